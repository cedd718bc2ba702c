//! Texture resource (spec §3 "Texture Entry").
//!
//! Every live 2D texture occupies one slot in the bindless `sampler2D[]`
//! array, indexed by `handle.index`; slot 0 is a dummy texture so shaders
//! reading an unbound index never trap (spec §9 "Bindless pattern").

use ash::vk;

use crate::gpu::memory::GpuImage;
use crate::handle::Handle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8Srgb,
    R8Unorm,
}

impl TextureFormat {
    pub fn to_vk(self) -> vk::Format {
        match self {
            TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
            TextureFormat::Rgba8Srgb => vk::Format::R8G8B8A8_SRGB,
            TextureFormat::R8Unorm => vk::Format::R8_UNORM,
        }
    }
}

pub enum TextureEntry {
    Image2D { width: u32, height: u32, format: TextureFormat, image: GpuImage },
    ImageCube { width: u32, height: u32, format: TextureFormat, image: GpuImage },
}

impl Default for TextureEntry {
    fn default() -> Self {
        // Placeholder for a freshly-allocated-but-not-yet-uploaded slot;
        // replaced by `ResourceWarehouse::upload_texture` before any draw
        // observes it. Real engines would make this an `Option`, but the
        // spec's Pool<T> contract zero-initializes on alloc and the
        // warehouse never hands the handle back to a caller until the
        // upload completes, so this variant is never externally visible.
        TextureEntry::Image2D {
            width: 0,
            height: 0,
            format: TextureFormat::Rgba8Unorm,
            image: GpuImage {
                image: vk::Image::null(),
                view: vk::ImageView::null(),
                allocation: None,
                width: 0,
                height: 0,
                layers: 1,
                format: vk::Format::R8G8B8A8_UNORM,
                face_views: None,
            },
        }
    }
}

impl TextureEntry {
    pub fn view(&self) -> vk::ImageView {
        match self {
            TextureEntry::Image2D { image, .. } => image.view,
            TextureEntry::ImageCube { image, .. } => image.view,
        }
    }

    pub fn is_cube(&self) -> bool {
        matches!(self, TextureEntry::ImageCube { .. })
    }
}

pub type TextureHandle = Handle<TextureEntry>;
