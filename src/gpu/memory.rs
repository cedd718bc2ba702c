//! Memory-type lookup and the single image constructor spec §9 asks for.

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use super::GpuContext;
use crate::error::{Error, Result};

/// An allocated GPU image plus its view, ready for use as a render/shadow
/// target or bindless-indexed sampled texture.
pub struct GpuImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub allocation: Option<Allocation>,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub format: vk::Format,
    /// Per-face views, populated only for 6-layer cube images (point-light
    /// shadow maps), so each face can be bound as its own render target.
    pub face_views: Option<[vk::ImageView; 6]>,
}

/// The one image constructor named in spec §9 ("the final core should
/// expose one that takes (width, height, format, usage)"). `layers` and
/// `flags` are additional parameters [`GpuContext::create_image`] and
/// [`GpuContext::create_cube_image`] pass through so both shadow map
/// shapes share this single code path.
pub(super) fn create_image(
    ctx: &GpuContext,
    width: u32,
    height: u32,
    layers: u32,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
    flags: vk::ImageCreateFlags,
) -> Result<GpuImage> {
    let image_info = vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(format)
        .extent(vk::Extent3D { width, height, depth: 1 })
        .mip_levels(1)
        .array_layers(layers)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .flags(flags);

    let image = unsafe { ctx.device.create_image(&image_info, None) }
        .map_err(|e| Error::BackendError(format!("create_image: {e}")))?;

    let requirements = unsafe { ctx.device.get_image_memory_requirements(image) };
    let allocation = ctx
        .allocator
        .lock()
        .map_err(|_| Error::BackendError("gpu allocator lock poisoned".into()))?
        .allocate(&AllocationCreateDesc {
            name: "gpu_image",
            requirements,
            location: MemoryLocation::GpuOnly,
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })
        .map_err(|_| Error::OutOfMemory)?;

    unsafe {
        ctx.device
            .bind_image_memory(image, allocation.memory(), allocation.offset())
            .map_err(|e| Error::BackendError(format!("bind_image_memory: {e}")))?;
    }

    let aspect = if is_depth_format(format) {
        vk::ImageAspectFlags::DEPTH
    } else {
        vk::ImageAspectFlags::COLOR
    };

    let view_type = if layers == 6 { vk::ImageViewType::CUBE } else { vk::ImageViewType::TYPE_2D };
    let view = create_view(ctx, image, format, aspect, view_type, 0, layers)?;

    let face_views = if layers == 6 {
        let mut faces = [vk::ImageView::null(); 6];
        for (i, face) in faces.iter_mut().enumerate() {
            *face = create_view(ctx, image, format, aspect, vk::ImageViewType::TYPE_2D, i as u32, 1)?;
        }
        Some(faces)
    } else {
        None
    };

    Ok(GpuImage { image, view, allocation: Some(allocation), width, height, layers, format, face_views })
}

fn create_view(
    ctx: &GpuContext,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
    view_type: vk::ImageViewType,
    base_layer: u32,
    layer_count: u32,
) -> Result<vk::ImageView> {
    let info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(view_type)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: base_layer,
            layer_count,
        });
    unsafe { ctx.device.create_image_view(&info, None) }.map_err(|e| Error::BackendError(format!("create_image_view: {e}")))
}

fn is_depth_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D16_UNORM
            | vk::Format::D32_SFLOAT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D32_SFLOAT_S8_UINT
            | vk::Format::D16_UNORM_S8_UINT
    )
}

/// Find a memory type index satisfying `type_bits` and `properties`, the
/// same linear scan any Vulkan allocator setup performs against
/// `VkPhysicalDeviceMemoryProperties`.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        let suitable = (type_bits & (1 << i)) != 0;
        let supports_properties =
            memory_properties.memory_types[i as usize].property_flags.contains(properties);
        suitable && supports_properties
    })
}

impl GpuImage {
    /// Release the image, its view(s), and its GPU allocation.
    ///
    /// `GpuImage` intentionally does not implement `Drop` and reach back
    /// into a `GpuContext` itself — it holds no ctx reference to avoid an
    /// `Arc` cycle. Callers (warehouse texture free, shadow map teardown)
    /// call this explicitly with the same `GpuContext` that created it,
    /// mirroring spec §4.3's "caller-driven resource release" discipline
    /// for handle pool frees.
    pub fn destroy(mut self, ctx: &GpuContext) {
        unsafe {
            if let Some(faces) = self.face_views.take() {
                for view in faces {
                    ctx.device.destroy_image_view(view, None);
                }
            }
            ctx.device.destroy_image_view(self.view, None);
            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = ctx.allocator.lock() {
                    let _ = allocator.free(allocation);
                }
            }
            ctx.device.destroy_image(self.image, None);
        }
    }
}
