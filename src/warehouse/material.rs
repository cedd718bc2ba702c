//! Material resource (spec §3 "Material", §4.6 feature bits).

use crate::handle::Handle;
use crate::warehouse::texture::TextureHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaterialType {
    #[default]
    Pbr,
    Unlit,
    Wireframe,
}

bitflags::bitflags! {
    /// Feature bits encoded into a [`super::super::batch::BatchKey`].
    ///
    /// The raw bit pattern indexes the pipeline-variant array (spec §4.6):
    /// pipelines are created lazily or up front for every combination of
    /// these bits actually used by a material.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MaterialFeatures: u32 {
        const ALBEDO_TEXTURE             = 1 << 0;
        const METALLIC_ROUGHNESS_TEXTURE = 1 << 1;
        const NORMAL_TEXTURE             = 1 << 2;
        const EMISSIVE_TEXTURE           = 1 << 3;
        const SKINNING                   = 1 << 4;
    }
}

/// Materials are pure data: they never own a descriptor set. Shaders
/// dereference `albedo_index` etc. via bindless indexing into the
/// warehouse's `sampler2D[]` array at draw time.
#[derive(Debug, Clone)]
pub struct Material {
    pub material_type: MaterialType,
    pub features: MaterialFeatures,
    pub albedo_texture: Option<TextureHandle>,
    pub metallic_roughness_texture: Option<TextureHandle>,
    pub normal_texture: Option<TextureHandle>,
    pub emissive_texture: Option<TextureHandle>,
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: [f32; 3],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            material_type: MaterialType::default(),
            features: MaterialFeatures::empty(),
            albedo_texture: None,
            metallic_roughness_texture: None,
            normal_texture: None,
            emissive_texture: None,
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: [0.0, 0.0, 0.0],
        }
    }
}

pub type MaterialHandle = Handle<Material>;

/// GPU-side mirror of [`Material`], laid out for the bindless material SSBO
/// (spec §4.3: "one SSBO of `MaterialGPU[]`"). Texture indices of `0` mean
/// "use the dummy slot" when no texture is bound.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialGpu {
    pub base_color_factor: [f32; 4],
    pub emissive_factor: [f32; 3],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub material_type: u32,
    pub albedo_index: u32,
    pub metallic_roughness_index: u32,
    pub normal_index: u32,
    pub emissive_index: u32,
    pub feature_bits: u32,
    pub _pad: [u32; 2],
}

impl MaterialGpu {
    pub fn from_material(material: &Material) -> Self {
        let index_of = |h: Option<TextureHandle>| h.map(|h| h.index + 1).unwrap_or(0);
        Self {
            base_color_factor: material.base_color_factor,
            emissive_factor: material.emissive_factor,
            metallic_factor: material.metallic_factor,
            roughness_factor: material.roughness_factor,
            material_type: material.material_type as u32,
            albedo_index: index_of(material.albedo_texture),
            metallic_roughness_index: index_of(material.metallic_roughness_texture),
            normal_index: index_of(material.normal_texture),
            emissive_index: index_of(material.emissive_texture),
            feature_bits: material.features.bits(),
            _pad: [0; 2],
        }
    }
}
