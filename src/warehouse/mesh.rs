//! Mesh resource (spec §3 "Mesh").

use crate::handle::Handle;
use crate::math::Aabb;

/// A sub-allocated range within one of the warehouse's two global buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferRange {
    pub offset: u32,
    pub count: u32,
}

/// Skinning data for a mesh with bone weights.
#[derive(Debug, Clone)]
pub struct Skinning {
    /// Range in the global skin-vertex buffer (weights/indices per vertex).
    pub skin_vertex_range: BufferRange,
    /// Warehouse-local indices of this mesh's bones within its node's
    /// skeleton (not warehouse handles — bones are not separately pooled).
    pub bones: Vec<u32>,
    pub root_bone_index: u32,
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub aabb: Aabb,
    pub index_range: BufferRange,
    pub vertex_range: BufferRange,
    pub skinning: Option<Skinning>,
}

impl Default for Mesh {
    fn default() -> Self {
        Self {
            aabb: Aabb::unit(),
            index_range: BufferRange::default(),
            vertex_range: BufferRange::default(),
            skinning: None,
        }
    }
}

pub type MeshHandle = Handle<Mesh>;

/// GPU-side mirror of [`Mesh`], one entry per live mesh in the bindless
/// `MeshGPU[]` SSBO (spec §4.3). Shaders index this with `mesh_id` from the
/// push constants to find the index/vertex sub-ranges for the current draw.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshGpu {
    pub index_offset: u32,
    pub index_count: u32,
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub skin_vertex_offset: u32,
    pub has_skinning: u32,
    pub _pad: [u32; 2],
}

impl MeshGpu {
    pub fn from_mesh(mesh: &Mesh) -> Self {
        let (skin_vertex_offset, has_skinning) = match &mesh.skinning {
            Some(skin) => (skin.skin_vertex_range.offset, 1),
            None => (0, 0),
        };
        Self {
            index_offset: mesh.index_range.offset,
            index_count: mesh.index_range.count,
            vertex_offset: mesh.vertex_range.offset,
            vertex_count: mesh.vertex_range.count,
            skin_vertex_offset,
            has_skinning,
            _pad: [0; 2],
        }
    }
}
