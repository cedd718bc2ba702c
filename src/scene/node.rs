//! Scene node: transform, parent/child links, and a tagged-union attachment
//! (spec §3 "Node", §9 "Dynamic dispatch on attachments").

use glam::{Mat4, Quat, Vec3};

use crate::handle::Handle;
use crate::math::Aabb;
use crate::warehouse::material::MaterialHandle;
use crate::warehouse::mesh::MeshHandle;

use super::emitter::Emitter;
use super::force_field::ForceField;
use super::light::Light;

/// Local translation/rotation/scale, the source of `world_matrix` once
/// combined with the parent chain.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE }
    }
}

impl Transform {
    pub fn to_matrix(self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Extra per-mesh-attachment data beyond the mesh/material handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshSkinning {
    /// Offset of this instance's bone matrices within the global bone slab
    /// (spec §3 "bone-matrix region").
    pub bone_matrix_offset: u32,
}

/// The closed, small set of things a node can be (spec §9: tagged union,
/// not vtable polymorphism — the renderer matches on this directly).
#[derive(Debug, Clone, Default)]
pub enum Attachment {
    #[default]
    None,
    Mesh {
        mesh: MeshHandle,
        material: MaterialHandle,
        cast_shadow: bool,
        skinning: Option<MeshSkinning>,
    },
    PointLight(Light),
    DirectionalLight(Light),
    SpotLight(Light),
    Emitter(Emitter),
    ForceField(ForceField),
    ParticleSystem {
        aabb: Aabb,
    },
}

pub type NodeHandle = Handle<Node>;

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub(super) local: Transform,
    pub(super) world_matrix: Mat4,
    pub(super) dirty: bool,
    pub(super) parent: Option<NodeHandle>,
    pub(super) children: Vec<NodeHandle>,
    /// Manual culling override (spec §6 `set_node_culling`); attachments
    /// without an AABB still report `culling_enabled = false` regardless of
    /// this flag (§4.5 upload step).
    pub culling_enabled: bool,
    pub attachment: Attachment,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            name: String::new(),
            local: Transform::default(),
            world_matrix: Mat4::IDENTITY,
            dirty: true,
            parent: None,
            children: Vec::new(),
            culling_enabled: true,
            attachment: Attachment::None,
        }
    }
}

impl Node {
    pub fn local_transform(&self) -> Transform {
        self.local
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.world_matrix
    }

    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    pub fn set_local_transform(&mut self, transform: Transform) {
        self.local = transform;
        self.dirty = true;
    }
}

/// One mesh attachment resolved for drawing, as returned by
/// [`super::Scene::collect_visible_meshes`] (spec §4.4).
#[derive(Debug, Clone, Copy)]
pub struct RenderNode {
    pub node: NodeHandle,
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub cast_shadow: bool,
    pub world_matrix: Mat4,
    pub bone_matrix_offset: Option<u32>,
}

/// GPU-side mirror of a node, one entry per live scene slot in the bindless
/// `NodeGPU[]` SSBO (spec §4.3). Kept minimal: the fields shaders need to
/// resolve a draw without re-walking the CPU tree.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct NodeGpu {
    pub material_id: u32,
    pub mesh_id: u32,
    pub bone_matrix_offset: u32,
    pub flags: u32,
}

impl NodeGpu {
    pub const FLAG_HAS_SKINNING: u32 = 1 << 0;
    pub const FLAG_CAST_SHADOW: u32 = 1 << 1;

    pub fn from_render_node(render_node: &RenderNode) -> Self {
        let mut flags = 0u32;
        if render_node.bone_matrix_offset.is_some() {
            flags |= Self::FLAG_HAS_SKINNING;
        }
        if render_node.cast_shadow {
            flags |= Self::FLAG_CAST_SHADOW;
        }
        Self {
            material_id: render_node.material.index,
            mesh_id: render_node.mesh.index,
            bone_matrix_offset: render_node.bone_matrix_offset.unwrap_or(0),
            flags,
        }
    }
}
