//! Scene graph: a pool of [`Node`]s addressed by handle, with a dirty-bit
//! world-matrix propagation pass and a set of render-oriented collectors
//! (spec §3 "Node", §4.4 "Scene Graph").
//!
//! Same `take_new`/dirty idiom as a flat, pipeline-bound render-instance
//! store, generalized to a `Pool<Node>` tree with tagged-union attachments
//! — every node is addressable the same way regardless of whether it
//! carries a mesh, a light, an emitter, or nothing at all.

pub mod emitter;
pub mod force_field;
pub mod light;
pub mod node;

use std::sync::Arc;

use glam::{Mat4, Vec3};

use crate::error::{Error, Result};
use crate::handle::Pool;
use crate::log::Logger;
use crate::math::{Aabb, Frustum};
use crate::warehouse::ResourceWarehouse;

pub use emitter::Emitter;
pub use force_field::{ForceField, ForceFieldBehavior};
pub use light::{Light, LightKind};
pub use node::{Attachment, MeshSkinning, Node, NodeGpu, NodeHandle, RenderNode, Transform};

/// A force field resolved to world space, as returned by
/// [`Scene::collect_forcefields`] (spec §4.9 step 3).
#[derive(Debug, Clone)]
pub struct ForceFieldInstance {
    pub node: NodeHandle,
    pub world_position: Vec3,
    pub force_field: ForceField,
}

/// A light resolved to world space, as returned by [`Scene::collect_lights`].
#[derive(Debug, Clone)]
pub struct LightInstance {
    pub node: NodeHandle,
    pub kind: LightKind,
    pub world_position: Vec3,
    /// Local -Z of the node's world matrix; meaningless for point lights.
    pub world_direction: Vec3,
    pub light: Light,
}

pub struct Scene {
    logger: Arc<dyn Logger>,
    nodes: Pool<Node>,
}

impl Scene {
    pub fn new(capacity: u32, logger: Arc<dyn Logger>) -> Self {
        Self { logger, nodes: Pool::with_capacity(capacity) }
    }

    /// Create a node under `parent` (`None` attaches at the tree's implicit
    /// root, whose world matrix is the identity sentinel) with the given
    /// local transform and attachment (spec §6 `attach_node`).
    pub fn attach_node(&mut self, parent: Option<NodeHandle>, transform: Transform, attachment: Attachment) -> Result<NodeHandle> {
        if let Some(parent) = parent {
            if self.nodes.get(parent).is_none() {
                crate::engine_warn!(self, "rendercore::Scene", "attach_node: parent handle {parent:?} does not resolve");
                return Err(Error::InvalidHandle);
            }
        }

        let (handle, node) = self.nodes.alloc().ok_or_else(|| {
            crate::engine_warn!(self, "rendercore::Scene", "scene node pool exhausted");
            Error::CapacityExceeded("scene node pool exhausted".into())
        })?;
        node.local = transform;
        node.attachment = attachment;
        node.dirty = true;

        if let Some(parent) = parent {
            self.link(parent, handle);
        }

        Ok(handle)
    }

    /// Push `child` into `parent`'s child list and mark it dirty (spec §4.4
    /// traversal contract). Rejects a change that would create a cycle by
    /// walking up from `parent` looking for `child` first (spec §9).
    fn link(&mut self, parent: NodeHandle, child: NodeHandle) -> bool {
        if parent == child || self.creates_cycle(parent, child) {
            return false;
        }

        if let Some(old_parent) = self.nodes.get(child).and_then(|n| n.parent) {
            if let Some(op) = self.nodes.get_mut(old_parent) {
                op.children.retain(|&c| c != child);
            }
        }

        match self.nodes.get_mut(parent) {
            Some(p) => p.children.push(child),
            None => return false,
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
            c.dirty = true;
        }
        true
    }

    fn creates_cycle(&self, parent: NodeHandle, child: NodeHandle) -> bool {
        let mut current = Some(parent);
        while let Some(h) = current {
            if h == child {
                return true;
            }
            current = self.nodes.get(h).and_then(|n| n.parent);
        }
        false
    }

    /// Recursively free `handle` and every descendant (spec §3 "parent owns
    /// children").
    pub fn free_node(&mut self, handle: NodeHandle) {
        let children = match self.nodes.get(handle) {
            Some(n) => n.children.clone(),
            None => return,
        };
        for child in children {
            self.free_node(child);
        }
        if let Some(parent) = self.nodes.get(handle).and_then(|n| n.parent) {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|&c| c != handle);
            }
        }
        self.nodes.free(handle);
    }

    pub fn set_node_culling(&mut self, handle: NodeHandle, enabled: bool) {
        match self.nodes.get_mut(handle) {
            Some(node) => node.culling_enabled = enabled,
            None => crate::engine_warn!(self, "rendercore::Scene", "set_node_culling: handle {handle:?} does not resolve"),
        }
    }

    pub fn set_local_transform(&mut self, handle: NodeHandle, transform: Transform) {
        match self.nodes.get_mut(handle) {
            Some(node) => node.set_local_transform(transform),
            None => crate::engine_warn!(self, "rendercore::Scene", "set_local_transform: handle {handle:?} does not resolve"),
        }
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    pub fn active_node_count(&self) -> usize {
        self.nodes.active_count()
    }

    pub fn capacity_used(&self) -> usize {
        self.nodes.capacity_used()
    }

    /// Raw dense iteration over every active node, in pool storage order.
    /// Used by the culling engine to fill `NodeCullingData` by slot index
    /// and by the frame orchestrator to fill the `NodeGPU[]` SSBO.
    pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeHandle, &Node)> {
        self.nodes.iter()
    }

    /// Recompute `world_matrix` for every dirty node (spec §4.4).
    ///
    /// Two linear passes (not recursion) over dense pool storage. The first
    /// pass is correct whenever parents were created before their children
    /// (the common case, since [`Self::attach_node`] always creates a fresh
    /// leaf). The second pass fixes residuals left by any node whose parent
    /// happens to sit at a higher pool index — `touched` persists across
    /// both passes so a parent recomputed late in pass one still propagates
    /// to a child pass one already skipped.
    pub fn update_world_matrices(&mut self) {
        let mut touched = vec![false; self.nodes.capacity_used()];
        self.propagate_pass(&mut touched);
        self.propagate_pass(&mut touched);
    }

    fn propagate_pass(&mut self, touched: &mut [bool]) {
        let handles: Vec<NodeHandle> = self.nodes.iter().map(|(h, _)| h).collect();
        for handle in handles {
            let (parent, own_dirty) = match self.nodes.get(handle) {
                Some(n) => (n.parent, n.dirty),
                None => continue,
            };
            let parent_touched = parent.map(|p| touched[p.index as usize]).unwrap_or(false);
            if !own_dirty && !parent_touched {
                continue;
            }

            let parent_world = match parent {
                Some(p) => self.nodes.get(p).map(|n| n.world_matrix).unwrap_or(Mat4::IDENTITY),
                None => Mat4::IDENTITY,
            };
            if let Some(node) = self.nodes.get_mut(handle) {
                node.world_matrix = parent_world * node.local.to_matrix();
                node.dirty = false;
            }
            touched[handle.index as usize] = true;
        }
    }

    /// Local-space AABB for a node's attachment (spec §4.5 upload step):
    /// mesh's stored AABB, light's radius box, particle system's own
    /// bounds, or the unit box for an emitter/force field. `None` for
    /// attachments that have no extent (`Attachment::None`).
    pub fn local_aabb(&self, handle: NodeHandle, warehouse: &ResourceWarehouse) -> Option<Aabb> {
        let node = self.nodes.get(handle)?;
        match &node.attachment {
            Attachment::None => None,
            Attachment::Mesh { mesh, .. } => warehouse.mesh(*mesh).map(|m| m.aabb),
            Attachment::PointLight(light) | Attachment::SpotLight(light) => {
                Some(Aabb::new(Vec3::splat(-light.radius), Vec3::splat(light.radius)))
            }
            Attachment::DirectionalLight(_) => Some(Aabb::unit()),
            Attachment::Emitter(_) | Attachment::ForceField(_) => Some(Aabb::unit()),
            Attachment::ParticleSystem { aabb } => Some(*aabb),
        }
    }

    /// Visible mesh instances against `frustum` (spec §4.4). Used both for
    /// the main camera (GPU culling result notwithstanding, this gives the
    /// CPU-side batch builder a render-ready list) and, with a light's
    /// frustum, by the shadow renderer's inline per-light rejection (§4.7).
    pub fn collect_visible_meshes(&self, warehouse: &ResourceWarehouse, frustum: &Frustum) -> Vec<RenderNode> {
        let mut out = Vec::new();
        for (handle, node) in self.nodes.iter() {
            let Attachment::Mesh { mesh, material, cast_shadow, skinning } = &node.attachment else {
                continue;
            };
            let Some(mesh_data) = warehouse.mesh(*mesh) else { continue };
            let world_aabb = mesh_data.aabb.transformed(&node.world_matrix);
            if node.culling_enabled && !frustum.intersects_aabb(&world_aabb) {
                continue;
            }
            out.push(RenderNode {
                node: handle,
                mesh: *mesh,
                material: *material,
                cast_shadow: *cast_shadow,
                world_matrix: node.world_matrix,
                bone_matrix_offset: skinning.map(|s| s.bone_matrix_offset),
            });
        }
        out
    }

    pub fn collect_emitters(&self) -> Vec<NodeHandle> {
        self.nodes
            .iter()
            .filter_map(|(h, n)| matches!(n.attachment, Attachment::Emitter(ref e) if e.enabled).then_some(h))
            .collect()
    }

    pub fn collect_forcefields(&self) -> Vec<ForceFieldInstance> {
        self.nodes
            .iter()
            .filter_map(|(h, n)| match &n.attachment {
                Attachment::ForceField(ff) => {
                    Some(ForceFieldInstance { node: h, world_position: n.world_matrix.col(3).truncate(), force_field: *ff })
                }
                _ => None,
            })
            .collect()
    }

    pub fn collect_lights(&self) -> Vec<LightInstance> {
        self.nodes
            .iter()
            .filter_map(|(h, n)| {
                let (kind, light) = match &n.attachment {
                    Attachment::PointLight(l) => (LightKind::Point, l),
                    Attachment::DirectionalLight(l) => (LightKind::Directional, l),
                    Attachment::SpotLight(l) => (LightKind::Spot, l),
                    _ => return None,
                };
                Some(LightInstance {
                    node: h,
                    kind,
                    world_position: n.world_matrix.col(3).truncate(),
                    world_direction: n.world_matrix.transform_vector3(Vec3::NEG_Z).normalize_or_zero(),
                    light: light.clone(),
                })
            })
            .collect()
    }

    pub fn log(&self, severity: crate::log::LogSeverity, source: &str, message: String) {
        self.logger.log(&crate::log::LogEntry { severity, timestamp: std::time::SystemTime::now(), source: source.to_string(), message, file: None, line: None });
    }

    pub fn log_detailed(&self, severity: crate::log::LogSeverity, source: &str, message: String, file: &'static str, line: u32) {
        self.logger.log(&crate::log::LogEntry { severity, timestamp: std::time::SystemTime::now(), source: source.to_string(), message, file: Some(file), line: Some(line) });
    }
}

#[cfg(test)]
#[path = "../scene_tests.rs"]
mod tests;
