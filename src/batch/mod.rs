//! Groups visible meshes so draws sharing a pipeline and descriptor layout
//! are issued together (spec §4.6).

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;

use crate::scene::RenderNode;
use crate::warehouse::material::{MaterialFeatures, MaterialType};
use crate::warehouse::ResourceWarehouse;

/// `(node_id, camera_index, material_id, mesh_id, bone_matrix_offset)`, the
/// one push-constant layout every draw-capable pass shares (spec §6). Lives
/// here rather than in `shadow` or `main_pass` since both depend on it.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawPushConstants {
    pub node_id: u32,
    pub camera_index: u32,
    pub material_id: u32,
    pub mesh_id: u32,
    pub bone_matrix_offset: u32,
}

bitflags! {
    /// Same bit layout as [`MaterialFeatures`]; re-exposed here because the
    /// batch key is a renderer-facing concept independent of material
    /// storage (spec §4.6: "the raw bit pattern indexes the pipeline-variant
    /// array").
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FeatureSet: u32 {
        const ALBEDO_TEXTURE             = 1 << 0;
        const METALLIC_ROUGHNESS_TEXTURE = 1 << 1;
        const NORMAL_TEXTURE             = 1 << 2;
        const EMISSIVE_TEXTURE           = 1 << 3;
        const SKINNING                   = 1 << 4;
    }
}

impl From<MaterialFeatures> for FeatureSet {
    fn from(features: MaterialFeatures) -> Self {
        FeatureSet::from_bits_truncate(features.bits())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub feature_set: FeatureSet,
    pub material_type: MaterialType,
}

/// One batch: a key plus the render nodes sharing it. Element order within
/// a batch is arbitrary (spec §4.6).
#[derive(Debug, Clone)]
pub struct Batch {
    pub key: BatchKey,
    pub nodes: Vec<RenderNode>,
}

/// Group `visible` into batches and return them ordered by key, so the main
/// renderer consolidates pipeline/descriptor binds between batches (spec
/// §4.6: "between batches, iteration order is by key").
pub fn build_batches(visible: &[RenderNode], warehouse: &ResourceWarehouse) -> Vec<Batch> {
    let mut grouped: FxHashMap<BatchKey, Vec<RenderNode>> = FxHashMap::default();

    for &render_node in visible {
        let Some(material) = warehouse.material(render_node.material) else { continue };
        let mut feature_set: FeatureSet = material.features.into();
        if render_node.bone_matrix_offset.is_some() {
            feature_set |= FeatureSet::SKINNING;
        }
        let key = BatchKey { feature_set, material_type: material.material_type };
        grouped.entry(key).or_default().push(render_node);
    }

    let mut batches: Vec<Batch> = grouped.into_iter().map(|(key, nodes)| Batch { key, nodes }).collect();
    batches.sort_by_key(|batch| (batch.key.material_type as u32, batch.key.feature_set.bits()));
    batches
}

/// Same grouping, restricted to shadow casters (spec §4.7: "iterate the
/// same batch set produced by §4.6 filtered to `cast_shadow = true`").
pub fn build_shadow_batches(visible: &[RenderNode], warehouse: &ResourceWarehouse) -> Vec<Batch> {
    let casters: Vec<RenderNode> = visible.iter().copied().filter(|n| n.cast_shadow).collect();
    build_batches(&casters, warehouse)
}

#[cfg(test)]
#[path = "../batch_tests.rs"]
mod tests;
