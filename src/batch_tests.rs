use super::*;

#[test]
fn feature_set_mirrors_material_features_bit_for_bit() {
    let features = MaterialFeatures::ALBEDO_TEXTURE | MaterialFeatures::NORMAL_TEXTURE;
    let feature_set: FeatureSet = features.into();
    assert_eq!(feature_set.bits(), features.bits());
    assert!(feature_set.contains(FeatureSet::ALBEDO_TEXTURE));
    assert!(feature_set.contains(FeatureSet::NORMAL_TEXTURE));
    assert!(!feature_set.contains(FeatureSet::SKINNING));
}

#[test]
fn batch_key_equality_ignores_field_order() {
    let a = BatchKey { feature_set: FeatureSet::SKINNING, material_type: MaterialType::Pbr };
    let b = BatchKey { feature_set: FeatureSet::SKINNING, material_type: MaterialType::Pbr };
    assert_eq!(a, b);

    let c = BatchKey { feature_set: FeatureSet::empty(), material_type: MaterialType::Pbr };
    assert_ne!(a, c);
}

// `build_batches`/`build_shadow_batches` themselves require a
// `ResourceWarehouse` (material lookups), which in turn requires a real
// `GpuContext`/Vulkan device to construct — not exercised here. See
// DESIGN.md's test-tooling section.
