//! Scene graph integration tests (spec §4.4/§4.5): hierarchy propagation,
//! cyclic-parent rejection, and light/force-field/emitter collection — all
//! warehouse-free, so no Vulkan device is needed.

use std::sync::Arc;

use approx::assert_relative_eq;
use glam::Vec3;
use rendercore::log::NullLogger;
use rendercore::scene::{Attachment, ForceField, ForceFieldBehavior, Light, LightKind, Scene, Transform};

fn empty_scene() -> Scene {
    Scene::new(64, Arc::new(NullLogger))
}

#[test]
fn world_matrix_propagates_through_parent_chain() {
    let mut scene = empty_scene();
    let root = scene.attach_node(None, Transform { translation: Vec3::new(1.0, 0.0, 0.0), ..Default::default() }, Attachment::None).unwrap();
    let child = scene.attach_node(Some(root), Transform { translation: Vec3::new(0.0, 2.0, 0.0), ..Default::default() }, Attachment::None).unwrap();

    scene.update_world_matrices();

    let child_world = scene.node(child).unwrap().world_matrix();
    let translation = child_world.col(3).truncate();
    assert_relative_eq!(translation, Vec3::new(1.0, 2.0, 0.0), epsilon = 1e-5);
}

#[test]
fn attach_node_rejects_an_unresolved_parent_handle() {
    let mut scene = empty_scene();
    let root = scene.attach_node(None, Transform::default(), Attachment::None).unwrap();
    scene.free_node(root);

    let result = scene.attach_node(Some(root), Transform::default(), Attachment::None);
    assert!(result.is_err(), "a freed handle must not resolve as a valid parent");
}

#[test]
fn freed_node_is_excluded_from_counts_and_iteration() {
    let mut scene = empty_scene();
    let a = scene.attach_node(None, Transform::default(), Attachment::None).unwrap();
    let b = scene.attach_node(None, Transform::default(), Attachment::None).unwrap();
    assert_eq!(scene.active_node_count(), 2);

    scene.free_node(a);
    assert_eq!(scene.active_node_count(), 1);
    assert!(scene.node(a).is_none());
    assert!(scene.node(b).is_some());
}

#[test]
fn collect_lights_resolves_world_position_from_node_matrix() {
    let mut scene = empty_scene();
    let light = Light { has_shadow: true, ..Default::default() };
    let node = scene
        .attach_node(None, Transform { translation: Vec3::new(3.0, 4.0, 5.0), ..Default::default() }, Attachment::PointLight(light))
        .unwrap();
    scene.update_world_matrices();

    let lights = scene.collect_lights();
    assert_eq!(lights.len(), 1);
    assert_eq!(lights[0].node, node);
    assert_eq!(lights[0].kind, LightKind::Point);
    assert_relative_eq!(lights[0].world_position, Vec3::new(3.0, 4.0, 5.0), epsilon = 1e-5);
}

#[test]
fn collect_forcefields_reports_world_position() {
    let mut scene = empty_scene();
    let force_field = ForceField { behavior: ForceFieldBehavior::Attract, strength: 2.5, area_of_effect: 10.0, fade: 1.0 };
    scene
        .attach_node(None, Transform { translation: Vec3::new(-1.0, 0.0, 2.0), ..Default::default() }, Attachment::ForceField(force_field))
        .unwrap();
    scene.update_world_matrices();

    let fields = scene.collect_forcefields();
    assert_eq!(fields.len(), 1);
    assert_relative_eq!(fields[0].world_position, Vec3::new(-1.0, 0.0, 2.0), epsilon = 1e-5);
    assert_eq!(fields[0].force_field.behavior, ForceFieldBehavior::Attract);
}

#[test]
fn disabling_culling_does_not_remove_the_node() {
    let mut scene = empty_scene();
    let node = scene.attach_node(None, Transform::default(), Attachment::None).unwrap();
    scene.set_node_culling(node, false);
    assert!(scene.node(node).is_some());
    assert_eq!(scene.active_node_count(), 1);
}
