use super::*;
use glam::{Mat4, Vec3};

#[test]
fn aabb_transformed_by_translation() {
    let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
    let m = Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0));
    let moved = aabb.transformed(&m);
    assert_eq!(moved.min, Vec3::new(4.0, -1.0, -1.0));
    assert_eq!(moved.max, Vec3::new(6.0, 1.0, 1.0));
}

#[test]
fn aabb_transformed_by_scale_stays_axis_aligned() {
    let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
    let m = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
    let scaled = aabb.transformed(&m);
    assert_eq!(scaled.min, Vec3::new(-2.0, -1.0, -1.0));
    assert_eq!(scaled.max, Vec3::new(2.0, 1.0, 1.0));
}

fn look_at_frustum(eye: Vec3, target: Vec3) -> Frustum {
    let view = Mat4::look_at_rh(eye, target, Vec3::Y);
    let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
    Frustum::from_view_projection(&(proj * view))
}

#[test]
fn frustum_soundness_box_behind_camera_is_culled() {
    let frustum = look_at_frustum(Vec3::ZERO, Vec3::Z * -1.0);
    // A unit box directly behind the camera (+Z when looking down -Z).
    let behind = Aabb::new(Vec3::new(-0.5, -0.5, 9.5), Vec3::new(0.5, 0.5, 10.5));
    assert!(!frustum.intersects_aabb(&behind));
}

#[test]
fn frustum_soundness_box_in_front_is_visible() {
    let frustum = look_at_frustum(Vec3::ZERO, Vec3::Z * -1.0);
    let ahead = Aabb::new(Vec3::new(-0.5, -0.5, -10.5), Vec3::new(0.5, 0.5, -9.5));
    assert!(frustum.intersects_aabb(&ahead));
}

#[test]
fn culling_correctness_scenario_line_of_meshes() {
    // Spec §8 scenario 6: 100 unit AABBs along -Z, camera facing +Z first,
    // then facing -Z.
    let boxes: Vec<Aabb> = (0..100)
        .map(|i| {
            let z = -(i as f32);
            Aabb::new(Vec3::new(-0.5, -0.5, z - 0.5), Vec3::new(0.5, 0.5, z + 0.5))
        })
        .collect();

    let facing_positive_z = look_at_frustum(Vec3::ZERO, Vec3::Z);
    let visible_count = boxes.iter().filter(|b| facing_positive_z.intersects_aabb(b)).count();
    assert_eq!(visible_count, 0);

    let facing_negative_z = look_at_frustum(Vec3::ZERO, Vec3::Z * -1.0);
    let visible_count = boxes.iter().filter(|b| facing_negative_z.intersects_aabb(b)).count();
    assert_eq!(visible_count, 100);
}
