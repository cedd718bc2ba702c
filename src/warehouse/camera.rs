//! Camera resource (spec §3 "Camera").
//!
//! A passive-storage `Camera` (the caller computes view/projection/frustum
//! and the engine only stores them) plus a `Projection`-driven constructor
//! on top. Spec §3 asks for more: "derives `view` and `projection` matrices
//! and a frustum (6 planes from V·P)" from perspective/orthographic
//! parameters, but passive storage stays useful for shadow cameras, whose
//! view/projection come from §4.7's per-light derivation rather than lens
//! parameters.

use glam::{Mat4, Vec3};

use crate::handle::Handle;
use crate::math::Frustum;

#[derive(Debug, Clone, Copy)]
pub enum Projection {
    Perspective { fov_y_radians: f32, aspect: f32, near: f32, far: f32 },
    Orthographic { half_width: f32, half_height: f32, near: f32, far: f32 },
}

impl Projection {
    pub fn to_matrix(self) -> Mat4 {
        match self {
            Projection::Perspective { fov_y_radians, aspect, near, far } => {
                Mat4::perspective_rh(fov_y_radians, aspect, near, far)
            }
            Projection::Orthographic { half_width, half_height, near, far } => Mat4::orthographic_rh(
                -half_width,
                half_width,
                -half_height,
                half_height,
                near,
                far,
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Camera {
    view: Mat4,
    projection: Mat4,
    frustum: Frustum,
}

impl Default for Camera {
    fn default() -> Self {
        Self::from_params(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y, Projection::Perspective {
            fov_y_radians: std::f32::consts::FRAC_PI_3,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        })
    }
}

impl Camera {
    /// Derive view, projection, and frustum from lens parameters — the
    /// entry point spec §3 describes. `eye`/`target`/`up` build the view
    /// matrix; `projection` builds the projection matrix; the frustum is
    /// always `Frustum::from_view_projection(&(projection * view))`.
    pub fn from_params(eye: Vec3, target: Vec3, up: Vec3, projection: Projection) -> Self {
        let view = Mat4::look_at_rh(eye, target, up);
        let proj = projection.to_matrix();
        let frustum = Frustum::from_view_projection(&(proj * view));
        Self { view, projection: proj, frustum }
    }

    /// Construct directly from matrices, the fully-passive path — used by
    /// the shadow renderer, whose view/projection are derived per-light
    /// (§4.7) rather than from FOV/aspect parameters.
    pub fn from_matrices(view: Mat4, projection: Mat4) -> Self {
        let frustum = Frustum::from_view_projection(&(projection * view));
        Self { view, projection, frustum }
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }
}

/// GPU-side mirror for the warehouse's bindless `Camera[]` uniform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraGpu {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
}

impl From<&Camera> for CameraGpu {
    fn from(camera: &Camera) -> Self {
        Self { view: camera.view, projection: camera.projection, view_projection: camera.view_projection_matrix() }
    }
}

pub type CameraHandle = Handle<Camera>;
