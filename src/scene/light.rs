//! Light attachment payload (spec §3 "Light").
//!
//! `kind` is not stored here: it is carried by the [`super::node::Attachment`]
//! variant (`PointLight`/`DirectionalLight`/`SpotLight`) the light is attached
//! under, and world position/direction are derived from the owning node's
//! world matrix rather than duplicated on this struct.

use glam::Vec4;

use crate::warehouse::texture::TextureHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Point,
    Directional,
    Spot,
}

#[derive(Debug, Clone)]
pub struct Light {
    pub color: Vec4,
    pub intensity: f32,
    /// Influence radius (point/spot) or far-plane extent used to derive the
    /// shadow projection (§4.7).
    pub radius: f32,
    /// Half-angle of the spot cone, in radians. Unused for point/directional.
    pub cone_angle_radians: f32,
    pub has_shadow: bool,
    /// Allocated once by a collaborator when `has_shadow` is set: a 2D
    /// texture for directional/spot, a cube texture for point lights.
    pub shadow_map: Option<TextureHandle>,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            color: Vec4::new(1.0, 1.0, 1.0, 1.0),
            intensity: 1.0,
            radius: 10.0,
            cone_angle_radians: std::f32::consts::FRAC_PI_4,
            has_shadow: false,
            shadow_map: None,
        }
    }
}
