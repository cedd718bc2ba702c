//! Particle emitter attachment payload (spec §3 "Emitter").
//!
//! The source's `Emitter` carries its own `transform` field; here the
//! owning [`super::node::Node`]'s local transform already serves that role,
//! so it is not duplicated.

use glam::Vec4;

#[derive(Debug, Clone)]
pub struct Emitter {
    /// Particles spawned per second while `enabled`.
    pub emission_rate: f32,
    pub lifetime: f32,
    /// Uniform random offset applied to spawn position, `±spread` per axis.
    pub position_spread: glam::Vec3,
    pub velocity_spread: glam::Vec3,
    pub initial_velocity: glam::Vec3,
    pub weight: f32,
    pub weight_spread: f32,
    pub color_start: Vec4,
    pub color_end: Vec4,
    pub size_start: f32,
    pub size_end: f32,
    pub enabled: bool,
    /// Fractional-second accumulator driving the spawn cadence (§4.9 step 2).
    pub time_accumulator: f32,
}

impl Default for Emitter {
    fn default() -> Self {
        Self {
            emission_rate: 10.0,
            lifetime: 1.0,
            position_spread: glam::Vec3::ZERO,
            velocity_spread: glam::Vec3::ZERO,
            initial_velocity: glam::Vec3::ZERO,
            weight: 1.0,
            weight_spread: 0.0,
            color_start: Vec4::new(1.0, 1.0, 1.0, 1.0),
            color_end: Vec4::new(1.0, 1.0, 1.0, 0.0),
            size_start: 1.0,
            size_end: 1.0,
            enabled: true,
            time_accumulator: 0.0,
        }
    }
}
