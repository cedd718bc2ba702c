//! Particle force-field attachment payload (spec §3 "ForceField").
//!
//! As with [`super::emitter::Emitter`], world position is derived from the
//! owning node's world matrix rather than duplicated here.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceFieldBehavior {
    Attract,
    Repel,
    Orbit,
}

#[derive(Debug, Clone, Copy)]
pub struct ForceField {
    pub behavior: ForceFieldBehavior,
    pub strength: f32,
    pub area_of_effect: f32,
    /// Falloff exponent applied to `1 - distance/area_of_effect` (§4.9 step 4).
    pub fade: f32,
}

impl Default for ForceField {
    fn default() -> Self {
        Self { behavior: ForceFieldBehavior::Attract, strength: 1.0, area_of_effect: 5.0, fade: 1.0 }
    }
}
