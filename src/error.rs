//! Error types for the renderer core.
//!
//! Mirrors the error taxonomy in spec §7: fallible operations at the API
//! boundary return [`Error`]; invalid-handle conditions are represented as
//! `Option::None` at call sites and never surface as an `Err` variant in
//! practice (the variant exists for completeness and internal assertions).

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Result type for renderer core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Renderer core errors.
#[derive(Debug, Clone)]
pub enum Error {
    /// Device, memory, or descriptor setup failed during initialization.
    InitializationFailed(String),

    /// A GPU or host allocation could not be satisfied.
    OutOfMemory,

    /// A handle did not resolve in its pool (stale generation or out of
    /// range). Call sites should prefer `Option::None` from `Pool::get`;
    /// this variant exists for internal invariants only.
    InvalidHandle,

    /// The swapchain image is stale; the orchestrator must trigger a
    /// swapchain rebuild before the frame can be resubmitted.
    SwapchainOutOfDate,

    /// The logical device was lost. Fatal: the process must tear down in
    /// an orderly fashion and exit.
    DeviceLost,

    /// A SPIR-V module failed validation or creation. Fatal at init.
    ShaderModuleInvalid(String),

    /// A fixed-size pool (meshes, materials) could not accept another
    /// entry. Distinct from the warn-and-drop capacities (culling,
    /// particles, lights) which never return this.
    CapacityExceeded(String),

    /// Backend (Vulkan) error not covered by a more specific variant.
    BackendError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InitializationFailed(msg) => write!(f, "initialization failed: {msg}"),
            Error::OutOfMemory => write!(f, "out of memory"),
            Error::InvalidHandle => write!(f, "invalid handle"),
            Error::SwapchainOutOfDate => write!(f, "swapchain out of date"),
            Error::DeviceLost => write!(f, "device lost"),
            Error::ShaderModuleInvalid(msg) => write!(f, "shader module invalid: {msg}"),
            Error::CapacityExceeded(msg) => write!(f, "capacity exceeded: {msg}"),
            Error::BackendError(msg) => write!(f, "backend error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ash::vk::Result> for Error {
    fn from(result: ash::vk::Result) -> Self {
        match result {
            ash::vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
            | ash::vk::Result::ERROR_OUT_OF_HOST_MEMORY => Error::OutOfMemory,
            ash::vk::Result::ERROR_DEVICE_LOST => Error::DeviceLost,
            ash::vk::Result::ERROR_OUT_OF_DATE_KHR => Error::SwapchainOutOfDate,
            other => Error::BackendError(other.to_string()),
        }
    }
}

/// A point-in-time read of [`DroppedCounts`]'s warn-and-drop tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DroppedCountsSnapshot {
    pub culling_nodes: u32,
    pub particles_force_fields: u32,
    pub lights: u32,
}

/// Accumulates the warn-and-drop events `CapacityExceeded`'s doc comment
/// describes for culling, particles, and lights — the three capacities that
/// degrade visual fidelity instead of returning `Err`. Shared via `Arc`
/// across whichever subsystems drop entries, read back through
/// [`Engine::dropped_counts`](crate::engine::Engine::dropped_counts).
#[derive(Debug, Default)]
pub struct DroppedCounts {
    culling_nodes: AtomicU32,
    particles_force_fields: AtomicU32,
    lights: AtomicU32,
}

impl DroppedCounts {
    pub fn record_culling_nodes(&self, count: u32) {
        self.culling_nodes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_particles_force_fields(&self, count: u32) {
        self.particles_force_fields.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_lights(&self, count: u32) {
        self.lights.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DroppedCountsSnapshot {
        DroppedCountsSnapshot {
            culling_nodes: self.culling_nodes.load(Ordering::Relaxed),
            particles_force_fields: self.particles_force_fields.load(Ordering::Relaxed),
            lights: self.lights.load(Ordering::Relaxed),
        }
    }
}
