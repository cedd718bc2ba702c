//! Fixed capacities named throughout spec §3/§4. Collected in one place
//! instead of scattered per-module magic numbers, since several modules
//! (warehouse, scene, culling, frame) all need to agree on the same bound.

/// Frames the CPU may have in flight toward the GPU at once (spec §3 "Frame").
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Upper bound on simultaneously active scene nodes (spec §4.5, §3 "NodeCullingData").
pub const MAX_SCENE_NODES: u32 = 4096;

/// Upper bound on simultaneously active lights, and thus shadow map slots
/// (spec §3 "Frame": "one 2D per light slot + one cube per light slot").
pub const MAX_LIGHTS: u32 = 10;

/// Size of the fixed particle pool (spec §3 "Particle").
pub const MAX_PARTICLES: u32 = 65536;

/// Force fields considered per frame by the particle compute pass (spec §4.9 step 3).
pub const MAX_FORCE_FIELDS: u32 = 32;

/// Bindless `sampler2D[]` array capacity (spec §4.3).
pub const MAX_TEXTURES: u32 = 4096;

/// Bindless cube-sampler array capacity (spec §4.3).
pub const MAX_CUBE_TEXTURES: u32 = 256;

pub const MAX_MESHES: u32 = 16384;
pub const MAX_MATERIALS: u32 = 4096;
pub const MAX_CAMERAS: u32 = 16;

/// Vertex/index sub-allocation arena sizes, in elements, for the two global
/// buffers the warehouse sub-allocates meshes from (spec §4.3).
pub const MAX_VERTICES: u32 = 4_000_000;
pub const MAX_INDICES: u32 = 12_000_000;

/// Sub-allocation arena size, in elements, for the global skin-vertex
/// buffer (per-vertex bone indices/weights, spec §3 "Mesh" skinning range).
pub const MAX_SKIN_VERTICES: u32 = 1_000_000;

/// Size classes for the bone-matrix slab (spec §4.2), sorted ascending by
/// `block_size`. Covers small props up through full humanoid rigs; the
/// top class's aggregate character count is aspirational (spec §9) and
/// should be checked against the device's max storage-buffer range at init.
pub const BONE_SLAB_CLASSES: [(u32, u32); 6] = [(8, 512), (16, 512), (32, 256), (64, 128), (128, 64), (256, 32)];
