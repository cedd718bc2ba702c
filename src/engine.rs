//! Top-level engine wiring (spec §2 "System Overview").
//!
//! `Engine` owns one instance of every subsystem and the double-buffered
//! [`FrameOrchestrator`]. It is an explicit value the caller constructs and
//! holds — not a global singleton (spec §9: "no global mutable engine
//! state; callers hold an explicit `Engine` or `GpuContext` value").
//! Vulkan instance/device/swapchain boot stays a collaborator's job (spec
//! §1); `Engine::new` takes an already-created device and queue.

use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::Allocator;

use crate::culling::CullingEngine;
use crate::error::{DroppedCounts, DroppedCountsSnapshot, Result};
use crate::frame::FrameOrchestrator;
use crate::gpu::GpuContext;
use crate::log::{DefaultLogger, Logger};
use crate::main_pass::MainRenderer;
use crate::particles::ParticleEngine;
use crate::postprocess::{PostProcessEffect, PostProcessStack};
use crate::scene::Scene;
use crate::shadow::ShadowRenderer;
use crate::warehouse::ResourceWarehouse;

/// Every SPIR-V module the engine's fixed pipelines need, gathered in one
/// place since shader compilation itself is a collaborator's job (spec §6:
/// "the engine accepts compiled SPIR-V; it does not compile GLSL/HLSL").
pub struct EngineShaders<'a> {
    pub culling_compute: &'a [u32],
    pub shadow_vertex_static: &'a [u32],
    pub shadow_vertex_skinned: &'a [u32],
    pub main_vertex_static: &'a [u32],
    pub main_vertex_skinned: &'a [u32],
    pub main_fragment: &'a [u32],
    pub particle_compute: &'a [u32],
    pub particle_vertex: &'a [u32],
    pub particle_fragment: &'a [u32],
    pub postprocess_vertex: &'a [u32],
    /// Must include a `PostProcessEffect::None` entry (passthrough).
    pub postprocess_effects: &'a [(PostProcessEffect, &'a [u32])],
}

/// Formats and extents the caller's swapchain/device settle on, handed down
/// to every subsystem that allocates its own images (spec §6: swapchain
/// format is `B8G8R8A8_SRGB`, chosen by the collaborator, not this crate).
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
    pub shadow_format: vk::Format,
    pub color_extent: vk::Extent2D,
    pub shadow_extent: u32,
    pub scene_capacity: u32,
}

pub struct Engine {
    ctx: Arc<GpuContext>,
    logger: Arc<dyn Logger>,
    dropped: Arc<DroppedCounts>,
    pub warehouse: ResourceWarehouse,
    pub scene: Scene,
    culling: CullingEngine,
    shadow: ShadowRenderer,
    main_pass: MainRenderer,
    pub particles: ParticleEngine,
    postprocess: PostProcessStack,
    frames: FrameOrchestrator,
}

impl Engine {
    /// `logger` defaults to [`DefaultLogger`]'s colored-console output when
    /// `None`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: ash::Device,
        instance: ash::Instance,
        allocator: Arc<Mutex<Allocator>>,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        max_storage_buffer_range: u64,
        max_bindless_descriptors: u32,
        logger: Option<Arc<dyn Logger>>,
        shaders: EngineShaders,
        config: EngineConfig,
    ) -> Result<Self> {
        let logger = logger.unwrap_or_else(|| Arc::new(DefaultLogger));
        let ctx = Arc::new(GpuContext::new(
            device,
            instance,
            allocator,
            graphics_queue,
            graphics_queue_family,
            max_storage_buffer_range,
            max_bindless_descriptors,
        )?);

        let dropped = Arc::new(DroppedCounts::default());
        let warehouse = ResourceWarehouse::new(ctx.clone(), logger.clone())?;
        let scene = Scene::new(config.scene_capacity, logger.clone());
        let culling = CullingEngine::new(ctx.clone(), logger.clone(), dropped.clone(), shaders.culling_compute)?;
        let shadow = ShadowRenderer::new(
            ctx.clone(),
            logger.clone(),
            dropped.clone(),
            shaders.shadow_vertex_static,
            shaders.shadow_vertex_skinned,
            config.shadow_format,
        )?;
        let main_pass = MainRenderer::new(
            ctx.clone(),
            logger.clone(),
            &warehouse,
            shaders.main_vertex_static,
            shaders.main_vertex_skinned,
            shaders.main_fragment,
            config.color_format,
            config.depth_format,
        )?;
        let particles = ParticleEngine::new(
            ctx.clone(),
            logger.clone(),
            dropped.clone(),
            shaders.particle_compute,
            shaders.particle_vertex,
            shaders.particle_fragment,
            config.color_format,
            config.depth_format,
        )?;
        let postprocess =
            PostProcessStack::new(ctx.clone(), logger.clone(), shaders.postprocess_vertex, shaders.postprocess_effects, config.color_format)?;
        let frames = FrameOrchestrator::new(
            ctx.clone(),
            logger.clone(),
            shadow.descriptor_set_layout(),
            config.color_format,
            config.depth_format,
            config.shadow_format,
            config.color_extent,
            config.shadow_extent,
        )?;

        let engine = Self { ctx, logger, dropped, warehouse, scene, culling, shadow, main_pass, particles, postprocess, frames };
        crate::engine_info!(engine, "rendercore::Engine", "engine initialized");
        Ok(engine)
    }

    /// Render one frame (spec §4.11's ten-step algorithm, driven by
    /// [`FrameOrchestrator::render_frame`]). `swapchain_images`/
    /// `swapchain_views` are indexed by the image index the swapchain
    /// collaborator's `AcquireNextImageKHR` returns.
    #[allow(clippy::too_many_arguments)]
    pub fn render_frame(
        &mut self,
        swapchain: &ash::khr::swapchain::Device,
        swapchain_handle: vk::SwapchainKHR,
        swapchain_images: &[vk::Image],
        swapchain_views: &[vk::ImageView],
        camera: crate::warehouse::camera::CameraHandle,
        clear_color: [f32; 4],
        dt: f32,
    ) -> Result<()> {
        self.frames.render_frame(
            swapchain,
            swapchain_handle,
            swapchain_images,
            swapchain_views,
            &mut self.scene,
            &mut self.warehouse,
            &mut self.culling,
            &self.shadow,
            &self.main_pass,
            &mut self.particles,
            &mut self.postprocess,
            camera,
            clear_color,
            dt,
        )
    }

    pub fn ctx(&self) -> &Arc<GpuContext> {
        &self.ctx
    }

    /// Tally of warn-and-drop events across culling, particle force fields,
    /// and shadow-casting lights (spec §7: these capacities degrade visual
    /// fidelity silently rather than return `Err`). Lets a host application
    /// surface dropped counts without scraping logs.
    pub fn dropped_counts(&self) -> DroppedCountsSnapshot {
        self.dropped.snapshot()
    }

    pub fn log(&self, severity: crate::log::LogSeverity, source: &str, message: String) {
        self.logger.log(&crate::log::LogEntry { severity, timestamp: std::time::SystemTime::now(), source: source.to_string(), message, file: None, line: None });
    }

    pub fn log_detailed(&self, severity: crate::log::LogSeverity, source: &str, message: String, file: &'static str, line: u32) {
        self.logger.log(&crate::log::LogEntry { severity, timestamp: std::time::SystemTime::now(), source: source.to_string(), message, file: Some(file), line: Some(line) });
    }

    /// `DeviceWaitIdle` then tear down every subsystem explicitly, in
    /// reverse dependency order (spec §5). Instance/device destruction
    /// stays the boot collaborator's job, as it was at construction.
    pub fn destroy(self) {
        unsafe {
            let _ = self.ctx.device.device_wait_idle();
        }
        self.frames.destroy();
        self.postprocess.destroy();
        self.particles.destroy();
        self.main_pass.destroy();
        self.shadow.destroy();
        self.culling.destroy();
        self.warehouse.destroy();
    }
}
