//! Frame orchestration: double-buffered per-frame GPU state and the
//! acquire/record/submit/present algorithm (spec §4.11, §3 "Frame").
//!
//! `Frame` owns exactly the resources spec §3 lists as per-frame-in-flight:
//! sync primitives, the primary command buffer, the shadow-camera UBO and
//! its shadow maps, the main-pass color/depth images, and the two ping-pong
//! post-process images. [`FrameOrchestrator`] owns `MAX_FRAMES_IN_FLIGHT`
//! of these and drives the 10-step per-frame sequence against whichever
//! subsystems the caller hands it — it does not own the scene, warehouse,
//! or any renderer itself (spec §9: "split the warehouse from the engine
//! so rendering passes can borrow `&Warehouse` immutably").

use std::sync::Arc;

use ash::khr::swapchain as khr_swapchain;
use ash::vk;

use crate::culling::CullingEngine;
use crate::error::{Error, Result};
use crate::gpu::buffer::{create_zeroed_buffer, GpuBuffer};
use crate::gpu::memory::GpuImage;
use crate::gpu::GpuContext;
use crate::limits::{MAX_FRAMES_IN_FLIGHT, MAX_LIGHTS};
use crate::log::Logger;
use crate::main_pass::MainRenderer;
use crate::particles::ParticleEngine;
use crate::postprocess::{self, PostProcessStack};
use crate::scene::Scene;
use crate::shadow::{ShadowCameraGpu, ShadowRenderer, SHADOW_CAMERA_SLOTS};
use crate::warehouse::camera::CameraHandle;
use crate::warehouse::ResourceWarehouse;

const BINDING_SHADOW_CAMERAS: u32 = 0;

/// Everything owned by one `MAX_FRAMES_IN_FLIGHT` slot (spec §3 "Frame").
struct Frame {
    image_available_semaphore: vk::Semaphore,
    render_finished_semaphore: vk::Semaphore,
    in_flight_fence: vk::Fence,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,

    shadow_camera_buffer: GpuBuffer,
    shadow_camera_descriptor_set: vk::DescriptorSet,
    /// One 2D shadow map per light slot (spec §3: "one 2D per light slot").
    shadow_maps_2d: Vec<GpuImage>,
    /// One cube shadow map per light slot, for point lights.
    shadow_maps_cube: Vec<GpuImage>,

    color_image: GpuImage,
    depth_image: GpuImage,
    ping_pong: [GpuImage; 2],
}

impl Frame {
    #[allow(clippy::too_many_arguments)]
    fn new(
        ctx: &GpuContext,
        shadow_camera_set_layout: vk::DescriptorSetLayout,
        color_format: vk::Format,
        depth_format: vk::Format,
        shadow_format: vk::Format,
        color_extent: vk::Extent2D,
        shadow_extent: u32,
    ) -> Result<Self> {
        let command_pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(ctx.graphics_queue_family);
        let command_pool = unsafe { ctx.device.create_command_pool(&command_pool_info, None) }
            .map_err(|e| Error::InitializationFailed(format!("frame command pool: {e}")))?;
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = unsafe { ctx.device.allocate_command_buffers(&alloc_info) }
            .map_err(|e| Error::InitializationFailed(format!("frame command buffer: {e}")))?[0];

        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let image_available_semaphore = unsafe { ctx.device.create_semaphore(&semaphore_info, None) }
            .map_err(|e| Error::InitializationFailed(format!("image_available semaphore: {e}")))?;
        let render_finished_semaphore = unsafe { ctx.device.create_semaphore(&semaphore_info, None) }
            .map_err(|e| Error::InitializationFailed(format!("render_finished semaphore: {e}")))?;
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        let in_flight_fence =
            unsafe { ctx.device.create_fence(&fence_info, None) }.map_err(|e| Error::InitializationFailed(format!("in_flight fence: {e}")))?;

        let shadow_camera_buffer = create_zeroed_buffer(
            ctx,
            SHADOW_CAMERA_SLOTS as u64 * std::mem::size_of::<ShadowCameraGpu>() as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?;
        let shadow_camera_descriptor_set = Self::allocate_shadow_descriptor_set(ctx, shadow_camera_set_layout, &shadow_camera_buffer)?;

        let shadow_usage = vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED;
        let shadow_maps_2d: Vec<GpuImage> =
            (0..MAX_LIGHTS).map(|_| ctx.create_image(shadow_extent, shadow_extent, shadow_format, shadow_usage)).collect::<Result<_>>()?;
        let shadow_maps_cube: Vec<GpuImage> =
            (0..MAX_LIGHTS).map(|_| ctx.create_cube_image(shadow_extent, shadow_format, shadow_usage)).collect::<Result<_>>()?;

        let color_image = ctx.create_image(
            color_extent.width,
            color_extent.height,
            color_format,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        )?;
        let depth_image = ctx.create_image(
            color_extent.width,
            color_extent.height,
            depth_format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;
        let ping_pong = [
            ctx.create_image(color_extent.width, color_extent.height, color_format, vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED)?,
            ctx.create_image(color_extent.width, color_extent.height, color_format, vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED)?,
        ];

        Ok(Self {
            image_available_semaphore,
            render_finished_semaphore,
            in_flight_fence,
            command_pool,
            command_buffer,
            shadow_camera_buffer,
            shadow_camera_descriptor_set,
            shadow_maps_2d,
            shadow_maps_cube,
            color_image,
            depth_image,
            ping_pong,
        })
    }

    fn allocate_shadow_descriptor_set(ctx: &GpuContext, layout: vk::DescriptorSetLayout, buffer: &GpuBuffer) -> Result<vk::DescriptorSet> {
        let layouts = [layout];
        let info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(ctx.descriptor_pool).set_layouts(&layouts);
        let set = unsafe { ctx.device.allocate_descriptor_sets(&info) }
            .map_err(|e| Error::InitializationFailed(format!("frame shadow descriptor set: {e}")))?[0];
        let buffer_info = [vk::DescriptorBufferInfo::default().buffer(buffer.buffer).offset(0).range(vk::WHOLE_SIZE)];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(BINDING_SHADOW_CAMERAS)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_info);
        unsafe { ctx.device.update_descriptor_sets(&[write], &[]) };
        Ok(set)
    }

    fn destroy(self, ctx: &GpuContext) {
        unsafe {
            ctx.device.destroy_semaphore(self.image_available_semaphore, None);
            ctx.device.destroy_semaphore(self.render_finished_semaphore, None);
            ctx.device.destroy_fence(self.in_flight_fence, None);
            ctx.device.destroy_command_pool(self.command_pool, None);
        }
        self.shadow_camera_buffer.destroy(ctx);
        for image in self.shadow_maps_2d {
            image.destroy(ctx);
        }
        for image in self.shadow_maps_cube {
            image.destroy(ctx);
        }
        self.color_image.destroy(ctx);
        self.depth_image.destroy(ctx);
        for image in self.ping_pong {
            image.destroy(ctx);
        }
    }
}

/// Drives the 10-step per-frame algorithm (spec §4.11) over
/// `MAX_FRAMES_IN_FLIGHT` [`Frame`] slots. Holds no scene/warehouse/renderer
/// state itself — those are borrowed for the duration of one
/// [`FrameOrchestrator::render_frame`] call (spec §9).
pub struct FrameOrchestrator {
    ctx: Arc<GpuContext>,
    logger: Arc<dyn Logger>,
    frames: Vec<Frame>,
    current_frame: usize,
    color_format: vk::Format,
    depth_format: vk::Format,
}

impl FrameOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctx: Arc<GpuContext>,
        logger: Arc<dyn Logger>,
        shadow_camera_set_layout: vk::DescriptorSetLayout,
        color_format: vk::Format,
        depth_format: vk::Format,
        shadow_format: vk::Format,
        color_extent: vk::Extent2D,
        shadow_extent: u32,
    ) -> Result<Self> {
        let frames = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| Frame::new(&ctx, shadow_camera_set_layout, color_format, depth_format, shadow_format, color_extent, shadow_extent))
            .collect::<Result<Vec<_>>>()?;
        let orchestrator = Self { ctx, logger, frames, current_frame: 0, color_format, depth_format };
        crate::engine_info!(orchestrator, "rendercore::Frame", "frame orchestrator initialized ({MAX_FRAMES_IN_FLIGHT} frames in flight)");
        Ok(orchestrator)
    }

    /// Steps 1-3 and 8-10 of spec §4.11, wrapping the caller-supplied
    /// recording closure for steps 4-7. `swapchain_image`/`swapchain_view`
    /// are the image acquired via `AcquireNextImageKHR` by the swapchain
    /// collaborator (spec §6); this orchestrator only consumes them.
    #[allow(clippy::too_many_arguments)]
    pub fn render_frame(
        &mut self,
        swapchain: &khr_swapchain::Device,
        swapchain_handle: vk::SwapchainKHR,
        swapchain_images: &[vk::Image],
        swapchain_views: &[vk::ImageView],
        scene: &mut Scene,
        warehouse: &mut ResourceWarehouse,
        culling: &mut CullingEngine,
        shadow: &ShadowRenderer,
        main_pass: &MainRenderer,
        particles: &mut ParticleEngine,
        postprocess: &mut PostProcessStack,
        camera: CameraHandle,
        clear_color: [f32; 4],
        dt: f32,
    ) -> Result<()> {
        let frame_index = self.current_frame;

        // Step 1: wait on this slot's fence.
        let fence = self.frames[frame_index].in_flight_fence;
        unsafe { self.ctx.device.wait_for_fences(&[fence], true, u64::MAX) }.map_err(Error::from)?;

        // Step 2: acquire a swapchain image.
        let image_available = self.frames[frame_index].image_available_semaphore;
        let (image_index, suboptimal) = unsafe {
            swapchain.acquire_next_image(swapchain_handle, u64::MAX, image_available, vk::Fence::null())
        }
        .map_err(|e| if e == vk::Result::ERROR_OUT_OF_DATE_KHR { Error::SwapchainOutOfDate } else { Error::from(e) })?;
        if suboptimal {
            crate::engine_warn!(self, "rendercore::Frame", "swapchain image {image_index} acquired suboptimal");
        }

        // Step 3: reset fence/command buffer, begin recording.
        unsafe { self.ctx.device.reset_fences(&[fence]) }.map_err(Error::from)?;
        let command_buffer = self.frames[frame_index].command_buffer;
        unsafe { self.ctx.device.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty()) }.map_err(Error::from)?;
        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.ctx.device.begin_command_buffer(command_buffer, &begin_info) }.map_err(Error::from)?;

        // Step 4: propagate transforms, upload world-matrix/camera/light UBOs.
        scene.update_world_matrices();
        let world_matrices: Vec<glam::Mat4> = scene.iter_nodes().map(|(_, node)| node.world_matrix()).collect();
        warehouse.upload_world_matrices(frame_index, &world_matrices)?;
        let lights = scene.collect_lights();
        shadow.write_camera_ubo(&self.frames[frame_index].shadow_camera_buffer, &lights)?;

        let Some(main_camera) = warehouse.camera(camera) else {
            unsafe { self.ctx.device.end_command_buffer(command_buffer) }.map_err(Error::from)?;
            return Err(Error::InvalidHandle);
        };
        let main_frustum = main_camera.frustum().clone();

        // Step 5: culling dispatch for the main camera.
        culling.upload(scene, warehouse, &main_frustum)?;
        culling.record_dispatch(command_buffer);
        Self::visibility_barrier(&self.ctx, command_buffer, culling);

        // Step 6: shadow pass(es), main pass, particle compute+draw,
        // post-process chain.
        self.record_shadow_passes(command_buffer, frame_index, scene, warehouse, shadow, &lights);
        let color_extent =
            vk::Extent2D { width: self.frames[frame_index].color_image.width, height: self.frames[frame_index].color_image.height };
        main_pass.record(
            command_buffer,
            self.frames[frame_index].color_image.view,
            self.frames[frame_index].depth_image.view,
            color_extent,
            clear_color,
            frame_index,
            camera.index,
            scene,
            warehouse,
            &main_frustum,
        );

        particles.recycle();
        particles.spawn(scene, dt);
        let forcefield_count = particles.upload_force_fields(scene)?;
        particles.record_simulate(command_buffer, dt, forcefield_count);
        // Particles draw additively into the same color/depth targets the
        // main pass just wrote, inside their own dynamic rendering scope
        // with LOAD ops so neither attachment is cleared again.
        self.record_particle_pass(command_buffer, frame_index, color_extent, particles);

        main_pass.transition_color_for_sampling(command_buffer, self.frames[frame_index].color_image.image);

        self.record_postprocess_chain(command_buffer, frame_index, swapchain_views[image_index as usize], postprocess);

        // Step 7: transition swapchain image to PRESENT_SRC.
        Self::transition_to_present(&self.ctx, command_buffer, swapchain_images[image_index as usize]);

        unsafe { self.ctx.device.end_command_buffer(command_buffer) }.map_err(Error::from)?;

        // Step 8: submit.
        let render_finished = self.frames[frame_index].render_finished_semaphore;
        let wait_semaphores = [image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [render_finished];
        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);
        unsafe { self.ctx.device.queue_submit(self.ctx.graphics_queue, &[submit_info], fence) }.map_err(Error::from)?;

        // Step 9: present.
        let swapchains = [swapchain_handle];
        let image_indices = [image_index];
        let present_info =
            vk::PresentInfoKHR::default().wait_semaphores(&signal_semaphores).swapchains(&swapchains).image_indices(&image_indices);
        let present_result = unsafe { swapchain.queue_present(self.ctx.graphics_queue, &present_info) };
        match present_result {
            Ok(false) => {}
            Ok(true) => crate::engine_warn!(self, "rendercore::Frame", "present returned suboptimal"),
            Err(e) if e == vk::Result::ERROR_OUT_OF_DATE_KHR => return Err(Error::SwapchainOutOfDate),
            Err(e) => return Err(Error::from(e)),
        }

        // Step 10: advance frame index.
        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
        Ok(())
    }

    /// Wrap [`ParticleEngine::record_draw`] in its own dynamic-rendering
    /// scope against this frame's color/depth images, using `LOAD` ops so
    /// the main pass's output survives underneath the particles.
    fn record_particle_pass(&self, command_buffer: vk::CommandBuffer, frame_index: usize, extent: vk::Extent2D, particles: &ParticleEngine) {
        let frame = &self.frames[frame_index];
        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(frame.color_image.view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE);
        let color_attachments = [color_attachment];
        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(frame.depth_image.view)
            .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE);
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent })
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);
        unsafe {
            self.ctx.device.cmd_begin_rendering(command_buffer, &rendering_info);
            let viewport = vk::Viewport { x: 0.0, y: 0.0, width: extent.width as f32, height: extent.height as f32, min_depth: 0.0, max_depth: 1.0 };
            let scissor = vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent };
            self.ctx.device.cmd_set_viewport(command_buffer, 0, &[viewport]);
            self.ctx.device.cmd_set_scissor(command_buffer, 0, &[scissor]);
            particles.record_draw(command_buffer);
            self.ctx.device.cmd_end_rendering(command_buffer);
        }
    }

    fn visibility_barrier(ctx: &GpuContext, command_buffer: vk::CommandBuffer, culling: &CullingEngine) {
        let barrier = vk::BufferMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::SHADER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .buffer(culling.visibility_buffer.buffer)
            .offset(0)
            .size(vk::WHOLE_SIZE);
        unsafe {
            ctx.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::PipelineStageFlags::VERTEX_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[barrier],
                &[],
            );
        }
    }

    /// Spec §4.7: one light at a time, its own `light.light.has_shadow`
    /// gate, directional/spot using UBO slot `light*6` and point using
    /// `light*6..light*6+6`. Layout transitions are batched per spec §4.7.
    fn record_shadow_passes(
        &self,
        command_buffer: vk::CommandBuffer,
        frame_index: usize,
        scene: &Scene,
        warehouse: &ResourceWarehouse,
        shadow: &ShadowRenderer,
        lights: &[crate::scene::LightInstance],
    ) {
        let frame = &self.frames[frame_index];
        let mut written_images: Vec<&GpuImage> = Vec::new();
        for light in lights.iter().take(MAX_LIGHTS as usize) {
            if !light.light.has_shadow {
                continue;
            }
            match light.kind {
                crate::scene::LightKind::Point => written_images.push(&frame.shadow_maps_cube[light.node.index as usize % frame.shadow_maps_cube.len()]),
                _ => written_images.push(&frame.shadow_maps_2d[light.node.index as usize % frame.shadow_maps_2d.len()]),
            }
        }
        if written_images.is_empty() {
            return;
        }
        shadow.transition_for_writing(command_buffer, &written_images);

        for (light_index, light) in lights.iter().enumerate().take(MAX_LIGHTS as usize) {
            if !light.light.has_shadow {
                continue;
            }
            let light_frustum = shadow_light_frustum(light);
            match light.kind {
                crate::scene::LightKind::Point => {
                    let image = &frame.shadow_maps_cube[light_index % frame.shadow_maps_cube.len()];
                    let faces = image.face_views.expect("cube shadow map must have per-face views");
                    for (face, view) in faces.into_iter().enumerate() {
                        let camera_index = light_index as u32 * 6 + face as u32;
                        shadow.record_face(
                            command_buffer,
                            view,
                            vk::Extent2D { width: image.width, height: image.height },
                            frame.shadow_camera_descriptor_set,
                            camera_index,
                            &light_frustum,
                            scene,
                            warehouse,
                        );
                    }
                }
                _ => {
                    let image = &frame.shadow_maps_2d[light_index % frame.shadow_maps_2d.len()];
                    shadow.record_face(
                        command_buffer,
                        image.view,
                        vk::Extent2D { width: image.width, height: image.height },
                        frame.shadow_camera_descriptor_set,
                        light_index as u32 * 6,
                        &light_frustum,
                        scene,
                        warehouse,
                    );
                }
            }
        }

        shadow.transition_for_sampling(command_buffer, &written_images);
    }

    /// Spec §4.10: walk `postprocess.effect_count()` stages, read slot 0
    /// bound to the main-pass color image, writing ping-pong until the
    /// final stage targets the swapchain image directly.
    /// Ping-pong images stay `SAMPLED | COLOR_ATTACHMENT` and dynamic
    /// rendering leaves them in `COLOR_ATTACHMENT_OPTIMAL` between writes,
    /// so no transition is needed between intermediate stages — only the
    /// final stage's target (the swapchain image) differs from the rest.
    fn record_postprocess_chain(
        &self,
        command_buffer: vk::CommandBuffer,
        frame_index: usize,
        swapchain_view: vk::ImageView,
        postprocess: &PostProcessStack,
    ) {
        let frame = &self.frames[frame_index];
        let extent = vk::Extent2D { width: frame.color_image.width, height: frame.color_image.height };
        postprocess.update_target(0, frame.color_image.view);
        postprocess.update_target(1, frame.ping_pong[0].view);
        postprocess.update_target(2, frame.ping_pong[1].view);

        let effect_count = postprocess.effect_count();
        for effect_index in 0..effect_count {
            let is_last = effect_index + 1 == effect_count;
            let write_view = if is_last { swapchain_view } else { frame.ping_pong[postprocess::write_slot(effect_index) - 1].view };
            postprocess.record_effect(command_buffer, effect_index, write_view, extent);
        }
    }

    fn transition_to_present(ctx: &GpuContext, command_buffer: vk::CommandBuffer, image: vk::Image) {
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
            .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .dst_access_mask(vk::AccessFlags::empty())
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        unsafe {
            ctx.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
    }

    pub fn current_frame_index(&self) -> usize {
        self.current_frame
    }

    pub fn log(&self, severity: crate::log::LogSeverity, source: &str, message: String) {
        self.logger.log(&crate::log::LogEntry { severity, timestamp: std::time::SystemTime::now(), source: source.to_string(), message, file: None, line: None });
    }

    pub fn log_detailed(&self, severity: crate::log::LogSeverity, source: &str, message: String, file: &'static str, line: u32) {
        self.logger.log(&crate::log::LogEntry { severity, timestamp: std::time::SystemTime::now(), source: source.to_string(), message, file: Some(file), line: Some(line) });
    }

    /// Waits for every in-flight fence (spec §5 `DeviceWaitIdle` on
    /// teardown) before releasing per-frame resources.
    pub fn destroy(self) {
        let ctx = self.ctx.clone();
        unsafe {
            let _ = ctx.device.device_wait_idle();
        }
        for frame in self.frames {
            frame.destroy(&ctx);
        }
    }

    /// Unused once `color_format`/`depth_format` only back `Frame::new` at
    /// construction; kept as fields (not locals) so a future swapchain
    /// resize can recreate frames without re-threading formats through the
    /// caller.
    pub fn formats(&self) -> (vk::Format, vk::Format) {
        (self.color_format, self.depth_format)
    }
}

fn shadow_light_frustum(light: &crate::scene::LightInstance) -> crate::math::Frustum {
    let view_projection = crate::shadow::derive_light_view_projections(light)[0];
    crate::math::Frustum::from_view_projection(&view_projection)
}
