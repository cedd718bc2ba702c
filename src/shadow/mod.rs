//! Shadow map rendering (spec §4.7).
//!
//! Per-light view/projection derivation and the depth-only draw recording
//! live here; the shadow map images and their UBO slots are double-buffered
//! (one set per frame in flight) and owned by [`crate::frame::Frame`], the
//! same split the warehouse uses for `world_matrix_buffers` — this module
//! only ever borrows them for the duration of one frame's recording.

use std::ffi::CString;
use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::batch::{self, Batch, DrawPushConstants};
use crate::error::{DroppedCounts, Error, Result};
use crate::gpu::buffer::GpuBuffer;
use crate::gpu::memory::GpuImage;
use crate::gpu::{pipeline, GpuContext};
use crate::limits::MAX_LIGHTS;
use crate::log::Logger;
use crate::math::Frustum;
use crate::scene::{LightInstance, LightKind, Scene};
use crate::warehouse::ResourceWarehouse;

/// One slot's worth of the shadow-camera UBO (spec §4.7: "write into
/// shadow-camera UBO slot `light*6`" / "`light*6 + face`").
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ShadowCameraGpu {
    pub view_projection: Mat4,
}

/// Total addressable UBO slots: 6 per light so a point light's 6 cube faces
/// and a directional/spot light's single view both fit the same stride.
pub const SHADOW_CAMERA_SLOTS: u32 = MAX_LIGHTS * 6;

fn directional_view_projection(position: Vec3, direction: Vec3, extent: f32, near: f32, far: f32) -> Mat4 {
    let view = Mat4::look_at_rh(position, position + direction, Vec3::Y);
    let proj = Mat4::orthographic_rh(-extent, extent, -extent, extent, near, far);
    proj * view
}

fn spot_view_projection(position: Vec3, direction: Vec3, cone_angle_radians: f32, near: f32, radius: f32) -> Mat4 {
    let view = Mat4::look_at_rh(position, position + direction, Vec3::X);
    let proj = Mat4::perspective_rh(cone_angle_radians * 2.0, 1.0, near, radius);
    proj * view
}

/// The six fixed cube-face directions/ups, in the order spec §4.7 implies
/// slots `light*6 + face` are consumed by the main pass's cube sampler.
const POINT_FACE_DIRECTIONS: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

fn point_view_projections(position: Vec3, near: f32, radius: f32) -> [Mat4; 6] {
    let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, near, radius);
    POINT_FACE_DIRECTIONS.map(|(dir, up)| proj * Mat4::look_at_rh(position, position + dir, up))
}

/// View-projection matrices for one light, in UBO-slot order starting at
/// `light_index * 6`. Directional/spot lights use only slot 0 of the 6.
pub fn derive_light_view_projections(light: &LightInstance) -> Vec<Mat4> {
    match light.kind {
        LightKind::Directional => vec![directional_view_projection(light.world_position, light.world_direction, light.light.radius, 0.1, light.light.radius * 2.0)],
        LightKind::Spot => {
            vec![spot_view_projection(light.world_position, light.world_direction, light.light.cone_angle_radians, 0.05, light.light.radius)]
        }
        LightKind::Point => point_view_projections(light.world_position, 0.01, light.light.radius).to_vec(),
    }
}

const BINDING_SHADOW_CAMERAS: u32 = 0;

pub struct ShadowRenderer {
    ctx: Arc<GpuContext>,
    logger: Arc<dyn Logger>,
    dropped: Arc<DroppedCounts>,
    descriptor_set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
    static_pipeline: vk::Pipeline,
    skinned_pipeline: vk::Pipeline,
    static_vertex_module: vk::ShaderModule,
    skinned_vertex_module: vk::ShaderModule,
}

impl ShadowRenderer {
    /// `depth_format` matches the format [`crate::frame::Frame`] creates its
    /// shadow images with. A depth-only pass needs no fragment shader; one
    /// is accepted anyway since some depth-bias/alpha-test variants want it
    /// (spec leaves this open — we accept `None` for the common case).
    pub fn new(
        ctx: Arc<GpuContext>,
        logger: Arc<dyn Logger>,
        dropped: Arc<DroppedCounts>,
        vertex_spirv_static: &[u32],
        vertex_spirv_skinned: &[u32],
        depth_format: vk::Format,
    ) -> Result<Self> {
        let descriptor_set_layout = Self::create_descriptor_set_layout(&ctx)?;
        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX)
            .offset(0)
            .size(std::mem::size_of::<DrawPushConstants>() as u32);
        let pipeline_layout = pipeline::create_pipeline_layout(&ctx, &[descriptor_set_layout], &[push_constant_range])?;

        let entry_point = CString::new("main").unwrap();
        let static_module = pipeline::create_shader_module(&ctx, vertex_spirv_static)?;
        let skinned_module = pipeline::create_shader_module(&ctx, vertex_spirv_skinned)?;

        let desc = pipeline::GraphicsPipelineDesc {
            vertex_module: static_module,
            vertex_entry: &entry_point,
            fragment: None,
            vertex_bindings: &[],
            vertex_attributes: &[],
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            layout: pipeline_layout,
            color_formats: &[],
            depth_format: Some(depth_format),
            depth_test: true,
            depth_write: true,
            cull_mode: vk::CullModeFlags::FRONT,
        };
        let static_pipeline = pipeline::create_graphics_pipeline(&ctx, &desc)?;
        let skinned_pipeline = pipeline::create_graphics_pipeline(
            &ctx,
            &pipeline::GraphicsPipelineDesc { vertex_module: skinned_module, ..desc },
        )?;

        let renderer = Self {
            ctx,
            logger,
            dropped,
            descriptor_set_layout,
            pipeline_layout,
            static_pipeline,
            skinned_pipeline,
            static_vertex_module: static_module,
            skinned_vertex_module: skinned_module,
        };
        crate::engine_info!(renderer, "rendercore::Shadow", "shadow renderer initialized");
        Ok(renderer)
    }

    fn create_descriptor_set_layout(ctx: &GpuContext) -> Result<vk::DescriptorSetLayout> {
        let bindings = [vk::DescriptorSetLayoutBinding::default()
            .binding(BINDING_SHADOW_CAMERAS)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX)];
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        unsafe { ctx.device.create_descriptor_set_layout(&info, None) }
            .map_err(|e| Error::InitializationFailed(format!("shadow descriptor set layout: {e}")))
    }

    /// Fill `camera_buffer` with every visible shadow-casting light's
    /// view-projection matrices, in `light_index * 6 [+ face]` slot order.
    pub fn write_camera_ubo(&self, camera_buffer: &GpuBuffer, lights: &[LightInstance]) -> Result<()> {
        if lights.len() > MAX_LIGHTS as usize {
            let dropped = (lights.len() - MAX_LIGHTS as usize) as u32;
            crate::engine_warn!(self, "rendercore::Shadow", "{dropped} light(s) exceed MAX_LIGHTS; dropping");
            self.dropped.record_lights(dropped);
        }
        for (light_index, light) in lights.iter().enumerate().take(MAX_LIGHTS as usize) {
            if !light.light.has_shadow {
                continue;
            }
            for (face, view_projection) in derive_light_view_projections(light).into_iter().enumerate() {
                let slot = light_index as u64 * 6 + face as u64;
                let gpu = ShadowCameraGpu { view_projection };
                camera_buffer.update(&self.ctx, slot * std::mem::size_of::<ShadowCameraGpu>() as u64, bytemuck::bytes_of(&gpu))?;
            }
        }
        Ok(())
    }

    /// Batched layout transitions before recording any face (spec §4.7:
    /// "one `CmdPipelineBarrier` per phase"). `images` is every shadow image
    /// this frame will write to (2D + cube, for every shadow-casting light).
    pub fn transition_for_writing(&self, command_buffer: vk::CommandBuffer, images: &[&GpuImage]) {
        let barriers: Vec<vk::ImageMemoryBarrier> = images
            .iter()
            .map(|image| {
                vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                    .src_access_mask(vk::AccessFlags::empty())
                    .dst_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
                    .image(image.image)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::DEPTH,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: image.layers,
                    })
            })
            .collect();
        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &barriers,
            );
        }
    }

    /// Batched transition to `SHADER_READ_ONLY_OPTIMAL` once every face has
    /// been written (spec §4.7).
    pub fn transition_for_sampling(&self, command_buffer: vk::CommandBuffer, images: &[&GpuImage]) {
        let barriers: Vec<vk::ImageMemoryBarrier> = images
            .iter()
            .map(|image| {
                vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                    .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                    .src_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
                    .dst_access_mask(vk::AccessFlags::SHADER_READ)
                    .image(image.image)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::DEPTH,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: image.layers,
                    })
            })
            .collect();
        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &barriers,
            );
        }
    }

    /// Record one face's depth-only draws: clear to 1.0, bind the
    /// depth-only pipeline variant, iterate the shadow batch set, push
    /// per-node constants, draw (spec §4.7). `camera_index` is the UBO slot
    /// this face's view-projection was written to.
    #[allow(clippy::too_many_arguments)]
    pub fn record_face(
        &self,
        command_buffer: vk::CommandBuffer,
        view: vk::ImageView,
        extent: vk::Extent2D,
        camera_descriptor_set: vk::DescriptorSet,
        camera_index: u32,
        light_frustum: &Frustum,
        scene: &Scene,
        warehouse: &ResourceWarehouse,
    ) {
        let visible = scene.collect_visible_meshes(warehouse, light_frustum);
        let batches = batch::build_shadow_batches(&visible, warehouse);

        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(view)
            .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue { depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 } });

        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent })
            .layer_count(1)
            .depth_attachment(&depth_attachment);

        unsafe {
            self.ctx.device.cmd_begin_rendering(command_buffer, &rendering_info);
            self.ctx.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &[camera_descriptor_set],
                &[],
            );

            self.record_batches(command_buffer, &batches, warehouse, camera_index);

            self.ctx.device.cmd_end_rendering(command_buffer);
        }
    }

    fn record_batches(&self, command_buffer: vk::CommandBuffer, batches: &[Batch], warehouse: &ResourceWarehouse, camera_index: u32) {
        for batch in batches {
            let skinned = batch.key.feature_set.contains(crate::batch::FeatureSet::SKINNING);
            let pipeline = if skinned { self.skinned_pipeline } else { self.static_pipeline };
            unsafe { self.ctx.device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline) };

            for node in &batch.nodes {
                let Some(mesh) = warehouse.mesh(node.mesh) else { continue };
                let constants = DrawPushConstants {
                    node_id: node.node.index,
                    camera_index,
                    material_id: node.material.index,
                    mesh_id: node.mesh.index,
                    bone_matrix_offset: node.bone_matrix_offset.unwrap_or(0),
                };
                unsafe {
                    self.ctx.device.cmd_push_constants(
                        command_buffer,
                        self.pipeline_layout,
                        vk::ShaderStageFlags::VERTEX,
                        0,
                        bytemuck::bytes_of(&constants),
                    );
                    // No vertex buffer bound: the vertex shader resolves
                    // gl_VertexIndex against the global index/vertex buffers,
                    // so the draw itself is this mesh's index range within
                    // them, not a fixed triangle.
                    self.ctx.device.cmd_draw(command_buffer, mesh.index_range.count, 1, mesh.index_range.offset, 0);
                }
            }
        }
    }

    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout
    }

    pub fn log(&self, severity: crate::log::LogSeverity, source: &str, message: String) {
        self.logger.log(&crate::log::LogEntry { severity, timestamp: std::time::SystemTime::now(), source: source.to_string(), message, file: None, line: None });
    }

    pub fn log_detailed(&self, severity: crate::log::LogSeverity, source: &str, message: String, file: &'static str, line: u32) {
        self.logger.log(&crate::log::LogEntry { severity, timestamp: std::time::SystemTime::now(), source: source.to_string(), message, file: Some(file), line: Some(line) });
    }

    pub fn destroy(self) {
        let ctx = self.ctx.clone();
        unsafe {
            ctx.device.destroy_pipeline(self.static_pipeline, None);
            ctx.device.destroy_pipeline(self.skinned_pipeline, None);
            ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            ctx.device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
            ctx.device.destroy_shader_module(self.static_vertex_module, None);
            ctx.device.destroy_shader_module(self.skinned_vertex_module, None);
        }
    }
}
