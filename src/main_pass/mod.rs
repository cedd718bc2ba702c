//! Main (forward) renderer (spec §4.8).
//!
//! Binds the full bindless set stack and draws the batch set built from
//! `Scene::collect_visible_meshes`. Like [`crate::shadow::ShadowRenderer`],
//! this struct owns only pipelines/layouts; the color/depth images it
//! renders into are per-frame and owned by the not-yet-written
//! [`crate::frame::Frame`].
//!
//! Spec §6 lists 7 main-pass descriptor sets (camera, textures, bone,
//! material, world-matrix, mesh, vertex-skinning). The warehouse already
//! consolidates camera/textures/materials/meshes into one bindless set
//! (its own `descriptor_set`, see `warehouse::mod` doc comment) rather than
//! four separate ones — this renderer keeps that consolidation and adds
//! the three sets the warehouse doesn't already bundle: bone matrices,
//! the frame-indexed world-matrix SSBO, and vertex skinning data.

use std::ffi::CString;
use std::sync::Arc;

use ash::vk;

use crate::batch::{self, Batch, DrawPushConstants, FeatureSet};
use crate::error::{Error, Result};
use crate::gpu::buffer::GpuBuffer;
use crate::gpu::{pipeline, GpuContext};
use crate::log::Logger;
use crate::math::Frustum;
use crate::scene::Scene;
use crate::warehouse::ResourceWarehouse;

const BINDING_WORLD_MATRICES: u32 = 0;
const BINDING_BONE_MATRICES: u32 = 0;
const BINDING_SKIN_VERTICES: u32 = 0;

pub struct MainRenderer {
    ctx: Arc<GpuContext>,
    logger: Arc<dyn Logger>,
    per_frame_set_layout: vk::DescriptorSetLayout,
    bone_set_layout: vk::DescriptorSetLayout,
    skin_set_layout: vk::DescriptorSetLayout,
    bone_descriptor_set: vk::DescriptorSet,
    skin_descriptor_set: vk::DescriptorSet,
    /// One world-matrix descriptor set per frame in flight, matching
    /// `ResourceWarehouse::world_matrix_buffers` (spec §3 "Frame").
    per_frame_descriptor_sets: Vec<vk::DescriptorSet>,
    pipeline_layout: vk::PipelineLayout,
    static_pipeline: vk::Pipeline,
    skinned_pipeline: vk::Pipeline,
    static_vertex_module: vk::ShaderModule,
    skinned_vertex_module: vk::ShaderModule,
    fragment_module: vk::ShaderModule,
}

impl MainRenderer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ctx: Arc<GpuContext>,
        logger: Arc<dyn Logger>,
        warehouse: &ResourceWarehouse,
        vertex_spirv_static: &[u32],
        vertex_spirv_skinned: &[u32],
        fragment_spirv: &[u32],
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> Result<Self> {
        let per_frame_set_layout = Self::create_storage_set_layout(&ctx, BINDING_WORLD_MATRICES, vk::ShaderStageFlags::VERTEX)?;
        let bone_set_layout = Self::create_storage_set_layout(&ctx, BINDING_BONE_MATRICES, vk::ShaderStageFlags::VERTEX)?;
        let skin_set_layout = Self::create_storage_set_layout(&ctx, BINDING_SKIN_VERTICES, vk::ShaderStageFlags::VERTEX)?;

        let per_frame_descriptor_sets = Self::allocate_sets(&ctx, per_frame_set_layout, warehouse.world_matrix_buffers.len())?;
        for (frame, &set) in per_frame_descriptor_sets.iter().enumerate() {
            Self::write_storage_binding(&ctx, set, BINDING_WORLD_MATRICES, warehouse.world_matrix_buffers[frame].buffer);
        }

        let bone_descriptor_set = Self::allocate_sets(&ctx, bone_set_layout, 1)?[0];
        Self::write_storage_binding(&ctx, bone_descriptor_set, BINDING_BONE_MATRICES, warehouse.bone_matrix_buffer.buffer);

        let skin_descriptor_set = Self::allocate_sets(&ctx, skin_set_layout, 1)?[0];
        Self::write_storage_binding(&ctx, skin_descriptor_set, BINDING_SKIN_VERTICES, warehouse.skin_vertex_buffer.buffer);

        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .offset(0)
            .size(std::mem::size_of::<DrawPushConstants>() as u32);
        let set_layouts = [warehouse.descriptor_set_layout, per_frame_set_layout, bone_set_layout, skin_set_layout];
        let pipeline_layout = pipeline::create_pipeline_layout(&ctx, &set_layouts, &[push_constant_range])?;

        let entry_point = CString::new("main").unwrap();
        let static_module = pipeline::create_shader_module(&ctx, vertex_spirv_static)?;
        let skinned_module = pipeline::create_shader_module(&ctx, vertex_spirv_skinned)?;
        let fragment_module = pipeline::create_shader_module(&ctx, fragment_spirv)?;

        let desc = pipeline::GraphicsPipelineDesc {
            vertex_module: static_module,
            vertex_entry: &entry_point,
            fragment: Some((fragment_module, &entry_point)),
            vertex_bindings: &[],
            vertex_attributes: &[],
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            layout: pipeline_layout,
            color_formats: std::slice::from_ref(&color_format),
            depth_format: Some(depth_format),
            depth_test: true,
            depth_write: true,
            cull_mode: vk::CullModeFlags::BACK,
        };
        let static_pipeline = pipeline::create_graphics_pipeline(&ctx, &desc)?;
        let skinned_pipeline = pipeline::create_graphics_pipeline(&ctx, &pipeline::GraphicsPipelineDesc { vertex_module: skinned_module, ..desc })?;

        let renderer = Self {
            ctx,
            logger,
            per_frame_set_layout,
            bone_set_layout,
            skin_set_layout,
            bone_descriptor_set,
            skin_descriptor_set,
            per_frame_descriptor_sets,
            pipeline_layout,
            static_pipeline,
            skinned_pipeline,
            static_vertex_module: static_module,
            skinned_vertex_module: skinned_module,
            fragment_module,
        };
        crate::engine_info!(renderer, "rendercore::MainPass", "main renderer initialized");
        Ok(renderer)
    }

    fn create_storage_set_layout(ctx: &GpuContext, binding: u32, stage: vk::ShaderStageFlags) -> Result<vk::DescriptorSetLayout> {
        let bindings =
            [vk::DescriptorSetLayoutBinding::default().binding(binding).descriptor_type(vk::DescriptorType::STORAGE_BUFFER).descriptor_count(1).stage_flags(stage)];
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        unsafe { ctx.device.create_descriptor_set_layout(&info, None) }
            .map_err(|e| Error::InitializationFailed(format!("main pass descriptor set layout: {e}")))
    }

    fn allocate_sets(ctx: &GpuContext, layout: vk::DescriptorSetLayout, count: usize) -> Result<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout; count];
        let info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(ctx.descriptor_pool).set_layouts(&layouts);
        unsafe { ctx.device.allocate_descriptor_sets(&info) }.map_err(|e| Error::InitializationFailed(format!("main pass descriptor sets: {e}")))
    }

    fn write_storage_binding(ctx: &GpuContext, set: vk::DescriptorSet, binding: u32, buffer: vk::Buffer) {
        let buffer_info = [vk::DescriptorBufferInfo::default().buffer(buffer).offset(0).range(vk::WHOLE_SIZE)];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(binding)
            .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
            .buffer_info(&buffer_info);
        unsafe { ctx.device.update_descriptor_sets(&[write], &[]) };
    }

    /// Record the forward pass: clear color/depth, bind the bindless sets,
    /// iterate the batch set built from `frustum`, draw (spec §4.8).
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        command_buffer: vk::CommandBuffer,
        color_view: vk::ImageView,
        depth_view: vk::ImageView,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
        frame_index: usize,
        camera_index: u32,
        scene: &Scene,
        warehouse: &ResourceWarehouse,
        frustum: &Frustum,
    ) {
        let visible = scene.collect_visible_meshes(warehouse, frustum);
        let batches = batch::build_batches(&visible, warehouse);

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(color_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue { color: vk::ClearColorValue { float32: clear_color } });
        let color_attachments = [color_attachment];

        let depth_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(depth_view)
            .image_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(vk::ClearValue { depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 } });

        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent })
            .layer_count(1)
            .color_attachments(&color_attachments)
            .depth_attachment(&depth_attachment);

        unsafe {
            self.ctx.device.cmd_begin_rendering(command_buffer, &rendering_info);

            let sets = [
                warehouse.descriptor_set,
                self.per_frame_descriptor_sets[frame_index],
                self.bone_descriptor_set,
                self.skin_descriptor_set,
            ];
            self.ctx.device.cmd_bind_descriptor_sets(command_buffer, vk::PipelineBindPoint::GRAPHICS, self.pipeline_layout, 0, &sets, &[]);

            let viewport = vk::Viewport { x: 0.0, y: 0.0, width: extent.width as f32, height: extent.height as f32, min_depth: 0.0, max_depth: 1.0 };
            let scissor = vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent };
            self.ctx.device.cmd_set_viewport(command_buffer, 0, &[viewport]);
            self.ctx.device.cmd_set_scissor(command_buffer, 0, &[scissor]);

            self.record_batches(command_buffer, &batches, warehouse, camera_index);

            self.ctx.device.cmd_end_rendering(command_buffer);
        }
    }

    fn record_batches(&self, command_buffer: vk::CommandBuffer, batches: &[Batch], warehouse: &ResourceWarehouse, camera_index: u32) {
        for batch in batches {
            let skinned = batch.key.feature_set.contains(FeatureSet::SKINNING);
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
                        vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
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

    /// Transition the main-pass color image to `SHADER_READ_ONLY_OPTIMAL`
    /// for the post-process chain (spec §4.8).
    pub fn transition_color_for_sampling(&self, command_buffer: vk::CommandBuffer, image: vk::Image) {
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
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
            ctx.device.destroy_descriptor_set_layout(self.per_frame_set_layout, None);
            ctx.device.destroy_descriptor_set_layout(self.bone_set_layout, None);
            ctx.device.destroy_descriptor_set_layout(self.skin_set_layout, None);
            ctx.device.destroy_shader_module(self.static_vertex_module, None);
            ctx.device.destroy_shader_module(self.skinned_vertex_module, None);
            ctx.device.destroy_shader_module(self.fragment_module, None);
        }
    }
}
