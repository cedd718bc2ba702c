//! Post-process effect chain (spec §4.10).
//!
//! Effect shaders are opaque SPIR-V modules supplied by the caller (spec
//! §1 lists "postprocess effect shaders" as out of scope for this core) —
//! this module only owns the pipeline plumbing and the ping-pong
//! bookkeeping, keeping mechanism (pipelines, descriptor sets) separate
//! from asset-supplied shader bytes (content). The three ping-pong images
//! themselves (main-pass color + two scratch targets) are owned by
//! [`crate::frame::Frame`], matching spec §3's `Frame` struct; this stack
//! only holds descriptor sets bound to whichever views the orchestrator
//! hands it each frame.

use std::ffi::CString;
use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::gpu::{pipeline, GpuContext};
use crate::log::Logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostProcessEffect {
    None,
    Grayscale,
    Tonemap,
    Blur,
    Bloom,
    Outline,
    Fog,
}

pub const ALL_EFFECTS: [PostProcessEffect; 7] = [
    PostProcessEffect::None,
    PostProcessEffect::Grayscale,
    PostProcessEffect::Tonemap,
    PostProcessEffect::Blur,
    PostProcessEffect::Bloom,
    PostProcessEffect::Outline,
    PostProcessEffect::Fog,
];

/// Opaque carrier for an effect's push-constant struct. Capped at 32 bytes
/// per spec §4.10; the stack never interprets the bytes, only forwards them.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct EffectParams {
    pub bytes: [u8; 32],
}

impl Default for EffectParams {
    fn default() -> Self {
        Self { bytes: [0; 32] }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EffectInstance {
    pub effect: PostProcessEffect,
    pub params: EffectParams,
}

/// Three read-bindable descriptor sets, pre-wired (spec §4.10) to {main-pass
/// image, ping-pong A, ping-pong B}. The orchestrator updates the
/// `combined image sampler` behind each slot once per frame before the
/// chain records.
pub const TARGET_COUNT: usize = 3;

/// For effect index `i` in the chain, the read slot it samples from.
pub fn read_slot(effect_index: usize) -> usize {
    if effect_index == 0 {
        0
    } else {
        ((effect_index - 1) % 2) + 1
    }
}

/// For effect index `i`, the ping-pong slot it writes into. The caller
/// (frame orchestrator) is responsible for instead directing the last
/// effect in the chain at the swapchain image, per spec §4.10.
pub fn write_slot(effect_index: usize) -> usize {
    (effect_index % 2) + 1
}

const BINDING_SOURCE: u32 = 0;

pub struct PostProcessStack {
    ctx: Arc<GpuContext>,
    logger: Arc<dyn Logger>,
    effects: Vec<EffectInstance>,
    descriptor_set_layout: vk::DescriptorSetLayout,
    descriptor_sets: [vk::DescriptorSet; TARGET_COUNT],
    pipeline_layout: vk::PipelineLayout,
    pipelines: FxHashMap<PostProcessEffect, vk::Pipeline>,
    vertex_module: vk::ShaderModule,
    fragment_modules: FxHashMap<PostProcessEffect, vk::ShaderModule>,
    sampler: vk::Sampler,
}

impl PostProcessStack {
    /// `effect_shaders` need only cover the effects the caller intends to
    /// use; `PostProcessEffect::None` must always be present (used as the
    /// passthrough when the effect list is empty).
    pub fn new(
        ctx: Arc<GpuContext>,
        logger: Arc<dyn Logger>,
        vertex_spirv: &[u32],
        effect_shaders: &[(PostProcessEffect, &[u32])],
        color_format: vk::Format,
    ) -> Result<Self> {
        if !effect_shaders.iter().any(|(effect, _)| *effect == PostProcessEffect::None) {
            return Err(Error::InitializationFailed("post-process stack requires a None passthrough shader".into()));
        }

        let descriptor_set_layout = Self::create_descriptor_set_layout(&ctx)?;
        let sampler = Self::create_sampler(&ctx)?;
        let descriptor_sets = Self::allocate_descriptor_sets(&ctx, descriptor_set_layout)?;

        let push_constant_range =
            vk::PushConstantRange::default().stage_flags(vk::ShaderStageFlags::FRAGMENT).offset(0).size(std::mem::size_of::<EffectParams>() as u32);
        let pipeline_layout = pipeline::create_pipeline_layout(&ctx, &[descriptor_set_layout], &[push_constant_range])?;

        let entry_point = CString::new("main").unwrap();
        let vertex_module = pipeline::create_shader_module(&ctx, vertex_spirv)?;

        let mut fragment_modules = FxHashMap::default();
        let mut pipelines = FxHashMap::default();
        for (effect, spirv) in effect_shaders {
            let fragment_module = pipeline::create_shader_module(&ctx, spirv)?;
            let pipeline = pipeline::create_graphics_pipeline(
                &ctx,
                &pipeline::GraphicsPipelineDesc {
                    vertex_module,
                    vertex_entry: &entry_point,
                    fragment: Some((fragment_module, &entry_point)),
                    vertex_bindings: &[],
                    vertex_attributes: &[],
                    topology: vk::PrimitiveTopology::TRIANGLE_LIST,
                    layout: pipeline_layout,
                    color_formats: std::slice::from_ref(&color_format),
                    depth_format: None,
                    depth_test: false,
                    depth_write: false,
                    cull_mode: vk::CullModeFlags::NONE,
                },
            )?;
            fragment_modules.insert(*effect, fragment_module);
            pipelines.insert(*effect, pipeline);
        }

        let stack = Self {
            ctx,
            logger,
            effects: Vec::new(),
            descriptor_set_layout,
            descriptor_sets,
            pipeline_layout,
            pipelines,
            vertex_module,
            fragment_modules,
            sampler,
        };
        crate::engine_info!(stack, "rendercore::PostProcess", "post-process stack initialized with {} effect pipelines", stack.pipelines.len());
        Ok(stack)
    }

    fn create_descriptor_set_layout(ctx: &GpuContext) -> Result<vk::DescriptorSetLayout> {
        let binding = vk::DescriptorSetLayoutBinding::default()
            .binding(BINDING_SOURCE)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT);
        let bindings = [binding];
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        unsafe { ctx.device.create_descriptor_set_layout(&info, None) }
            .map_err(|e| Error::InitializationFailed(format!("post-process descriptor set layout: {e}")))
    }

    fn create_sampler(ctx: &GpuContext) -> Result<vk::Sampler> {
        let info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE);
        unsafe { ctx.device.create_sampler(&info, None) }.map_err(|e| Error::InitializationFailed(format!("post-process sampler: {e}")))
    }

    fn allocate_descriptor_sets(ctx: &GpuContext, layout: vk::DescriptorSetLayout) -> Result<[vk::DescriptorSet; TARGET_COUNT]> {
        let layouts = [layout; TARGET_COUNT];
        let info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(ctx.descriptor_pool).set_layouts(&layouts);
        let sets = unsafe { ctx.device.allocate_descriptor_sets(&info) }
            .map_err(|e| Error::InitializationFailed(format!("post-process descriptor sets: {e}")))?;
        Ok([sets[0], sets[1], sets[2]])
    }

    /// Rebind read slot `slot` (0..TARGET_COUNT) to `view`, called once per
    /// frame by the orchestrator before the chain records (the three views
    /// are main-pass color, ping-pong A, ping-pong B).
    pub fn update_target(&self, slot: usize, view: vk::ImageView) {
        let image_info = [vk::DescriptorImageInfo::default().image_view(view).image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL).sampler(self.sampler)];
        let write = vk::WriteDescriptorSet::default()
            .dst_set(self.descriptor_sets[slot])
            .dst_binding(BINDING_SOURCE)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info);
        unsafe { self.ctx.device.update_descriptor_sets(&[write], &[]) };
    }

    pub fn add_postprocess_effect(&mut self, effect: PostProcessEffect, params: EffectParams) {
        self.effects.push(EffectInstance { effect, params });
    }

    pub fn clear_postprocess_effects(&mut self) {
        self.effects.clear();
    }

    pub fn effect_count(&self) -> usize {
        self.effects.len().max(1)
    }

    /// Record one effect's full-screen-triangle draw. `write_extent` is the
    /// render target dimensions; `write_view`/`color_format` describe the
    /// attachment the orchestrator is currently targeting (the final effect
    /// in the chain targets the swapchain image instead of a ping-pong one).
    pub fn record_effect(
        &self,
        command_buffer: vk::CommandBuffer,
        effect_index: usize,
        write_view: vk::ImageView,
        write_extent: vk::Extent2D,
    ) {
        let instance = self.effects.get(effect_index).copied().unwrap_or(EffectInstance { effect: PostProcessEffect::None, params: EffectParams::default() });
        let Some(&pipeline) = self.pipelines.get(&instance.effect) else {
            return;
        };
        let read_set = self.descriptor_sets[read_slot(effect_index)];

        let color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(write_view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE);
        let color_attachments = [color_attachment];
        let rendering_info = vk::RenderingInfo::default()
            .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: write_extent })
            .layer_count(1)
            .color_attachments(&color_attachments);

        unsafe {
            self.ctx.device.cmd_begin_rendering(command_buffer, &rendering_info);
            self.ctx.device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
            self.ctx.device.cmd_bind_descriptor_sets(command_buffer, vk::PipelineBindPoint::GRAPHICS, self.pipeline_layout, 0, &[read_set], &[]);
            self.ctx.device.cmd_push_constants(command_buffer, self.pipeline_layout, vk::ShaderStageFlags::FRAGMENT, 0, bytemuck::bytes_of(&instance.params));
            let viewport = vk::Viewport { x: 0.0, y: 0.0, width: write_extent.width as f32, height: write_extent.height as f32, min_depth: 0.0, max_depth: 1.0 };
            let scissor = vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: write_extent };
            self.ctx.device.cmd_set_viewport(command_buffer, 0, &[viewport]);
            self.ctx.device.cmd_set_scissor(command_buffer, 0, &[scissor]);
            // Full-screen triangle: no vertex buffer, positions derived from
            // gl_VertexIndex in the shader.
            self.ctx.device.cmd_draw(command_buffer, 3, 1, 0, 0);
            self.ctx.device.cmd_end_rendering(command_buffer);
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
            for pipeline in self.pipelines.values() {
                ctx.device.destroy_pipeline(*pipeline, None);
            }
            ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            for module in self.fragment_modules.values() {
                ctx.device.destroy_shader_module(*module, None);
            }
            ctx.device.destroy_shader_module(self.vertex_module, None);
            ctx.device.destroy_sampler(self.sampler, None);
            ctx.device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
        }
    }
}
