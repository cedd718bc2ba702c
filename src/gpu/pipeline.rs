//! Shared shader-module and pipeline construction helpers.
//!
//! Shader modules are created via a raw `device.create_shader_module` over
//! 4-byte-aligned SPIR-V words, with no SPIR-V reflection step: every
//! descriptor set layout and push-constant range in this core is fixed and
//! documented by spec §6, so pipelines are built from explicit layouts
//! supplied by the caller rather than reflected from the shader binary.
//! Every pipeline here targets dynamic rendering (`VK_KHR_dynamic_rendering`,
//! spec §6): no `vk::RenderPass`/`vk::Framebuffer` is ever created.

use ash::vk;

use super::GpuContext;
use crate::error::{Error, Result};

/// Create a shader module from SPIR-V words. `spirv` must already be
/// 4-byte-aligned `u32` words — the asset pipeline that embeds the bytes
/// (spec §6 "compiled out-of-band, embedded as byte arrays") is responsible
/// for that, not this core.
pub fn create_shader_module(ctx: &GpuContext, spirv: &[u32]) -> Result<vk::ShaderModule> {
    let info = vk::ShaderModuleCreateInfo::default().code(spirv);
    unsafe { ctx.device.create_shader_module(&info, None) }
        .map_err(|e| Error::ShaderModuleInvalid(format!("create_shader_module: {e}")))
}

pub fn create_pipeline_layout(
    ctx: &GpuContext,
    set_layouts: &[vk::DescriptorSetLayout],
    push_constant_ranges: &[vk::PushConstantRange],
) -> Result<vk::PipelineLayout> {
    let info = vk::PipelineLayoutCreateInfo::default().set_layouts(set_layouts).push_constant_ranges(push_constant_ranges);
    unsafe { ctx.device.create_pipeline_layout(&info, None) }
        .map_err(|e| Error::InitializationFailed(format!("create_pipeline_layout: {e}")))
}

/// Build a single-stage compute pipeline. Used by the culling dispatch
/// (§4.5) and the particle simulation (§4.9).
pub fn create_compute_pipeline(
    ctx: &GpuContext,
    module: vk::ShaderModule,
    entry_point: &std::ffi::CStr,
    layout: vk::PipelineLayout,
) -> Result<vk::Pipeline> {
    let stage = vk::PipelineShaderStageCreateInfo::default().stage(vk::ShaderStageFlags::COMPUTE).module(module).name(entry_point);
    let info = vk::ComputePipelineCreateInfo::default().stage(stage).layout(layout);
    unsafe { ctx.device.create_compute_pipelines(vk::PipelineCache::null(), &[info], None) }
        .map_err(|(_, e)| Error::InitializationFailed(format!("create_compute_pipelines: {e}")))
        .map(|pipelines| pipelines[0])
}

/// Description of one graphics pipeline targeting dynamic rendering.
pub struct GraphicsPipelineDesc<'a> {
    pub vertex_module: vk::ShaderModule,
    pub vertex_entry: &'a std::ffi::CStr,
    /// `None` for depth-only passes (shadow maps): the pipeline then has no
    /// fragment stage at all, rather than a fragment stage bound to a null
    /// module.
    pub fragment: Option<(vk::ShaderModule, &'a std::ffi::CStr)>,
    pub vertex_bindings: &'a [vk::VertexInputBindingDescription],
    pub vertex_attributes: &'a [vk::VertexInputAttributeDescription],
    pub topology: vk::PrimitiveTopology,
    pub layout: vk::PipelineLayout,
    pub color_formats: &'a [vk::Format],
    pub depth_format: Option<vk::Format>,
    pub depth_test: bool,
    pub depth_write: bool,
    pub cull_mode: vk::CullModeFlags,
}

/// Build a graphics pipeline for `VK_KHR_dynamic_rendering` (no render
/// pass/framebuffer), with dynamic viewport+scissor (spec §4.8: "Dynamic
/// viewport+scissor matches the render target").
pub fn create_graphics_pipeline(ctx: &GpuContext, desc: &GraphicsPipelineDesc) -> Result<vk::Pipeline> {
    let mut stages = vec![
        vk::PipelineShaderStageCreateInfo::default().stage(vk::ShaderStageFlags::VERTEX).module(desc.vertex_module).name(desc.vertex_entry),
    ];
    if let Some((fragment_module, fragment_entry)) = desc.fragment {
        stages.push(vk::PipelineShaderStageCreateInfo::default().stage(vk::ShaderStageFlags::FRAGMENT).module(fragment_module).name(fragment_entry));
    }

    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(desc.vertex_bindings)
        .vertex_attribute_descriptions(desc.vertex_attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default().topology(desc.topology);

    let viewport_state = vk::PipelineViewportStateCreateInfo::default().viewport_count(1).scissor_count(1);

    let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
        .polygon_mode(vk::PolygonMode::FILL)
        .cull_mode(desc.cull_mode)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .line_width(1.0);

    let multisample = vk::PipelineMultisampleStateCreateInfo::default().rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
        .depth_test_enable(desc.depth_test)
        .depth_write_enable(desc.depth_write)
        .depth_compare_op(vk::CompareOp::LESS_OR_EQUAL);

    let attachment_blend = vk::PipelineColorBlendAttachmentState::default().color_write_mask(vk::ColorComponentFlags::RGBA);
    let attachment_blends = vec![attachment_blend; desc.color_formats.len()];
    let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&attachment_blends);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let mut rendering_info = vk::PipelineRenderingCreateInfo::default().color_attachment_formats(desc.color_formats);
    if let Some(depth_format) = desc.depth_format {
        rendering_info = rendering_info.depth_attachment_format(depth_format);
    }

    let mut info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterization)
        .multisample_state(&multisample)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blend)
        .dynamic_state(&dynamic_state)
        .layout(desc.layout)
        .push_next(&mut rendering_info);
    info.render_pass = vk::RenderPass::null();

    unsafe { ctx.device.create_graphics_pipelines(vk::PipelineCache::null(), &[info], None) }
        .map_err(|(_, e)| Error::InitializationFailed(format!("create_graphics_pipelines: {e}")))
        .map(|pipelines| pipelines[0])
}
