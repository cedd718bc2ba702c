//! GPU frustum culling (spec §4.5).
//!
//! CPU side fills one [`NodeCullingGpu`] entry per active scene slot and the
//! 6-plane frustum uniform; GPU side is a `ceil(node_count/64)`-group compute
//! dispatch writing a parallel `b32` visibility array. Compute-pipeline
//! plumbing (shader module + pipeline layout + descriptor set, no render
//! pass involved either way) adapted from graphics to a single compute
//! stage.

use std::ffi::CString;
use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};

use crate::error::{DroppedCounts, Error, Result};
use crate::gpu::buffer::{self, GpuBuffer};
use crate::gpu::{pipeline, GpuContext};
use crate::limits::MAX_SCENE_NODES;
use crate::log::Logger;
use crate::math::{Aabb, Frustum};
use crate::scene::Scene;
use crate::warehouse::ResourceWarehouse;

/// Mirrors spec §3 `NodeCullingData`, padded to 16-byte lanes for std430.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct NodeCullingGpu {
    aabb_min: [f32; 4],
    aabb_max: [f32; 4],
    culling_enabled: u32,
    _pad: [u32; 3],
}

impl Default for NodeCullingGpu {
    fn default() -> Self {
        Self { aabb_min: [0.0; 4], aabb_max: [0.0; 4], culling_enabled: 0, _pad: [0; 3] }
    }
}

/// The 6 outward half-space planes the compute shader tests each AABB
/// against (spec §4.5 dispatch step).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FrustumGpu {
    planes: [[f32; 4]; 6],
}

const BINDING_NODE_DATA: u32 = 0;
const BINDING_VISIBILITY: u32 = 1;
const BINDING_FRUSTUM: u32 = 2;

/// Compute-shader local workgroup size (spec §4.5: `ceil(node_count/64)`).
const WORKGROUP_SIZE: u32 = 64;

pub struct CullingEngine {
    ctx: Arc<GpuContext>,
    logger: Arc<dyn Logger>,
    dropped: Arc<DroppedCounts>,
    pub node_data_buffer: GpuBuffer,
    pub visibility_buffer: GpuBuffer,
    pub frustum_buffer: GpuBuffer,
    descriptor_set_layout: vk::DescriptorSetLayout,
    descriptor_set: vk::DescriptorSet,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    shader_module: vk::ShaderModule,
    active_node_count: u32,
    overflow_warned: bool,
}

impl CullingEngine {
    pub fn new(ctx: Arc<GpuContext>, logger: Arc<dyn Logger>, dropped: Arc<DroppedCounts>, compute_spirv: &[u32]) -> Result<Self> {
        let node_data_buffer = buffer::create_zeroed_buffer(
            &ctx,
            (MAX_SCENE_NODES as u64) * std::mem::size_of::<NodeCullingGpu>() as u64,
            vk::BufferUsageFlags::STORAGE_BUFFER,
        )?;
        let visibility_buffer = buffer::create_zeroed_buffer(
            &ctx,
            (MAX_SCENE_NODES as u64) * std::mem::size_of::<u32>() as u64,
            vk::BufferUsageFlags::STORAGE_BUFFER,
        )?;
        let frustum_buffer =
            buffer::create_zeroed_buffer(&ctx, std::mem::size_of::<FrustumGpu>() as u64, vk::BufferUsageFlags::UNIFORM_BUFFER)?;

        let descriptor_set_layout = Self::create_descriptor_set_layout(&ctx)?;
        let descriptor_set = Self::allocate_descriptor_set(&ctx, descriptor_set_layout)?;
        Self::write_descriptor_set(&ctx, descriptor_set, &node_data_buffer, &visibility_buffer, &frustum_buffer);

        let shader_module = pipeline::create_shader_module(&ctx, compute_spirv)?;
        let pipeline_layout = pipeline::create_pipeline_layout(&ctx, &[descriptor_set_layout], &[])?;
        let entry_point = CString::new("main").unwrap();
        let compute_pipeline = pipeline::create_compute_pipeline(&ctx, shader_module, &entry_point, pipeline_layout)?;

        let engine = Self {
            ctx,
            logger,
            dropped,
            node_data_buffer,
            visibility_buffer,
            frustum_buffer,
            descriptor_set_layout,
            descriptor_set,
            pipeline_layout,
            pipeline: compute_pipeline,
            shader_module,
            active_node_count: 0,
            overflow_warned: false,
        };
        crate::engine_info!(engine, "rendercore::Culling", "culling engine initialized");
        Ok(engine)
    }

    fn create_descriptor_set_layout(ctx: &GpuContext) -> Result<vk::DescriptorSetLayout> {
        let bindings = [
            vk::DescriptorSetLayoutBinding::default()
                .binding(BINDING_NODE_DATA)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::COMPUTE),
            vk::DescriptorSetLayoutBinding::default()
                .binding(BINDING_VISIBILITY)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::COMPUTE),
            vk::DescriptorSetLayoutBinding::default()
                .binding(BINDING_FRUSTUM)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::COMPUTE),
        ];
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        unsafe { ctx.device.create_descriptor_set_layout(&info, None) }
            .map_err(|e| Error::InitializationFailed(format!("culling descriptor set layout: {e}")))
    }

    fn allocate_descriptor_set(ctx: &GpuContext, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let layouts = [layout];
        let info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(ctx.descriptor_pool).set_layouts(&layouts);
        let sets = unsafe { ctx.device.allocate_descriptor_sets(&info) }
            .map_err(|e| Error::InitializationFailed(format!("culling descriptor set: {e}")))?;
        Ok(sets[0])
    }

    fn write_descriptor_set(ctx: &GpuContext, set: vk::DescriptorSet, node_data: &GpuBuffer, visibility: &GpuBuffer, frustum: &GpuBuffer) {
        let node_data_info = [vk::DescriptorBufferInfo::default().buffer(node_data.buffer).offset(0).range(vk::WHOLE_SIZE)];
        let visibility_info = [vk::DescriptorBufferInfo::default().buffer(visibility.buffer).offset(0).range(vk::WHOLE_SIZE)];
        let frustum_info = [vk::DescriptorBufferInfo::default().buffer(frustum.buffer).offset(0).range(vk::WHOLE_SIZE)];

        let writes = [
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(BINDING_NODE_DATA)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .buffer_info(&node_data_info),
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(BINDING_VISIBILITY)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .buffer_info(&visibility_info),
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(BINDING_FRUSTUM)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&frustum_info),
        ];
        unsafe { ctx.device.update_descriptor_sets(&writes, &[]) };
    }

    /// Upload step (spec §4.5): compute each active node's world AABB and
    /// write it, plus `culling_enabled`, into slot `handle.index`. Slots
    /// past `MAX_SCENE_NODES` are dropped with a one-shot warning.
    pub fn upload(&mut self, scene: &Scene, warehouse: &ResourceWarehouse, frustum: &Frustum) -> Result<()> {
        let mut slots = vec![NodeCullingGpu::default(); MAX_SCENE_NODES as usize];
        let mut highest = 0u32;

        for (handle, node) in scene.iter_nodes() {
            if handle.index >= MAX_SCENE_NODES {
                if !self.overflow_warned {
                    crate::engine_warn!(self, "rendercore::Culling", "scene slot {} exceeds MAX_SCENE_NODES; dropping", handle.index);
                    self.overflow_warned = true;
                }
                self.dropped.record_culling_nodes(1);
                continue;
            }

            let local_aabb = scene.local_aabb(handle, warehouse);
            let enabled = node.culling_enabled && local_aabb.is_some();
            let world_aabb = local_aabb.map(|aabb| aabb.transformed(&node.world_matrix)).unwrap_or(Aabb::unit());

            slots[handle.index as usize] = NodeCullingGpu {
                aabb_min: [world_aabb.min.x, world_aabb.min.y, world_aabb.min.z, 0.0],
                aabb_max: [world_aabb.max.x, world_aabb.max.y, world_aabb.max.z, 0.0],
                culling_enabled: enabled as u32,
                _pad: [0; 3],
            };
            highest = highest.max(handle.index + 1);
        }

        self.active_node_count = highest;
        self.node_data_buffer.update(&self.ctx, 0, bytemuck::cast_slice(&slots[..highest as usize]))?;

        let frustum_gpu = FrustumGpu { planes: frustum.planes.map(|p| p.to_array()) };
        self.frustum_buffer.update(&self.ctx, 0, bytemuck::bytes_of(&frustum_gpu))?;
        Ok(())
    }

    /// Record the compute dispatch into an already-begun command buffer
    /// (spec §4.11 step 5). Caller is responsible for the preceding/following
    /// pipeline barriers.
    pub fn record_dispatch(&self, command_buffer: vk::CommandBuffer) {
        if self.active_node_count == 0 {
            return;
        }
        let groups = self.active_node_count.div_ceil(WORKGROUP_SIZE);
        unsafe {
            self.ctx.device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::COMPUTE, self.pipeline);
            self.ctx.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                self.pipeline_layout,
                0,
                &[self.descriptor_set],
                &[],
            );
            self.ctx.device.cmd_dispatch(command_buffer, groups, 1, 1);
        }
    }

    pub fn active_node_count(&self) -> u32 {
        self.active_node_count
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
            ctx.device.destroy_pipeline(self.pipeline, None);
            ctx.device.destroy_pipeline_layout(self.pipeline_layout, None);
            ctx.device.destroy_shader_module(self.shader_module, None);
            ctx.device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
        }
        self.node_data_buffer.destroy(&ctx);
        self.visibility_buffer.destroy(&ctx);
        self.frustum_buffer.destroy(&ctx);
    }
}
