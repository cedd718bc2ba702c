//! GPU particle simulation (spec §4.9).
//!
//! The particle pool is a single host-visible SSBO, not frame-indexed —
//! CPU recycle/spawn reads and writes it directly through its persistent
//! mapping. This is only safe because the orchestrator waits on the
//! current frame's fence (spec §4.11 step 1) before this engine touches it
//! each frame, per spec §5's frame-ownership invariant.

use std::ffi::CString;
use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rand::Rng;

use crate::error::{DroppedCounts, Error, Result};
use crate::gpu::buffer::{self, GpuBuffer};
use crate::gpu::{pipeline, GpuContext};
use crate::limits::{MAX_FORCE_FIELDS, MAX_PARTICLES};
use crate::log::Logger;
use crate::scene::{Emitter, ForceFieldBehavior, Scene};

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ParticleGpu {
    pub position: [f32; 4],
    pub velocity: [f32; 4],
    pub color_start: [f32; 4],
    pub color_end: [f32; 4],
    pub color: [f32; 4],
    pub size: f32,
    pub size_end: f32,
    pub life: f32,
    pub max_life: f32,
    pub is_dead: u32,
    pub weight: f32,
    pub _pad: [u32; 2],
}

impl Default for ParticleGpu {
    fn default() -> Self {
        Self {
            position: [0.0; 4],
            velocity: [0.0; 4],
            color_start: [0.0; 4],
            color_end: [0.0; 4],
            color: [0.0; 4],
            size: 0.0,
            size_end: 0.0,
            life: 0.0,
            max_life: 0.0,
            is_dead: 1,
            weight: 1.0,
            _pad: [0; 2],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ForceFieldGpu {
    position: [f32; 4],
    behavior: u32,
    strength: f32,
    area_of_effect: f32,
    fade: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ParticlePushConstants {
    dt: f32,
    forcefield_count: u32,
    _pad: [u32; 2],
}

const BINDING_PARTICLES: u32 = 0;
const BINDING_FORCE_FIELDS: u32 = 1;
const COMPUTE_WORKGROUP_SIZE: u32 = 256;

pub struct ParticleEngine {
    ctx: Arc<GpuContext>,
    logger: Arc<dyn Logger>,
    dropped: Arc<DroppedCounts>,
    pub particle_buffer: GpuBuffer,
    pub force_field_buffer: GpuBuffer,
    /// Free particle slot indices. Invariant (spec §8): `MAX_PARTICLES -
    /// free_list.len()` equals the currently live particle count.
    free_list: Vec<u32>,
    descriptor_set_layout: vk::DescriptorSetLayout,
    descriptor_set: vk::DescriptorSet,
    compute_pipeline_layout: vk::PipelineLayout,
    compute_pipeline: vk::Pipeline,
    compute_module: vk::ShaderModule,
    draw_pipeline_layout: vk::PipelineLayout,
    draw_pipeline: vk::Pipeline,
    vertex_module: vk::ShaderModule,
    fragment_module: vk::ShaderModule,
}

impl ParticleEngine {
    pub fn new(
        ctx: Arc<GpuContext>,
        logger: Arc<dyn Logger>,
        dropped: Arc<DroppedCounts>,
        compute_spirv: &[u32],
        vertex_spirv: &[u32],
        fragment_spirv: &[u32],
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> Result<Self> {
        let particle_buffer = buffer::create_zeroed_buffer(
            &ctx,
            (MAX_PARTICLES as u64) * std::mem::size_of::<ParticleGpu>() as u64,
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let force_field_buffer = buffer::create_zeroed_buffer(
            &ctx,
            (MAX_FORCE_FIELDS as u64) * std::mem::size_of::<ForceFieldGpu>() as u64,
            vk::BufferUsageFlags::STORAGE_BUFFER,
        )?;

        let descriptor_set_layout = Self::create_descriptor_set_layout(&ctx)?;
        let descriptor_set = Self::allocate_descriptor_set(&ctx, descriptor_set_layout)?;
        Self::write_descriptor_set(&ctx, descriptor_set, &particle_buffer, &force_field_buffer);

        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::COMPUTE)
            .offset(0)
            .size(std::mem::size_of::<ParticlePushConstants>() as u32);
        let compute_pipeline_layout = pipeline::create_pipeline_layout(&ctx, &[descriptor_set_layout], &[push_constant_range])?;
        let entry_point = CString::new("main").unwrap();
        let compute_module = pipeline::create_shader_module(&ctx, compute_spirv)?;
        let compute_pipeline = pipeline::create_compute_pipeline(&ctx, compute_module, &entry_point, compute_pipeline_layout)?;

        let draw_pipeline_layout = pipeline::create_pipeline_layout(&ctx, &[], &[])?;
        let vertex_module = pipeline::create_shader_module(&ctx, vertex_spirv)?;
        let fragment_module = pipeline::create_shader_module(&ctx, fragment_spirv)?;
        let vertex_binding = vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(std::mem::size_of::<ParticleGpu>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX);
        let vertex_attributes = Self::vertex_attributes();
        let draw_pipeline = pipeline::create_graphics_pipeline(
            &ctx,
            &pipeline::GraphicsPipelineDesc {
                vertex_module,
                vertex_entry: &entry_point,
                fragment: Some((fragment_module, &entry_point)),
                vertex_bindings: std::slice::from_ref(&vertex_binding),
                vertex_attributes: &vertex_attributes,
                topology: vk::PrimitiveTopology::POINT_LIST,
                layout: draw_pipeline_layout,
                color_formats: std::slice::from_ref(&color_format),
                depth_format: Some(depth_format),
                depth_test: true,
                depth_write: false,
                cull_mode: vk::CullModeFlags::NONE,
            },
        )?;

        let free_list: Vec<u32> = (0..MAX_PARTICLES).rev().collect();

        let engine = Self {
            ctx,
            logger,
            dropped,
            particle_buffer,
            force_field_buffer,
            free_list,
            descriptor_set_layout,
            descriptor_set,
            compute_pipeline_layout,
            compute_pipeline,
            compute_module,
            draw_pipeline_layout,
            draw_pipeline,
            vertex_module,
            fragment_module,
        };
        crate::engine_info!(engine, "rendercore::Particles", "particle engine initialized ({MAX_PARTICLES} slots)");
        Ok(engine)
    }

    /// Offsets mirror [`ParticleGpu`]'s field layout: the draw only needs
    /// `position`, the compute-lerped `color`, `size`, and `is_dead` (the
    /// vertex shader discards dead particles by collapsing their point size
    /// to zero rather than via a separate indirection).
    fn vertex_attributes() -> [vk::VertexInputAttributeDescription; 4] {
        let field = |location: u32, offset: u32, format: vk::Format| {
            vk::VertexInputAttributeDescription::default().location(location).binding(0).format(format).offset(offset)
        };
        let color_offset = std::mem::offset_of!(ParticleGpu, color) as u32;
        let size_offset = std::mem::offset_of!(ParticleGpu, size) as u32;
        let is_dead_offset = std::mem::offset_of!(ParticleGpu, is_dead) as u32;
        [
            field(0, 0, vk::Format::R32G32B32A32_SFLOAT),
            field(1, color_offset, vk::Format::R32G32B32A32_SFLOAT),
            field(2, size_offset, vk::Format::R32_SFLOAT),
            field(3, is_dead_offset, vk::Format::R32_UINT),
        ]
    }

    fn create_descriptor_set_layout(ctx: &GpuContext) -> Result<vk::DescriptorSetLayout> {
        let bindings = [
            vk::DescriptorSetLayoutBinding::default()
                .binding(BINDING_PARTICLES)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::COMPUTE),
            vk::DescriptorSetLayoutBinding::default()
                .binding(BINDING_FORCE_FIELDS)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::COMPUTE),
        ];
        let info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        unsafe { ctx.device.create_descriptor_set_layout(&info, None) }
            .map_err(|e| Error::InitializationFailed(format!("particle descriptor set layout: {e}")))
    }

    fn allocate_descriptor_set(ctx: &GpuContext, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let layouts = [layout];
        let info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(ctx.descriptor_pool).set_layouts(&layouts);
        let sets = unsafe { ctx.device.allocate_descriptor_sets(&info) }
            .map_err(|e| Error::InitializationFailed(format!("particle descriptor set: {e}")))?;
        Ok(sets[0])
    }

    fn write_descriptor_set(ctx: &GpuContext, set: vk::DescriptorSet, particles: &GpuBuffer, force_fields: &GpuBuffer) {
        let particle_info = [vk::DescriptorBufferInfo::default().buffer(particles.buffer).offset(0).range(vk::WHOLE_SIZE)];
        let force_field_info = [vk::DescriptorBufferInfo::default().buffer(force_fields.buffer).offset(0).range(vk::WHOLE_SIZE)];
        let writes = [
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(BINDING_PARTICLES)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .buffer_info(&particle_info),
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(BINDING_FORCE_FIELDS)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .buffer_info(&force_field_info),
        ];
        unsafe { ctx.device.update_descriptor_sets(&writes, &[]) };
    }

    fn mapped_particles(&mut self) -> &mut [ParticleGpu] {
        let slice = self.particle_buffer.mapped_slice_mut().expect("particle buffer must be host-visible");
        bytemuck::cast_slice_mut(slice)
    }

    /// Step 1 (spec §4.9): scan for particles whose life has reached zero
    /// and return them to the free list.
    pub fn recycle(&mut self) {
        let mut newly_dead = Vec::new();
        for (index, particle) in self.mapped_particles().iter_mut().enumerate() {
            if particle.life <= 0.0 && particle.is_dead == 0 {
                particle.is_dead = 1;
                newly_dead.push(index as u32);
            }
        }
        self.free_list.extend(newly_dead);
    }

    /// Step 2 (spec §4.9): accumulate each enabled emitter's spawn clock and
    /// reset freed slots with randomized spread parameters.
    pub fn spawn(&mut self, scene: &mut Scene, dt: f32) {
        let mut rng = rand::rng();

        // Collect (world_position, spawn_count) per emitter first: slot
        // allocation and the GPU write both need `&mut self`, so the
        // emitter's own accumulator bookkeeping happens on `scene` alone.
        let mut spawns: Vec<(Emitter, Vec3, u32)> = Vec::new();
        for handle in scene.collect_emitters() {
            let Some(node) = scene.node(handle) else { continue };
            let world_position = node.world_matrix().col(3).truncate();
            let Some(node_mut) = scene.node_mut(handle) else { continue };
            let crate::scene::Attachment::Emitter(ref mut emitter) = node_mut.attachment else { continue };
            if !emitter.enabled {
                continue;
            }

            emitter.time_accumulator += dt;
            let interval = 1.0 / emitter.emission_rate.max(0.0001);
            let mut count = 0u32;
            while emitter.time_accumulator >= interval {
                emitter.time_accumulator -= interval;
                count += 1;
            }
            if count > 0 {
                spawns.push((emitter.clone(), world_position, count));
            }
        }

        for (emitter, world_position, count) in spawns {
            for _ in 0..count {
                let Some(slot) = self.free_list.pop() else { break };
                let particle = Self::spawn_particle(&emitter, world_position, &mut rng);
                self.mapped_particles()[slot as usize] = particle;
            }
        }
    }

    fn spawn_particle(emitter: &Emitter, world_position: Vec3, rng: &mut impl Rng) -> ParticleGpu {
        let spread = |base: Vec3, spread: Vec3, rng: &mut impl Rng| -> Vec3 {
            Vec3::new(
                base.x + rng.random_range(-spread.x..=spread.x),
                base.y + rng.random_range(-spread.y..=spread.y),
                base.z + rng.random_range(-spread.z..=spread.z),
            )
        };
        let position = spread(world_position, emitter.position_spread, rng);
        let velocity = spread(emitter.initial_velocity, emitter.velocity_spread, rng);
        let weight = emitter.weight + rng.random_range(-emitter.weight_spread..=emitter.weight_spread);

        ParticleGpu {
            position: [position.x, position.y, position.z, 0.0],
            velocity: [velocity.x, velocity.y, velocity.z, 0.0],
            color_start: emitter.color_start.to_array(),
            color_end: emitter.color_end.to_array(),
            color: emitter.color_start.to_array(),
            size: emitter.size_start,
            size_end: emitter.size_end,
            life: emitter.lifetime,
            max_life: emitter.lifetime,
            is_dead: 0,
            weight,
            _pad: [0; 2],
        }
    }

    /// Step 3 (spec §4.9): pack force-field world positions into the SSBO,
    /// truncated to `MAX_FORCE_FIELDS`.
    pub fn upload_force_fields(&self, scene: &Scene) -> Result<u32> {
        let fields = scene.collect_forcefields();
        let count = fields.len().min(MAX_FORCE_FIELDS as usize);
        if fields.len() > count {
            let dropped = (fields.len() - count) as u32;
            crate::engine_warn!(self, "rendercore::Particles", "{dropped} force field(s) exceed MAX_FORCE_FIELDS; dropping");
            self.dropped.record_particles_force_fields(dropped);
        }
        let mut gpu_fields = vec![ForceFieldGpu { position: [0.0; 4], behavior: 0, strength: 0.0, area_of_effect: 0.0, fade: 0.0 }; count];
        for (slot, instance) in fields.iter().take(count).enumerate() {
            gpu_fields[slot] = ForceFieldGpu {
                position: [instance.world_position.x, instance.world_position.y, instance.world_position.z, 0.0],
                behavior: match instance.force_field.behavior {
                    ForceFieldBehavior::Attract => 0,
                    ForceFieldBehavior::Repel => 1,
                    ForceFieldBehavior::Orbit => 2,
                },
                strength: instance.force_field.strength,
                area_of_effect: instance.force_field.area_of_effect,
                fade: instance.force_field.fade,
            };
        }
        if !gpu_fields.is_empty() {
            self.force_field_buffer.update(&self.ctx, 0, bytemuck::cast_slice(&gpu_fields))?;
        }
        Ok(count as u32)
    }

    /// Steps 4-5 (spec §4.9): dispatch the compute pass, then the
    /// compute→vertex-input barrier so the draw sees integrated particles.
    pub fn record_simulate(&self, command_buffer: vk::CommandBuffer, dt: f32, forcefield_count: u32) {
        let constants = ParticlePushConstants { dt, forcefield_count, _pad: [0; 2] };
        unsafe {
            self.ctx.device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::COMPUTE, self.compute_pipeline);
            self.ctx.device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::COMPUTE,
                self.compute_pipeline_layout,
                0,
                &[self.descriptor_set],
                &[],
            );
            self.ctx.device.cmd_push_constants(command_buffer, self.compute_pipeline_layout, vk::ShaderStageFlags::COMPUTE, 0, bytemuck::bytes_of(&constants));
            self.ctx.device.cmd_dispatch(command_buffer, MAX_PARTICLES.div_ceil(COMPUTE_WORKGROUP_SIZE), 1, 1);

            let barrier = vk::BufferMemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::SHADER_WRITE)
                .dst_access_mask(vk::AccessFlags::VERTEX_ATTRIBUTE_READ)
                .buffer(self.particle_buffer.buffer)
                .offset(0)
                .size(vk::WHOLE_SIZE);
            self.ctx.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::PipelineStageFlags::VERTEX_INPUT,
                vk::DependencyFlags::empty(),
                &[],
                &[barrier],
                &[],
            );
        }
    }

    /// Step 6 (spec §4.9): draw every particle slot as a point; the vertex
    /// shader discards `is_dead` particles.
    pub fn record_draw(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.ctx.device.cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, self.draw_pipeline);
            self.ctx.device.cmd_bind_vertex_buffers(command_buffer, 0, &[self.particle_buffer.buffer], &[0]);
            self.ctx.device.cmd_draw(command_buffer, MAX_PARTICLES, 1, 0, 0);
        }
    }

    pub fn active_count(&self) -> u32 {
        MAX_PARTICLES - self.free_list.len() as u32
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
            ctx.device.destroy_pipeline(self.compute_pipeline, None);
            ctx.device.destroy_pipeline_layout(self.compute_pipeline_layout, None);
            ctx.device.destroy_shader_module(self.compute_module, None);
            ctx.device.destroy_pipeline(self.draw_pipeline, None);
            ctx.device.destroy_pipeline_layout(self.draw_pipeline_layout, None);
            ctx.device.destroy_shader_module(self.vertex_module, None);
            ctx.device.destroy_shader_module(self.fragment_module, None);
            ctx.device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
        }
        self.particle_buffer.destroy(&ctx);
        self.force_field_buffer.destroy(&ctx);
    }
}
