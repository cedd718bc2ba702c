//! Resource Warehouse (spec §4.3): bindless pools of textures, materials,
//! meshes, and cameras, plus the global vertex/index buffers and per-frame
//! SSBOs everything else in the engine reads by index.
//!
//! Follows an "own the pools, expose `upload_*`/`create_*` entry points, log
//! on success" shape, using generational [`Handle`] pools rather than
//! name-keyed storage, since every consumer (batch builder, shadow
//! renderer, push constants) addresses resources by a stable 32-bit index,
//! not by name.

pub mod camera;
pub mod material;
pub mod mesh;
pub mod texture;

use ash::vk;
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::gpu::buffer::{create_buffer, create_zeroed_buffer, GpuBuffer};
use crate::gpu::memory::GpuImage;
use crate::gpu::GpuContext;
use crate::handle::Pool;
use crate::limits::{MAX_CAMERAS, MAX_FRAMES_IN_FLIGHT, MAX_INDICES, MAX_MATERIALS, MAX_MESHES, MAX_SKIN_VERTICES, MAX_TEXTURES, MAX_VERTICES};
use crate::log::Logger;
use crate::slab::{SizeClass, SlabAllocator};

use camera::Camera;
use material::{Material, MaterialGpu};
use mesh::{BufferRange, Mesh, MeshGpu, Skinning};
use texture::{TextureEntry, TextureFormat};

/// Geometry handed in by the asset loader collaborator (spec §6: "the loader
/// delivers `Geometry { vertices, indices, optional skinnings }`").
pub struct Geometry {
    /// Raw vertex bytes, already laid out to match the main pipeline's
    /// vertex input bindings.
    pub vertices: Vec<u8>,
    pub vertex_stride: u32,
    pub indices: Vec<u32>,
    pub skinning: Option<GeometrySkinning>,
}

pub struct GeometrySkinning {
    /// Raw per-vertex bone index/weight bytes, parallel to `vertices`.
    pub skin_vertices: Vec<u8>,
    pub skin_vertex_stride: u32,
    pub bones: Vec<u32>,
    pub root_bone_index: u32,
}

/// A simple bump allocator over one of the warehouse's two global buffers.
/// Vertex/index data is uploaded once and lives for the session, so there
/// is no free list here — unlike [`crate::slab::SlabAllocator`], which
/// exists because bone ranges genuinely come and go as characters
/// spawn/despawn.
struct BumpArena {
    cursor: u32,
    capacity: u32,
}

impl BumpArena {
    fn new(capacity: u32) -> Self {
        Self { cursor: 0, capacity }
    }

    fn alloc(&mut self, count: u32) -> Option<u32> {
        if self.cursor + count > self.capacity {
            return None;
        }
        let offset = self.cursor;
        self.cursor += count;
        Some(offset)
    }
}

pub struct ResourceWarehouse {
    ctx: Arc<GpuContext>,
    logger: Arc<dyn Logger>,

    meshes: Pool<Mesh>,
    materials: Pool<Material>,
    textures_2d: Pool<TextureEntry>,
    textures_cube: Pool<TextureEntry>,
    cameras: Pool<Camera>,

    vertex_arena: BumpArena,
    index_arena: BumpArena,
    pub vertex_buffer: GpuBuffer,
    pub index_buffer: GpuBuffer,

    /// Dummy zero-initialized skin-vertex buffer, bound whenever a pipeline
    /// expects skin attributes but the draw is static (spec §4.3).
    pub dummy_skin_buffer: GpuBuffer,
    /// Dummy 1x1 texture occupying bindless slot 0 (spec §9 "Bindless pattern").
    dummy_texture: GpuImage,

    /// Global per-vertex bone index/weight storage, sub-allocated the same
    /// way as `vertex_buffer`/`index_buffer` (spec §3 "Mesh" skinning range,
    /// §6 main-pass descriptor set 6 "vertex skinning data").
    skin_vertex_arena: BumpArena,
    pub skin_vertex_buffer: GpuBuffer,

    /// Bone transform matrices (spec §4.2/§6 descriptor set 2 "bone SSBO").
    bone_allocator: SlabAllocator,
    pub bone_matrix_buffer: GpuBuffer,

    pub material_buffer: GpuBuffer,
    pub mesh_buffer: GpuBuffer,
    /// One world-matrix SSBO per frame in flight (spec §3 "Frame",
    /// §4.3: "SSBO containing per-node world_matrix[] (per frame in flight)").
    pub world_matrix_buffers: [GpuBuffer; MAX_FRAMES_IN_FLIGHT],
    pub camera_buffer: GpuBuffer,

    pub descriptor_set_layout: vk::DescriptorSetLayout,
    pub descriptor_set: vk::DescriptorSet,
    sampler: vk::Sampler,

    textures_overflow_warned: bool,
}

const BINDING_TEXTURES: u32 = 0;
const BINDING_MATERIALS: u32 = 1;
const BINDING_MESHES: u32 = 2;
const BINDING_CAMERAS: u32 = 3;

/// Write one bindless texture descriptor. A free function (not a method)
/// so call sites holding a live borrow into one of the warehouse's pools
/// can still reach `ctx`/`descriptor_set`/`sampler` without the borrow
/// checker treating the whole `ResourceWarehouse` as re-borrowed.
fn write_texture_descriptor(
    ctx: &GpuContext,
    descriptor_set: vk::DescriptorSet,
    sampler: vk::Sampler,
    index: u32,
    view: vk::ImageView,
) -> Result<()> {
    let image_info =
        [vk::DescriptorImageInfo::default().image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL).image_view(view).sampler(sampler)];
    let write = vk::WriteDescriptorSet::default()
        .dst_set(descriptor_set)
        .dst_binding(BINDING_TEXTURES)
        .dst_array_element(index)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .image_info(&image_info);
    unsafe { ctx.device.update_descriptor_sets(&[write], &[]) };
    Ok(())
}

impl ResourceWarehouse {
    pub fn new(ctx: Arc<GpuContext>, logger: Arc<dyn Logger>) -> Result<Self> {
        let vertex_buffer = create_buffer(
            &ctx,
            MAX_VERTICES as u64 * 4,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::CpuToGpu,
        )?;
        let index_buffer = create_buffer(
            &ctx,
            MAX_INDICES as u64 * std::mem::size_of::<u32>() as u64,
            vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::CpuToGpu,
        )?;
        let dummy_skin_buffer = create_zeroed_buffer(
            &ctx,
            4096,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::STORAGE_BUFFER,
        )?;
        let dummy_texture = Self::create_dummy_texture(&ctx)?;

        let skin_vertex_buffer = create_zeroed_buffer(
            &ctx,
            MAX_SKIN_VERTICES as u64 * 16,
            vk::BufferUsageFlags::STORAGE_BUFFER,
        )?;
        let bone_slab_classes: Vec<SizeClass> =
            crate::limits::BONE_SLAB_CLASSES.iter().map(|&(block_size, block_count)| SizeClass { block_size, block_count }).collect();
        let bone_allocator = SlabAllocator::new(&bone_slab_classes);
        let bone_matrix_buffer = create_zeroed_buffer(
            &ctx,
            bone_allocator.capacity() as u64 * 64,
            vk::BufferUsageFlags::STORAGE_BUFFER,
        )?;

        let material_buffer = create_zeroed_buffer(
            &ctx,
            MAX_MATERIALS as u64 * std::mem::size_of::<MaterialGpu>() as u64,
            vk::BufferUsageFlags::STORAGE_BUFFER,
        )?;
        let mesh_buffer = create_zeroed_buffer(
            &ctx,
            MAX_MESHES as u64 * std::mem::size_of::<MeshGpu>() as u64,
            vk::BufferUsageFlags::STORAGE_BUFFER,
        )?;
        let world_matrix_buffers = std::array::from_fn(|_| {
            create_zeroed_buffer(
                &ctx,
                crate::limits::MAX_SCENE_NODES as u64 * 64,
                vk::BufferUsageFlags::STORAGE_BUFFER,
            )
            .expect("world matrix ssbo allocation")
        });
        let camera_buffer = create_zeroed_buffer(
            &ctx,
            MAX_CAMERAS as u64 * std::mem::size_of::<camera::CameraGpu>() as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
        )?;

        let sampler = Self::create_default_sampler(&ctx)?;
        let descriptor_set_layout = Self::create_descriptor_set_layout(&ctx)?;
        let descriptor_set = Self::allocate_descriptor_set(&ctx, descriptor_set_layout)?;

        let mut warehouse = Self {
            ctx,
            logger,
            meshes: Pool::with_capacity(MAX_MESHES),
            materials: Pool::with_capacity(MAX_MATERIALS),
            textures_2d: Pool::with_capacity(MAX_TEXTURES),
            textures_cube: Pool::with_capacity(crate::limits::MAX_CUBE_TEXTURES),
            cameras: Pool::with_capacity(MAX_CAMERAS),
            vertex_arena: BumpArena::new(MAX_VERTICES),
            index_arena: BumpArena::new(MAX_INDICES),
            vertex_buffer,
            index_buffer,
            dummy_skin_buffer,
            dummy_texture,
            skin_vertex_arena: BumpArena::new(MAX_SKIN_VERTICES),
            skin_vertex_buffer,
            bone_allocator,
            bone_matrix_buffer,
            material_buffer,
            mesh_buffer,
            world_matrix_buffers,
            camera_buffer,
            descriptor_set_layout,
            descriptor_set,
            sampler,
            textures_overflow_warned: false,
        };

        warehouse.write_dummy_texture_descriptor()?;
        crate::engine_info!(warehouse, "rendercore::Warehouse", "resource warehouse initialized");
        Ok(warehouse)
    }

    fn create_dummy_texture(ctx: &GpuContext) -> Result<GpuImage> {
        let format = TextureFormat::Rgba8Unorm.to_vk();
        let image = ctx.create_image(1, 1, format, vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST)?;
        Ok(image)
    }

    fn create_default_sampler(ctx: &GpuContext) -> Result<vk::Sampler> {
        let info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .max_lod(vk::LOD_CLAMP_NONE);
        unsafe { ctx.device.create_sampler(&info, None) }.map_err(|e| Error::InitializationFailed(format!("sampler: {e}")))
    }

    /// Bindless layout: set 1 of the main-pass stack (spec §6). The other
    /// sets (bone matrices, world matrices, vertex skinning) are owned by
    /// the frame orchestrator and the slab allocator's buffer respectively.
    fn create_descriptor_set_layout(ctx: &GpuContext) -> Result<vk::DescriptorSetLayout> {
        let binding_flags = [vk::DescriptorBindingFlags::UPDATE_AFTER_BIND | vk::DescriptorBindingFlags::PARTIALLY_BOUND; 4];
        let mut flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);

        let bindings = [
            vk::DescriptorSetLayoutBinding::default()
                .binding(BINDING_TEXTURES)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(MAX_TEXTURES)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT),
            vk::DescriptorSetLayoutBinding::default()
                .binding(BINDING_MATERIALS)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT),
            vk::DescriptorSetLayoutBinding::default()
                .binding(BINDING_MESHES)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::COMPUTE),
            vk::DescriptorSetLayoutBinding::default()
                .binding(BINDING_CAMERAS)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT | vk::ShaderStageFlags::COMPUTE),
        ];

        let info = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL)
            .bindings(&bindings)
            .push_next(&mut flags_info);
        unsafe { ctx.device.create_descriptor_set_layout(&info, None) }
            .map_err(|e| Error::InitializationFailed(format!("warehouse descriptor set layout: {e}")))
    }

    fn allocate_descriptor_set(ctx: &GpuContext, layout: vk::DescriptorSetLayout) -> Result<vk::DescriptorSet> {
        let layouts = [layout];
        let info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(ctx.descriptor_pool).set_layouts(&layouts);
        let sets = unsafe { ctx.device.allocate_descriptor_sets(&info) }
            .map_err(|e| Error::InitializationFailed(format!("warehouse descriptor set: {e}")))?;
        Ok(sets[0])
    }

    fn write_dummy_texture_descriptor(&mut self) -> Result<()> {
        write_texture_descriptor(&self.ctx, self.descriptor_set, self.sampler, 0, self.dummy_texture.view)
    }

    // ---- Mesh ----

    pub fn upload_mesh(&mut self, geometry: Geometry) -> Result<mesh::MeshHandle> {
        let vertex_count = geometry.vertices.len() as u32 / geometry.vertex_stride.max(1);
        let vertex_offset = self
            .vertex_arena
            .alloc(vertex_count)
            .ok_or_else(|| Error::CapacityExceeded("global vertex buffer exhausted".into()))?;
        self.vertex_buffer.update(&self.ctx, vertex_offset as u64 * geometry.vertex_stride as u64, &geometry.vertices)?;

        let index_count = geometry.indices.len() as u32;
        let index_offset = self
            .index_arena
            .alloc(index_count)
            .ok_or_else(|| Error::CapacityExceeded("global index buffer exhausted".into()))?;
        let index_bytes = bytemuck::cast_slice(&geometry.indices);
        self.index_buffer.update(&self.ctx, index_offset as u64 * 4, index_bytes)?;

        let skinning = match geometry.skinning {
            Some(skin) => {
                let skin_vertex_count = skin.skin_vertices.len() as u32 / skin.skin_vertex_stride.max(1);
                let skin_vertex_offset = self
                    .skin_vertex_arena
                    .alloc(skin_vertex_count)
                    .ok_or_else(|| Error::CapacityExceeded("global skin-vertex buffer exhausted".into()))?;
                self.skin_vertex_buffer.update(&self.ctx, skin_vertex_offset as u64 * skin.skin_vertex_stride as u64, &skin.skin_vertices)?;
                Some(Skinning {
                    skin_vertex_range: BufferRange { offset: skin_vertex_offset, count: skin_vertex_count },
                    bones: skin.bones,
                    root_bone_index: skin.root_bone_index,
                })
            }
            None => None,
        };

        let aabb = crate::math::Aabb::unit();
        let (handle, slot) = self
            .meshes
            .alloc()
            .ok_or_else(|| Error::CapacityExceeded("mesh pool exhausted".into()))?;
        *slot = Mesh {
            aabb,
            index_range: BufferRange { offset: index_offset, count: index_count },
            vertex_range: BufferRange { offset: vertex_offset, count: vertex_count },
            skinning,
        };
        let gpu = MeshGpu::from_mesh(slot);
        let offset = handle.index as u64 * std::mem::size_of::<MeshGpu>() as u64;
        self.mesh_buffer.update(&self.ctx, offset, bytemuck::bytes_of(&gpu))?;
        crate::engine_debug!(self, "rendercore::Warehouse", "uploaded mesh {handle:?} ({vertex_count} verts, {index_count} indices)");
        Ok(handle)
    }

    /// Overwrite a mesh's stored AABB, used once the asset loader's true
    /// bounds are known (uploaded geometry alone does not carry one).
    pub fn set_mesh_aabb(&mut self, handle: mesh::MeshHandle, aabb: crate::math::Aabb) -> Result<()> {
        let slot = self.meshes.get_mut(handle).ok_or(Error::InvalidHandle)?;
        slot.aabb = aabb;
        let gpu = MeshGpu::from_mesh(slot);
        let offset = handle.index as u64 * std::mem::size_of::<MeshGpu>() as u64;
        self.mesh_buffer.update(&self.ctx, offset, bytemuck::bytes_of(&gpu))
    }

    pub fn mesh(&self, handle: mesh::MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle)
    }

    // ---- Material ----

    pub fn upload_material(&mut self, material: Material) -> Result<material::MaterialHandle> {
        let (handle, slot) = self
            .materials
            .alloc()
            .ok_or_else(|| Error::CapacityExceeded("material pool exhausted".into()))?;
        *slot = material;
        let gpu = MaterialGpu::from_material(slot);
        let offset = handle.index as u64 * std::mem::size_of::<MaterialGpu>() as u64;
        self.material_buffer.update(&self.ctx, offset, bytemuck::bytes_of(&gpu))?;
        crate::engine_debug!(self, "rendercore::Warehouse", "uploaded material {handle:?}");
        Ok(handle)
    }

    pub fn material(&self, handle: material::MaterialHandle) -> Option<&Material> {
        self.materials.get(handle)
    }

    // ---- Texture ----

    /// Upload a 2D texture and write its bindless descriptor slot (spec
    /// §4.3 "`create_texture_2d(handle, view)`").
    pub fn upload_texture_2d(&mut self, width: u32, height: u32, format: TextureFormat, pixels: &[u8]) -> Result<texture::TextureHandle> {
        let image = self.ctx.create_image(
            width,
            height,
            format.to_vk(),
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
        )?;
        self.upload_pixels(&image, 0, pixels)?;

        let (handle, slot) = match self.textures_2d.alloc() {
            Some(pair) => pair,
            None => {
                if !self.textures_overflow_warned {
                    crate::engine_warn!(self, "rendercore::Warehouse", "2D texture pool exhausted; dropping upload");
                    self.textures_overflow_warned = true;
                }
                return Err(Error::CapacityExceeded("2D texture pool exhausted".into()));
            }
        };
        *slot = TextureEntry::Image2D { width, height, format, image };
        let view = slot.view();
        write_texture_descriptor(&self.ctx, self.descriptor_set, self.sampler, handle.index, view)?;
        crate::engine_debug!(self, "rendercore::Warehouse", "uploaded 2D texture {handle:?} ({width}x{height})");
        Ok(handle)
    }

    pub fn upload_texture_cube(&mut self, size: u32, format: TextureFormat, faces: &[&[u8]; 6]) -> Result<texture::TextureHandle> {
        let image = self.ctx.create_cube_image(
            size,
            format.to_vk(),
            vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::TRANSFER_DST,
        )?;
        for (layer, face) in faces.iter().enumerate() {
            self.upload_pixels(&image, layer as u32, face)?;
        }

        let (handle, slot) = self
            .textures_cube
            .alloc()
            .ok_or_else(|| Error::CapacityExceeded("cube texture pool exhausted".into()))?;
        *slot = TextureEntry::ImageCube { width: size, height: size, format, image };
        crate::engine_debug!(self, "rendercore::Warehouse", "uploaded cube texture {handle:?} ({size}x{size})");
        Ok(handle)
    }

    /// Copy `pixels` into array layer `layer` of `image` and transition that
    /// layer `UNDEFINED -> TRANSFER_DST_OPTIMAL -> SHADER_READ_ONLY_OPTIMAL`,
    /// via a one-shot command buffer from [`GpuContext::upload_command_pool`].
    /// Submitted and waited on synchronously — texture uploads are a setup-time
    /// operation, not part of the per-frame recording path (spec §4.11 has no
    /// upload step).
    fn upload_pixels(&self, image: &GpuImage, layer: u32, pixels: &[u8]) -> Result<()> {
        let ctx = &self.ctx;
        let staging = create_buffer(ctx, pixels.len() as u64, vk::BufferUsageFlags::TRANSFER_SRC, MemoryLocation::CpuToGpu)?;
        staging.update(ctx, 0, pixels)?;

        let pool = ctx.upload_command_pool.lock().map_err(|_| Error::BackendError("upload command pool lock poisoned".into()))?;
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(*pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let command_buffer = unsafe { ctx.device.allocate_command_buffers(&alloc_info) }
            .map_err(|e| Error::BackendError(format!("upload command buffer: {e}")))?[0];

        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        let subresource = vk::ImageSubresourceRange::default()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .base_mip_level(0)
            .level_count(1)
            .base_array_layer(layer)
            .layer_count(1);

        unsafe {
            ctx.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| Error::BackendError(format!("begin upload command buffer: {e}")))?;

            let to_transfer = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image.image)
                .subresource_range(subresource)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE);
            ctx.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );

            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: layer,
                    layer_count: 1,
                })
                .image_offset(vk::Offset3D::default())
                .image_extent(vk::Extent3D { width: image.width, height: image.height, depth: 1 });
            ctx.device.cmd_copy_buffer_to_image(command_buffer, staging.buffer, image.image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[region]);

            let to_shader = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image.image)
                .subresource_range(subresource)
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ);
            ctx.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader],
            );

            ctx.device
                .end_command_buffer(command_buffer)
                .map_err(|e| Error::BackendError(format!("end upload command buffer: {e}")))?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            ctx.device
                .queue_submit(ctx.graphics_queue, &[submit_info], vk::Fence::null())
                .map_err(|e| Error::BackendError(format!("submit upload commands: {e}")))?;
            ctx.device
                .queue_wait_idle(ctx.graphics_queue)
                .map_err(|e| Error::BackendError(format!("wait for upload completion: {e}")))?;
            ctx.device.free_command_buffers(*pool, &command_buffers);
        }
        drop(pool);

        staging.destroy(ctx);
        Ok(())
    }

    /// Free a 2D texture. The bindless slot is overwritten with the dummy
    /// view so stale draws render the dummy texel rather than reading
    /// destroyed memory (spec §4.3, §7 "missing texture handle renders as a
    /// dummy/magenta texel").
    pub fn free_texture_2d(&mut self, handle: texture::TextureHandle) -> Result<()> {
        if let Some((entry, _)) = self.textures_2d.free(handle) {
            let entry = std::mem::replace(entry, TextureEntry::default());
            if let TextureEntry::Image2D { image, .. } = entry {
                image.destroy(&self.ctx);
            }
            write_texture_descriptor(&self.ctx, self.descriptor_set, self.sampler, handle.index, self.dummy_texture.view)?;
        }
        Ok(())
    }

    pub fn texture_2d(&self, handle: texture::TextureHandle) -> Option<&TextureEntry> {
        self.textures_2d.get(handle)
    }

    // ---- Camera ----

    pub fn create_camera(&mut self, camera: Camera) -> Result<camera::CameraHandle> {
        let (handle, slot) = self
            .cameras
            .alloc()
            .ok_or_else(|| Error::CapacityExceeded("camera pool exhausted".into()))?;
        *slot = camera;
        let gpu = camera::CameraGpu::from(&*slot);
        let offset = handle.index as u64 * std::mem::size_of::<camera::CameraGpu>() as u64;
        self.camera_buffer.update(&self.ctx, offset, bytemuck::bytes_of(&gpu))?;
        Ok(handle)
    }

    pub fn update_camera(&mut self, handle: camera::CameraHandle, camera: Camera) -> Result<()> {
        let slot = self.cameras.get_mut(handle).ok_or(Error::InvalidHandle)?;
        *slot = camera;
        let gpu = camera::CameraGpu::from(&*slot);
        let offset = handle.index as u64 * std::mem::size_of::<camera::CameraGpu>() as u64;
        self.camera_buffer.update(&self.ctx, offset, bytemuck::bytes_of(&gpu))
    }

    pub fn camera(&self, handle: camera::CameraHandle) -> Option<&Camera> {
        self.cameras.get(handle)
    }

    /// Upload this frame's world-matrix SSBO slice for frame index `frame`.
    pub fn upload_world_matrices(&self, frame: usize, matrices: &[glam::Mat4]) -> Result<()> {
        self.world_matrix_buffers[frame].update(&self.ctx, 0, bytemuck::cast_slice(matrices))
    }

    // ---- Bone matrices ----

    /// Reserve a contiguous bone-matrix range for a newly skinned node
    /// (spec §4.2). Returns the slab offset to store as the node's
    /// `bone_matrix_offset`.
    pub fn alloc_bone_range(&mut self, bone_count: u32) -> Result<u32> {
        self.bone_allocator.alloc(bone_count).ok_or_else(|| Error::CapacityExceeded("bone-matrix slab exhausted".into()))
    }

    pub fn free_bone_range(&mut self, offset: u32) {
        self.bone_allocator.free(offset);
    }

    /// Write a skinned node's current bone matrices at `offset` (spec §3
    /// global invariant: "slices of distinct skins never overlap").
    pub fn update_bone_matrices(&self, offset: u32, matrices: &[glam::Mat4]) -> Result<()> {
        self.bone_matrix_buffer.update(&self.ctx, offset as u64 * 64, bytemuck::cast_slice(matrices))
    }

    pub fn log(&self, severity: crate::log::LogSeverity, source: &str, message: String) {
        self.logger.log(&crate::log::LogEntry { severity, timestamp: std::time::SystemTime::now(), source: source.to_string(), message, file: None, line: None });
    }

    pub fn log_detailed(&self, severity: crate::log::LogSeverity, source: &str, message: String, file: &'static str, line: u32) {
        self.logger.log(&crate::log::LogEntry { severity, timestamp: std::time::SystemTime::now(), source: source.to_string(), message, file: Some(file), line: Some(line) });
    }

    /// Release every GPU resource the warehouse owns.
    ///
    /// Like [`GpuImage::destroy`]/[`GpuBuffer::destroy`], this is an
    /// explicit caller-driven teardown rather than a `Drop` impl: those two
    /// types have no destructor of their own, so the warehouse must move
    /// them out one at a time, which only an owned-`self` method can do
    /// safely. [`crate::engine::Engine`] calls this during its own teardown
    /// sequence, after `DeviceWaitIdle` (spec §5).
    pub fn destroy(mut self) {
        let ctx = self.ctx.clone();
        for (_, entry) in self.textures_2d.iter_mut() {
            let entry = std::mem::replace(entry, TextureEntry::default());
            match entry {
                TextureEntry::Image2D { image, .. } | TextureEntry::ImageCube { image, .. } => image.destroy(&ctx),
            }
        }
        for (_, entry) in self.textures_cube.iter_mut() {
            let entry = std::mem::replace(entry, TextureEntry::default());
            match entry {
                TextureEntry::Image2D { image, .. } | TextureEntry::ImageCube { image, .. } => image.destroy(&ctx),
            }
        }
        self.dummy_texture.destroy(&ctx);
        self.vertex_buffer.destroy(&ctx);
        self.index_buffer.destroy(&ctx);
        self.dummy_skin_buffer.destroy(&ctx);
        self.skin_vertex_buffer.destroy(&ctx);
        self.bone_matrix_buffer.destroy(&ctx);
        self.material_buffer.destroy(&ctx);
        self.mesh_buffer.destroy(&ctx);
        for buffer in self.world_matrix_buffers {
            buffer.destroy(&ctx);
        }
        self.camera_buffer.destroy(&ctx);
        unsafe {
            ctx.device.destroy_sampler(self.sampler, None);
            ctx.device.destroy_descriptor_set_layout(self.descriptor_set_layout, None);
        }
    }
}
