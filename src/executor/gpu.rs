//! wgpu compute backend.
//!
//! Headless: no surface, no window. Both kernels live in one generated
//! shader module sharing one bind group; the spawn dispatch is submitted
//! fire-and-forget (its uniform write snapshots inputs at issue time and
//! single-queue submission order sequences it before the frame's update),
//! while the update dispatch blocks until completion.

use bytemuck::{cast_slice, cast_slice_mut};
use wgpu::util::DeviceExt;

use crate::curve::{CurveTable, CURVE_CHANNELS, CURVE_RESOLUTION};
use crate::error::BackendError;
use crate::features::Features;
use crate::params::{GpuParams, Params};
use crate::shaders::{self, WORKGROUP_SIZE};
use crate::storage::ParticleStorage;

use super::{BackendKind, Executor};

/// The data-parallel backend: one thread per pool slot.
pub struct GpuExecutor {
    device: wgpu::Device,
    queue: wgpu::Queue,
    spawn_pipeline: wgpu::ComputePipeline,
    update_pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    params_buffer: wgpu::Buffer,
    pos_life: wgpu::Buffer,
    vel_fade: wgpu::Buffer,
    size: wgpu::Buffer,
    curves: wgpu::Buffer,
    rotation: Option<wgpu::Buffer>,
    color_start: Option<wgpu::Buffer>,
    color_end: Option<wgpu::Buffer>,
    /// Shared staging buffer for column readback, sized to the largest column.
    staging: wgpu::Buffer,
    capacity: u32,
}

impl GpuExecutor {
    /// Acquire an adapter and build buffers and pipelines for one feature
    /// set. Fails with [`BackendError`] when the machine has no compatible
    /// adapter; the engine never partially initializes.
    pub fn new(features: &Features, capacity: u32) -> Result<Self, BackendError> {
        let capacity = capacity.max(1);
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(BackendError::NoAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("cinder device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))?;

        let lane_bytes = capacity as u64 * 16;
        let storage_usage =
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;
        let column = |label: &str, size: u64| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: storage_usage,
                mapped_at_creation: false,
            })
        };

        let pos_life = column("pos_life", lane_bytes);
        let vel_fade = column("vel_fade", lane_bytes);
        let size = column("size", capacity as u64 * 4);
        let rotation = features.needs_rotation.then(|| column("rotation", lane_bytes));
        let color_start = features.needs_per_particle_color.then(|| column("color_start", lane_bytes));
        let color_end = features.needs_per_particle_color.then(|| column("color_end", lane_bytes));

        let curves = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("curve table"),
            contents: cast_slice(CurveTable::default_table().samples()),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("params"),
            size: std::mem::size_of::<GpuParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback staging"),
            size: lane_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Bind group layout mirrors shaders::bindings_wgsl numbering.
        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let mut layout_entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            storage_entry(1, false),
            storage_entry(2, false),
            storage_entry(3, false),
            storage_entry(4, true),
        ];
        let mut group_entries = vec![
            wgpu::BindGroupEntry { binding: 0, resource: params_buffer.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: pos_life.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 2, resource: vel_fade.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 3, resource: size.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 4, resource: curves.as_entire_binding() },
        ];
        if let (Some(binding), Some(buffer)) = (shaders::rotation_binding(features), &rotation) {
            layout_entries.push(storage_entry(binding, false));
            group_entries.push(wgpu::BindGroupEntry { binding, resource: buffer.as_entire_binding() });
        }
        if let (Some((start_binding, end_binding)), Some(start), Some(end)) =
            (shaders::color_bindings(features), &color_start, &color_end)
        {
            layout_entries.push(storage_entry(start_binding, false));
            layout_entries.push(storage_entry(end_binding, false));
            group_entries.push(wgpu::BindGroupEntry {
                binding: start_binding,
                resource: start.as_entire_binding(),
            });
            group_entries.push(wgpu::BindGroupEntry {
                binding: end_binding,
                resource: end.as_entire_binding(),
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("particle bind group layout"),
            entries: &layout_entries,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("particle bind group"),
            layout: &bind_group_layout,
            entries: &group_entries,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("particle kernels"),
            source: wgpu::ShaderSource::Wgsl(shaders::generate_kernels(features).into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("particle pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = |label: &str, entry: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let spawn_pipeline = pipeline("spawn pipeline", "spawn");
        let update_pipeline = pipeline("update pipeline", "update");

        Ok(Self {
            device,
            queue,
            spawn_pipeline,
            update_pipeline,
            bind_group,
            params_buffer,
            pos_life,
            vel_fade,
            size,
            curves,
            rotation,
            color_start,
            color_end,
            staging,
            capacity,
        })
    }

    /// The wgpu device, for renderers sharing the particle buffers.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The wgpu queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn dispatch(&self, pipeline: &wgpu::ComputePipeline, params: &Params) {
        // The uniform write is sequenced with the submission, so the
        // dispatch sees a snapshot of the store at issue time.
        self.queue.write_buffer(
            &self.params_buffer,
            0,
            bytemuck::bytes_of(&params.to_gpu(self.capacity)),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("particle pass") });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("particle compute"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(self.capacity.div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        self.queue.submit(Some(encoder.finish()));
    }

    /// Copy one GPU column into a CPU slice through the staging buffer.
    fn read_column(&self, buffer: &wgpu::Buffer, bytes: u64, out: &mut [u8]) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("readback") });
        encoder.copy_buffer_to_buffer(buffer, 0, &self.staging, 0, bytes);
        self.queue.submit(Some(encoder.finish()));

        let slice = self.staging.slice(..bytes);
        slice.map_async(wgpu::MapMode::Read, |_| {});
        self.device.poll(wgpu::Maintain::Wait);
        {
            let data = slice.get_mapped_range();
            out.copy_from_slice(&data);
        }
        self.staging.unmap();
    }
}

impl Executor for GpuExecutor {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn reset(&mut self, storage: &mut ParticleStorage) {
        storage.reset();
        self.queue.write_buffer(&self.pos_life, 0, cast_slice(&storage.pos_life));
        self.queue.write_buffer(&self.vel_fade, 0, cast_slice(&storage.vel_fade));
        self.queue.write_buffer(&self.size, 0, cast_slice(&storage.size));
        if let (Some(buffer), Some(data)) = (&self.rotation, &storage.rotation) {
            self.queue.write_buffer(buffer, 0, cast_slice(data));
        }
        if let (Some(buffer), Some(data)) = (&self.color_start, &storage.color_start) {
            self.queue.write_buffer(buffer, 0, cast_slice(data));
        }
        if let (Some(buffer), Some(data)) = (&self.color_end, &storage.color_end) {
            self.queue.write_buffer(buffer, 0, cast_slice(data));
        }
        // GPU buffers are authoritative from here on.
        storage.clear_dirty();
    }

    fn upload_curves(&mut self, table: &CurveTable) {
        debug_assert_eq!(table.samples().len(), CURVE_RESOLUTION * CURVE_CHANNELS);
        self.queue.write_buffer(&self.curves, 0, cast_slice(table.samples()));
    }

    fn spawn(&mut self, params: &Params, _storage: &mut ParticleStorage) {
        // Fire and forget: side effects are only needed before the next
        // update, which the single queue sequences after this submission.
        self.dispatch(&self.spawn_pipeline, params);
    }

    fn update(&mut self, params: &Params, _storage: &mut ParticleStorage) {
        self.dispatch(&self.update_pipeline, params);
        self.device.poll(wgpu::Maintain::Wait);
    }

    fn synchronize(&mut self, storage: &mut ParticleStorage) {
        let n = self.capacity as usize;
        let lane_bytes = n as u64 * 16;
        let mut lanes: Vec<[f32; 4]> = vec![[0.0; 4]; n];

        self.read_column(&self.pos_life, lane_bytes, cast_slice_mut(&mut lanes));
        storage.pos_life.copy_from_slice(&lanes);
        self.read_column(&self.vel_fade, lane_bytes, cast_slice_mut(&mut lanes));
        storage.vel_fade.copy_from_slice(&lanes);

        let mut sizes = vec![0.0f32; n];
        self.read_column(&self.size, n as u64 * 4, cast_slice_mut(&mut sizes));
        storage.size.copy_from_slice(&sizes);

        if let (Some(buffer), Some(data)) = (&self.rotation, &mut storage.rotation) {
            self.read_column(buffer, lane_bytes, cast_slice_mut(&mut lanes));
            data.copy_from_slice(&lanes);
        }
        if let (Some(buffer), Some(data)) = (&self.color_start, &mut storage.color_start) {
            self.read_column(buffer, lane_bytes, cast_slice_mut(&mut lanes));
            data.copy_from_slice(&lanes);
        }
        if let (Some(buffer), Some(data)) = (&self.color_end, &mut storage.color_end) {
            self.read_column(buffer, lane_bytes, cast_slice_mut(&mut lanes));
            data.copy_from_slice(&lanes);
        }
    }

    fn drain(&mut self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}
