use wgpu::{BindGroup, BindGroupLayout, ComputePipeline, Device};

use crate::config::WORKGROUP_SIZE;
use crate::gpu::buffers::{GpuField, ModelBuffers};

/// Read-only or read-write storage buffer visible to compute shaders
pub(crate) fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Compute pipeline with one explicit bind group layout
pub(crate) fn compute_pipeline(
    device: &Device,
    label: &str,
    source: &'static str,
    entries: &[wgpu::BindGroupLayoutEntry],
) -> (ComputePipeline, BindGroupLayout) {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries,
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    });

    (pipeline, bind_group_layout)
}

/// Workgroups covering a `width` x `height` grid
pub(crate) fn workgroups(width: u32, height: u32) -> (u32, u32) {
    (width.div_ceil(WORKGROUP_SIZE), height.div_ceil(WORKGROUP_SIZE))
}

/// Update and liveness passes of one simulation step.
///
/// Bind groups are built once per buffer slot: index `i` reads buffer `i`
/// and writes buffer `1 - i`.
pub struct StepPipeline {
    update: ComputePipeline,
    liveness: ComputePipeline,
    update_groups: [BindGroup; 2],
    liveness_groups: [BindGroup; 2],
}

impl StepPipeline {
    pub fn new(device: &Device, field: &GpuField, models: &ModelBuffers) -> Self {
        let (update, update_layout) = compute_pipeline(
            device,
            "update-pipeline",
            concat!(
                include_str!("../shaders/common.wgsl"),
                include_str!("../shaders/update.wgsl")
            ),
            &[
                storage_entry(0, true),
                storage_entry(1, false),
                uniform_entry(2, wgpu::ShaderStages::COMPUTE),
                storage_entry(3, true),
                storage_entry(4, true),
                storage_entry(5, true),
                storage_entry(6, true),
                storage_entry(7, true),
            ],
        );

        let (liveness, liveness_layout) = compute_pipeline(
            device,
            "liveness-pipeline",
            concat!(
                include_str!("../shaders/common.wgsl"),
                include_str!("../shaders/liveness.wgsl")
            ),
            &[
                storage_entry(0, true),
                storage_entry(1, false),
                uniform_entry(2, wgpu::ShaderStages::COMPUTE),
                storage_entry(3, true),
            ],
        );

        let buffers = field.field.buffers();
        let scratch = field.field.scratch_buffer();

        let update_group = |read: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("update-bind-group"),
                layout: &update_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffers[read].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: scratch.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: field.step_params.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: models.weights.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: models.biases.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: models.layers.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: models.models.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: models.filters.as_entire_binding(),
                    },
                ],
            })
        };

        let liveness_group = |read: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("liveness-bind-group"),
                layout: &liveness_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffers[read].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: buffers[1 - read].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: field.step_params.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: scratch.as_entire_binding(),
                    },
                ],
            })
        };

        Self {
            update,
            liveness,
            update_groups: [update_group(0), update_group(1)],
            liveness_groups: [liveness_group(0), liveness_group(1)],
        }
    }

    /// Record both passes for a field whose current buffer is `current`
    pub fn dispatch(&self, encoder: &mut wgpu::CommandEncoder, current: usize, width: u32, height: u32) {
        let (groups_x, groups_y) = workgroups(width, height);

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("update-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.update);
            pass.set_bind_group(0, &self.update_groups[current], &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("liveness-pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.liveness);
        pass.set_bind_group(0, &self.liveness_groups[current], &[]);
        pass.dispatch_workgroups(groups_x, groups_y, 1);
    }
}
