use wgpu::{BindGroup, ComputePipeline, Device};

use crate::gpu::buffers::{EditUniforms, GpuField, ModelBuffers};
use crate::gpu::compute::{compute_pipeline, storage_entry, uniform_entry, workgroups};
use crate::simulation::cell::CellLayout;
use crate::simulation::edit::{Circle, Edit};

/// In-place edit pass over the current buffer
pub struct EditPipeline {
    pipeline: ComputePipeline,
    groups: [BindGroup; 2],
}

impl EditPipeline {
    pub fn new(device: &Device, field: &GpuField, models: &ModelBuffers) -> Self {
        let (pipeline, layout) = compute_pipeline(
            device,
            "edit-pipeline",
            concat!(
                include_str!("../shaders/common.wgsl"),
                include_str!("../shaders/edit.wgsl")
            ),
            &[
                storage_entry(0, false),
                uniform_entry(1, wgpu::ShaderStages::COMPUTE),
                storage_entry(2, true),
            ],
        );

        let group = |slot: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("edit-bind-group"),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: field.field.buffers()[slot].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: field.edit_params.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: models.seed_state.as_entire_binding(),
                    },
                ],
            })
        };

        Self {
            pipeline,
            groups: [group(0), group(1)],
        }
    }

    /// Record the edit against buffer slot `current`
    pub fn dispatch(&self, encoder: &mut wgpu::CommandEncoder, current: usize, width: u32, height: u32) {
        let (groups_x, groups_y) = workgroups(width, height);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("edit-pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.groups[current], &[]);
        pass.dispatch_workgroups(groups_x, groups_y, 1);
    }
}

/// Uniform block for an edit command
pub fn edit_uniforms(layout: &CellLayout, width: u32, height: u32, edit: &Edit) -> EditUniforms {
    let mut params = EditUniforms {
        width,
        height,
        channels: layout.channels as u32,
        stride: layout.stride() as u32,
        visible: layout.visible as u32,
        alive_channel: layout.alive_channel as u32,
        ..Default::default()
    };

    let set_circle = |params: &mut EditUniforms, circle: &Circle| {
        params.center_x = circle.center_x;
        params.center_y = circle.center_y;
        params.radius = circle.radius;
        params.scale_x = circle.scale_x;
        params.scale_y = circle.scale_y;
    };

    match *edit {
        Edit::Paint {
            circle,
            seed_cell,
            model,
        } => {
            params.kind = 0;
            params.model_id = model;
            params.seed_x = seed_cell.0;
            params.seed_y = seed_cell.1;
            set_circle(&mut params, &circle);
        }
        Edit::Clear { circle } => {
            params.kind = 1;
            set_circle(&mut params, &circle);
        }
        Edit::Disturb {
            amount,
            threshold,
            seed,
        } => {
            params.kind = 2;
            params.amount = amount;
            params.threshold = threshold;
            params.noise_seed = seed;
        }
    }
    params
}
