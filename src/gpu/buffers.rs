use wgpu::util::DeviceExt;
use wgpu::{Buffer, BufferUsages, Device, Queue};

use crate::error::{EngineError, Result};
use crate::model::ModelBank;
use crate::simulation::cell::CellLayout;
use crate::simulation::field::StateField;

/// Field parameters shared by the update and liveness shaders (48 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StepUniforms {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub stride: u32,

    pub alive_channel: u32,
    pub topology: u32,
    pub filter_count: u32,
    pub model_count: u32,

    pub step_seed: u32,
    pub fire_rate: f32,
    pub alive_threshold: f32,
    pub _padding: u32,
}

/// Edit command parameters (80 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EditUniforms {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub stride: u32,

    pub visible: u32,
    pub alive_channel: u32,
    /// 0 = paint, 1 = clear, 2 = disturb
    pub kind: u32,
    pub model_id: u32,

    pub seed_x: u32,
    pub seed_y: u32,
    pub noise_seed: u32,
    pub _padding0: u32,

    pub center_x: f32,
    pub center_y: f32,
    pub radius: f32,
    pub scale_x: f32,

    pub scale_y: f32,
    pub amount: f32,
    pub threshold: f32,
    pub _padding1: f32,
}

/// Render parameters (64 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct RenderUniforms {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub stride: u32,

    pub visible: u32,
    pub alive_channel: u32,
    pub mode: u32,
    pub channel: u32,

    pub view_width: f32,
    pub view_height: f32,
    pub _padding: [f32; 2],

    pub background: [f32; 4],
}

/// Packed model parameters resident on the device
pub struct ModelBuffers {
    pub weights: Buffer,
    pub biases: Buffer,
    pub layers: Buffer,
    pub models: Buffer,
    pub filters: Buffer,
    pub seed_state: Buffer,
}

impl ModelBuffers {
    /// Upload every model of the bank
    pub fn new(device: &Device, bank: &ModelBank) -> Self {
        let packed = bank.pack();
        let storage = |label: &str, contents: &[u8]| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: BufferUsages::STORAGE,
            })
        };

        Self {
            weights: storage("model-weights", bytemuck::cast_slice(&packed.weights)),
            biases: storage("model-biases", bytemuck::cast_slice(&packed.biases)),
            layers: storage("model-layers", bytemuck::cast_slice(&packed.layers)),
            models: storage("model-table", bytemuck::cast_slice(&packed.models)),
            filters: storage("perception-filters", bytemuck::cast_slice(&packed.filters)),
            seed_state: storage("seed-state", bytemuck::cast_slice(bank.layout().seed())),
        }
    }
}

/// Device-resident state field plus the uniform buffers of every pass
pub struct GpuField {
    pub field: StateField<Buffer>,
    pub step_params: Buffer,
    pub edit_params: Buffer,
    pub render_params: Buffer,
    /// MAP_READ copy target for snapshots
    pub staging: Buffer,
    pub byte_size: u64,
}

impl GpuField {
    /// Allocate the two state buffers, the scratch buffer and uniforms
    pub fn new(device: &Device, width: u32, height: u32, layout: &CellLayout) -> Result<Self> {
        let stride = layout.stride();
        let byte_size = width as u64 * height as u64 * stride as u64 * 4;
        let max = device.limits().max_storage_buffer_binding_size as u64;
        if byte_size > max {
            return Err(EngineError::grid(format!(
                "{}x{} field needs {} bytes, device binds at most {}",
                width, height, byte_size, max
            )));
        }

        let state = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: byte_size,
                usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        let uniform = |label: &str, size: usize| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: size as u64,
                usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        let field = StateField::from_parts(
            width,
            height,
            stride,
            state("field-buffer-a"),
            state("field-buffer-b"),
            state("field-scratch"),
        );

        Ok(Self {
            field,
            step_params: uniform("step-params-buffer", std::mem::size_of::<StepUniforms>()),
            edit_params: uniform("edit-params-buffer", std::mem::size_of::<EditUniforms>()),
            render_params: uniform("render-params-buffer", std::mem::size_of::<RenderUniforms>()),
            staging: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("field-staging"),
                size: byte_size,
                usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            byte_size,
        })
    }

    /// Upload `cell` into every slot of both state buffers
    pub fn reset(&self, queue: &Queue, cell: &[f32]) {
        let data: Vec<f32> = cell
            .iter()
            .copied()
            .cycle()
            .take(self.field.len())
            .collect();
        for buffer in self.field.buffers() {
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(&data));
        }
        queue.write_buffer(self.field.scratch_buffer(), 0, bytemuck::cast_slice(&data));
    }

    pub fn write_step_params(&self, queue: &Queue, params: &StepUniforms) {
        queue.write_buffer(&self.step_params, 0, bytemuck::bytes_of(params));
    }

    pub fn write_edit_params(&self, queue: &Queue, params: &EditUniforms) {
        queue.write_buffer(&self.edit_params, 0, bytemuck::bytes_of(params));
    }

    pub fn write_render_params(&self, queue: &Queue, params: &RenderUniforms) {
        queue.write_buffer(&self.render_params, 0, bytemuck::bytes_of(params));
    }
}
