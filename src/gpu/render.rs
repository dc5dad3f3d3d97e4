use wgpu::{
    BindGroup, Buffer, Device, RenderPipeline as WgpuRenderPipeline, Texture, TextureFormat,
    TextureView,
};

use crate::config::BACKGROUND;
use crate::gpu::buffers::{GpuField, RenderUniforms};
use crate::gpu::compute::uniform_entry;
use crate::simulation::cell::CellLayout;
use crate::simulation::render::{RenderMode, ViewSize};

/// Fullscreen projection of the current buffer
pub struct RenderPipeline {
    pipeline: WgpuRenderPipeline,
    groups: [BindGroup; 2],
}

impl RenderPipeline {
    pub fn new(device: &Device, format: TextureFormat, field: &GpuField) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("render-shader"),
            source: wgpu::ShaderSource::Wgsl(
                concat!(
                    include_str!("../shaders/common.wgsl"),
                    include_str!("../shaders/render.wgsl")
                )
                .into(),
            ),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("render-bind-group-layout"),
            entries: &[
                // Cells storage buffer (read-only)
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("render-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("render-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let group = |slot: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("render-bind-group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: field.field.buffers()[slot].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: field.render_params.as_entire_binding(),
                    },
                ],
            })
        };

        Self {
            pipeline,
            groups: [group(0), group(1)],
        }
    }

    /// Draw buffer slot `current` into `view`
    pub fn draw(&self, encoder: &mut wgpu::CommandEncoder, view: &TextureView, current: usize) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("render-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: BACKGROUND[0] as f64,
                        g: BACKGROUND[1] as f64,
                        b: BACKGROUND[2] as f64,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.groups[current], &[]);
        pass.draw(0..3, 0..1); // Draw fullscreen triangle
    }
}

/// Uniform block for drawing a `width` x `height` field into `view`
pub fn render_uniforms(
    layout: &CellLayout,
    width: u32,
    height: u32,
    view: ViewSize,
    mode: RenderMode,
) -> RenderUniforms {
    RenderUniforms {
        width,
        height,
        channels: layout.channels as u32,
        stride: layout.stride() as u32,
        visible: layout.visible as u32,
        alive_channel: layout.alive_channel as u32,
        mode: mode.as_u32(),
        channel: mode.channel(),
        view_width: view.width as f32,
        view_height: view.height as f32,
        _padding: [0.0; 2],
        background: [BACKGROUND[0], BACKGROUND[1], BACKGROUND[2], 1.0],
    }
}

/// Row pitch of a texture-to-buffer copy, padded to the copy alignment
pub fn padded_bytes_per_row(width: u32) -> u32 {
    (width * 4).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
}

/// RGBA8 texture rendered to when no window surface exists, plus its
/// readback buffer
pub struct OffscreenTarget {
    pub texture: Texture,
    pub view: TextureView,
    pub readback: Buffer,
    pub size: ViewSize,
}

impl OffscreenTarget {
    pub fn new(device: &Device, size: ViewSize) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("offscreen-target"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("offscreen-readback"),
            size: padded_bytes_per_row(size.width) as u64 * size.height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            texture,
            view,
            readback,
            size,
        }
    }

    /// Record a copy of the rendered image into the readback buffer
    pub fn copy_to_readback(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row(self.size.width)),
                    rows_per_image: Some(self.size.height),
                },
            },
            wgpu::Extent3d {
                width: self.size.width,
                height: self.size.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// Drop the row padding of a readback image
pub fn unpad_rows(padded: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pitch = padded_bytes_per_row(width) as usize;
    let row = width as usize * 4;
    padded
        .chunks(pitch)
        .take(height as usize)
        .flat_map(|chunk| &chunk[..row])
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::cell::Topology;

    #[test]
    fn test_row_padding() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
    }

    #[test]
    fn test_unpad_rows() {
        let mut padded = vec![0u8; 512];
        padded[..4].copy_from_slice(&[1, 2, 3, 4]);
        padded[256..260].copy_from_slice(&[5, 6, 7, 8]);
        let pixels = unpad_rows(&padded, 1, 2);
        assert_eq!(pixels, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_render_uniforms_channel_mode() {
        let layout = CellLayout::new(12, 3, 3, Topology::Hex, None);
        let params = render_uniforms(&layout, 32, 16, ViewSize::new(640, 320), RenderMode::Channel(7));
        assert_eq!((params.mode, params.channel), (3, 7));
        assert_eq!(params.stride, 13);
        assert_eq!(params.view_width, 640.0);
    }
}
