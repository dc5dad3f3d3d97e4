use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::{Backend, DebugHook, Engine};
use crate::error::{EngineError, Result};
use crate::gpu::buffers::{GpuField, ModelBuffers, StepUniforms};
use crate::gpu::compute::StepPipeline;
use crate::gpu::context::GpuContext;
use crate::gpu::edit::{edit_uniforms, EditPipeline};
use crate::gpu::render::{render_uniforms, unpad_rows, OffscreenTarget, RenderPipeline};
use crate::model::{ModelAsset, ModelBank};
use crate::simulation::edit::Edit;
use crate::simulation::render::{Frame, RenderMode, ViewSize};
use crate::simulation::update::StepParams;

pub struct GpuBackend {
    context: GpuContext,
    bank: Arc<ModelBank>,
    field: GpuField,
    /// Bound by the step and edit pipelines
    #[allow(dead_code)]
    models: ModelBuffers,
    step_pipeline: StepPipeline,
    edit_pipeline: EditPipeline,
    render_pipeline: RenderPipeline,
    offscreen: Option<OffscreenTarget>,
    frame: Option<Frame>,
}

impl GpuBackend {
    /// Upload the bank and allocate the field on `context`'s device
    pub fn new(context: GpuContext, bank: &Arc<ModelBank>, config: &EngineConfig) -> Result<Self> {
        let layout = bank.layout();
        let field = GpuField::new(&context.device, config.width, config.height, layout)?;
        let models = ModelBuffers::new(&context.device, bank);

        let step_pipeline = StepPipeline::new(&context.device, &field, &models);
        let edit_pipeline = EditPipeline::new(&context.device, &field, &models);
        let render_pipeline = RenderPipeline::new(&context.device, context.format(), &field);
        context.check()?;

        log::info!(
            "GPU field allocated: {} bytes per buffer, {} channels",
            field.byte_size,
            layout.channels
        );

        Ok(Self {
            context,
            bank: Arc::clone(bank),
            field,
            models,
            step_pipeline,
            edit_pipeline,
            render_pipeline,
            offscreen: None,
            frame: None,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Last image read back from an offscreen draw
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn submit(&self, encoder: wgpu::CommandEncoder) -> Result<()> {
        self.context.queue.submit(std::iter::once(encoder.finish()));
        self.context.check()
    }

    fn draw_to_surface(&mut self, view: ViewSize) -> Result<()> {
        self.context.resize(view.width, view.height);
        let Some(target) = self.context.target.as_ref() else {
            return Ok(());
        };

        let output = match target.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface outdated, reconfiguring");
                target.surface.configure(&self.context.device, &target.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timeout, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(EngineError::device_lost(format!("surface: {}", e))),
        };

        let texture_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.encoder("render-encoder");
        self.render_pipeline
            .draw(&mut encoder, &texture_view, self.field.field.current_index());
        self.submit(encoder)?;
        output.present();
        Ok(())
    }

    fn draw_offscreen(&mut self, view: ViewSize) -> Result<()> {
        if self.offscreen.as_ref().map(|t| t.size) != Some(view) {
            self.offscreen = Some(OffscreenTarget::new(&self.context.device, view));
        }
        let Some(target) = self.offscreen.as_ref() else {
            return Ok(());
        };

        let mut encoder = self.encoder("offscreen-encoder");
        self.render_pipeline
            .draw(&mut encoder, &target.view, self.field.field.current_index());
        target.copy_to_readback(&mut encoder);
        self.submit(encoder)?;

        let padded = self.context.read_buffer(&target.readback)?;
        self.frame = Some(Frame {
            width: view.width,
            height: view.height,
            pixels: unpad_rows(&padded, view.width, view.height),
        });
        Ok(())
    }
}

impl Backend for GpuBackend {
    fn reset(&mut self, cell: &[f32]) -> Result<()> {
        self.field.reset(&self.context.queue, cell);
        self.context.check()
    }

    fn step(&mut self, params: &StepParams) -> Result<()> {
        let layout = self.bank.layout();
        let (width, height) = (self.field.field.width(), self.field.field.height());
        self.field.write_step_params(
            &self.context.queue,
            &StepUniforms {
                width,
                height,
                channels: layout.channels as u32,
                stride: layout.stride() as u32,
                alive_channel: layout.alive_channel as u32,
                topology: layout.topology.as_u32(),
                filter_count: self.bank.filters().len() as u32,
                model_count: self.bank.count() as u32,
                step_seed: params.step_seed,
                fire_rate: params.fire_rate,
                alive_threshold: params.alive_threshold,
                _padding: 0,
            },
        );

        let mut encoder = self.encoder("step-encoder");
        self.step_pipeline
            .dispatch(&mut encoder, self.field.field.current_index(), width, height);
        self.submit(encoder)?;
        self.field.field.swap();
        Ok(())
    }

    fn edit(&mut self, edit: &Edit) -> Result<()> {
        let (width, height) = (self.field.field.width(), self.field.field.height());
        let params = edit_uniforms(self.bank.layout(), width, height, edit);
        self.field.write_edit_params(&self.context.queue, &params);

        let mut encoder = self.encoder("edit-encoder");
        self.edit_pipeline
            .dispatch(&mut encoder, self.field.field.current_index(), width, height);
        self.submit(encoder)
    }

    fn draw(&mut self, view: ViewSize, mode: RenderMode) -> Result<()> {
        let params = render_uniforms(
            self.bank.layout(),
            self.field.field.width(),
            self.field.field.height(),
            view,
            mode,
        );
        self.field.write_render_params(&self.context.queue, &params);

        if self.context.target.is_some() {
            self.draw_to_surface(view)
        } else {
            self.draw_offscreen(view)
        }
    }

    fn snapshot(&mut self) -> Result<Vec<f32>> {
        let mut encoder = self.encoder("snapshot-encoder");
        encoder.copy_buffer_to_buffer(
            self.field.field.current_buffer(),
            0,
            &self.field.staging,
            0,
            self.field.byte_size,
        );
        self.submit(encoder)?;

        let bytes = self.context.read_buffer(&self.field.staging)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
}

impl Engine<GpuBackend> {
    /// Engine on an existing GPU context (window surface or headless)
    pub fn with_context<R>(
        asset: &ModelAsset,
        config: EngineConfig,
        context: GpuContext,
        debug_hook: Option<DebugHook>,
        ready: R,
    ) -> Result<Self>
    where
        R: FnOnce(&Engine<GpuBackend>),
    {
        Self::new(
            asset,
            config,
            |bank, config| GpuBackend::new(context, bank, config),
            debug_hook,
            ready,
        )
    }

    /// Engine on a headless GPU device; `draw` fills `backend().frame()`
    pub fn offscreen(asset: &ModelAsset, config: EngineConfig) -> Result<Self> {
        let context = pollster::block_on(GpuContext::headless())?;
        Self::with_context(asset, config, context, None, |_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::WHOLE_FIELD;
    use crate::simulation::cell::Topology;
    use crate::simulation::CpuBackend;

    // Needs a GPU adapter: cargo test -- --ignored
    #[test]
    #[ignore]
    fn test_gpu_matches_cpu_on_identity_model() {
        let asset = ModelAsset::identity(&["still"], 4, 3, 3, Topology::Square);
        let config = EngineConfig::with_size(16, 16);

        let mut gpu = Engine::<GpuBackend>::offscreen(&asset, config).unwrap();
        let mut cpu = Engine::<CpuBackend>::headless(&asset, config).unwrap();

        gpu.paint(5.0, 5.0, WHOLE_FIELD, 0).unwrap();
        cpu.paint(5.0, 5.0, WHOLE_FIELD, 0).unwrap();
        for _ in 0..3 {
            gpu.step().unwrap();
            cpu.step().unwrap();
        }
        assert_eq!(gpu.snapshot().unwrap(), cpu.snapshot().unwrap());

        let view = ViewSize::new(32, 32);
        gpu.draw(view, RenderMode::Alive).unwrap();
        cpu.draw(view, RenderMode::Alive).unwrap();
        let gpu_frame = gpu.backend().unwrap().frame().cloned().unwrap();
        let cpu_frame = cpu.backend().unwrap().frame().cloned().unwrap();
        assert_eq!(gpu_frame.pixels.len(), cpu_frame.pixels.len());
        // unorm conversion may round the background one step differently
        for (i, (g, c)) in gpu_frame.pixels.iter().zip(&cpu_frame.pixels).enumerate() {
            assert!(g.abs_diff(*c) <= 1, "byte {}: gpu {} cpu {}", i, g, c);
        }
    }
}
