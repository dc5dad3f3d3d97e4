use std::sync::Arc;

use crate::config::EngineConfig;
use crate::engine::{Backend, DebugHook, Engine};
use crate::error::Result;
use crate::model::{ModelAsset, ModelBank};
use crate::simulation::edit::{apply_edit, Edit};
use crate::simulation::field::StateField;
use crate::simulation::render::{render_frame, Frame, RenderMode, ViewSize};
use crate::simulation::update::{liveness_pass, update_pass, StepParams};

pub struct CpuBackend {
    bank: Arc<ModelBank>,
    field: StateField<Vec<f32>>,
    frame: Option<Frame>,
}

impl CpuBackend {
    pub fn new(bank: &Arc<ModelBank>, config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            bank: Arc::clone(bank),
            field: StateField::new(config.width, config.height, bank.layout().channels),
            frame: None,
        })
    }

    pub fn field(&self) -> &StateField<Vec<f32>> {
        &self.field
    }

    /// Last image produced by `draw`
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }
}

impl Backend for CpuBackend {
    fn reset(&mut self, cell: &[f32]) -> Result<()> {
        self.field.reset(cell);
        Ok(())
    }

    fn step(&mut self, params: &StepParams) -> Result<()> {
        let (width, height) = (self.field.width(), self.field.height());
        let bank = &self.bank;
        let (read, scratch, write) = self.field.split_mut();
        update_pass(bank, width, height, read, scratch, params);
        liveness_pass(bank, width, height, read, scratch, write, params.alive_threshold);
        self.field.swap();
        Ok(())
    }

    fn edit(&mut self, edit: &Edit) -> Result<()> {
        let (width, height) = (self.field.width(), self.field.height());
        apply_edit(self.bank.layout(), width, height, self.field.current_mut(), edit);
        Ok(())
    }

    fn draw(&mut self, view: ViewSize, mode: RenderMode) -> Result<()> {
        self.frame = Some(render_frame(
            self.bank.layout(),
            self.field.width(),
            self.field.height(),
            self.field.current_buffer(),
            view,
            mode,
        ));
        Ok(())
    }

    fn snapshot(&mut self) -> Result<Vec<f32>> {
        Ok(self.field.current_buffer().clone())
    }
}

impl Engine<CpuBackend> {
    /// Engine on the CPU backend, without a debug hook
    pub fn headless(asset: &ModelAsset, config: EngineConfig) -> Result<Self> {
        Self::new(asset, config, CpuBackend::new, None, |_| {})
    }

    /// Engine on the CPU backend with a live-tuning hook
    pub fn headless_with_hook(
        asset: &ModelAsset,
        config: EngineConfig,
        hook: DebugHook,
    ) -> Result<Self> {
        Self::new(asset, config, CpuBackend::new, Some(hook), |_| {})
    }
}
