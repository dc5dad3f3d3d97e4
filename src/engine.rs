use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{EngineConfig, TunableParams};
use crate::error::{EngineError, Result};
use crate::model::{ModelAsset, ModelBank};
use crate::simulation::edit::{Circle, Edit};
use crate::simulation::field::validate_grid;
use crate::simulation::render::{RenderMode, ViewSize};
use crate::simulation::update::StepParams;

/// Radius sentinel for `paint`: repaint the entire field
pub const WHOLE_FIELD: f32 = -1.0;

/// Live-tuning pass-through, called before every step
pub type DebugHook = Box<dyn FnMut(&mut TunableParams)>;

/// Storage and passes behind the engine.
///
/// Calls arrive already validated. Effects must be observable in call order
/// by the next call, even when the backend schedules work asynchronously.
pub trait Backend {
    /// Set every cell of the field to `cell`
    fn reset(&mut self, cell: &[f32]) -> Result<()>;

    /// Run one update pass, one liveness pass, then swap
    fn step(&mut self, params: &StepParams) -> Result<()>;

    /// Apply an edit to the current buffer
    fn edit(&mut self, edit: &Edit) -> Result<()>;

    /// Project the current buffer to the output
    fn draw(&mut self, view: ViewSize, mode: RenderMode) -> Result<()>;

    /// Copy of the current buffer (`stride` floats per cell, row-major)
    fn snapshot(&mut self) -> Result<Vec<f32>>;
}

/// Neural cellular automaton engine.
///
/// Arguments are checked before the backend sees them, so a rejected call
/// never touches the field.
pub struct Engine<B: Backend> {
    backend: Option<B>,
    bank: Arc<ModelBank>,
    config: EngineConfig,
    rng: StdRng,
    debug_hook: Option<DebugHook>,
    steps: u64,
}

impl<B: Backend> Engine<B> {
    /// Build the model bank, create the backend, clear the field, then fire
    /// `ready`. Any error is returned before `ready` runs.
    pub fn new<F, R>(
        asset: &ModelAsset,
        config: EngineConfig,
        create_backend: F,
        debug_hook: Option<DebugHook>,
        ready: R,
    ) -> Result<Self>
    where
        F: FnOnce(&Arc<ModelBank>, &EngineConfig) -> Result<B>,
        R: FnOnce(&Engine<B>),
    {
        let bank = Arc::new(ModelBank::load(asset)?);
        validate_grid(config.width, config.height, bank.layout().topology)?;

        let config = EngineConfig {
            params: config.params.sanitized(),
            ..config
        };
        let mut backend = create_backend(&bank, &config)?;
        backend.reset(&bank.layout().dead_cell(0))?;

        log::info!(
            "Engine ready: {}x{} grid, {} models, fire rate {:.2}",
            config.width,
            config.height,
            bank.count(),
            config.params.fire_rate
        );

        let engine = Self {
            backend: Some(backend),
            bank,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            debug_hook,
            steps: 0,
        };
        ready(&engine);
        Ok(engine)
    }

    fn backend_mut(&mut self) -> Result<&mut B> {
        self.backend.as_mut().ok_or(EngineError::EngineDestroyed)
    }

    /// Backend, for host-specific access (frames, surfaces)
    pub fn backend(&self) -> Result<&B> {
        self.backend.as_ref().ok_or(EngineError::EngineDestroyed)
    }

    /// Advance the simulation by one step
    pub fn step(&mut self) -> Result<()> {
        if self.backend.is_none() {
            return Err(EngineError::EngineDestroyed);
        }
        self.poll_debug_hook();

        let params = StepParams {
            step_seed: self.rng.gen(),
            fire_rate: self.config.params.fire_rate,
            alive_threshold: self.config.params.alive_threshold,
        };
        self.backend_mut()?.step(&params)?;
        self.steps += 1;
        Ok(())
    }

    fn poll_debug_hook(&mut self) {
        if let Some(hook) = self.debug_hook.as_mut() {
            let before = self.config.params;
            hook(&mut self.config.params);
            self.config.params = self.config.params.sanitized();
            if self.config.params != before {
                log::debug!("Parameters changed: {:?}", self.config.params);
            }
        }
    }

    /// Draw the current buffer
    pub fn draw(&mut self, view: ViewSize, mode: RenderMode) -> Result<()> {
        if self.backend.is_none() {
            return Err(EngineError::EngineDestroyed);
        }
        view.validate()?;
        mode.validate(self.bank.layout())?;
        self.backend_mut()?.draw(view, mode)
    }

    /// Run `steps_per_frame` steps, then draw
    pub fn frame(&mut self, view: ViewSize, mode: RenderMode) -> Result<()> {
        if self.backend.is_none() {
            return Err(EngineError::EngineDestroyed);
        }
        view.validate()?;
        mode.validate(self.bank.layout())?;
        for _ in 0..self.config.params.steps_per_frame {
            self.step()?;
        }
        self.backend_mut()?.draw(view, mode)
    }

    /// Hand the cells within `radius` of grid point (x, y) to `model_id`
    /// and plant a seed at (x, y). A negative radius (`WHOLE_FIELD`)
    /// repaints every cell.
    pub fn paint(&mut self, x: f32, y: f32, radius: f32, model_id: usize) -> Result<()> {
        if self.backend.is_none() {
            return Err(EngineError::EngineDestroyed);
        }
        if let Err(e) = self.bank.get(model_id) {
            log::warn!("Rejected paint: {}", e);
            return Err(e);
        }
        if !x.is_finite() || !y.is_finite() || radius.is_nan() {
            return Err(EngineError::grid(format!(
                "paint at ({}, {}) radius {}",
                x, y, radius
            )));
        }

        let (width, height) = (self.config.width, self.config.height);
        let seed_cell = (
            (x.floor() as i64).rem_euclid(width as i64) as u32,
            (y.floor() as i64).rem_euclid(height as i64) as u32,
        );
        let edit = Edit::Paint {
            circle: Circle::grid(x, y, radius, width, height),
            seed_cell,
            model: model_id as u32,
        };
        log::debug!("Paint model {} at {:?} radius {}", model_id, seed_cell, radius);
        self.backend_mut()?.edit(&edit)
    }

    /// Kill every cell within `radius` display pixels of display point
    /// (x, y). Selectors are kept so the region regrows under its model.
    /// A negative radius is rejected.
    pub fn clear_circle(&mut self, x: f32, y: f32, radius: f32, view: ViewSize) -> Result<()> {
        if self.backend.is_none() {
            return Err(EngineError::EngineDestroyed);
        }
        view.validate()?;
        if !x.is_finite() || !y.is_finite() || radius.is_nan() || radius < 0.0 {
            return Err(EngineError::grid(format!(
                "clear at ({}, {}) radius {}",
                x, y, radius
            )));
        }
        let circle = Circle::display(x, y, radius, view, self.config.width, self.config.height);
        log::debug!("Clear circle {:?}", circle);
        self.backend_mut()?.edit(&Edit::Clear { circle })
    }

    /// Perturb the hidden channels of every alive cell
    pub fn disturb(&mut self) -> Result<()> {
        if self.backend.is_none() {
            return Err(EngineError::EngineDestroyed);
        }
        let edit = Edit::Disturb {
            amount: self.config.params.disturb_amount,
            threshold: self.config.params.alive_threshold,
            seed: self.rng.gen(),
        };
        log::debug!("Disturb {:?}", edit);
        self.backend_mut()?.edit(&edit)
    }

    /// Kill every cell and hand the whole field to model 0
    pub fn reset(&mut self) -> Result<()> {
        let cell = self.bank.layout().dead_cell(0);
        self.backend_mut()?.reset(&cell)
    }

    /// Copy of the current buffer
    pub fn snapshot(&mut self) -> Result<Vec<f32>> {
        self.backend_mut()?.snapshot()
    }

    /// Release the backend. Later calls fail with `EngineDestroyed`.
    pub fn destroy(&mut self) -> Result<()> {
        match self.backend.take() {
            Some(backend) => {
                drop(backend);
                log::info!("Engine destroyed after {} steps", self.steps);
                Ok(())
            }
            None => Err(EngineError::EngineDestroyed),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.backend.is_none()
    }

    pub fn bank(&self) -> &ModelBank {
        &self.bank
    }

    pub fn model_count(&self) -> usize {
        self.bank.count()
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.bank.names()
    }

    pub fn params(&self) -> &TunableParams {
        &self.config.params
    }

    pub fn set_params(&mut self, params: TunableParams) {
        self.config.params = params.sanitized();
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn step_count(&self) -> u64 {
        self.steps
    }
}
