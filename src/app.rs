use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalPosition;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::config::{EngineConfig, TunableParams, ERASE_RADIUS, MAX_STEPS_PER_FRAME, PAINT_RADIUS};
use crate::engine::{DebugHook, Engine, WHOLE_FIELD};
use crate::error::Result;
use crate::gpu::{GpuBackend, GpuContext};
use crate::model::{ModelAsset, ModelCycle};
use crate::simulation::render::{RenderMode, ViewSize};

/// Interactive window host
pub struct App {
    asset: ModelAsset,
    config: EngineConfig,
    window: Option<Arc<Window>>,
    engine: Option<Engine<GpuBackend>>,
    cycle: ModelCycle,
    /// Shared with the engine's debug hook
    params: Rc<RefCell<TunableParams>>,
    mode: usize,
    cursor: Option<PhysicalPosition<f64>>,
    brush: Option<MouseButton>,
    fps_counter: FpsCounter,
}

impl App {
    pub fn new(asset: ModelAsset, config: EngineConfig) -> Self {
        Self {
            asset,
            params: Rc::new(RefCell::new(config.params.sanitized())),
            config,
            window: None,
            engine: None,
            cycle: ModelCycle::new(1),
            mode: 0,
            cursor: None,
            brush: None,
            fps_counter: FpsCounter::new(),
        }
    }

    fn view(&self) -> Option<ViewSize> {
        let size = self.window.as_ref()?.inner_size();
        let view = ViewSize::new(size.width, size.height);
        view.validate().ok().map(|_| view)
    }

    fn render_mode(&self) -> RenderMode {
        RenderMode::CYCLE[self.mode % RenderMode::CYCLE.len()]
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attrs = Window::default_attributes()
            .with_title("Neural Cells - Initializing...")
            .with_inner_size(winit::dpi::LogicalSize::new(768, 768));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return Ok(());
            }
        };

        log::info!("Creating GPU context...");
        let context = pollster::block_on(GpuContext::new(window.clone()))?;

        let shared = Rc::clone(&self.params);
        let hook: DebugHook = Box::new(move |params: &mut TunableParams| *params = *shared.borrow());

        let engine = Engine::with_context(&self.asset, self.config, context, Some(hook), |engine| {
            log::info!("Loaded models: {}", engine.model_names().join(", "));
        })?;

        self.cycle = ModelCycle::shuffled(engine.model_count(), &mut StdRng::seed_from_u64(self.config.seed));
        self.engine = Some(engine);
        self.window = Some(window);
        self.repaint()?;

        log::info!("Controls:");
        log::info!("  Left drag: Paint current model");
        log::info!("  Right drag: Erase");
        log::info!("  Space/N, P: Next / previous model");
        log::info!("  D: Disturb hidden state");
        log::info!("  R: Reset field");
        log::info!("  [/]: Fewer / more steps per frame");
        log::info!("  M: Cycle render mode");
        log::info!("  Escape: Quit");
        Ok(())
    }

    /// Hand the whole field to the current model and seed its center
    fn repaint(&mut self) -> Result<()> {
        let model = self.cycle.current();
        let (x, y) = (self.config.width as f32 / 2.0, self.config.height as f32 / 2.0);
        if let Some(engine) = self.engine.as_mut() {
            log::info!("Model: {}", engine.model_names()[model]);
            engine.paint(x, y, WHOLE_FIELD, model)?;
        }
        Ok(())
    }

    /// Apply the held mouse button at the cursor
    fn apply_brush(&mut self) -> Result<()> {
        let (Some(button), Some(cursor), Some(view)) = (self.brush, self.cursor, self.view()) else {
            return Ok(());
        };
        let Some(engine) = self.engine.as_mut() else {
            return Ok(());
        };

        let (px, py) = (cursor.x as f32, cursor.y as f32);
        match button {
            MouseButton::Left => {
                let gx = px * self.config.width as f32 / view.width as f32;
                let gy = py * self.config.height as f32 / view.height as f32;
                engine.paint(gx, gy, PAINT_RADIUS, self.cycle.current())
            }
            MouseButton::Right => engine.clear_circle(px, py, ERASE_RADIUS, view),
            _ => Ok(()),
        }
    }

    fn render(&mut self) -> Result<()> {
        let Some(view) = self.view() else {
            return Ok(());
        };
        self.apply_brush()?;

        let mode = self.render_mode();
        let Some(engine) = self.engine.as_mut() else {
            return Ok(());
        };
        engine.frame(view, mode)?;

        if let Some(fps) = self.fps_counter.tick() {
            if let Some(window) = &self.window {
                let name = engine.model_names()[self.cycle.current()];
                window.set_title(&format!("Neural Cells - {:.0} FPS - {} [{}]", fps, name, mode));
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key_code: KeyCode) -> Result<()> {
        match key_code {
            KeyCode::Space | KeyCode::KeyN => {
                self.cycle.switch(1);
                self.repaint()?;
            }
            KeyCode::KeyP => {
                self.cycle.switch(-1);
                self.repaint()?;
            }
            KeyCode::KeyD => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.disturb()?;
                    log::info!("Disturbed hidden state");
                }
            }
            KeyCode::KeyR => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.reset()?;
                    log::info!("Field reset");
                }
            }
            KeyCode::BracketLeft | KeyCode::BracketRight => {
                let mut params = self.params.borrow_mut();
                params.steps_per_frame = if key_code == KeyCode::BracketLeft {
                    params.steps_per_frame.saturating_sub(1).max(1)
                } else {
                    (params.steps_per_frame + 1).min(MAX_STEPS_PER_FRAME)
                };
                log::info!("Steps per frame: {}", params.steps_per_frame);
            }
            KeyCode::KeyM => {
                self.mode = (self.mode + 1) % RenderMode::CYCLE.len();
                log::info!("Render mode: {}", self.render_mode());
            }
            _ => {}
        }
        Ok(())
    }

    /// Log recoverable errors; tear down on fatal ones
    fn check(&mut self, event_loop: &ActiveEventLoop, result: Result<()>) {
        if let Err(e) = result {
            if e.is_fatal() {
                log::error!("{}", e);
                if let Some(mut engine) = self.engine.take() {
                    let _ = engine.destroy();
                }
                event_loop.exit();
            } else {
                log::warn!("{}", e);
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        log::info!("Grid size: {}x{}", self.config.width, self.config.height);
        let result = self.start(event_loop);
        self.check(event_loop, result);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let result = match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting...");
                if let Some(mut engine) = self.engine.take() {
                    let _ = engine.destroy();
                }
                event_loop.exit();
                Ok(())
            }
            WindowEvent::KeyboardInput { event, .. } => match event.physical_key {
                PhysicalKey::Code(KeyCode::Escape) if event.state.is_pressed() => {
                    log::info!("Escape pressed, exiting...");
                    event_loop.exit();
                    Ok(())
                }
                PhysicalKey::Code(key_code) if event.state.is_pressed() && !event.repeat => {
                    self.handle_key(key_code)
                }
                _ => Ok(()),
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Some(position);
                Ok(())
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.brush = match state {
                    ElementState::Pressed => Some(button),
                    ElementState::Released => None,
                };
                self.apply_brush()
            }
            WindowEvent::RedrawRequested => {
                let result = self.render();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
                result
            }
            _ => Ok(()),
        };
        self.check(event_loop, result);
    }
}

/// Simple FPS counter
struct FpsCounter {
    last_update: Instant,
    frame_count: u32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            last_update: Instant::now(),
            frame_count: 0,
        }
    }

    /// Tick the counter, returns Some(fps) every second
    fn tick(&mut self) -> Option<f64> {
        self.frame_count += 1;
        let elapsed = self.last_update.elapsed();

        if elapsed.as_secs_f64() >= 1.0 {
            let fps = self.frame_count as f64 / elapsed.as_secs_f64();
            self.frame_count = 0;
            self.last_update = Instant::now();
            Some(fps)
        } else {
            None
        }
    }
}
