use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use wgpu::{Adapter, Device, Instance, Queue, Surface, SurfaceConfiguration};
use winit::window::Window;

use crate::error::{EngineError, Result};

/// Window surface plus its current configuration
pub struct SurfaceTarget {
    pub surface: Surface<'static>,
    pub config: SurfaceConfiguration,
}

/// GPU context holding the wgpu device, queue and optional window surface
pub struct GpuContext {
    pub device: Device,
    pub queue: Queue,
    pub target: Option<SurfaceTarget>,
    adapter: Adapter,
    lost: Arc<AtomicBool>,
    fault: Arc<Mutex<Option<String>>>,
}

impl GpuContext {
    /// Create a context presenting to `window`
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| EngineError::GpuUnavailable(format!("surface: {}", e)))?;

        let mut context = Self::with_instance(&instance, Some(&surface)).await?;

        let size = window.inner_size();
        let config = surface
            .get_default_config(&context.adapter, size.width.max(1), size.height.max(1))
            .ok_or_else(|| EngineError::GpuUnavailable("surface not supported by adapter".into()))?;
        surface.configure(&context.device, &config);

        context.target = Some(SurfaceTarget { surface, config });
        Ok(context)
    }

    /// Create a context without a surface (offscreen rendering)
    pub async fn headless() -> Result<Self> {
        let instance = Instance::new(&wgpu::InstanceDescriptor::default());
        Self::with_instance(&instance, None).await
    }

    async fn with_instance(instance: &Instance, surface: Option<&Surface<'static>>) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| EngineError::GpuUnavailable("no suitable GPU adapter".into()))?;

        log::info!("Using GPU: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("neural-cells-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| EngineError::GpuUnavailable(format!("device: {}", e)))?;

        let lost = Arc::new(AtomicBool::new(false));
        let lost_flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::error!("Device lost ({:?}): {}", reason, message);
            lost_flag.store(true, Ordering::SeqCst);
        });

        let fault = Arc::new(Mutex::new(None));
        let fault_slot = Arc::clone(&fault);
        device.on_uncaptured_error(Box::new(move |error| {
            log::error!("GPU error: {}", error);
            if let Ok(mut slot) = fault_slot.lock() {
                slot.get_or_insert_with(|| error.to_string());
            }
        }));

        Ok(Self {
            device,
            queue,
            target: None,
            adapter,
            lost,
            fault,
        })
    }

    /// Fail with `DeviceLost` once the device is gone or has reported an error
    pub fn check(&self) -> Result<()> {
        if self.lost.load(Ordering::SeqCst) {
            return Err(EngineError::device_lost("device lost"));
        }
        if let Ok(slot) = self.fault.lock() {
            if let Some(message) = slot.as_ref() {
                return Err(EngineError::device_lost(message.clone()));
            }
        }
        Ok(())
    }

    /// Block until `buffer` (MAP_READ) can be mapped, then copy it out
    pub fn read_buffer(&self, buffer: &wgpu::Buffer) -> Result<Vec<u8>> {
        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| EngineError::device_lost("readback callback dropped"))?
            .map_err(|e| EngineError::device_lost(format!("buffer map failed: {}", e)))?;

        let bytes = slice.get_mapped_range().to_vec();
        buffer.unmap();
        self.check()?;
        Ok(bytes)
    }

    /// Reconfigure the surface for a new output size
    pub fn resize(&mut self, width: u32, height: u32) {
        if let Some(target) = &mut self.target {
            if width > 0
                && height > 0
                && (target.config.width != width || target.config.height != height)
            {
                target.config.width = width;
                target.config.height = height;
                target.surface.configure(&self.device, &target.config);
            }
        }
    }

    /// Format render pipelines must target
    pub fn format(&self) -> wgpu::TextureFormat {
        match &self.target {
            Some(target) => target.config.format,
            None => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}
