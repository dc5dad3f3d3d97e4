pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod model;
pub mod simulation;

pub use config::{EngineConfig, TunableParams};
pub use engine::{Backend, DebugHook, Engine, WHOLE_FIELD};
pub use error::{EngineError, Result};
pub use gpu::GpuBackend;
pub use model::{ModelAsset, ModelBank, ModelCycle};
pub use simulation::{CpuBackend, Frame, RenderMode, Topology, ViewSize};
