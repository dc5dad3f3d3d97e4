mod backend;
mod buffers;
mod compute;
mod context;
mod edit;
mod render;

pub use backend::GpuBackend;
pub use buffers::{EditUniforms, GpuField, ModelBuffers, RenderUniforms, StepUniforms};
pub use compute::StepPipeline;
pub use context::{GpuContext, SurfaceTarget};
pub use edit::EditPipeline;
pub use render::{OffscreenTarget, RenderPipeline};
