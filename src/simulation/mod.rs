pub mod cell;
pub mod cpu;
pub mod edit;
pub mod field;
pub mod render;
pub mod rng;
pub mod update;

pub use cell::{CellLayout, Topology};
pub use cpu::CpuBackend;
pub use edit::{Circle, Edit};
pub use field::StateField;
pub use render::{Frame, RenderMode, ViewSize};
pub use update::StepParams;
