mod asset;
mod bank;
mod cycle;
mod network;
mod packing;

pub use asset::{standard_filters, LayerRecord, ModelAsset, ModelRecord};
pub use bank::{dequantize, Layer, Model, ModelBank};
pub use cycle::ModelCycle;
pub use network::perceive;
pub use packing::{GpuLayer, GpuModelEntry, PackedBank};
