/// Default grid dimensions for the demo host (128x128 = 16K cells)
pub const GRID_WIDTH: u32 = 128;
pub const GRID_HEIGHT: u32 = 128;

/// Compute shader workgroup size (per axis)
pub const WORKGROUP_SIZE: u32 = 8;

// ============================================
// Update Rule Parameters
// ============================================

/// Probability that a cell applies its computed delta on a given step
pub const FIRE_RATE: f32 = 0.5;

/// A cell counts as alive when its alive channel exceeds this value
pub const ALIVE_THRESHOLD: f32 = 0.1;

/// Amplitude of the hidden-channel noise added by `disturb`
pub const DISTURB_AMOUNT: f32 = 0.2;

/// Update passes per displayed frame
pub const STEPS_PER_FRAME: u32 = 1;

/// Seed for the per-step random stream
pub const DEFAULT_SEED: u64 = 0x5EED_CE11;

// ============================================
// Model Limits
// ============================================

/// Maximum number of resident models addressable by the selector channel.
/// The selector is an integer-valued float but the demo host and the model
/// table treat it as an 8-bit id.
pub const MAX_MODELS: usize = 256;

/// Maximum state channels per cell (excluding the selector)
pub const MAX_CHANNELS: usize = 32;

/// Maximum width of any dense layer (including the perception vector)
pub const MAX_LAYER_WIDTH: usize = 256;

/// Maximum dense layers per model
pub const MAX_LAYERS: usize = 4;

/// Maximum perception filters per asset
pub const MAX_FILTERS: usize = 8;

// ============================================
// Rendering
// ============================================

/// Color shown under dead cells (near black)
pub const BACKGROUND: [f32; 3] = [0.05, 0.05, 0.08];

// ============================================
// Demo Host Interaction
// ============================================

/// Brush radius (grid cells) used when painting a model
pub const PAINT_RADIUS: f32 = 6.0;

/// Eraser radius in physical pixels
pub const ERASE_RADIUS: f32 = 24.0;

/// Bounds for the steps-per-frame hotkeys
pub const MAX_STEPS_PER_FRAME: u32 = 16;

// ============================================
// Runtime Parameters
// ============================================

/// Parameters a host settings surface may change between steps
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TunableParams {
    pub fire_rate: f32,
    pub alive_threshold: f32,
    pub disturb_amount: f32,
    pub steps_per_frame: u32,
}

impl Default for TunableParams {
    fn default() -> Self {
        Self {
            fire_rate: FIRE_RATE,
            alive_threshold: ALIVE_THRESHOLD,
            disturb_amount: DISTURB_AMOUNT,
            steps_per_frame: STEPS_PER_FRAME,
        }
    }
}

impl TunableParams {
    /// Clamp values into their valid ranges
    pub fn sanitized(self) -> Self {
        Self {
            fire_rate: clamp_unit(self.fire_rate, FIRE_RATE),
            alive_threshold: clamp_unit(self.alive_threshold, ALIVE_THRESHOLD),
            disturb_amount: if self.disturb_amount.is_finite() {
                self.disturb_amount.abs()
            } else {
                DISTURB_AMOUNT
            },
            steps_per_frame: self.steps_per_frame.clamp(1, MAX_STEPS_PER_FRAME),
        }
    }
}

fn clamp_unit(value: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Construction-time engine settings
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub width: u32,
    pub height: u32,
    /// Seed of the per-step random stream
    pub seed: u64,
    pub params: TunableParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: GRID_WIDTH,
            height: GRID_HEIGHT,
            seed: DEFAULT_SEED,
            params: TunableParams::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }
}
