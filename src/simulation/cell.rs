use serde::{Deserialize, Serialize};

/// Neighbor-gather shape of the lattice.
///
/// Tap 0 is always the cell itself, followed by its neighbors in a fixed
/// order. Models are trained against one topology; it comes from the asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// 3x3 Moore neighborhood (8 neighbors)
    Square,
    /// Odd-row-offset hexagonal lattice (6 neighbors)
    Hex,
}

/// Square taps: self, then row above, same row, row below
const SQUARE_TAPS: [(i32, i32); 9] = [
    (0, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Hex taps for even rows: self, left, right, up-left, up-right, down-left, down-right
const HEX_EVEN_TAPS: [(i32, i32); 7] = [(0, 0), (-1, 0), (1, 0), (-1, -1), (0, -1), (-1, 1), (0, 1)];

/// Hex taps for odd rows (shifted half a cell to the right)
const HEX_ODD_TAPS: [(i32, i32); 7] = [(0, 0), (-1, 0), (1, 0), (0, -1), (1, -1), (0, 1), (1, 1)];

impl Topology {
    /// Number of gathered taps, including the cell itself
    pub fn taps(self) -> usize {
        match self {
            Topology::Square => SQUARE_TAPS.len(),
            Topology::Hex => HEX_EVEN_TAPS.len(),
        }
    }

    /// Tap offsets for a cell on row `y`
    pub fn offsets(self, y: u32) -> &'static [(i32, i32)] {
        match self {
            Topology::Square => &SQUARE_TAPS,
            Topology::Hex if y % 2 == 0 => &HEX_EVEN_TAPS,
            Topology::Hex => &HEX_ODD_TAPS,
        }
    }

    /// Shader-side discriminant
    pub fn as_u32(self) -> u32 {
        match self {
            Topology::Square => 0,
            Topology::Hex => 1,
        }
    }

    /// Flat cell indices of the taps around (x, y) on a torus
    pub fn gather(self, x: u32, y: u32, width: u32, height: u32, out: &mut [usize; 9]) -> usize {
        let offsets = self.offsets(y);
        for (slot, (dx, dy)) in out.iter_mut().zip(offsets) {
            let nx = (x as i64 + *dx as i64).rem_euclid(width as i64) as usize;
            let ny = (y as i64 + *dy as i64).rem_euclid(height as i64) as usize;
            *slot = ny * width as usize + nx;
        }
        offsets.len()
    }
}

/// Channel partition of a cell, shared by every model in a bank.
///
/// A cell occupies `stride()` consecutive floats: `channels` state values
/// followed by the model selector.
#[derive(Clone, Debug, PartialEq)]
pub struct CellLayout {
    pub channels: usize,
    pub visible: usize,
    pub alive_channel: usize,
    pub topology: Topology,
    seed: Vec<f32>,
}

impl CellLayout {
    pub fn new(
        channels: usize,
        visible: usize,
        alive_channel: usize,
        topology: Topology,
        seed: Option<Vec<f32>>,
    ) -> Self {
        let seed = seed.unwrap_or_else(|| {
            (0..channels)
                .map(|c| {
                    if c == alive_channel || c >= visible {
                        1.0
                    } else {
                        0.0
                    }
                })
                .collect()
        });
        Self {
            channels,
            visible,
            alive_channel,
            topology,
            seed,
        }
    }

    /// Floats per cell (state channels + selector)
    pub fn stride(&self) -> usize {
        self.channels + 1
    }

    /// Offset of the selector within a cell
    pub fn selector_slot(&self) -> usize {
        self.channels
    }

    /// Hidden channels carry free state and are the target of `disturb`
    pub fn is_hidden(&self, channel: usize) -> bool {
        channel >= self.visible && channel != self.alive_channel && channel < self.channels
    }

    /// State written into a freshly painted seed cell
    pub fn seed(&self) -> &[f32] {
        &self.seed
    }

    /// A dead cell governed by `model`
    pub fn dead_cell(&self, model: u32) -> Vec<f32> {
        let mut cell = vec![0.0; self.stride()];
        cell[self.selector_slot()] = encode_selector(model);
        cell
    }

    /// Whether the cell's own alive channel exceeds `threshold`
    pub fn is_alive(&self, cell: &[f32], threshold: f32) -> bool {
        cell[self.alive_channel] > threshold
    }
}

/// Encode a model id into the selector channel
pub fn encode_selector(model: u32) -> f32 {
    model as f32
}

/// Decode the selector channel into a model id
pub fn decode_selector(value: f32) -> u32 {
    value.max(0.0) as u32
}
