use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::simulation::cell::Topology;

fn default_zero_point() -> f32 {
    128.0
}

/// One dense layer, row-major `[out][in]`, weights quantized to u8
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayerRecord {
    pub in_dim: usize,
    pub out_dim: usize,
    pub scale: f32,
    #[serde(default = "default_zero_point")]
    pub zero_point: f32,
    pub weights: Vec<u8>,
    pub bias: Vec<f32>,
}

/// One trained rule
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Declared state channel count; must match the asset's
    pub channels: usize,
    pub layers: Vec<LayerRecord>,
}

/// A bank of rules sharing one cell layout and gather shape
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelAsset {
    pub channels: usize,
    pub visible_channels: usize,
    pub alive_channel: usize,
    pub topology: Topology,
    /// Perception kernels, one weight per gathered tap
    pub filters: Vec<Vec<f32>>,
    #[serde(default)]
    pub seed: Option<Vec<f32>>,
    pub names: Vec<String>,
    pub models: Vec<ModelRecord>,
}

impl ModelAsset {
    /// Parse a JSON asset
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a JSON asset from raw bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rules whose delta is always zero (a single zero-weight layer)
    pub fn identity(
        names: &[&str],
        channels: usize,
        visible_channels: usize,
        alive_channel: usize,
        topology: Topology,
    ) -> Self {
        let mut identity_filter = vec![0.0; topology.taps()];
        identity_filter[0] = 1.0;

        let zero_point = default_zero_point();
        let models = names
            .iter()
            .map(|_| ModelRecord {
                channels,
                layers: vec![LayerRecord {
                    in_dim: channels,
                    out_dim: channels,
                    scale: 1.0 / 128.0,
                    zero_point,
                    weights: vec![zero_point as u8; channels * channels],
                    bias: vec![0.0; channels],
                }],
            })
            .collect();

        Self {
            channels,
            visible_channels,
            alive_channel,
            topology,
            filters: vec![identity_filter],
            seed: None,
            names: names.iter().map(|n| n.to_string()).collect(),
            models,
        }
    }

    /// Randomly initialized two-layer rules with the standard
    /// identity/gradient/laplacian perception. Used by the demo host when
    /// no trained asset is supplied.
    pub fn random(
        names: &[&str],
        channels: usize,
        hidden: usize,
        topology: Topology,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let filters = standard_filters(topology);
        let features = channels * filters.len();

        let models = names
            .iter()
            .map(|_| ModelRecord {
                channels,
                layers: vec![
                    random_layer(&mut rng, features, hidden, 2.0 / features as f32),
                    random_layer(&mut rng, hidden, channels, 0.02),
                ],
            })
            .collect();

        Self {
            channels,
            visible_channels: 3,
            alive_channel: 3.min(channels - 1),
            topology,
            filters,
            seed: None,
            names: names.iter().map(|n| n.to_string()).collect(),
            models,
        }
    }
}

fn random_layer(rng: &mut StdRng, in_dim: usize, out_dim: usize, scale: f32) -> LayerRecord {
    LayerRecord {
        in_dim,
        out_dim,
        scale: scale / 128.0,
        zero_point: default_zero_point(),
        weights: (0..in_dim * out_dim).map(|_| rng.gen()).collect(),
        bias: (0..out_dim).map(|_| rng.gen_range(-0.01..0.01)).collect(),
    }
}

/// Identity, x gradient, y gradient and laplacian kernels for `topology`
pub fn standard_filters(topology: Topology) -> Vec<Vec<f32>> {
    match topology {
        Topology::Square => vec![
            scaled(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 1.0),
            scaled(&[0.0, -1.0, 0.0, 1.0, -2.0, 2.0, -1.0, 0.0, 1.0], 8.0),
            scaled(&[0.0, -1.0, -2.0, -1.0, 0.0, 0.0, 1.0, 2.0, 1.0], 8.0),
            scaled(&[-12.0, 1.0, 2.0, 1.0, 2.0, 2.0, 1.0, 2.0, 1.0], 16.0),
        ],
        Topology::Hex => vec![
            scaled(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 1.0),
            scaled(&[0.0, -1.0, 1.0, -0.5, 0.5, -0.5, 0.5], 4.0),
            scaled(&[0.0, 0.0, 0.0, -1.0, -1.0, 1.0, 1.0], 4.0),
            scaled(&[-6.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0], 6.0),
        ],
    }
}

fn scaled(taps: &[f32], divisor: f32) -> Vec<f32> {
    taps.iter().map(|v| v / divisor).collect()
}
