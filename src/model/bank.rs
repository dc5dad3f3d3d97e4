use crate::config::{MAX_CHANNELS, MAX_FILTERS, MAX_LAYERS, MAX_LAYER_WIDTH, MAX_MODELS};
use crate::error::{EngineError, Result};
use crate::model::asset::{LayerRecord, ModelAsset};
use crate::simulation::cell::CellLayout;

/// A dense layer with its quantized weights and their dequantized form
#[derive(Clone, Debug)]
pub struct Layer {
    pub in_dim: usize,
    pub out_dim: usize,
    pub scale: f32,
    pub zero_point: f32,
    /// Quantized weights, row-major `[out][in]`
    pub quantized: Vec<u8>,
    pub bias: Vec<f32>,
    weights: Vec<f32>,
}

impl Layer {
    fn from_record(record: &LayerRecord) -> Self {
        let weights = record
            .weights
            .iter()
            .map(|q| dequantize(*q, record.zero_point, record.scale))
            .collect();
        Self {
            in_dim: record.in_dim,
            out_dim: record.out_dim,
            scale: record.scale,
            zero_point: record.zero_point,
            quantized: record.weights.clone(),
            bias: record.bias.clone(),
            weights,
        }
    }

    /// Dequantized weights, row-major `[out][in]`
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
}

/// Shared by the CPU path and mirrored by the update shader
pub fn dequantize(q: u8, zero_point: f32, scale: f32) -> f32 {
    (q as f32 - zero_point) * scale
}

/// One trained update rule
#[derive(Clone, Debug)]
pub struct Model {
    pub name: String,
    channels: usize,
    layers: Vec<Layer>,
}

impl Model {
    /// Declared state channel count
    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }
}

/// All resident models plus the cell layout and perception they share
#[derive(Clone, Debug)]
pub struct ModelBank {
    layout: CellLayout,
    filters: Vec<Vec<f32>>,
    models: Vec<Model>,
}

impl ModelBank {
    /// Validate an asset and build the bank
    pub fn load(asset: &ModelAsset) -> Result<Self> {
        let count = asset.models.len();
        if count > MAX_MODELS {
            return Err(EngineError::UnsupportedModelCount {
                count,
                max: MAX_MODELS,
            });
        }
        if count == 0 {
            return Err(EngineError::asset("asset holds no models"));
        }

        let channels = asset.channels;
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(EngineError::asset(format!(
                "channel count {} outside 1..={}",
                channels, MAX_CHANNELS
            )));
        }
        if asset.visible_channels == 0 || asset.visible_channels > channels {
            return Err(EngineError::asset(format!(
                "visible channel count {} outside 1..={}",
                asset.visible_channels, channels
            )));
        }
        if asset.alive_channel >= channels {
            return Err(EngineError::asset(format!(
                "alive channel {} out of range for {} channels",
                asset.alive_channel, channels
            )));
        }
        if let Some(seed) = &asset.seed {
            if seed.len() != channels {
                return Err(EngineError::asset(format!(
                    "seed has {} values, expected {}",
                    seed.len(),
                    channels
                )));
            }
            if seed.iter().any(|v| !v.is_finite()) {
                return Err(EngineError::asset("seed is not finite"));
            }
        }

        let taps = asset.topology.taps();
        if asset.filters.is_empty() || asset.filters.len() > MAX_FILTERS {
            return Err(EngineError::asset(format!(
                "filter count {} outside 1..={}",
                asset.filters.len(),
                MAX_FILTERS
            )));
        }
        for (f, filter) in asset.filters.iter().enumerate() {
            if filter.len() != taps {
                return Err(EngineError::asset(format!(
                    "filter {} has {} taps, {:?} topology gathers {}",
                    f,
                    filter.len(),
                    asset.topology,
                    taps
                )));
            }
            if filter.iter().any(|w| !w.is_finite()) {
                return Err(EngineError::asset(format!("filter {} is not finite", f)));
            }
        }
        let features = channels * asset.filters.len();
        if features > MAX_LAYER_WIDTH {
            return Err(EngineError::asset(format!(
                "perception vector of {} exceeds {}",
                features, MAX_LAYER_WIDTH
            )));
        }

        if asset.names.len() != count {
            return Err(EngineError::asset(format!(
                "{} names for {} models",
                asset.names.len(),
                count
            )));
        }

        let mut models = Vec::with_capacity(count);
        for (id, (record, name)) in asset.models.iter().zip(&asset.names).enumerate() {
            if name.trim().is_empty() {
                return Err(EngineError::asset(format!("model {} has an empty name", id)));
            }
            if record.channels != channels {
                return Err(EngineError::asset(format!(
                    "model {} ({}) declares {} channels, bank uses {}",
                    id, name, record.channels, channels
                )));
            }
            validate_layers(id, name, &record.layers, features, channels)?;
            models.push(Model {
                name: name.clone(),
                channels,
                layers: record.layers.iter().map(Layer::from_record).collect(),
            });
        }

        let layout = CellLayout::new(
            channels,
            asset.visible_channels,
            asset.alive_channel,
            asset.topology,
            asset.seed.clone(),
        );

        log::info!(
            "Loaded {} models ({} channels, {:?} topology, {} filters)",
            count,
            channels,
            asset.topology,
            asset.filters.len()
        );

        Ok(Self {
            layout,
            filters: asset.filters.clone(),
            models,
        })
    }

    /// Parse and validate a JSON asset
    pub fn from_json(json: &str) -> Result<Self> {
        Self::load(&ModelAsset::from_json(json)?)
    }

    /// Model by id
    pub fn get(&self, id: usize) -> Result<&Model> {
        self.models.get(id).ok_or(EngineError::InvalidModelId {
            id,
            count: self.models.len(),
        })
    }

    /// Model governing a cell whose selector decodes to `id`. Selectors are
    /// validated at edit time, so this only guards the index.
    pub fn for_selector(&self, id: u32) -> &Model {
        let last = self.models.len() - 1;
        &self.models[(id as usize).min(last)]
    }

    pub fn count(&self) -> usize {
        self.models.len()
    }

    /// Model names in id order
    pub fn names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn layout(&self) -> &CellLayout {
        &self.layout
    }

    pub fn filters(&self) -> &[Vec<f32>] {
        &self.filters
    }

    /// Length of the perception vector fed to the first layer
    pub fn feature_count(&self) -> usize {
        self.layout.channels * self.filters.len()
    }
}

fn validate_layers(
    id: usize,
    name: &str,
    layers: &[LayerRecord],
    features: usize,
    channels: usize,
) -> Result<()> {
    if layers.is_empty() || layers.len() > MAX_LAYERS {
        return Err(EngineError::asset(format!(
            "model {} ({}) has {} layers, expected 1..={}",
            id,
            name,
            layers.len(),
            MAX_LAYERS
        )));
    }

    let mut expected_in = features;
    for (l, layer) in layers.iter().enumerate() {
        if layer.in_dim != expected_in {
            return Err(EngineError::asset(format!(
                "model {} ({}) layer {} takes {} inputs, expected {}",
                id, name, l, layer.in_dim, expected_in
            )));
        }
        if layer.out_dim == 0 || layer.out_dim > MAX_LAYER_WIDTH {
            return Err(EngineError::asset(format!(
                "model {} ({}) layer {} width {} outside 1..={}",
                id, name, l, layer.out_dim, MAX_LAYER_WIDTH
            )));
        }
        if layer.weights.len() != layer.in_dim * layer.out_dim {
            return Err(EngineError::asset(format!(
                "model {} ({}) layer {} has {} weights, shape {}x{}",
                id,
                name,
                l,
                layer.weights.len(),
                layer.out_dim,
                layer.in_dim
            )));
        }
        if layer.bias.len() != layer.out_dim {
            return Err(EngineError::asset(format!(
                "model {} ({}) layer {} has {} biases, expected {}",
                id,
                name,
                l,
                layer.bias.len(),
                layer.out_dim
            )));
        }
        if !layer.scale.is_finite() || !layer.zero_point.is_finite() {
            return Err(EngineError::asset(format!(
                "model {} ({}) layer {} has a non-finite quantization",
                id, name, l
            )));
        }
        if layer.bias.iter().any(|b| !b.is_finite()) {
            return Err(EngineError::asset(format!(
                "model {} ({}) layer {} has a non-finite bias",
                id, name, l
            )));
        }
        expected_in = layer.out_dim;
    }

    if expected_in != channels {
        return Err(EngineError::asset(format!(
            "model {} ({}) outputs {} values, expected {}",
            id, name, expected_in, channels
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::cell::Topology;

    fn asset() -> ModelAsset {
        ModelAsset::random(&["moss", "coral"], 8, 16, Topology::Square, 7)
    }

    #[test]
    fn test_load_valid_asset() {
        let bank = ModelBank::load(&asset()).unwrap();
        assert_eq!(bank.count(), 2);
        assert_eq!(bank.names(), vec!["moss", "coral"]);
        assert_eq!(bank.feature_count(), 32);
        assert_eq!(bank.get(1).unwrap().channels(), 8);
    }

    #[test]
    fn test_get_out_of_range() {
        let bank = ModelBank::load(&asset()).unwrap();
        assert!(matches!(
            bank.get(2),
            Err(EngineError::InvalidModelId { id: 2, count: 2 })
        ));
    }

    #[test]
    fn test_channel_mismatch_between_models() {
        let mut asset = asset();
        asset.models[1].channels = 9;
        assert!(matches!(ModelBank::load(&asset), Err(EngineError::AssetFormat(_))));
    }

    #[test]
    fn test_missing_names() {
        let mut asset = asset();
        asset.names.pop();
        assert!(matches!(ModelBank::load(&asset), Err(EngineError::AssetFormat(_))));
    }

    #[test]
    fn test_inconsistent_weight_shape() {
        let mut asset = asset();
        asset.models[0].layers[1].weights.pop();
        assert!(matches!(ModelBank::load(&asset), Err(EngineError::AssetFormat(_))));

        let mut asset = self::asset();
        asset.models[0].layers[1].in_dim += 1;
        assert!(matches!(ModelBank::load(&asset), Err(EngineError::AssetFormat(_))));
    }

    #[test]
    fn test_filter_taps_must_match_topology() {
        let mut asset = asset();
        asset.topology = Topology::Hex;
        assert!(matches!(ModelBank::load(&asset), Err(EngineError::AssetFormat(_))));
    }

    #[test]
    fn test_non_finite_bias_and_seed() {
        let mut bad_bias = asset();
        bad_bias.models[1].layers[0].bias[0] = f32::NAN;
        assert!(matches!(ModelBank::load(&bad_bias), Err(EngineError::AssetFormat(_))));

        let mut bad_seed = asset();
        let mut seed = vec![0.0; bad_seed.channels];
        seed[bad_seed.alive_channel] = f32::INFINITY;
        bad_seed.seed = Some(seed);
        assert!(matches!(ModelBank::load(&bad_seed), Err(EngineError::AssetFormat(_))));
    }

    #[test]
    fn test_too_many_models() {
        let names: Vec<String> = (0..=MAX_MODELS).map(|i| format!("m{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let asset = ModelAsset::identity(&refs, 1, 1, 0, Topology::Square);
        assert!(matches!(
            ModelBank::load(&asset),
            Err(EngineError::UnsupportedModelCount { count, max }) if count == MAX_MODELS + 1 && max == MAX_MODELS
        ));
    }

    #[test]
    fn test_dequantize_zero_point() {
        assert_eq!(dequantize(128, 128.0, 0.5), 0.0);
        assert_eq!(dequantize(130, 128.0, 0.5), 1.0);
        assert_eq!(dequantize(0, 128.0, 0.5), -64.0);
    }

    #[test]
    fn test_for_selector_clamps() {
        let bank = ModelBank::load(&asset()).unwrap();
        assert_eq!(bank.for_selector(99).name, "coral");
    }
}
