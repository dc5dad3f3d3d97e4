use crate::model::bank::ModelBank;

/// Layer descriptor as laid out in the update shader's `layers` array (32 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuLayer {
    /// Byte offset of the first quantized weight in the packed weight words
    pub weight_offset: u32,
    /// Index of the first bias in the bias array
    pub bias_offset: u32,
    pub in_dim: u32,
    pub out_dim: u32,
    pub scale: f32,
    pub zero_point: f32,
    pub _padding: [u32; 2],
}

/// Range of layers belonging to one model (8 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuModelEntry {
    pub first_layer: u32,
    pub layer_count: u32,
}

/// Every model of a bank flattened into upload-ready arrays.
///
/// Weights stay quantized: four u8 per little-endian u32 word, each layer
/// starting on a word boundary. The shader dequantizes on the fly.
#[derive(Clone, Debug, Default)]
pub struct PackedBank {
    pub weights: Vec<u32>,
    pub biases: Vec<f32>,
    pub layers: Vec<GpuLayer>,
    pub models: Vec<GpuModelEntry>,
    /// Filter taps, filter-major: `filters[f * taps + k]`
    pub filters: Vec<f32>,
}

impl ModelBank {
    /// Flatten the bank for GPU upload
    pub fn pack(&self) -> PackedBank {
        let mut packed = PackedBank::default();
        let mut bytes: Vec<u8> = Vec::new();

        for model in self.models() {
            packed.models.push(GpuModelEntry {
                first_layer: packed.layers.len() as u32,
                layer_count: model.layers().len() as u32,
            });
            for layer in model.layers() {
                packed.layers.push(GpuLayer {
                    weight_offset: bytes.len() as u32,
                    bias_offset: packed.biases.len() as u32,
                    in_dim: layer.in_dim as u32,
                    out_dim: layer.out_dim as u32,
                    scale: layer.scale,
                    zero_point: layer.zero_point,
                    _padding: [0; 2],
                });
                bytes.extend_from_slice(&layer.quantized);
                bytes.resize(bytes.len().next_multiple_of(4), 0);
                packed.biases.extend_from_slice(&layer.bias);
            }
        }

        packed.weights = bytes
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect();
        packed.filters = self.filters().iter().flatten().copied().collect();
        packed
    }
}

impl PackedBank {
    /// Quantized byte at `byte` (mirrors the shader's `weight_at`)
    pub fn weight_byte(&self, byte: u32) -> u8 {
        let word = self.weights[(byte >> 2) as usize];
        ((word >> ((byte & 3) * 8)) & 0xFF) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::asset::ModelAsset;
    use crate::simulation::cell::Topology;

    #[test]
    fn test_gpu_layout_sizes() {
        assert_eq!(std::mem::size_of::<GpuLayer>(), 32);
        assert_eq!(std::mem::size_of::<GpuModelEntry>(), 8);
    }

    #[test]
    fn test_pack_preserves_every_weight() {
        let asset = ModelAsset::random(&["a", "b", "c"], 5, 7, Topology::Hex, 3);
        let bank = ModelBank::load(&asset).unwrap();
        let packed = bank.pack();

        assert_eq!(packed.models.len(), 3);
        assert_eq!(packed.layers.len(), 6);
        assert_eq!(packed.filters.len(), 4 * Topology::Hex.taps());

        for (model, entry) in bank.models().iter().zip(&packed.models) {
            for (l, layer) in model.layers().iter().enumerate() {
                let gpu = packed.layers[(entry.first_layer as usize) + l];
                assert_eq!(gpu.weight_offset % 4, 0);
                for (i, q) in layer.quantized.iter().enumerate() {
                    assert_eq!(packed.weight_byte(gpu.weight_offset + i as u32), *q);
                }
                let bias = &packed.biases[gpu.bias_offset as usize..][..layer.out_dim];
                assert_eq!(bias, layer.bias.as_slice());
            }
        }
    }
}
