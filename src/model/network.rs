use crate::config::MAX_LAYER_WIDTH;
use crate::model::bank::Model;

/// Apply the perception kernels to a gathered neighborhood.
///
/// `taps[k]` is the state of tap k. Entry `c * F + f` of `out` is the
/// response of filter f on channel c.
pub fn perceive(filters: &[Vec<f32>], taps: &[&[f32]], channels: usize, out: &mut [f32]) {
    let filter_count = filters.len();
    out[..channels * filter_count].fill(0.0);
    for (k, tap) in taps.iter().enumerate() {
        for c in 0..channels {
            let value = tap[c];
            for (f, filter) in filters.iter().enumerate() {
                out[c * filter_count + f] += filter[k] * value;
            }
        }
    }
}

impl Model {
    /// Evaluate the network on a perception vector, writing the state delta
    /// into `delta` (one value per channel)
    pub fn forward(&self, features: &[f32], delta: &mut [f32]) {
        let mut current = [0.0f32; MAX_LAYER_WIDTH];
        let mut next = [0.0f32; MAX_LAYER_WIDTH];
        current[..features.len()].copy_from_slice(features);

        let layers = self.layers();
        for (l, layer) in layers.iter().enumerate() {
            let last = l + 1 == layers.len();
            let weights = layer.weights();
            for o in 0..layer.out_dim {
                let row = &weights[o * layer.in_dim..(o + 1) * layer.in_dim];
                let mut acc = layer.bias[o];
                for (w, x) in row.iter().zip(&current[..layer.in_dim]) {
                    acc += w * x;
                }
                next[o] = if last { acc } else { acc.max(0.0) };
            }
            current[..layer.out_dim].copy_from_slice(&next[..layer.out_dim]);
        }

        let channels = self.channels();
        delta[..channels].copy_from_slice(&current[..channels]);
    }
}
