use rayon::prelude::*;

use crate::config::MAX_LAYER_WIDTH;
use crate::model::{perceive, ModelBank};
use crate::simulation::cell::decode_selector;
use crate::simulation::rng::fire_sample;

/// Per-step inputs shared by both passes
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepParams {
    pub step_seed: u32,
    pub fire_rate: f32,
    pub alive_threshold: f32,
}

/// Evaluate every cell's model over its neighborhood and apply the delta
/// where the fire mask allows it. Writes `dst` (the scratch buffer).
pub fn update_pass(
    bank: &ModelBank,
    width: u32,
    height: u32,
    src: &[f32],
    dst: &mut [f32],
    params: &StepParams,
) {
    let layout = bank.layout();
    let stride = layout.stride();
    let channels = layout.channels;
    let topology = layout.topology;
    let filters = bank.filters();
    let row_len = width as usize * stride;

    dst.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as u32;
            let mut indices = [0usize; 9];
            let mut features = [0.0f32; MAX_LAYER_WIDTH];
            let mut delta = [0.0f32; MAX_LAYER_WIDTH];

            for (x, out) in row.chunks_exact_mut(stride).enumerate() {
                let x = x as u32;
                let cell = y * width + x;
                let base = cell as usize * stride;
                let this = &src[base..base + stride];

                let taps = topology.gather(x, y, width, height, &mut indices);
                let mut gathered: [&[f32]; 9] = [&[]; 9];
                for (slot, index) in gathered.iter_mut().zip(&indices[..taps]) {
                    *slot = &src[index * stride..index * stride + channels];
                }
                perceive(filters, &gathered[..taps], channels, &mut features);

                let model = bank.for_selector(decode_selector(this[channels]));
                model.forward(&features[..bank.feature_count()], &mut delta);

                let fire = fire_sample(params.step_seed, cell) < params.fire_rate;
                for c in 0..channels {
                    out[c] = if fire { this[c] + delta[c] } else { this[c] };
                }
                out[channels] = this[channels];
            }
        });
}

/// Keep updated cells whose neighborhood was alive both before and after the
/// update; reset the rest to the empty state. Reads `src` (pre-update) and
/// `updated` (scratch), writes `dst`.
pub fn liveness_pass(
    bank: &ModelBank,
    width: u32,
    height: u32,
    src: &[f32],
    updated: &[f32],
    dst: &mut [f32],
    threshold: f32,
) {
    let layout = bank.layout();
    let stride = layout.stride();
    let channels = layout.channels;
    let alive = layout.alive_channel;
    let topology = layout.topology;
    let row_len = width as usize * stride;

    dst.par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as u32;
            let mut indices = [0usize; 9];

            for (x, out) in row.chunks_exact_mut(stride).enumerate() {
                let x = x as u32;
                let base = (y * width + x) as usize * stride;
                let taps = topology.gather(x, y, width, height, &mut indices);

                let mut pre = src[base + alive];
                let mut post = updated[base + alive];
                for index in &indices[1..taps] {
                    pre = pre.max(src[index * stride + alive]);
                    post = post.max(updated[index * stride + alive]);
                }

                if pre > threshold && post > threshold {
                    out[..channels].copy_from_slice(&updated[base..base + channels]);
                } else {
                    out[..channels].fill(0.0);
                }
                out[channels] = src[base + channels];
            }
        });
}
