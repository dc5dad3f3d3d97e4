/// PCG hash (Jarzynski & Olano)
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747796405).wrapping_add(2891336453);
    let word = ((state >> ((state >> 28).wrapping_add(4))) ^ state).wrapping_mul(277803737);
    (word >> 22) ^ word
}

/// Map a hash to [0, 1) using its top 24 bits
pub fn unit_float(hash: u32) -> f32 {
    (hash >> 8) as f32 * (1.0 / 16_777_216.0)
}

/// Fire-mask sample for `cell` on the step seeded with `step_seed`
pub fn fire_sample(step_seed: u32, cell: u32) -> f32 {
    unit_float(pcg_hash(cell.wrapping_mul(0x9E37_79B9) ^ step_seed))
}

/// Noise sample for one channel of one cell
pub fn noise_sample(seed: u32, cell: u32, channel: u32) -> f32 {
    unit_float(pcg_hash(pcg_hash(cell ^ seed).wrapping_add(channel)))
}
