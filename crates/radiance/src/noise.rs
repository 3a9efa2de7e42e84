//! Ray-angle jitter sources for the path tracer.
//!
//! Both the GLSL program and the CPU backend derive jitter from these
//! definitions. The blue-noise tile is generated here and uploaded as a
//! texture, so both backends read identical values.

use std::f32::consts::TAU;

use crate::types::NoiseMethod;

/// Edge length of the square blue-noise tile.
pub const BLUE_NOISE_SIZE: u32 = 64;

/// Plastic constant, the 2D generalisation of the golden ratio.
const PLASTIC: f64 = 1.324_717_957_244_746;

/// Integer hash from the PCG family (`pcg_hash`), stateless and reversible.
pub fn pcg_hash(value: u32) -> u32 {
    let state = value.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Maps a hash to `[0, 1)` using its top 24 bits so the value is exact in f32.
pub fn hash_to_unit(hash: u32) -> f32 {
    (hash >> 8) as f32 / 16_777_216.0
}

/// Per-pixel, per-ray jitter in `[0, 1)` seeded only by its inputs.
pub fn hash_jitter(x: u32, y: u32, ray: u32) -> f32 {
    hash_to_unit(pcg_hash(x ^ pcg_hash(y ^ pcg_hash(ray))))
}

/// R2 low-discrepancy tile, row-major, `BLUE_NOISE_SIZE²` values in `[0, 1)`.
pub fn blue_noise_tile() -> Vec<f32> {
    let a1 = 1.0 / PLASTIC;
    let a2 = 1.0 / (PLASTIC * PLASTIC);
    let mut tile = Vec::with_capacity((BLUE_NOISE_SIZE * BLUE_NOISE_SIZE) as usize);
    for y in 0..BLUE_NOISE_SIZE {
        for x in 0..BLUE_NOISE_SIZE {
            let value = (x as f64 * a1 + y as f64 * a2).fract() as f32;
            // f64 -> f32 rounding can land exactly on 1.0.
            tile.push(if value >= 1.0 { 0.0 } else { value });
        }
    }
    tile
}

/// Jitter source resolved for one frame.
pub(crate) enum Jitter<'a> {
    None,
    Hash,
    Tile(&'a [f32]),
}

impl<'a> Jitter<'a> {
    pub(crate) fn new(method: NoiseMethod, tile: &'a [f32]) -> Self {
        match method {
            NoiseMethod::None => Jitter::None,
            NoiseMethod::PseudoRandomHash => Jitter::Hash,
            NoiseMethod::BlueNoise => Jitter::Tile(tile),
        }
    }

    pub(crate) fn sample(&self, x: u32, y: u32, ray: u32) -> f32 {
        match self {
            Jitter::None => 0.0,
            Jitter::Hash => hash_jitter(x, y, ray),
            Jitter::Tile(tile) => {
                let mask = BLUE_NOISE_SIZE - 1;
                tile[((y & mask) * BLUE_NOISE_SIZE + (x & mask)) as usize]
            }
        }
    }
}

/// Angle of ray `ray` out of `ray_count`, offset by `jitter` strides.
pub fn ray_angle(ray: u32, ray_count: u32, jitter: f32) -> f32 {
    TAU * (ray as f32 + jitter) / ray_count as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcg_hash_is_stable() {
        assert_eq!(pcg_hash(0), pcg_hash(0));
        assert_ne!(pcg_hash(0), pcg_hash(1));
        assert_ne!(hash_jitter(3, 4, 0), hash_jitter(4, 3, 0));
    }

    #[test]
    fn hash_jitter_stays_in_unit_interval() {
        for y in 0..32 {
            for x in 0..32 {
                for ray in 0..8 {
                    let value = hash_jitter(x, y, ray);
                    assert!((0.0..1.0).contains(&value));
                }
            }
        }
    }

    #[test]
    fn blue_noise_tile_is_well_spread() {
        let tile = blue_noise_tile();
        assert_eq!(tile.len(), 4096);
        assert!(tile.iter().all(|value| (0.0..1.0).contains(value)));

        let mut buckets = [0usize; 8];
        for value in &tile {
            buckets[(value * 8.0) as usize] += 1;
        }
        for count in buckets {
            assert!((384..=640).contains(&count), "{buckets:?}");
        }
    }

    #[test]
    fn tile_jitter_wraps_every_64_pixels() {
        let tile = blue_noise_tile();
        let jitter = Jitter::new(NoiseMethod::BlueNoise, &tile);
        assert_eq!(jitter.sample(5, 9, 0), jitter.sample(69, 73, 3));
        let none = Jitter::new(NoiseMethod::None, &tile);
        assert_eq!(none.sample(5, 9, 2), 0.0);
    }

    #[test]
    fn ray_angles_cover_the_circle() {
        assert_eq!(ray_angle(0, 16, 0.0), 0.0);
        let last = ray_angle(15, 16, 0.999);
        assert!(last < TAU);
    }
}
