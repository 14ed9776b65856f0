//! Seeded test volumes for runs without a dataset.

use mutual_info::Volume;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Concentric intensity shells around the volume centre plus a little noise.
pub fn phantom(dimension: usize, depth: usize, seed: u64) -> Volume {
    let mut rng = StdRng::seed_from_u64(seed);
    let centre = dimension as f64 / 2.0;
    let mid_slice = depth as f64 / 2.0;
    let shell = (dimension as f64 / 16.0).max(1.0);

    Volume::from_fn(dimension, depth, |row, col, slice| {
        let dy = row as f64 - centre;
        let dx = col as f64 - centre;
        let dz = slice as f64 - mid_slice;
        let radius = (dx * dx + dy * dy + dz * dz).sqrt();
        let base = ((radius / shell) as u32 * 23) % 224;
        (base + rng.random_range(0..32)) as u8
    })
}

/// Shifts every slice by `(dx, dy)` pixels, filling uncovered pixels with zero.
pub fn translated(volume: &Volume, dx: i64, dy: i64) -> Volume {
    let dimension = volume.dimension() as i64;
    Volume::from_fn(volume.dimension(), volume.depth(), |row, col, slice| {
        let src_row = row as i64 - dy;
        let src_col = col as i64 - dx;
        if (0..dimension).contains(&src_row) && (0..dimension).contains(&src_col) {
            volume.get(src_row as usize, src_col as usize, slice)
        } else {
            0
        }
    })
}
