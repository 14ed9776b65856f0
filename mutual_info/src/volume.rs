//! 3D volumes in the interleaved host layout.
//!
//! Voxel `(row, col, slice)` lives at `(row * dimension + col) * depth + slice`,
//! so consecutive samples of a stream walk through depth first.

use common::{PackLayout, PackedWord};

use crate::Bin;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    dimension: usize,
    depth: usize,
    voxels: Vec<Bin>,
}

impl Volume {
    pub fn new(dimension: usize, depth: usize) -> Self {
        Self {
            dimension,
            depth,
            voxels: vec![0; dimension * dimension * depth],
        }
    }

    pub fn from_fn<F>(dimension: usize, depth: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize, usize) -> Bin,
    {
        let mut volume = Self::new(dimension, depth);
        for row in 0..dimension {
            for col in 0..dimension {
                for slice in 0..depth {
                    volume.set(row, col, slice, f(row, col, slice));
                }
            }
        }
        volume
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn voxels(&self) -> &[Bin] {
        &self.voxels
    }

    #[inline]
    fn index(&self, row: usize, col: usize, slice: usize) -> usize {
        debug_assert!(row < self.dimension && col < self.dimension && slice < self.depth);
        (row * self.dimension + col) * self.depth + slice
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize, slice: usize) -> Bin {
        self.voxels[self.index(row, col, slice)]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, slice: usize, value: Bin) {
        let idx = self.index(row, col, slice);
        self.voxels[idx] = value;
    }

    /// Scatters a row-major `dimension x dimension` image into `slice`.
    pub fn write_slice(&mut self, slice: usize, pixels: &[Bin]) {
        debug_assert_eq!(pixels.len(), self.dimension * self.dimension);
        for (pixel, &value) in pixels.iter().enumerate() {
            self.voxels[pixel * self.depth + slice] = value;
        }
    }

    /// Gathers `slice` into a row-major image.
    pub fn read_slice(&self, slice: usize) -> Vec<Bin> {
        self.voxels
            .iter()
            .skip(slice)
            .step_by(self.depth)
            .copied()
            .collect()
    }

    /// Copy extended with zero slices up to `depth`.
    pub fn padded(&self, depth: usize) -> Self {
        if depth <= self.depth {
            return self.clone();
        }
        let mut padded = Self::new(self.dimension, depth);
        for (pixel, column) in self.voxels.chunks(self.depth.max(1)).enumerate() {
            let start = pixel * depth;
            padded.voxels[start..start + column.len()].copy_from_slice(column);
        }
        padded
    }

    pub fn pack(&self, layout: PackLayout) -> Vec<PackedWord> {
        pack_samples(&self.voxels, layout)
    }
}

/// Packs consecutive samples, `layout.fields` per word. A trailing partial
/// word is zero filled.
pub fn pack_samples(samples: &[Bin], layout: PackLayout) -> Vec<PackedWord> {
    samples
        .chunks(layout.fields)
        .map(|chunk| layout.pack(chunk.iter().map(|&s| s as u64)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_round_trip_through_interleaved_layout() {
        let mut volume = Volume::new(3, 2);
        let first: Vec<Bin> = (0..9).collect();
        let second: Vec<Bin> = (100..109).collect();
        volume.write_slice(0, &first);
        volume.write_slice(1, &second);

        assert_eq!(volume.read_slice(0), first);
        assert_eq!(volume.read_slice(1), second);
        // depth is innermost
        assert_eq!(&volume.voxels()[..4], &[0, 100, 1, 101]);
        assert_eq!(volume.get(1, 2, 1), 105);
    }

    #[test]
    fn padding_appends_zero_slices() {
        let volume = Volume::from_fn(2, 3, |row, col, slice| (row * 100 + col * 10 + slice + 1) as Bin);
        let padded = volume.padded(4);

        assert_eq!(padded.depth(), 4);
        for slice in 0..3 {
            assert_eq!(padded.read_slice(slice), volume.read_slice(slice));
        }
        assert_eq!(padded.read_slice(3), vec![0; 4]);
        assert_eq!(volume.padded(2), volume);
    }

    #[test]
    fn packing_groups_consecutive_samples() {
        let layout = PackLayout::new(8, 4);
        let words = pack_samples(&[1, 2, 3, 4, 5, 6], layout);

        assert_eq!(words.len(), 2);
        assert_eq!(layout.unpack(words[0]).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(layout.unpack(words[1]).collect::<Vec<_>>(), vec![5, 6, 0, 0]);
    }
}
