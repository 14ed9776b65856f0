//! Volumes stored as one grayscale PNG per slice: `IM1.png`, `IM2.png`, ...

use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context};
use common::file_utils::slice_image_files;
use image::GrayImage;
use mutual_info::Volume;

pub fn slice_path(dir: &Path, slice: usize) -> PathBuf {
    dir.join(format!("IM{}.png", slice + 1))
}

/// Reads slices `IM1.png..=IM{slices}.png` into a `dimension x dimension x slices` volume.
pub fn read_volume(dir: &Path, dimension: usize, slices: usize) -> anyhow::Result<Volume> {
    let available = slice_image_files(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .len();
    ensure!(
        available >= slices,
        "{} holds {available} slice images, {slices} requested",
        dir.display()
    );

    let mut volume = Volume::new(dimension, slices);
    for slice in 0..slices {
        let path = slice_path(dir, slice);
        let image = image::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?
            .to_luma8();

        if image.width() as usize != dimension || image.height() as usize != dimension {
            bail!(
                "{} is {}x{}, expected {dimension}x{dimension}",
                path.display(),
                image.width(),
                image.height()
            );
        }
        volume.write_slice(slice, image.as_raw());
    }

    Ok(volume)
}

/// Writes the first `slices` slices of `volume` as PNG files into `dir`.
pub fn write_volume(volume: &Volume, dir: &Path, slices: usize) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let dimension = volume.dimension() as u32;
    for slice in 0..slices.min(volume.depth()) {
        let image = GrayImage::from_raw(dimension, dimension, volume.read_slice(slice))
            .context("Slice buffer does not match the volume dimension")?;
        let path = slice_path(dir, slice);
        image
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use common::test_utils::test_output_path;

    use super::*;

    #[test]
    fn slices_round_trip_through_png() -> anyhow::Result<()> {
        let dir = test_output_path("png_volume_round_trip");
        let volume = Volume::from_fn(6, 3, |row, col, slice| (row * 40 + col * 5 + slice) as u8);

        write_volume(&volume, &dir, 3)?;
        let loaded = read_volume(&dir, 6, 3)?;

        assert_eq!(loaded, volume);
        Ok(())
    }

    #[test]
    fn wrong_dimension_is_reported() -> anyhow::Result<()> {
        let dir = test_output_path("png_volume_wrong_dimension");
        write_volume(&Volume::new(4, 1), &dir, 1)?;

        let err = read_volume(&dir, 8, 1).unwrap_err();
        assert!(err.to_string().contains("expected 8x8"), "{err}");
        Ok(())
    }

    #[test]
    fn missing_slices_are_reported() {
        let dir = test_output_path("png_volume_missing");
        assert!(read_volume(&dir, 4, 2).is_err());
    }
}
