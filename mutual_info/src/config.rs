use std::path::Path;

use common::PackLayout;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Intensity bins per axis; the quantization interval is 1.
pub const BINS: usize = 256;
pub const JOINT_BINS: usize = BINS * BINS;

/// Width of one pixel sample inside a packed word.
pub const SAMPLE_BITS: usize = 8;

pub const N_COUPLES_MAX: u32 = 512;

pub const JOINT_ENTROPY_THRESHOLD: f64 = 1e-15;
pub const MARGINAL_ENTROPY_THRESHOLD: f64 = 1e-12;

pub const SUPPORTED_PARTITIONS: [usize; 7] = [1, 2, 4, 8, 16, 32, 64];

/// Histogram cells live in `u32` memories.
pub const MAX_CELL_BITS: usize = 32;

pub const DEFAULT_STREAM_DEPTH: usize = 2;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntropyPrecision {
    #[default]
    Float,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiConfig {
    /// Slices are `dimension x dimension` pixels.
    pub dimension: usize,
    /// Histogram partitions, also the number of samples per packed word.
    pub partitions: usize,
    /// Histogram cells per packed word entering the entropy engines.
    pub entropy_pe: usize,
    pub stream_depth: usize,
    pub precision: EntropyPrecision,
    /// Upper bound for `n_couples`; larger requests are clamped.
    pub max_couples: u32,
    /// Zero the lane memories while emitting them.
    pub end_reset: bool,
}

impl Default for MiConfig {
    fn default() -> Self {
        Self {
            dimension: 512,
            partitions: 16,
            entropy_pe: 1,
            stream_depth: DEFAULT_STREAM_DEPTH,
            precision: EntropyPrecision::Float,
            max_couples: N_COUPLES_MAX,
            end_reset: true,
        }
    }
}

impl MiConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config: Self = common::serde::load_file(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(Error::InvalidConfig(message));

        if !SUPPORTED_PARTITIONS.contains(&self.partitions) {
            return invalid(format!(
                "partitions must be one of {SUPPORTED_PARTITIONS:?}, got {}",
                self.partitions
            ));
        }
        if self.dimension == 0 || (self.dimension * self.dimension) % self.partitions != 0 {
            return invalid(format!(
                "dimension {} squared is not a multiple of {} partitions",
                self.dimension, self.partitions
            ));
        }
        if !self.entropy_pe.is_power_of_two() || BINS % self.entropy_pe != 0 {
            return invalid(format!(
                "entropy_pe must be a power of two dividing {BINS}, got {}",
                self.entropy_pe
            ));
        }
        if self.stream_depth == 0 {
            return invalid("stream_depth must be at least 1".to_string());
        }
        if self.max_couples == 0 || self.max_couples > N_COUPLES_MAX {
            return invalid(format!(
                "max_couples must be within 1..={N_COUPLES_MAX}, got {}",
                self.max_couples
            ));
        }
        if self.hist_bits() > MAX_CELL_BITS {
            return invalid(format!(
                "histogram cells need {} bits, at most {MAX_CELL_BITS} supported",
                self.hist_bits()
            ));
        }
        for (name, layout) in [
            ("sample", self.sample_layout()),
            ("lane histogram", self.lane_layout()),
            ("histogram", self.hist_layout()),
        ] {
            if !layout.fits() {
                return invalid(format!(
                    "{name} word needs {} bits, exceeds one packed word",
                    layout.total_bits()
                ));
            }
        }

        Ok(())
    }

    /// Packed sample words per slice.
    pub fn words_per_slice(&self) -> usize {
        self.dimension * self.dimension / self.partitions
    }

    /// Bits needed to count every sample of a full-depth volume.
    pub fn hist_bits(&self) -> usize {
        let max_count = (self.dimension * self.dimension) as u64 * self.max_couples as u64;
        (u64::BITS - max_count.leading_zeros()) as usize
    }

    /// Bits needed by a single partition, which sees `1/partitions` of the samples.
    pub fn lane_hist_bits(&self) -> usize {
        self.hist_bits()
            .saturating_sub(self.partitions.trailing_zeros() as usize)
    }

    pub fn sample_layout(&self) -> PackLayout {
        PackLayout::new(SAMPLE_BITS, self.partitions)
    }

    pub fn lane_layout(&self) -> PackLayout {
        PackLayout::new(self.lane_hist_bits(), self.entropy_pe)
    }

    pub fn hist_layout(&self) -> PackLayout {
        PackLayout::new(self.hist_bits(), self.entropy_pe)
    }

    pub fn joint_words(&self) -> usize {
        JOINT_BINS / self.entropy_pe
    }

    pub fn marginal_words(&self) -> usize {
        BINS / self.entropy_pe
    }

    pub fn clamp_couples(&self, n_couples: u32) -> u32 {
        n_couples.min(self.max_couples)
    }

    /// Zero slices appended so the depth is a multiple of `partitions`.
    pub fn padding(&self, n_couples: u32) -> u32 {
        let partitions = self.partitions as u32;
        (partitions - n_couples % partitions) % partitions
    }
}
