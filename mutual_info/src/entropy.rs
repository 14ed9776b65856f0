//! Shannon entropy of a packed histogram stream.
//!
//! Each packed word is split into `entropy_pe` lanes; every lane accumulates a
//! partial sum over its share of bins, the partials are added and a single
//! entropy value (bits) is written to the output stream.

use std::fmt::Debug;
use std::ops::Add;

use common::{PackLayout, PackedWord};
use tracing::debug;

use crate::config::EntropyPrecision;
use crate::error::Result;
use crate::stage::StageSet;
use crate::stream::{stream_bank, StreamReader, StreamWriter};
use crate::unpack::split_stream;

/// Fractional bits of the fixed-point accumulator.
pub const FIXED_FRACTION_BITS: u32 = 10;

/// Per-bin contribution and final normalization of an entropy computation.
pub trait EntropyKernel: Clone + Send + Sync + 'static {
    type Partial: Copy + Default + Debug + Add<Output = Self::Partial> + Send + Sync + 'static;

    fn term(&self, count: u64) -> Self::Partial;

    fn finish(&self, sum: Self::Partial) -> f32;
}

/// Accumulates `-p * log2(p)` in `f32`, skipping bins with `p <= threshold`.
#[derive(Debug, Clone, Copy)]
pub struct FloatEntropy {
    total: u64,
    threshold: f64,
}

impl FloatEntropy {
    pub fn new(total: u64, threshold: f64) -> Self {
        Self { total, threshold }
    }
}

impl EntropyKernel for FloatEntropy {
    type Partial = f32;

    #[inline]
    fn term(&self, count: u64) -> f32 {
        if count == 0 || self.total == 0 {
            return 0.0;
        }
        let p = count as f32 / self.total as f32;
        if (p as f64) > self.threshold {
            -p * p.log2()
        } else {
            0.0
        }
    }

    fn finish(&self, sum: f32) -> f32 {
        sum
    }
}

/// Accumulates `c * log2(c)` in fixed point; `H = log2(N) - sum / N`.
///
/// Needs no division per bin. Every non-empty bin has `p >= 1/N`, far above
/// the float thresholds, so no bin is skipped.
#[derive(Debug, Clone, Copy)]
pub struct FixedEntropy {
    total: u64,
}

impl FixedEntropy {
    pub fn new(total: u64) -> Self {
        Self { total }
    }
}

impl EntropyKernel for FixedEntropy {
    type Partial = u64;

    #[inline]
    fn term(&self, count: u64) -> u64 {
        if count <= 1 {
            return 0;
        }
        let c = count as f64;
        (c * c.log2() * (1u64 << FIXED_FRACTION_BITS) as f64).round() as u64
    }

    fn finish(&self, sum: u64) -> f32 {
        if self.total == 0 {
            return 0.0;
        }
        let n = self.total as f64;
        let weighted = sum as f64 / (1u64 << FIXED_FRACTION_BITS) as f64;
        (n.log2() - weighted / n).max(0.0) as f32
    }
}

/// Entropy of in-memory counts, same arithmetic as the streaming engine with
/// a single lane.
pub fn entropy_of<K: EntropyKernel, I: IntoIterator<Item = u64>>(kernel: &K, counts: I) -> f32 {
    let sum = counts
        .into_iter()
        .fold(K::Partial::default(), |acc, count| acc + kernel.term(count));
    kernel.finish(sum)
}

/// Parameters of one entropy engine instance.
#[derive(Debug, Clone, Copy)]
pub struct EntropyStage {
    pub precision: EntropyPrecision,
    /// Normalization total, the number of accumulated samples.
    pub total: u64,
    pub threshold: f64,
    pub layout: PackLayout,
    /// Packed words to consume.
    pub words: usize,
    pub depth: usize,
}

impl EntropyStage {
    pub async fn run(
        self,
        input: StreamReader<PackedWord>,
        output: StreamWriter<f32>,
    ) -> Result<()> {
        match self.precision {
            EntropyPrecision::Float => {
                let kernel = FloatEntropy::new(self.total, self.threshold);
                entropy_engine(input, output, self.layout, self.words, kernel, self.depth).await
            }
            EntropyPrecision::Fixed => {
                let kernel = FixedEntropy::new(self.total);
                entropy_engine(input, output, self.layout, self.words, kernel, self.depth).await
            }
        }
    }
}

pub async fn entropy_engine<K: EntropyKernel>(
    mut input: StreamReader<PackedWord>,
    output: StreamWriter<f32>,
    layout: PackLayout,
    words: usize,
    kernel: K,
    depth: usize,
) -> Result<()> {
    let name = input.name().to_string();
    let (lane_writers, lane_readers) = stream_bank::<u64>(&format!("{name}/bins"), layout.fields, depth);
    let (partial_writers, partial_readers) =
        stream_bank::<K::Partial>(&format!("{name}/partial"), layout.fields, depth);

    let mut stages = StageSet::new();
    stages.spawn(format!("{name} split"), async move {
        split_stream(&mut input, &lane_writers, layout, words).await
    });
    for (lane, (bins, partial)) in lane_readers.into_iter().zip(partial_writers).enumerate() {
        stages.spawn(
            format!("{name} entropy lane {lane}"),
            entropy_lane(bins, partial, words, kernel.clone()),
        );
    }
    stages.spawn(format!("{name} entropy sum"), async move {
        let entropy = sum_partials(partial_readers, &kernel).await?;
        debug!(stream = %name, entropy, "entropy computed");
        output.write(entropy).await
    });

    stages.join().await?;
    Ok(())
}

async fn entropy_lane<K: EntropyKernel>(
    mut bins: StreamReader<u64>,
    partial: StreamWriter<K::Partial>,
    count: usize,
    kernel: K,
) -> Result<()> {
    let mut acc = K::Partial::default();
    for _ in 0..count {
        acc = acc + kernel.term(bins.read().await?);
    }
    partial.write(acc).await
}

async fn sum_partials<K: EntropyKernel>(
    mut partials: Vec<StreamReader<K::Partial>>,
    kernel: &K,
) -> Result<f32> {
    let mut sum = K::Partial::default();
    for partial in partials.iter_mut() {
        sum = sum + partial.read().await?;
    }
    Ok(kernel.finish(sum))
}

#[cfg(test)]
mod tests {
    use common::FloatExt;

    use super::*;
    use crate::config::{BINS, JOINT_ENTROPY_THRESHOLD, MARGINAL_ENTROPY_THRESHOLD};
    use crate::stream::stream;
    use crate::unpack::spawn_feed;

    async fn stream_entropy(
        counts: &[u64],
        fields: usize,
        precision: EntropyPrecision,
    ) -> anyhow::Result<f32> {
        let layout = PackLayout::new(20, fields);
        let words: Vec<PackedWord> = counts
            .chunks(fields)
            .map(|chunk| layout.pack(chunk.iter().copied()))
            .collect();
        let stage = EntropyStage {
            precision,
            total: counts.iter().sum(),
            threshold: MARGINAL_ENTROPY_THRESHOLD,
            layout,
            words: words.len(),
            depth: 2,
        };

        let (_feed, input) = spawn_feed("marginal", words, 2);
        let (writer, mut reader) = stream("entropy", 1);
        stage.run(input, writer).await?;
        Ok(reader.read().await?)
    }

    #[test]
    fn uniform_distribution_has_eight_bits() {
        let kernel = FloatEntropy::new(BINS as u64 * 3, MARGINAL_ENTROPY_THRESHOLD);
        let entropy = entropy_of(&kernel, std::iter::repeat(3).take(BINS));
        assert!(entropy.within(8.0, 1e-4), "{entropy}");
    }

    #[test]
    fn single_bin_has_zero_entropy() {
        let counts = [0, 0, 42, 0];
        assert_eq!(entropy_of(&FloatEntropy::new(42, JOINT_ENTROPY_THRESHOLD), counts), 0.0);
        assert!(entropy_of(&FixedEntropy::new(42), counts).within(0.0, 1e-3));
    }

    #[test]
    fn two_equal_bins_have_one_bit() {
        let counts = [8, 0, 8];
        assert_eq!(entropy_of(&FloatEntropy::new(16, MARGINAL_ENTROPY_THRESHOLD), counts), 1.0);
        assert!(entropy_of(&FixedEntropy::new(16), counts).approximately_eq(1.0));
    }

    #[test]
    fn empty_histogram_has_zero_entropy() {
        let counts = [0u64; 8];
        assert_eq!(entropy_of(&FloatEntropy::new(0, JOINT_ENTROPY_THRESHOLD), counts), 0.0);
        assert_eq!(entropy_of(&FixedEntropy::new(0), counts), 0.0);
    }

    #[test]
    fn threshold_skips_negligible_bins() {
        let kernel = FloatEntropy::new(1_000_000, 1e-3);
        // p = 1e-6 is below the threshold
        assert_eq!(kernel.term(1), 0.0);
        assert!(kernel.term(500_000) > 0.0);
    }

    #[tokio::test]
    async fn lane_count_does_not_change_the_result() -> anyhow::Result<()> {
        let counts: Vec<u64> = (0..BINS as u64).map(|i| (i * 37) % 101).collect();
        let reference = stream_entropy(&counts, 1, EntropyPrecision::Float).await?;

        assert!(reference > 0.0 && reference <= 8.0);
        for fields in [2, 4, 8, 16] {
            let entropy = stream_entropy(&counts, fields, EntropyPrecision::Float).await?;
            assert!(entropy.within(reference, 1e-5), "{fields}: {entropy} vs {reference}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn fixed_point_tracks_float() -> anyhow::Result<()> {
        let counts: Vec<u64> = (0..BINS as u64).map(|i| 1 + (i * i) % 977).collect();
        let float = stream_entropy(&counts, 4, EntropyPrecision::Float).await?;
        let fixed = stream_entropy(&counts, 4, EntropyPrecision::Fixed).await?;

        assert!(fixed.within(float, 1e-2), "fixed {fixed} float {float}");
        Ok(())
    }
}
