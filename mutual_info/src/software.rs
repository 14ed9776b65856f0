//! Direct software computation of mutual information, used to verify the
//! streaming pipeline.

use rayon::prelude::*;

use crate::config::{JOINT_ENTROPY_THRESHOLD, MARGINAL_ENTROPY_THRESHOLD};
use crate::histogram::JointHistogram;
use crate::Bin;

const CHUNK_SAMPLES: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftwareMi {
    pub joint_entropy: f64,
    pub reference_entropy: f64,
    pub floating_entropy: f64,
    pub mutual_information: f64,
}

/// Tallies the joint histogram of two equally long sample sequences.
pub fn joint_histogram(reference: &[Bin], floating: &[Bin]) -> JointHistogram {
    debug_assert_eq!(reference.len(), floating.len());

    reference
        .par_chunks(CHUNK_SAMPLES)
        .zip(floating.par_chunks(CHUNK_SAMPLES))
        .fold(JointHistogram::new, |mut histogram, (r, f)| {
            for (&reference, &floating) in r.iter().zip(f) {
                histogram.increment(reference, floating);
            }
            histogram
        })
        .reduce(JointHistogram::new, |mut a, b| {
            a.merge(&b);
            a
        })
}

/// `-sum(p * log2 p)` over bins whose probability exceeds `threshold`.
pub fn shannon_entropy<I: IntoIterator<Item = u64>>(counts: I, total: u64, threshold: f64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    counts
        .into_iter()
        .map(|count| count as f64 / total)
        .filter(|&p| p > threshold)
        .map(|p| -p * p.log2())
        .sum()
}

pub fn software_mi(reference: &[Bin], floating: &[Bin]) -> SoftwareMi {
    let histogram = joint_histogram(reference, floating);
    let total = histogram.total();

    let joint_entropy = shannon_entropy(
        histogram.cells().iter().map(|&c| c as u64),
        total,
        JOINT_ENTROPY_THRESHOLD,
    );
    let reference_entropy =
        shannon_entropy(histogram.row_marginal(), total, MARGINAL_ENTROPY_THRESHOLD);
    let floating_entropy =
        shannon_entropy(histogram.col_marginal(), total, MARGINAL_ENTROPY_THRESHOLD);

    SoftwareMi {
        joint_entropy,
        reference_entropy,
        floating_entropy,
        mutual_information: reference_entropy + floating_entropy - joint_entropy,
    }
}
