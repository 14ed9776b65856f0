//! The streaming mutual-information dataflow.
//!
//! ```text
//! reference -> split -+-> lane 0 -+
//! floating  -> split -+-> lane P -+-> reduce -> broadcast -+-> entropy(joint) ------+
//!                                                          +-> row -> entropy(row) -+-> combine -> MI
//!                                                          +-> col -> entropy(col) -+
//! ```
//!
//! Every stage is a tokio task and every arrow a bounded stream, so all stages
//! run concurrently and a slow stage throttles everything upstream of it.

use common::PackedWord;
use tracing::{debug, warn};

use crate::combine::compute_mutual_information;
use crate::config::{MiConfig, JOINT_ENTROPY_THRESHOLD, MARGINAL_ENTROPY_THRESHOLD};
use crate::entropy::EntropyStage;
use crate::error::{Error, Result};
use crate::histogram::{histogram_lane, JointHistogram, LaneOutput};
use crate::marginal::{hist_col, hist_row};
use crate::reduce::sum_joint_histogram;
use crate::stage::{root_cause, StageSet};
use crate::stream::{stream, stream_bank, StreamReader, StreamWriter};
use crate::unpack::{broadcast, drain, split_stream};
use crate::Bin;


/// Owns the per-partition histogram memories, which persist across runs.
#[derive(Debug)]
pub struct Pipeline {
    config: MiConfig,
    lanes: Vec<JointHistogram>,
    /// Samples held by the lane memories.
    pending_samples: u64,
}

fn fresh_lanes(partitions: usize) -> Vec<JointHistogram> {
    (0..partitions).map(|_| JointHistogram::new()).collect()
}

impl Pipeline {
    pub fn new(config: MiConfig) -> Result<Self> {
        config.validate()?;
        let lanes = fresh_lanes(config.partitions);

        Ok(Self {
            config,
            lanes,
            pending_samples: 0,
        })
    }

    pub fn config(&self) -> &MiConfig {
        &self.config
    }

    pub fn lanes(&self) -> &[JointHistogram] {
        &self.lanes
    }

    pub fn pending_samples(&self) -> u64 {
        self.pending_samples
    }

    pub fn reset(&mut self) {
        self.lanes.iter_mut().for_each(JointHistogram::clear);
        self.pending_samples = 0;
    }

    /// Packed words per input stream and samples they carry for `n_couples` slices.
    fn stream_size(&self, n_couples: u32) -> (usize, u64) {
        let words = self.config.words_per_slice() * n_couples as usize;
        (words, (words * self.config.partitions) as u64)
    }

    /// Runs the full dataflow over `n_couples` slices and returns the MI.
    ///
    /// Both streams must carry `words_per_slice * n_couples` packed words.
    /// Counts left in the lanes by [`accumulate`](Self::accumulate) or by runs
    /// without `end_reset` are part of the histogram.
    pub async fn compute(
        &mut self,
        reference: StreamReader<PackedWord>,
        floating: StreamReader<PackedWord>,
        n_couples: u32,
    ) -> Result<f32> {
        let (words, samples) = self.stream_size(n_couples);
        let total = self.pending_samples + samples;
        let depth = self.config.stream_depth;
        let layout = self.config.hist_layout();
        let joint_words = self.config.joint_words();
        let marginal_words = self.config.marginal_words();
        debug!(n_couples, words, total, "compute");

        let mut stages = StageSet::new();
        let (lanes, mut joint) = self.spawn_histogram(&mut stages, reference, floating, words);

        let (to_joint_w, to_joint) = stream("joint copy", depth);
        let (to_row_w, mut to_row) = stream("row copy", depth);
        let (to_col_w, mut to_col) = stream("col copy", depth);
        stages.spawn("broadcast", async move {
            broadcast(&mut joint, &[to_joint_w, to_row_w, to_col_w], joint_words).await
        });

        let (row_w, row) = stream("row marginal", depth);
        let (col_w, col) = stream("col marginal", depth);
        stages.spawn("hist row", async move { hist_row(&mut to_row, &row_w, layout).await });
        stages.spawn("hist col", async move { hist_col(&mut to_col, &col_w, layout).await });

        let precision = self.config.precision;
        let entropy = |threshold: f64, words: usize| EntropyStage {
            precision,
            total,
            threshold,
            layout,
            words,
            depth,
        };
        let (joint_h_w, mut joint_h) = stream("joint entropy", depth);
        let (row_h_w, mut row_h) = stream("row entropy", depth);
        let (col_h_w, mut col_h) = stream("col entropy", depth);
        stages.spawn(
            "joint entropy",
            entropy(JOINT_ENTROPY_THRESHOLD, joint_words).run(to_joint, joint_h_w),
        );
        stages.spawn(
            "row entropy",
            entropy(MARGINAL_ENTROPY_THRESHOLD, marginal_words).run(row, row_h_w),
        );
        stages.spawn(
            "col entropy",
            entropy(MARGINAL_ENTROPY_THRESHOLD, marginal_words).run(col, col_h_w),
        );

        let (mi_w, mut mi_r) = stream("mutual information", depth);
        stages.spawn("combine", async move {
            compute_mutual_information(&mut row_h, &mut col_h, &mut joint_h, &mi_w).await
        });

        let mi = mi_r.read().await;
        let lanes = lanes.join().await;
        let rest = stages.join().await.map(|_| ());
        let mi = self.settle(lanes, rest, mi, total, true)?;

        debug!(mi, "compute finished");
        Ok(mi)
    }

    /// Feeds `n_couples` slices into the lane memories without emitting anything.
    pub async fn accumulate(
        &mut self,
        reference: StreamReader<PackedWord>,
        floating: StreamReader<PackedWord>,
        n_couples: u32,
    ) -> Result<()> {
        let (words, samples) = self.stream_size(n_couples);
        let total = self.pending_samples + samples;
        debug!(n_couples, words, total, "accumulate");

        let mut stages = StageSet::new();
        let lanes = self.spawn_lanes(&mut stages, reference, floating, words, None);

        let lanes = lanes.join().await;
        let rest = stages.join().await.map(|_| ());
        self.settle(lanes, rest, Ok(()), total, false)
    }

    /// Runs split, lanes and reducer only and collects the merged histogram.
    pub async fn joint_histogram(
        &mut self,
        reference: StreamReader<PackedWord>,
        floating: StreamReader<PackedWord>,
        n_couples: u32,
    ) -> Result<JointHistogram> {
        let (words, samples) = self.stream_size(n_couples);
        let total = self.pending_samples + samples;
        let layout = self.config.hist_layout();
        let joint_words = self.config.joint_words();

        let mut stages = StageSet::new();
        let (lanes, mut joint) = self.spawn_histogram(&mut stages, reference, floating, words);

        let cells = drain(&mut joint, joint_words).await.map(|words| {
            words
                .into_iter()
                .flat_map(|word| layout.unpack(word))
                .map(|count| count as u32)
                .collect::<Vec<_>>()
        });
        let lanes = lanes.join().await;
        let rest = stages.join().await.map(|_| ());
        let cells = self.settle(lanes, rest, cells, total, true)?;

        Ok(JointHistogram::from_cells(cells))
    }

    /// Spawns the splitters and one task per lane. Lane memories leave `self`
    /// until [`settle`](Self::settle) puts them back.
    fn spawn_lanes(
        &mut self,
        stages: &mut StageSet,
        mut reference: StreamReader<PackedWord>,
        mut floating: StreamReader<PackedWord>,
        words: usize,
        outputs: Option<Vec<StreamWriter<PackedWord>>>,
    ) -> StageSet<JointHistogram> {
        let partitions = self.config.partitions;
        let depth = self.config.stream_depth;
        let sample_layout = self.config.sample_layout();
        let lane_layout = self.config.lane_layout();
        let end_reset = self.config.end_reset;

        let (ref_writers, ref_readers) = stream_bank::<Bin>("reference lane", partitions, depth);
        let (flt_writers, flt_readers) = stream_bank::<Bin>("floating lane", partitions, depth);
        stages.spawn("split reference", async move {
            split_stream(&mut reference, &ref_writers, sample_layout, words).await
        });
        stages.spawn("split floating", async move {
            split_stream(&mut floating, &flt_writers, sample_layout, words).await
        });

        // an interrupted run may have left the memories elsewhere
        let memories = if self.lanes.len() == partitions {
            std::mem::take(&mut self.lanes)
        } else {
            self.pending_samples = 0;
            fresh_lanes(partitions)
        };

        let mut outputs = outputs.map(Vec::into_iter);
        let mut lanes = StageSet::new();
        for (lane, ((memory, reference), floating)) in memories
            .into_iter()
            .zip(ref_readers)
            .zip(flt_readers)
            .enumerate()
        {
            let output = outputs
                .as_mut()
                .and_then(Iterator::next)
                .map(|stream| LaneOutput {
                    stream,
                    layout: lane_layout,
                    end_reset,
                });
            lanes.spawn(
                format!("histogram lane {lane}"),
                histogram_lane(lane, memory, reference, floating, words, output),
            );
        }
        lanes
    }

    /// Lanes plus the reducer; returns the merged joint histogram stream.
    fn spawn_histogram(
        &mut self,
        stages: &mut StageSet,
        reference: StreamReader<PackedWord>,
        floating: StreamReader<PackedWord>,
        words: usize,
    ) -> (StageSet<JointHistogram>, StreamReader<PackedWord>) {
        let depth = self.config.stream_depth;
        let lane_layout = self.config.lane_layout();
        let hist_layout = self.config.hist_layout();
        let joint_words = self.config.joint_words();

        let (lane_writers, mut lane_readers) =
            stream_bank::<PackedWord>("lane histogram", self.config.partitions, depth);
        let lanes = self.spawn_lanes(stages, reference, floating, words, Some(lane_writers));

        let (joint_w, joint_r) = stream("joint histogram", depth);
        stages.spawn("reduce", async move {
            sum_joint_histogram(&mut lane_readers, lane_layout, &joint_w, hist_layout, joint_words)
                .await
        });

        (lanes, joint_r)
    }

    /// Returns lane memories after a run. Any failure discards them, since a
    /// failed lane never hands its memory back.
    fn settle<T>(
        &mut self,
        lanes: Result<Vec<JointHistogram>>,
        rest: Result<()>,
        value: Result<T>,
        total: u64,
        emitted: bool,
    ) -> Result<T> {
        match (lanes, rest, value) {
            (Ok(lanes), Ok(()), Ok(value)) => {
                self.lanes = lanes;
                self.pending_samples = if emitted && self.config.end_reset {
                    0
                } else {
                    total
                };
                Ok(value)
            }
            (lanes, rest, value) => {
                self.lanes = fresh_lanes(self.config.partitions);
                self.pending_samples = 0;

                let err = root_cause([lanes.err(), rest.err(), value.err()].into_iter().flatten())
                    .unwrap_or_else(|| Error::StageFailed {
                        stage: "pipeline".to_string(),
                        message: "run aborted".to_string(),
                    });
                warn!("pipeline run failed, histogram memories cleared: {err}");
                Err(err)
            }
        }
    }
}
