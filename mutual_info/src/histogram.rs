//! Joint histogram memories and the per-partition accumulation stage.

use common::{PackLayout, PackedWord};
use tracing::trace;

use crate::config::{BINS, JOINT_BINS};
use crate::error::Result;
use crate::stream::{StreamReader, StreamWriter};
use crate::Bin;

/// 256x256 table of pair counts, row = reference bin, column = floating bin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointHistogram {
    cells: Vec<u32>,
}

impl Default for JointHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl JointHistogram {
    pub fn new() -> Self {
        Self {
            cells: vec![0; JOINT_BINS],
        }
    }

    /// Row-major cells, as produced by [`JointHistogram::cells`].
    pub fn from_cells(cells: Vec<u32>) -> Self {
        debug_assert_eq!(cells.len(), JOINT_BINS);
        Self { cells }
    }

    /// Direct tally, one memory update per pair.
    pub fn from_pairs<I: IntoIterator<Item = (Bin, Bin)>>(pairs: I) -> Self {
        let mut histogram = Self::new();
        for (reference, floating) in pairs {
            histogram.increment(reference, floating);
        }
        histogram
    }

    #[inline]
    fn index(reference: Bin, floating: Bin) -> usize {
        reference as usize * BINS + floating as usize
    }

    #[inline]
    pub fn get(&self, reference: Bin, floating: Bin) -> u32 {
        self.cells[Self::index(reference, floating)]
    }

    #[inline]
    pub fn set(&mut self, reference: Bin, floating: Bin, count: u32) {
        self.cells[Self::index(reference, floating)] = count;
    }

    #[inline]
    pub fn increment(&mut self, reference: Bin, floating: Bin) {
        let cell = &mut self.cells[Self::index(reference, floating)];
        *cell = cell.wrapping_add(1);
    }

    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    pub fn total(&self) -> u64 {
        self.cells.iter().map(|&c| c as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|&c| c == 0)
    }

    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    pub fn merge(&mut self, other: &JointHistogram) {
        for (cell, &count) in self.cells.iter_mut().zip(&other.cells) {
            *cell = cell.wrapping_add(count);
        }
    }

    /// Reference-intensity marginal.
    pub fn row_marginal(&self) -> Vec<u64> {
        self.cells
            .chunks(BINS)
            .map(|row| row.iter().map(|&c| c as u64).sum())
            .collect()
    }

    /// Floating-intensity marginal.
    pub fn col_marginal(&self) -> Vec<u64> {
        let mut columns = vec![0u64; BINS];
        for row in self.cells.chunks(BINS) {
            for (column, &count) in columns.iter_mut().zip(row) {
                *column += count as u64;
            }
        }
        columns
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    reference: Bin,
    floating: Bin,
    count: u32,
}

/// Run-length compressed histogram updates.
///
/// Consecutive equal pairs only bump a register; memory is read and written
/// when the pair changes and once more on [`flush`](Self::flush). The register
/// starts empty, so a first pair of `(0, 0)` is counted like any other pair
/// and nothing is written back before data arrives.
#[derive(Debug, Default)]
pub struct RunLengthAccumulator {
    run: Option<Run>,
}

impl RunLengthAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, memory: &mut JointHistogram, reference: Bin, floating: Bin) {
        if let Some(run) = self.run.as_mut() {
            if run.reference == reference && run.floating == floating {
                run.count = run.count.wrapping_add(1);
                return;
            }
        }

        self.flush(memory);
        self.run = Some(Run {
            reference,
            floating,
            count: memory.get(reference, floating).wrapping_add(1),
        });
    }

    /// Writes the pending run back to memory.
    pub fn flush(&mut self, memory: &mut JointHistogram) {
        if let Some(run) = self.run.take() {
            memory.set(run.reference, run.floating, run.count);
        }
    }
}

/// Consumes exactly `samples` pairs from the two lanes into `memory`.
pub async fn accumulate(
    memory: &mut JointHistogram,
    reference: &mut StreamReader<Bin>,
    floating: &mut StreamReader<Bin>,
    samples: usize,
) -> Result<()> {
    let mut accumulator = RunLengthAccumulator::new();
    for _ in 0..samples {
        let r = reference.read().await?;
        let f = floating.read().await?;
        accumulator.push(memory, r, f);
    }
    accumulator.flush(memory);
    Ok(())
}

/// Emits the table row-major, `layout.fields` cells per word.
/// With `end_reset` each cell is zeroed as soon as it has been read.
pub async fn write_out(
    memory: &mut JointHistogram,
    output: &StreamWriter<PackedWord>,
    layout: PackLayout,
    end_reset: bool,
) -> Result<()> {
    for chunk in memory.cells.chunks_mut(layout.fields) {
        let word = layout.pack(chunk.iter().map(|&c| c as u64));
        if end_reset {
            chunk.fill(0);
        }
        output.write(word).await?;
    }
    Ok(())
}

/// Where a lane sends its table once accumulation is done.
#[derive(Debug)]
pub struct LaneOutput {
    pub stream: StreamWriter<PackedWord>,
    pub layout: PackLayout,
    pub end_reset: bool,
}

/// One histogram partition: accumulate, then optionally emit.
/// The memory is handed back so it persists across runs.
pub async fn histogram_lane(
    lane: usize,
    mut memory: JointHistogram,
    mut reference: StreamReader<Bin>,
    mut floating: StreamReader<Bin>,
    samples: usize,
    output: Option<LaneOutput>,
) -> Result<JointHistogram> {
    trace!(lane, samples, "accumulating");
    accumulate(&mut memory, &mut reference, &mut floating, samples).await?;

    if let Some(output) = output {
        write_out(&mut memory, &output.stream, output.layout, output.end_reset).await?;
        trace!(lane, "histogram emitted");
    }
    Ok(memory)
}
