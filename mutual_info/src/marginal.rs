//! Row and column projections of the merged joint histogram.

use common::{PackLayout, PackedWord};

use crate::config::BINS;
use crate::error::Result;
use crate::stream::{StreamReader, StreamWriter};

/// Sums every row of the joint stream. Emits `BINS / layout.fields` words.
pub async fn hist_row(
    input: &mut StreamReader<PackedWord>,
    output: &StreamWriter<PackedWord>,
    layout: PackLayout,
) -> Result<()> {
    let words_per_row = BINS / layout.fields;
    let mut pending = Vec::with_capacity(layout.fields);

    for _ in 0..BINS {
        let mut row_sum = 0u64;
        for _ in 0..words_per_row {
            let word = input.read().await?;
            row_sum += layout.unpack(word).sum::<u64>();
        }
        pending.push(row_sum);

        if pending.len() == layout.fields {
            output.write(layout.pack(pending.drain(..))).await?;
        }
    }
    Ok(())
}

/// Sums every column of the joint stream. The column totals are only complete
/// after the last row, so all words are emitted at the end.
pub async fn hist_col(
    input: &mut StreamReader<PackedWord>,
    output: &StreamWriter<PackedWord>,
    layout: PackLayout,
) -> Result<()> {
    let mut columns = vec![0u64; BINS];

    for _ in 0..BINS {
        for chunk in columns.chunks_mut(layout.fields) {
            let word = input.read().await?;
            for (column, value) in chunk.iter_mut().zip(layout.unpack(word)) {
                *column += value;
            }
        }
    }

    for chunk in columns.chunks(layout.fields) {
        output.write(layout.pack(chunk.iter().copied())).await?;
    }
    Ok(())
}
