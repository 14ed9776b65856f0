use common::{PackLayout, PackedWord};

use crate::error::Result;
use crate::stream::{StreamReader, StreamWriter};

/// Merges per-partition histogram streams into one.
///
/// For every output word one word is read from each input and the fields are
/// summed, widening from `input_layout` to `output_layout`.
pub async fn sum_joint_histogram(
    inputs: &mut [StreamReader<PackedWord>],
    input_layout: PackLayout,
    output: &StreamWriter<PackedWord>,
    output_layout: PackLayout,
    words: usize,
) -> Result<()> {
    debug_assert_eq!(input_layout.fields, output_layout.fields);

    let mut sums = vec![0u64; output_layout.fields];
    for _ in 0..words {
        for input in inputs.iter_mut() {
            let word = input.read().await?;
            for (sum, value) in sums.iter_mut().zip(input_layout.unpack(word)) {
                *sum += value;
            }
        }
        output.write(output_layout.pack(sums.iter().copied())).await?;
        sums.fill(0);
    }
    Ok(())
}
