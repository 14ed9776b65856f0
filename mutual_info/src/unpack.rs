//! Stream plumbing: memory to stream, word splitting, fan-out, write-back.

use common::{PackLayout, PackedWord};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::stream::{stream, StreamReader, StreamWriter};

/// Conversion of an extracted packed field into a lane element.
pub trait FromField: Copy + Send + 'static {
    fn from_field(value: u64) -> Self;
}

impl FromField for u8 {
    #[inline]
    fn from_field(value: u64) -> Self {
        value as u8
    }
}

impl FromField for u64 {
    #[inline]
    fn from_field(value: u64) -> Self {
        value
    }
}

/// Writes every element of `words` into `output`, in order.
pub async fn feed_words<T, I>(words: I, output: &StreamWriter<T>) -> Result<()>
where
    I: IntoIterator<Item = T>,
{
    for word in words {
        output.write(word).await?;
    }
    Ok(())
}

/// Spawns a task feeding `words` into a fresh stream and returns its reading end.
pub fn spawn_feed<T, I>(name: &str, words: I, depth: usize) -> (JoinHandle<Result<()>>, StreamReader<T>)
where
    T: Send + 'static,
    I: IntoIterator<Item = T> + Send + 'static,
    I::IntoIter: Send,
{
    let (writer, reader) = stream(name, depth);
    let handle = tokio::spawn(async move { feed_words(words, &writer).await });
    (handle, reader)
}

/// Consumes exactly `count` words; field `j` of each word goes to `outputs[j]`.
pub async fn split_stream<T: FromField>(
    input: &mut StreamReader<PackedWord>,
    outputs: &[StreamWriter<T>],
    layout: PackLayout,
    count: usize,
) -> Result<()> {
    debug_assert_eq!(outputs.len(), layout.fields);

    for _ in 0..count {
        let word = input.read().await?;
        for (field, output) in outputs.iter().enumerate() {
            output.write(T::from_field(layout.get(&word, field))).await?;
        }
    }
    Ok(())
}

/// Copies each of `count` elements to every output.
pub async fn broadcast<T: Clone>(
    input: &mut StreamReader<T>,
    outputs: &[StreamWriter<T>],
    count: usize,
) -> Result<()> {
    for _ in 0..count {
        let value = input.read().await?;
        for output in outputs {
            output.write(value.clone()).await?;
        }
    }
    Ok(())
}

/// Reads exactly `count` elements back into memory.
pub async fn drain<T>(input: &mut StreamReader<T>, count: usize) -> Result<Vec<T>> {
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(input.read().await?);
    }
    Ok(values)
}
