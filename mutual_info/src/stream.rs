//! Bounded FIFO channels connecting pipeline stages.
//!
//! Writes wait while the channel is full and reads wait while it is empty,
//! so a slow consumer throttles its producer and no element is ever dropped.
//! When either end goes away the other side gets [`Error::StreamClosed`]
//! instead of waiting forever.

use std::sync::Arc;

use tokio::sync::mpsc::{channel, Receiver, Sender};

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct StreamWriter<T> {
    name: Arc<str>,
    tx: Sender<T>,
}

#[derive(Debug)]
pub struct StreamReader<T> {
    name: Arc<str>,
    rx: Receiver<T>,
}

/// Creates a stream holding at most `depth` elements in flight.
pub fn stream<T>(name: impl Into<Arc<str>>, depth: usize) -> (StreamWriter<T>, StreamReader<T>) {
    let name = name.into();
    let (tx, rx) = channel(depth.max(1));
    (
        StreamWriter {
            name: name.clone(),
            tx,
        },
        StreamReader { name, rx },
    )
}

/// Creates `count` independent streams named `name[0]`, `name[1]`, ...
pub fn stream_bank<T>(
    name: &str,
    count: usize,
    depth: usize,
) -> (Vec<StreamWriter<T>>, Vec<StreamReader<T>>) {
    (0..count)
        .map(|idx| stream(format!("{name}[{idx}]"), depth))
        .unzip()
}

impl<T> StreamWriter<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn write(&self, value: T) -> Result<()> {
        self.tx.send(value).await.map_err(|_| Error::StreamClosed {
            stream: self.name.to_string(),
        })
    }
}

impl<T> StreamReader<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn read(&mut self) -> Result<T> {
        self.rx.recv().await.ok_or_else(|| Error::StreamClosed {
            stream: self.name.to_string(),
        })
    }
}
