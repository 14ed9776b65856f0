use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("stream `{stream}` closed before the transfer completed")]
    StreamClosed { stream: String },
    #[error("stage `{stage}` failed: {message}")]
    StageFailed { stage: String, message: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("no reference volume loaded")]
    ReferenceNotLoaded,
    #[error("{input} holds {available} words, {needed} required")]
    InputTooShort {
        input: String,
        needed: usize,
        available: usize,
    },
}

impl Error {
    /// Closed streams are usually a consequence of another stage failing.
    pub fn is_stream_closed(&self) -> bool {
        matches!(self, Self::StreamClosed { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
