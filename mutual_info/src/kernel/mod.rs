//! Top-level invocation contract.
//!
//! Two variants exist. The streaming variant receives the floating volume as a
//! stream and the reference volume as a memory buffer on every call. The
//! caching variant keeps the reference volume after a `LoadReference` request
//! and processes the floating volume slice by slice on `Compute`.

use std::sync::Arc;

use common::PackedWord;
use strum_macros::FromRepr;
use tracing::{info, warn};

use crate::config::MiConfig;
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::stage::root_cause;
use crate::stream::StreamReader;
use crate::unpack::spawn_feed;

/// Raw mode selector of the caching variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u32)]
pub enum Functionality {
    LoadImage = 0,
    Compute = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'a> {
    LoadReference(&'a [PackedWord]),
    Compute {
        floating: &'a [PackedWord],
        n_couples: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Success = 1,
    InvalidMode = -1,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Response {
    pub status: Status,
    pub mutual_info: f32,
}

impl Response {
    fn success(mutual_info: f32) -> Self {
        Self {
            status: Status::Success,
            mutual_info,
        }
    }
}

#[derive(Debug)]
pub struct MutualInfoKernel {
    pipeline: Pipeline,
    reference: Option<Arc<[PackedWord]>>,
}

impl MutualInfoKernel {
    pub fn new(config: MiConfig) -> Result<Self> {
        Ok(Self {
            pipeline: Pipeline::new(config)?,
            reference: None,
        })
    }

    pub fn config(&self) -> &MiConfig {
        self.pipeline.config()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn clamp_couples(&self, n_couples: u32) -> u32 {
        let clamped = self.config().clamp_couples(n_couples);
        if clamped != n_couples {
            warn!(requested = n_couples, clamped, "n_couples clamped");
        }
        clamped
    }

    /// Streaming variant: one MI per call.
    ///
    /// `n_couples` is clamped to `max_couples`. `reference` must hold at least
    /// `words_per_slice * n_couples` words; the floating stream must carry
    /// exactly that many.
    pub async fn run(
        &mut self,
        floating: StreamReader<PackedWord>,
        reference: &[PackedWord],
        n_couples: u32,
    ) -> Result<f32> {
        let n_couples = self.clamp_couples(n_couples);
        let words = self.config().words_per_slice() * n_couples as usize;
        let reference = reference
            .get(..words)
            .ok_or_else(|| Error::InputTooShort {
                input: "reference".to_string(),
                needed: words,
                available: reference.len(),
            })?;

        let (feed, reference) =
            spawn_feed("reference", reference.to_vec(), self.config().stream_depth);
        let mi = self.pipeline.compute(reference, floating, n_couples).await;
        let fed = join_feed(feed).await;

        let mi = match (mi, fed) {
            (Ok(mi), Ok(())) => mi,
            (mi, fed) => return Err(first_failure([mi.err(), fed.err()])),
        };
        info!(n_couples, mi, "mutual information computed");
        Ok(mi)
    }

    pub async fn handle(&mut self, request: Request<'_>) -> Result<Response> {
        match request {
            Request::LoadReference(words) => {
                self.reference = Some(Arc::from(words));
                info!(words = words.len(), "reference volume loaded");
                Ok(Response::success(0.0))
            }
            Request::Compute {
                floating,
                n_couples,
            } => {
                let mi = self.compute_cached(floating, n_couples).await?;
                Ok(Response::success(mi))
            }
        }
    }

    /// Caching variant addressed with a raw mode selector.
    /// Unknown modes answer [`Status::InvalidMode`] with MI 0.
    pub async fn handle_raw(
        &mut self,
        functionality: u32,
        image: &[PackedWord],
        n_couples: u32,
    ) -> Result<Response> {
        match Functionality::from_repr(functionality) {
            Some(Functionality::LoadImage) => self.handle(Request::LoadReference(image)).await,
            Some(Functionality::Compute) => {
                self.handle(Request::Compute {
                    floating: image,
                    n_couples,
                })
                .await
            }
            None => {
                warn!(functionality, "unknown functionality");
                Ok(Response {
                    status: Status::InvalidMode,
                    mutual_info: 0.0,
                })
            }
        }
    }

    /// Runs the pipeline once per slice; lanes keep accumulating until the
    /// last slice, which emits the histogram and resets them.
    async fn compute_cached(&mut self, floating: &[PackedWord], n_couples: u32) -> Result<f32> {
        let reference = self.reference.clone().ok_or(Error::ReferenceNotLoaded)?;
        let n_couples = self.clamp_couples(n_couples);
        let slice_words = self.config().words_per_slice();
        let depth = self.config().stream_depth;
        let words = slice_words * n_couples as usize;

        for (input, available) in [("reference", reference.len()), ("floating", floating.len())] {
            if available < words {
                return Err(Error::InputTooShort {
                    input: input.to_string(),
                    needed: words,
                    available,
                });
            }
        }
        let floating: Arc<[PackedWord]> = Arc::from(&floating[..words]);

        let last = n_couples.saturating_sub(1);
        for slice in 0..n_couples {
            let range = slice as usize * slice_words..(slice as usize + 1) * slice_words;
            let (ref_feed, ref_stream) = spawn_slice("reference", &reference, range.clone(), depth);
            let (flt_feed, flt_stream) = spawn_slice("floating", &floating, range, depth);

            let outcome = if slice == last {
                self.pipeline.compute(ref_stream, flt_stream, 1).await
            } else {
                self.pipeline.accumulate(ref_stream, flt_stream, 1).await.map(|()| 0.0)
            };
            let ref_fed = join_feed(ref_feed).await;
            let flt_fed = join_feed(flt_feed).await;

            match (outcome, ref_fed, flt_fed) {
                (Ok(mi), Ok(()), Ok(())) if slice == last => {
                    info!(n_couples, mi, "mutual information computed from cached reference");
                    return Ok(mi);
                }
                (Ok(_), Ok(()), Ok(())) => {}
                (outcome, ref_fed, flt_fed) => {
                    return Err(first_failure([outcome.err(), ref_fed.err(), flt_fed.err()]))
                }
            }
        }

        // zero slices: emit whatever the lanes hold, nothing for a fresh pipeline
        let (_, reference) = spawn_feed("reference", Vec::new(), depth);
        let (_, floating) = spawn_feed("floating", Vec::new(), depth);
        self.pipeline.compute(reference, floating, 0).await
    }
}

fn spawn_slice(
    name: &str,
    words: &Arc<[PackedWord]>,
    range: std::ops::Range<usize>,
    depth: usize,
) -> (
    tokio::task::JoinHandle<Result<()>>,
    StreamReader<PackedWord>,
) {
    let words = Arc::clone(words);
    spawn_feed(name, range.map(move |idx| words[idx]), depth)
}

async fn join_feed(feed: tokio::task::JoinHandle<Result<()>>) -> Result<()> {
    feed.await.map_err(|e| Error::StageFailed {
        stage: "feed".to_string(),
        message: e.to_string(),
    })?
}

fn first_failure<const N: usize>(errors: [Option<Error>; N]) -> Error {
    root_cause(errors.into_iter().flatten()).unwrap_or_else(|| Error::StageFailed {
        stage: "kernel".to_string(),
        message: "run aborted".to_string(),
    })
}

#[cfg(test)]
mod tests;
