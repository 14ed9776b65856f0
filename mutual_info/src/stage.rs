//! Concurrent execution of pipeline stages.

use std::collections::HashMap;
use std::future::Future;

use tokio::task::{Id, JoinSet};
use tracing::debug;

use crate::error::{Error, Result};

/// A set of named stages running as tokio tasks.
///
/// [`StageSet::join`] waits for every stage and returns their outputs in
/// spawn order, or the most relevant failure.
#[derive(Debug)]
pub struct StageSet<T = ()> {
    tasks: JoinSet<Result<T>>,
    names: HashMap<Id, (usize, String)>,
}

impl<T: Send + 'static> Default for StageSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> StageSet<T> {
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            names: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn spawn<F>(&mut self, name: impl Into<String>, stage: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let index = self.names.len();
        let handle = self.tasks.spawn(stage);
        self.names.insert(handle.id(), (index, name.into()));
    }

    pub async fn join(mut self) -> Result<Vec<T>> {
        let mut outputs: Vec<Option<T>> = (0..self.names.len()).map(|_| None).collect();
        let mut failures = Vec::new();

        while let Some(joined) = self.tasks.join_next_with_id().await {
            match joined {
                Ok((id, Ok(value))) => {
                    if let Some((index, _)) = self.names.get(&id) {
                        outputs[*index] = Some(value);
                    }
                }
                Ok((id, Err(err))) => {
                    debug!(stage = self.stage_name(id), "stage failed: {err}");
                    failures.push(err);
                }
                Err(join_error) => {
                    let stage = self.stage_name(join_error.id()).to_string();
                    failures.push(Error::StageFailed {
                        stage,
                        message: join_error.to_string(),
                    });
                }
            }
        }

        if let Some(err) = root_cause(failures) {
            return Err(err);
        }
        Ok(outputs.into_iter().flatten().collect())
    }

    fn stage_name(&self, id: Id) -> &str {
        self.names
            .get(&id)
            .map(|(_, name)| name.as_str())
            .unwrap_or("unknown")
    }
}

/// Picks the error that most likely caused the others.
///
/// Prefers the first error that is not a closed stream, since a failing stage
/// closes its channels and every neighbour then reports `StreamClosed`.
pub fn root_cause<I: IntoIterator<Item = Error>>(errors: I) -> Option<Error> {
    let mut first = None;
    for err in errors {
        if !err.is_stream_closed() {
            return Some(err);
        }
        first.get_or_insert(err);
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::stream;

    #[tokio::test]
    async fn outputs_follow_spawn_order() -> anyhow::Result<()> {
        let mut stages = StageSet::new();
        for idx in 0..8u32 {
            stages.spawn(format!("stage {idx}"), async move {
                tokio::task::yield_now().await;
                Ok(idx * 10)
            });
        }

        assert_eq!(stages.len(), 8);
        assert_eq!(stages.join().await?, (0..8).map(|i| i * 10).collect::<Vec<_>>());
        Ok(())
    }

    #[tokio::test]
    async fn reports_root_cause_over_closed_streams() {
        let (writer, mut reader) = stream::<u32>("link", 2);
        let mut stages = StageSet::new();
        stages.spawn("consumer", async move {
            reader.read().await?;
            Ok(())
        });
        stages.spawn("producer", async move {
            drop(writer);
            Err(Error::InvalidConfig("boom".to_string()))
        });

        assert_eq!(
            stages.join().await,
            Err(Error::InvalidConfig("boom".to_string()))
        );
    }

    #[tokio::test]
    async fn panicking_stage_is_named() {
        let mut stages: StageSet<()> = StageSet::new();
        stages.spawn("exploder", async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        });

        match stages.join().await {
            Err(Error::StageFailed { stage, .. }) => assert_eq!(stage, "exploder"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn root_cause_falls_back_to_first_closed_stream() {
        let closed = |name: &str| Error::StreamClosed {
            stream: name.to_string(),
        };
        assert_eq!(root_cause(Vec::new()), None);
        assert_eq!(
            root_cause([closed("a"), closed("b")]),
            Some(closed("a"))
        );
        assert_eq!(
            root_cause([closed("a"), Error::ReferenceNotLoaded]),
            Some(Error::ReferenceNotLoaded)
        );
    }
}
