//! Chains stages into a linear pipeline.
//!
//! Every stage owns the sending half of its output stream. When the stage's
//! `run` returns the sender is dropped, which closes the stream and is the
//! only end-of-data signal the next stage sees.

use std::{future::Future, marker::PhantomData};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("stage `{stage}` panicked")]
    StagePanicked { stage: &'static str },
    #[error("stage `{stage}` was aborted")]
    StageAborted { stage: &'static str },
    #[error("invalid pipeline settings: {0}")]
    InvalidSettings(&'static str),
}

#[async_trait]
pub trait Stage: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn name(&self) -> &'static str;

    /// Consumes `input` until it is exhausted. Must not return before every
    /// task it spawned has stopped writing to `output`.
    async fn run(self, input: mpsc::Receiver<Self::Input>, output: mpsc::Sender<Self::Output>);
}

/// A stage built from a closure.
pub struct FnStage<I, O, F> {
    name: &'static str,
    f: F,
    _marker: PhantomData<fn(I) -> O>,
}

pub fn stage_fn<I, O, F, Fut>(name: &'static str, f: F) -> FnStage<I, O, F>
where
    F: FnOnce(mpsc::Receiver<I>, mpsc::Sender<O>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    FnStage {
        name,
        f,
        _marker: PhantomData,
    }
}

#[async_trait]
impl<I, O, F, Fut> Stage for FnStage<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnOnce(mpsc::Receiver<I>, mpsc::Sender<O>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    type Input = I;
    type Output = O;

    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(self, input: mpsc::Receiver<I>, output: mpsc::Sender<O>) {
        (self.f)(input, output).await
    }
}

/// A pipeline under construction whose current tail produces `T`.
pub struct Pipeline<T> {
    stages: Vec<(&'static str, JoinHandle<()>)>,
    stream: mpsc::Receiver<T>,
    capacity: usize,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Seeds the first stream from `items` on a dedicated source task.
    pub fn from_items<I>(items: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let items = items.into_iter();
        let source = tokio::spawn(async move {
            for item in items {
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });
        Self {
            stages: vec![("source", source)],
            stream: rx,
            capacity,
        }
    }

    /// Spawns `stage` reading from the current tail.
    pub fn then<S>(self, stage: S) -> Pipeline<S::Output>
    where
        S: Stage<Input = T>,
    {
        let Pipeline {
            mut stages,
            stream,
            capacity,
        } = self;
        let (tx, rx) = mpsc::channel(capacity);
        let name = stage.name();
        let handle = tokio::spawn(async move {
            tracing::debug!(target: "pipeline", stage = name, "stage started");
            stage.run(stream, tx).await;
            tracing::debug!(target: "pipeline", stage = name, "stage closed");
        });
        stages.push((name, handle));
        Pipeline {
            stages,
            stream: rx,
            capacity,
        }
    }

    /// Hands out the final stream and a handle that waits for every stage.
    pub fn into_stream(self) -> (mpsc::Receiver<T>, Completion) {
        (
            self.stream,
            Completion {
                stages: self.stages,
            },
        )
    }

    /// Drains the final stream, then waits for every stage to finish.
    pub async fn collect(self) -> Result<Vec<T>, PipelineError> {
        let (mut stream, completion) = self.into_stream();
        let mut items = Vec::new();
        while let Some(item) = stream.recv().await {
            items.push(item);
        }
        completion.wait().await?;
        Ok(items)
    }
}

#[must_use = "stages keep running until the completion is awaited"]
pub struct Completion {
    stages: Vec<(&'static str, JoinHandle<()>)>,
}

impl Completion {
    /// Waits for all stages; reports the first one that did not finish cleanly.
    pub async fn wait(self) -> Result<(), PipelineError> {
        let mut first_error = None;
        for (stage, handle) in self.stages {
            if let Err(err) = handle.await {
                let error = if err.is_panic() {
                    tracing::error!(target: "pipeline", stage, "stage panicked");
                    PipelineError::StagePanicked { stage }
                } else {
                    PipelineError::StageAborted { stage }
                };
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Cancels every stage still running. A later `wait` reports the first
    /// cancelled stage as `StageAborted`.
    pub fn abort(&self) {
        for (_, handle) in &self.stages {
            handle.abort();
        }
    }
}
