use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::mpsc;

use crate::{
    domain::{Batch, MessageId, User},
    services::MessageStore,
};

use super::{
    orchestrator::Stage,
    queue::{work_queue, WorkReceiver, WorkSender},
    stats::PipelineStats,
};

/// Groups users into batches of at most `max_batch_users` and looks up their
/// messages on a fixed pool of workers.
pub struct MessageBatchingStage {
    store: Arc<dyn MessageStore>,
    max_batch_users: usize,
    workers: usize,
    stats: Arc<PipelineStats>,
}

impl MessageBatchingStage {
    pub fn new(
        store: Arc<dyn MessageStore>,
        max_batch_users: usize,
        workers: usize,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            store,
            max_batch_users: max_batch_users.max(1),
            workers: workers.max(1),
            stats,
        }
    }
}

#[async_trait]
impl Stage for MessageBatchingStage {
    type Input = User;
    type Output = MessageId;

    fn name(&self) -> &'static str {
        "batch_messages"
    }

    async fn run(self, input: mpsc::Receiver<User>, output: mpsc::Sender<MessageId>) {
        let (batches, queue) = work_queue::<Batch>(1);

        let collector = tokio::spawn(collect_batches(
            input,
            batches,
            self.max_batch_users,
            self.stats.clone(),
        ));

        let workers: Vec<_> = (0..self.workers)
            .map(|worker| {
                tokio::spawn(lookup_worker(
                    worker,
                    queue.clone(),
                    self.store.clone(),
                    output.clone(),
                    self.stats.clone(),
                ))
            })
            .collect();
        drop(output);

        if let Err(err) = collector.await {
            tracing::warn!(target: "batcher", error = %err, "batch collector failed");
        }
        for res in join_all(workers).await {
            if let Err(err) = res {
                tracing::warn!(target: "batcher", error = %err, "lookup worker failed");
            }
        }
        let snapshot = queue.snapshot();
        tracing::debug!(
            target: "batcher",
            dispatched = snapshot.pushed,
            processed = snapshot.taken,
            "batch queue drained"
        );
    }
}

async fn collect_batches(
    mut input: mpsc::Receiver<User>,
    batches: WorkSender<Batch>,
    max_batch_users: usize,
    stats: Arc<PipelineStats>,
) {
    let mut batch = Vec::with_capacity(max_batch_users);
    while let Some(user) = input.recv().await {
        batch.push(user);
        if batch.len() >= max_batch_users {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(max_batch_users));
            if !batches.push(full).await {
                return;
            }
            stats.record_batches(1);
        }
    }
    if !batch.is_empty() && batches.push(batch).await {
        stats.record_batches(1);
    }
}

async fn lookup_worker(
    worker: usize,
    queue: WorkReceiver<Batch>,
    store: Arc<dyn MessageStore>,
    output: mpsc::Sender<MessageId>,
    stats: Arc<PipelineStats>,
) {
    while let Some(batch) = queue.pop().await {
        let ids = match store.fetch_messages(&batch).await {
            Ok(ids) => ids,
            Err(err) => {
                stats.record_dropped_batches(1);
                tracing::debug!(
                    target: "batcher",
                    worker,
                    users = batch.len(),
                    error = %err,
                    "message lookup failed; dropping batch"
                );
                continue;
            }
        };

        stats.record_messages(ids.len() as u64);
        for id in ids {
            if output.send(id).await.is_err() {
                return;
            }
        }
    }
}
