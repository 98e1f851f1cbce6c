use std::sync::Arc;

use async_trait::async_trait;
use tokio::{
    sync::{mpsc, Semaphore},
    task::JoinSet,
};

use crate::{
    domain::{MessageId, MessageResult},
    services::SpamClassifier,
};

use super::{orchestrator::Stage, stats::PipelineStats};

/// Classifies every message on its own task while holding the number of
/// outstanding classifier calls to the semaphore's permit count.
pub struct SpamClassificationStage {
    classifier: Arc<dyn SpamClassifier>,
    permits: Arc<Semaphore>,
    stats: Arc<PipelineStats>,
}

impl SpamClassificationStage {
    pub fn new(
        classifier: Arc<dyn SpamClassifier>,
        max_concurrent: usize,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            classifier,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            stats,
        }
    }
}

#[async_trait]
impl Stage for SpamClassificationStage {
    type Input = MessageId;
    type Output = MessageResult;

    fn name(&self) -> &'static str {
        "classify_spam"
    }

    async fn run(self, mut input: mpsc::Receiver<MessageId>, output: mpsc::Sender<MessageResult>) {
        let mut tasks = JoinSet::new();

        while let Some(id) = input.recv().await {
            let classifier = self.classifier.clone();
            let permits = self.permits.clone();
            let stats = self.stats.clone();
            let output = output.clone();

            tasks.spawn(async move {
                let Ok(permit) = permits.acquire_owned().await else {
                    return;
                };
                let verdict = classifier.classify_spam(id).await;
                drop(permit);

                match verdict {
                    Ok(has_spam) => {
                        stats.record_results(1);
                        let _ = output.send(MessageResult { id, has_spam }).await;
                    }
                    Err(err) => {
                        stats.record_failed_classifications(1);
                        tracing::debug!(target: "classifier", message_id = %id, error = %err, "classification failed; dropping message");
                    }
                }
            });
            while tasks.try_join_next().is_some() {}
        }

        while let Some(res) = tasks.join_next().await {
            if let Err(err) = res {
                tracing::warn!(target: "classifier", error = %err, "classification task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{
        config::{PipelineSettings, SimulationConfig},
        services::SimulatedBackend,
        tasks::orchestrator::Pipeline,
    };

    use super::*;

    fn backend(max_concurrent: usize) -> SimulatedBackend {
        SimulatedBackend::new(
            &PipelineSettings::new(2, max_concurrent),
            &SimulationConfig {
                latency: Duration::from_millis(5),
                spam_modulus: 3,
            },
        )
    }

    async fn classify(
        backend: Arc<SimulatedBackend>,
        ids: Vec<MessageId>,
        max_concurrent: usize,
        stats: Arc<PipelineStats>,
    ) -> Vec<MessageResult> {
        let mut results = Pipeline::from_items(ids, 1)
            .then(SpamClassificationStage::new(backend, max_concurrent, stats))
            .collect()
            .await
            .unwrap();
        results.sort_by_key(|r| r.id);
        results
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn in_flight_calls_never_exceed_the_limit() {
        let backend = Arc::new(backend(3));
        let stats = Arc::new(PipelineStats::default());
        let ids: Vec<MessageId> = (1..=60).map(MessageId).collect();

        let results = classify(backend.clone(), ids, 3, stats.clone()).await;

        // The backend rejects any call above its limit, so every message
        // coming back proves the cap held.
        assert_eq!(results.len(), 60);
        assert_eq!(stats.snapshot().classifications_failed, 0);
        assert!(backend.peak_concurrent_classifications() <= 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failed_classification_drops_only_that_message() {
        let backend = Arc::new(backend(2).with_failing_message(MessageId(4)));
        let stats = Arc::new(PipelineStats::default());
        let ids: Vec<MessageId> = (1..=6).map(MessageId).collect();

        let results = classify(backend, ids, 2, stats.clone()).await;

        assert_eq!(
            results,
            vec![
                MessageResult::new(MessageId(1), false),
                MessageResult::new(MessageId(2), false),
                MessageResult::new(MessageId(3), true),
                MessageResult::new(MessageId(5), false),
                MessageResult::new(MessageId(6), true),
            ]
        );
        assert_eq!(stats.snapshot().classifications_failed, 1);
    }
}
