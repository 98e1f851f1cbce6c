use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{
    sync::{mpsc, Semaphore},
    task::JoinSet,
};

use crate::{domain::User, services::UserDirectory};

use super::{orchestrator::Stage, stats::PipelineStats};

/// User ids already forwarded downstream.
#[derive(Debug, Default)]
struct SeenUsers {
    ids: Mutex<HashSet<u64>>,
}

impl SeenUsers {
    /// Atomic test-and-set: `true` only for the first caller with `id`.
    fn first_sighting(&self, id: u64) -> bool {
        self.ids.lock().insert(id)
    }
}

/// Resolves every email concurrently and forwards each distinct user once.
pub struct UserResolverStage {
    directory: Arc<dyn UserDirectory>,
    limiter: Option<Arc<Semaphore>>,
    stats: Arc<PipelineStats>,
}

impl UserResolverStage {
    pub fn new(directory: Arc<dyn UserDirectory>, stats: Arc<PipelineStats>) -> Self {
        Self {
            directory,
            limiter: None,
            stats,
        }
    }

    /// Caps the number of resolutions in flight. Unbounded when never called.
    pub fn with_concurrency_limit(mut self, limit: Option<usize>) -> Self {
        self.limiter = limit.map(|limit| Arc::new(Semaphore::new(limit.max(1))));
        self
    }
}

#[async_trait]
impl Stage for UserResolverStage {
    type Input = String;
    type Output = User;

    fn name(&self) -> &'static str {
        "resolve_users"
    }

    async fn run(self, mut input: mpsc::Receiver<String>, output: mpsc::Sender<User>) {
        let seen = Arc::new(SeenUsers::default());
        let mut tasks = JoinSet::new();

        while let Some(email) = input.recv().await {
            self.stats.record_emails(1);
            let directory = self.directory.clone();
            let limiter = self.limiter.clone();
            let seen = seen.clone();
            let stats = self.stats.clone();
            let output = output.clone();

            tasks.spawn(async move {
                let permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                let resolved = directory.resolve_user(&email).await;
                drop(permit);

                let user = match resolved {
                    Ok(user) => user,
                    Err(err) => {
                        stats.record_resolve_failures(1);
                        tracing::debug!(target: "resolver", email = %email, error = %err, "email not resolved");
                        return;
                    }
                };

                if !seen.first_sighting(user.id) {
                    stats.record_duplicates(1);
                    return;
                }
                stats.record_users(1);
                let _ = output.send(user).await;
            });
            while tasks.try_join_next().is_some() {}
        }

        tracing::debug!(target: "resolver", pending = tasks.len(), "input drained");
        while let Some(res) = tasks.join_next().await {
            if let Err(err) = res {
                tracing::warn!(target: "resolver", error = %err, "resolution task failed");
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

    fn backend(latency_ms: u64) -> SimulatedBackend {
        SimulatedBackend::new(
            &PipelineSettings::default(),
            &SimulationConfig {
                latency: Duration::from_millis(latency_ms),
                spam_modulus: 3,
            },
        )
    }

    async fn resolve(
        backend: Arc<SimulatedBackend>,
        emails: Vec<&str>,
        stats: Arc<PipelineStats>,
    ) -> Vec<User> {
        let emails: Vec<String> = emails.into_iter().map(String::from).collect();
        Pipeline::from_items(emails, 1)
            .then(UserResolverStage::new(backend, stats))
            .collect()
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn duplicate_emails_yield_one_user() {
        let backend = Arc::new(backend(5).with_user("a@x", 1).with_user("b@x", 2));
        let stats = Arc::new(PipelineStats::default());

        let users = resolve(backend.clone(), vec!["a@x", "b@x", "a@x"], stats.clone()).await;

        let mut ids: Vec<u64> = users.iter().map(|u| u.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(backend.resolve_calls(), 3);
        assert_eq!(stats.snapshot().duplicate_users, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn aliases_under_contention_are_forwarded_once() {
        let backend = Arc::new(backend(1));
        let emails: Vec<String> = (0..200)
            .map(|n| format!("Shared+{n}@example.com"))
            .chain((0..20).map(|n| format!("user{n}@example.com")))
            .collect();
        let stats = Arc::new(PipelineStats::default());

        let users = Pipeline::from_items(emails, 1)
            .then(UserResolverStage::new(backend, stats.clone()))
            .collect()
            .await
            .unwrap();

        let distinct: HashSet<u64> = users.iter().map(|u| u.id).collect();
        assert_eq!(users.len(), distinct.len());
        assert_eq!(users.len(), 21);
        assert_eq!(stats.snapshot().duplicate_users, 199);
    }

    #[tokio::test]
    async fn unresolvable_emails_are_skipped() {
        let backend = Arc::new(backend(0).with_user("a@x", 1));
        let stats = Arc::new(PipelineStats::default());

        let users = resolve(backend, vec!["broken", "a@x", ""], stats.clone()).await;

        assert_eq!(users, vec![User::new(1, "a@x")]);
        assert_eq!(stats.snapshot().resolve_failures, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_limit_caps_resolutions_in_flight() {
        let backend = Arc::new(backend(2));
        let emails: Vec<String> = (0..30).map(|n| format!("u{n}@x")).collect();

        let users = Pipeline::from_items(emails, 1)
            .then(
                UserResolverStage::new(backend.clone(), Arc::new(PipelineStats::default()))
                    .with_concurrency_limit(Some(3)),
            )
            .collect()
            .await
            .unwrap();

        assert_eq!(users.len(), 30);
        assert_eq!(backend.resolve_calls(), 30);
        let peak = backend.peak_concurrent_resolutions();
        assert!((1..=3).contains(&peak), "peak resolutions {peak}");
    }
}
