use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tokio::sync::{mpsc, Mutex};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub pushed: usize,
    pub taken: usize,
}

#[derive(Debug, Default)]
struct Counters {
    pushed: AtomicUsize,
    taken: AtomicUsize,
}

/// Single-producer side of a work queue shared by a pool of consumers.
#[derive(Debug)]
pub struct WorkSender<T> {
    sender: mpsc::Sender<T>,
    counters: Arc<Counters>,
}

/// Consumer side; clones compete for items, each item is taken exactly once.
#[derive(Debug)]
pub struct WorkReceiver<T> {
    receiver: Arc<Mutex<mpsc::Receiver<T>>>,
    counters: Arc<Counters>,
}

impl<T> Clone for WorkReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
            counters: self.counters.clone(),
        }
    }
}

pub fn work_queue<T>(capacity: usize) -> (WorkSender<T>, WorkReceiver<T>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let counters = Arc::new(Counters::default());
    (
        WorkSender {
            sender,
            counters: counters.clone(),
        },
        WorkReceiver {
            receiver: Arc::new(Mutex::new(receiver)),
            counters,
        },
    )
}

impl<T> WorkSender<T> {
    /// Waits for room in the queue. Returns `false` once every consumer is gone.
    pub async fn push(&self, value: T) -> bool {
        if self.sender.send(value).await.is_err() {
            return false;
        }
        self.counters.pushed.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        snapshot(&self.counters)
    }
}

impl<T> WorkReceiver<T> {
    /// Next item, or `None` when the sender is dropped and the queue is empty.
    pub async fn pop(&self) -> Option<T> {
        let value = {
            let mut receiver = self.receiver.lock().await;
            receiver.recv().await
        };
        if value.is_some() {
            self.counters.taken.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        snapshot(&self.counters)
    }
}

fn snapshot(counters: &Counters) -> QueueSnapshot {
    QueueSnapshot {
        pushed: counters.pushed.load(Ordering::Relaxed),
        taken: counters.taken.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn consumers_split_items_without_duplicates() {
        let (sender, receiver) = work_queue::<u32>(1);
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let receiver = receiver.clone();
                tokio::spawn(async move {
                    let mut taken = Vec::new();
                    while let Some(value) = receiver.pop().await {
                        taken.push(value);
                    }
                    taken
                })
            })
            .collect();

        for value in 0..100 {
            assert!(sender.push(value).await);
        }
        let pushed = sender.snapshot().pushed;
        drop(sender);

        let mut seen = HashSet::new();
        for consumer in consumers {
            for value in consumer.await.unwrap() {
                assert!(seen.insert(value), "item {value} taken twice");
            }
        }
        assert_eq!(pushed, 100);
        assert_eq!(seen.len(), 100);
        assert_eq!(receiver.snapshot().taken, 100);
    }

    #[tokio::test]
    async fn push_fails_once_consumers_are_gone() {
        let (sender, receiver) = work_queue::<u32>(1);
        drop(receiver);
        assert!(!sender.push(1).await);
    }
}
