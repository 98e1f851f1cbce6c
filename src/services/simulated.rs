use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tokio::time::sleep;

use crate::{
    config::{PipelineSettings, SimulationConfig},
    domain::{MessageId, User},
};

use super::{MessageStore, ServiceError, SpamClassifier, UserDirectory};

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("valid email regex"));

const USER_ID_SPACE: u64 = 1_000_000;
const MESSAGES_PER_USER: u64 = 3;

/// In-process stand-in for the three collaborators.
///
/// Emails are normalized (lowercased, `+tag` stripped) before being hashed
/// into a user id, so aliases of one mailbox resolve to the same user. Each
/// user owns three message ids derived from its id, and a message is spam
/// when its id is divisible by `spam_modulus`.
///
/// The backend enforces the limits it was built with: a lookup with more than
/// `max_batch_users` users fails, and so does a classification call that would
/// exceed `max_concurrent_classifications` simultaneous calls. Peak
/// concurrency of resolutions and classifications is recorded for assertions.
#[derive(Debug)]
pub struct SimulatedBackend {
    max_batch_users: usize,
    max_concurrent_classifications: usize,
    latency: Duration,
    spam_modulus: u64,
    known_users: HashMap<String, u64>,
    failing_users: HashSet<u64>,
    failing_messages: HashSet<MessageId>,
    resolve_calls: AtomicUsize,
    resolving: AtomicUsize,
    peak_resolving: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
}

impl SimulatedBackend {
    pub fn new(settings: &PipelineSettings, simulation: &SimulationConfig) -> Self {
        Self {
            max_batch_users: settings.max_batch_users,
            max_concurrent_classifications: settings.max_concurrent_classifications,
            latency: simulation.latency,
            spam_modulus: simulation.spam_modulus.max(1),
            known_users: HashMap::new(),
            failing_users: HashSet::new(),
            failing_messages: HashSet::new(),
            resolve_calls: AtomicUsize::new(0),
            resolving: AtomicUsize::new(0),
            peak_resolving: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Pins `email` to a specific user id instead of the hashed one.
    pub fn with_user(mut self, email: &str, id: u64) -> Self {
        self.known_users.insert(normalize_email(email), id);
        self
    }

    /// Any lookup batch containing this user fails as a whole.
    pub fn with_failing_user(mut self, id: u64) -> Self {
        self.failing_users.insert(id);
        self
    }

    pub fn with_failing_message(mut self, id: MessageId) -> Self {
        self.failing_messages.insert(id);
        self
    }

    /// Message ids owned by `user`, in ascending order.
    pub fn messages_of(&self, user: u64) -> Vec<MessageId> {
        (1..=MESSAGES_PER_USER)
            .map(|n| MessageId(user.saturating_mul(10).saturating_add(n)))
            .collect()
    }

    pub fn is_spam(&self, id: MessageId) -> bool {
        id.0 % self.spam_modulus == 0
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrent_resolutions(&self) -> usize {
        self.peak_resolving.load(Ordering::SeqCst)
    }

    pub fn peak_concurrent_classifications(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Sizes of every lookup batch received, in arrival order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().clone()
    }

    fn user_id_for(&self, normalized: &str) -> u64 {
        self.known_users
            .get(normalized)
            .copied()
            .unwrap_or_else(|| fnv1a(normalized.as_bytes()) % USER_ID_SPACE + 1)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl UserDirectory for SimulatedBackend {
    async fn resolve_user(&self, email: &str) -> Result<User, ServiceError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let _slot = InFlight::enter(&self.resolving, &self.peak_resolving);
        self.simulate_latency().await;

        let email = email.trim();
        if !EMAIL_REGEX.is_match(email) {
            return Err(ServiceError::InvalidEmail(email.to_string()));
        }
        let normalized = normalize_email(email);
        Ok(User::new(self.user_id_for(&normalized), normalized))
    }
}

#[async_trait]
impl MessageStore for SimulatedBackend {
    async fn fetch_messages(&self, users: &[User]) -> Result<Vec<MessageId>, ServiceError> {
        self.batch_sizes.lock().push(users.len());
        self.simulate_latency().await;

        if users.len() > self.max_batch_users {
            return Err(ServiceError::BatchTooLarge {
                size: users.len(),
                limit: self.max_batch_users,
            });
        }
        if let Some(user) = users.iter().find(|u| self.failing_users.contains(&u.id)) {
            return Err(ServiceError::Unavailable(format!(
                "message lookup failed for user {}",
                user.id
            )));
        }

        Ok(users
            .iter()
            .flat_map(|user| self.messages_of(user.id))
            .collect())
    }
}

#[async_trait]
impl SpamClassifier for SimulatedBackend {
    async fn classify_spam(&self, id: MessageId) -> Result<bool, ServiceError> {
        let slot = InFlight::enter(&self.in_flight, &self.peak_in_flight);
        if slot.current > self.max_concurrent_classifications {
            return Err(ServiceError::TooManyRequests {
                limit: self.max_concurrent_classifications,
            });
        }
        self.simulate_latency().await;

        if self.failing_messages.contains(&id) {
            return Err(ServiceError::Unavailable(format!(
                "classification failed for message {id}"
            )));
        }
        Ok(self.is_spam(id))
    }
}

/// Counts one call as in flight until dropped and raises `peak` to match.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
    current: usize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let current = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(current, Ordering::SeqCst);
        Self { counter, current }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

fn normalize_email(email: &str) -> String {
    let email = email.trim().to_lowercase();
    if let Some((local, domain)) = email.split_once('@') {
        let local = local.split_once('+').map_or(local, |(base, _)| base);
        return format!("{local}@{domain}");
    }
    email
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
    })
}
