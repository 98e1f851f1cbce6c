//! Contracts of the external collaborators the pipeline consumes, plus the
//! two backends that implement them.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{MessageId, User};

pub mod http;
pub mod simulated;
mod wire;

pub use http::HttpBackend;
pub use simulated::SimulatedBackend;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid service url: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),
    #[error("batch of {size} users exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
    #[error("more than {limit} concurrent classification requests")]
    TooManyRequests { limit: usize },
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Resolves an email address to the account that owns it.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve_user(&self, email: &str) -> Result<User, ServiceError>;
}

/// Lists the messages belonging to any of the given users in one call.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn fetch_messages(&self, users: &[User]) -> Result<Vec<MessageId>, ServiceError>;
}

#[async_trait]
pub trait SpamClassifier: Send + Sync {
    async fn classify_spam(&self, id: MessageId) -> Result<bool, ServiceError>;
}

#[derive(Clone)]
pub struct Services {
    pub users: Arc<dyn UserDirectory>,
    pub messages: Arc<dyn MessageStore>,
    pub classifier: Arc<dyn SpamClassifier>,
}

impl Services {
    /// Uses one backend for all three collaborators.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: UserDirectory + MessageStore + SpamClassifier + 'static,
    {
        Self {
            users: backend.clone(),
            messages: backend.clone(),
            classifier: backend,
        }
    }
}
