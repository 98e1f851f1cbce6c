use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::domain::{MessageId, User};

use super::{
    wire::{
        build_messages_request, spam_path, MessagesResponse, SpamResponse, UserResponse,
        MESSAGES_PATH, USERS_PATH,
    },
    MessageStore, ServiceError, SpamClassifier, UserDirectory,
};

/// Talks to the identity, message and classification services over JSON/HTTP.
#[derive(Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(http: Client, base_url: &str) -> Result<Self, ServiceError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait]
impl UserDirectory for HttpBackend {
    async fn resolve_user(&self, email: &str) -> Result<User, ServiceError> {
        let mut url = self.endpoint(USERS_PATH)?;
        url.query_pairs_mut().append_pair("email", email);

        let user: UserResponse = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(user.into())
    }
}

#[async_trait]
impl MessageStore for HttpBackend {
    async fn fetch_messages(&self, users: &[User]) -> Result<Vec<MessageId>, ServiceError> {
        let request = build_messages_request(users);
        let response: MessagesResponse = self
            .http
            .post(self.endpoint(MESSAGES_PATH)?)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.message_ids)
    }
}

#[async_trait]
impl SpamClassifier for HttpBackend {
    async fn classify_spam(&self, id: MessageId) -> Result<bool, ServiceError> {
        let response: SpamResponse = self
            .http
            .get(self.endpoint(&spam_path(id))?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.has_spam)
    }
}
