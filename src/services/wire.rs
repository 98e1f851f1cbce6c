use serde::{Deserialize, Serialize};

use crate::domain::{MessageId, User};

pub const USERS_PATH: &str = "users";
pub const MESSAGES_PATH: &str = "messages";

pub fn build_messages_request(users: &[User]) -> MessagesRequest {
    MessagesRequest {
        user_ids: users.iter().map(|user| user.id).collect(),
    }
}

pub fn spam_path(id: MessageId) -> String {
    format!("{MESSAGES_PATH}/{id}/spam")
}

#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub user_ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UserResponse {
    pub id: u64,
    pub email: String,
}

impl From<UserResponse> for User {
    fn from(value: UserResponse) -> Self {
        User::new(value.id, value.email)
    }
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub message_ids: Vec<MessageId>,
}

#[derive(Debug, Deserialize)]
pub struct SpamResponse {
    pub has_spam: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_request_carries_user_ids() {
        let users = vec![User::new(7, "a@x"), User::new(9, "b@x")];
        let body = serde_json::to_value(build_messages_request(&users)).unwrap();
        assert_eq!(body, serde_json::json!({ "user_ids": [7, 9] }));
    }

    #[test]
    fn decodes_message_ids_and_tolerates_missing_list() {
        let parsed: MessagesResponse =
            serde_json::from_str(r#"{"message_ids": [3, 1, 2]}"#).unwrap();
        assert_eq!(
            parsed.message_ids,
            vec![MessageId(3), MessageId(1), MessageId(2)]
        );

        let empty: MessagesResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.message_ids.is_empty());
    }

    #[test]
    fn spam_path_embeds_message_id() {
        assert_eq!(spam_path(MessageId(42)), "messages/42/spam");
    }
}
