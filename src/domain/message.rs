use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageResult {
    pub id: MessageId,
    pub has_spam: bool,
}

impl MessageResult {
    pub fn new(id: MessageId, has_spam: bool) -> Self {
        Self {
            id,
            has_spam,
        }
    }

    /// Renders the report line `"<has_spam> <id>"`.
    pub fn render(&self) -> String {
        format!("{} {}", self.has_spam, self.id)
    }
}
