use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub user_message: String,
    pub ai_response: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatEntry {
    pub fn new(user_message: impl Into<String>, ai_response: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            ai_response: ai_response.into(),
            timestamp: Utc::now(),
        }
    }
}
