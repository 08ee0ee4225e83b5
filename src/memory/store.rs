//! Conversation log storage
//!
//! Append-only, shared by all concurrent runs of one orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single entry in the conversation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub message_id: Uuid,
    /// Run that produced this message
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: MessageRole,
    pub content: String,
    /// Approximate token count
    pub token_count: usize,
}

impl ConversationMessage {
    pub fn new(run_id: Uuid, role: MessageRole, content: String) -> Self {
        let token_count = (content.len() + 3) / 4;

        Self {
            message_id: Uuid::new_v4(),
            run_id,
            timestamp: Utc::now(),
            role,
            content,
            token_count,
        }
    }
}

/// Process-lifetime conversation log
#[derive(Debug, Default)]
pub struct ConversationLog {
    messages: RwLock<Vec<ConversationMessage>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished run as a (query, answer) pair
    pub async fn append_exchange(&self, run_id: Uuid, query: &str, answer: String) {
        let mut messages = self.messages.write().await;
        messages.push(ConversationMessage::new(run_id, MessageRole::User, query.to_string()));
        messages.push(ConversationMessage::new(run_id, MessageRole::Assistant, answer));
    }

    /// Snapshot of all messages in append order
    pub async fn messages(&self) -> Vec<ConversationMessage> {
        self.messages.read().await.clone()
    }

    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn total_tokens(&self) -> usize {
        self.messages.read().await.iter().map(|m| m.token_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_message_creation() {
        let msg = ConversationMessage::new(
            Uuid::new_v4(),
            MessageRole::User,
            "Strategy for AAPL?".to_string(),
        );
        assert_eq!(msg.role, MessageRole::User);
        assert!(msg.token_count > 0);
    }

    #[tokio::test]
    async fn test_append_exchange_keeps_order() {
        let log = ConversationLog::new();
        let run_id = Uuid::new_v4();

        log.append_exchange(run_id, "What about MSFT?", "{\"direction\":\"HOLD\"}".to_string())
            .await;

        let messages = log.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert!(messages.iter().all(|m| m.run_id == run_id));
        assert!(log.total_tokens().await > 0);
        assert_eq!(log.message_count().await, 2);
    }
}
