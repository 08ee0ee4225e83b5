//! Conversation log
//!
//! Process-lifetime record of completed runs. The workflow only appends;
//! hosts may read it back.

pub mod store;

pub use store::{ConversationLog, ConversationMessage, MessageRole};
