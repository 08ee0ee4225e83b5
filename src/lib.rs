//! Trading Strategy Orchestrator
//!
//! Routes a free-text trading question through a multi-agent workflow:
//! - Classifies intent (analysis type, security, sector, horizon)
//! - Selects technical / fundamental / risk analysts for the query
//! - Runs analysts in order, sharing earlier findings with later ones
//! - Synthesizes one structured trading strategy
//! - Recovers from malformed model output with flagged fallbacks
//!
//! WORKFLOW:
//! CLASSIFY → SELECT → DELEGATE → SYNTHESIZE → DONE

pub mod agents;
pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod llm;
pub mod memory;
pub mod models;
pub mod orchestrator;
pub mod recovery;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use orchestrator::Orchestrator;
