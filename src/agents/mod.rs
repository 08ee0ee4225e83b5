//! Domain analysts
//!
//! Roles are a closed set; the registry decides which of them run for a
//! classified query and owns their lazily-built delegates.

pub mod context;
pub mod delegate;
pub mod registry;
pub mod roles;

pub use context::DelegateContext;
pub use delegate::{build_analyst, Delegate, DelegateOutput, LlmAnalyst};
pub use registry::AgentRegistry;
pub use roles::AnalystRole;
