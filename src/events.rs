//! Stream events emitted by the streaming workflow
//!
//! Serialized as `{"type": "...", "timestamp": "...", ...}` for SSE clients.

use crate::agents::AnalystRole;
use crate::models::{ClassificationResult, Strategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Classification {
        payload: ClassificationResult,
    },
    AnalystStart {
        agent: AnalystRole,
        instruction: String,
    },
    /// Best-effort: the lookups an analyst is expected to make
    ToolCall {
        agent: AnalystRole,
        tool: String,
        args: serde_json::Value,
    },
    AnalystEnd {
        agent: AnalystRole,
        summary: String,
    },
    RiskScore {
        score: u8,
        label: String,
    },
    /// Always last; `payload` is null when the run aborted
    Strategy {
        payload: Option<Strategy>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl StreamEvent {
    pub fn now(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            EventKind::Classification { .. } => "classification",
            EventKind::AnalystStart { .. } => "analyst_start",
            EventKind::ToolCall { .. } => "tool_call",
            EventKind::AnalystEnd { .. } => "analyst_end",
            EventKind::RiskScore { .. } => "risk_score",
            EventKind::Strategy { .. } => "strategy",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::Strategy { .. })
    }
}
