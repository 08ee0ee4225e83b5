//! Context passed from the orchestrator to each analyst

use crate::agents::roles::AnalystRole;
use crate::models::ClassificationResult;
use crate::recovery::preview;
use serde::{Deserialize, Serialize};

/// Characters of an analyst's output re-shared with later analysts
pub const SHARED_FACT_CHARS: usize = 300;

/// Snapshot handed to one analyst. Built fresh before every call, so it
/// reflects shared facts as of that point in the sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelegateContext {
    pub security: Option<String>,
    pub sector: Option<String>,
    pub time_horizon: Option<String>,
    pub shared_facts: Vec<String>,
    pub instruction: String,
}

impl DelegateContext {
    pub fn new(classification: &ClassificationResult, shared_facts: &[String]) -> Self {
        Self {
            security: classification.security.clone(),
            sector: classification.sector.clone(),
            time_horizon: classification.time_horizon.clone(),
            shared_facts: shared_facts.to_vec(),
            instruction: instruction_for(&classification.raw_intent),
        }
    }

    /// Render as the analyst's input message
    pub fn render(&self) -> String {
        let mut parts = vec![self.instruction.clone()];

        if let Some(security) = &self.security {
            parts.push(format!("Security/ticker: {}", security));
        }
        if let Some(sector) = &self.sector {
            parts.push(format!("Sector: {}", sector));
        }
        if let Some(horizon) = &self.time_horizon {
            parts.push(format!("Time horizon: {}", horizon));
        }
        if !self.shared_facts.is_empty() {
            parts.push(format!(
                "Shared facts (reuse, do not re-fetch): {}",
                self.shared_facts.join("; ")
            ));
        }

        parts.join("\n")
    }
}

/// Per-analyst task built from the classified intent
pub fn instruction_for(raw_intent: &str) -> String {
    format!(
        "User objective: {}. Provide your analysis concisely.",
        raw_intent
    )
}

/// Abbreviated record of an analyst's output for later analysts
pub fn shared_fact(role: AnalystRole, output: &str) -> String {
    format!("{}: {}", role.label(), preview(output, SHARED_FACT_CHARS))
}
