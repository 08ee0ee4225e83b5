//! Run-scoped workflow state

use crate::agents::context::{shared_fact, DelegateContext};
use crate::agents::AnalystRole;
use crate::models::ClassificationResult;
use std::fmt;
use tracing::warn;

pub const NO_TECHNICAL: &str = "No technical analysis requested or available.";
pub const NO_FUNDAMENTAL: &str = "No fundamental analysis requested or available.";
pub const NO_RISK: &str = "No risk assessment requested or available.";

/// Workflow stages, strictly linear per run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStage {
    Idle,
    Classifying,
    Selecting,
    Delegating(usize),
    Synthesizing,
    Done,
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStage::Idle => write!(f, "IDLE"),
            WorkflowStage::Classifying => write!(f, "CLASSIFYING"),
            WorkflowStage::Selecting => write!(f, "SELECTING"),
            WorkflowStage::Delegating(k) => write!(f, "DELEGATING({})", k),
            WorkflowStage::Synthesizing => write!(f, "SYNTHESIZING"),
            WorkflowStage::Done => write!(f, "DONE"),
        }
    }
}

/// Findings accumulated while analysts run
#[derive(Debug, Default)]
pub struct RunState {
    technical: Option<String>,
    fundamental: Option<String>,
    risk: Option<String>,
    shared_facts: Vec<String>,
}

/// The three finding blocks handed to synthesis, sentinels filled in
#[derive(Debug, Clone, PartialEq)]
pub struct Findings {
    pub technical: String,
    pub fundamental: String,
    pub risk: String,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh context reflecting shared facts gathered so far
    pub fn context_for(&self, classification: &ClassificationResult) -> DelegateContext {
        DelegateContext::new(classification, &self.shared_facts)
    }

    /// Store an analyst's output under its slot; technical and
    /// fundamental findings are also re-shared with later analysts.
    pub fn record(&mut self, role: AnalystRole, output: String) {
        let slot = match role {
            AnalystRole::Technical => &mut self.technical,
            AnalystRole::Fundamental => &mut self.fundamental,
            AnalystRole::Risk => &mut self.risk,
        };

        if slot.is_some() {
            warn!(role = %role, "Finding already recorded, keeping the first");
            return;
        }

        if role.shares_findings() {
            self.shared_facts.push(shared_fact(role, &output));
        }
        *slot = Some(output);
    }

    pub fn finding(&self, role: AnalystRole) -> Option<&str> {
        match role {
            AnalystRole::Technical => self.technical.as_deref(),
            AnalystRole::Fundamental => self.fundamental.as_deref(),
            AnalystRole::Risk => self.risk.as_deref(),
        }
    }

    pub fn shared_facts(&self) -> &[String] {
        &self.shared_facts
    }

    pub fn findings(&self) -> Findings {
        let or_sentinel = |value: &Option<String>, sentinel: &str| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .unwrap_or(sentinel)
                .to_string()
        };

        Findings {
            technical: or_sentinel(&self.technical, NO_TECHNICAL),
            fundamental: or_sentinel(&self.fundamental, NO_FUNDAMENTAL),
            risk: or_sentinel(&self.risk, NO_RISK),
        }
    }
}
