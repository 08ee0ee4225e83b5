//! Delegate trait and the default LLM-backed analysts
//!
//! Delegates are stateless: one instance per role is shared by every
//! concurrent run.

use crate::agents::roles::AnalystRole;
use crate::config::RiskLimits;
use crate::llm::{CompletionRequest, CompletionService};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// What an analyst returns: free text, optionally a pre-parsed value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelegateOutput {
    pub text: String,
    pub value: Option<serde_json::Value>,
}

/// Trait for a role-bound analyst
#[async_trait]
pub trait Delegate: Send + Sync {
    fn role(&self) -> AnalystRole;
    async fn run(&self, message: &str) -> Result<DelegateOutput>;
}

const FUNDAMENTAL_INSTRUCTIONS: &str = r#"You are a Fundamental Analyst Agent for securities trading.
Your role is to analyze market fundamentals: earnings reports, income statements, balance sheets, and macroeconomic indicators.
Provide a concise, factual summary focused on valuation-relevant metrics and growth.
Do not make price targets or trading recommendations; only report fundamental findings.
If the context provides a ticker or sector, use it. Reuse any shared facts provided in the context to avoid redundant lookups."#;

const TECHNICAL_INSTRUCTIONS: &str = r#"You are a Technical Analyst Agent for securities trading.
Your role is to analyze price movements, chart patterns, volume, and moving averages, and provide a concise technical assessment.
Do not make fundamental or risk conclusions; only report technical findings. Use the security/sector from context when provided.
Reuse any shared facts provided in the context to avoid redundant lookups."#;

const RISK_INSTRUCTIONS: &str = r#"You are a Risk Management Agent for securities trading.
Your role is to evaluate downside risk, volatility, and compliance with trading limits before a strategy is finalized.
Provide a clear risk assessment. State WITHIN or EXCEEDS for each limit you check.
Do not recommend entries or targets; only state whether risk is acceptable and any limit breaches or caveats.
Use the security from context when provided."#;

/// System instructions for a role; risk analysts get the configured limits
pub fn instructions_for(role: AnalystRole, limits: &RiskLimits) -> String {
    match role {
        AnalystRole::Technical => TECHNICAL_INSTRUCTIONS.to_string(),
        AnalystRole::Fundamental => FUNDAMENTAL_INSTRUCTIONS.to_string(),
        AnalystRole::Risk => format!(
            "{}\n\nTrading limits:\n- Max position size: {}% of portfolio\n- Max annualized volatility: {}%",
            RISK_INSTRUCTIONS, limits.max_position_pct, limits.max_volatility_pct
        ),
    }
}

/// Analyst backed by the completion service
pub struct LlmAnalyst {
    role: AnalystRole,
    instructions: String,
    service: Arc<dyn CompletionService>,
}

impl LlmAnalyst {
    pub fn new(role: AnalystRole, instructions: String, service: Arc<dyn CompletionService>) -> Self {
        Self {
            role,
            instructions,
            service,
        }
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }
}

#[async_trait]
impl Delegate for LlmAnalyst {
    fn role(&self) -> AnalystRole {
        self.role
    }

    async fn run(&self, message: &str) -> Result<DelegateOutput> {
        let completion = self
            .service
            .complete(CompletionRequest {
                agent: self.role.as_str(),
                instructions: &self.instructions,
                input: message,
                json_output: false,
            })
            .await?;

        Ok(DelegateOutput {
            text: completion.text,
            value: completion.parsed,
        })
    }
}

/// Default delegate for a role
pub fn build_analyst(
    role: AnalystRole,
    service: Arc<dyn CompletionService>,
    limits: &RiskLimits,
) -> Arc<dyn Delegate> {
    Arc::new(LlmAnalyst::new(role, instructions_for(role, limits), service))
}
