//! Completion collaborator
//!
//! Classification, delegation and synthesis all go through an opaque
//! `complete(instructions, input)` call. Backends may return a value
//! already parsed server-side; callers try that before parsing text.

use crate::error::OrchestrationError;
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

pub mod gemini;
pub use gemini::GeminiClient;

/// One request to the completion service
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    /// Logical caller name (classifier, synthesizer, technical_analyst, ...)
    pub agent: &'a str,
    pub instructions: &'a str,
    pub input: &'a str,
    /// Ask the backend for JSON-only output
    pub json_output: bool,
}

/// Model output: raw text plus an optional pre-parsed value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub parsed: Option<serde_json::Value>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parsed: None,
        }
    }
}

/// Trait for the language-model completion service
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion>;
}

/// A request as seen by [`ScriptedCompletionService`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub agent: String,
    pub instructions: String,
    pub input: String,
}

/// Offline completion service for development & testing.
/// Replies are scripted per agent name; every request is recorded.
pub struct ScriptedCompletionService {
    replies: HashMap<String, Completion>,
    unavailable: Vec<String>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedCompletionService {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            unavailable: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Canned replies for a full BUY/HOLD style run, used when no API key is set
    pub fn demo() -> Self {
        Self::new()
            .with_reply(
                "classifier",
                r#"{"analysis_type":"both","security":"AAPL","sector":"technology","time_horizon":"medium_term","raw_intent":"Trading strategy for AAPL"}"#,
            )
            .with_reply(
                "technical_analyst",
                "AAPL trades above its 50-day and 200-day moving averages; volume is steady.",
            )
            .with_reply(
                "fundamental_analyst",
                "Revenue growth is modest, margins are stable and the balance sheet is strong.",
            )
            .with_reply(
                "risk_analyst",
                "Annualized volatility is WITHIN the configured limit; max drawdown is moderate.",
            )
            .with_reply(
                "synthesizer",
                r#"{"security":"AAPL","direction":"BUY","confidence":"MEDIUM","technical_summary":"Uptrend above key averages","fundamental_summary":"Stable margins, strong balance sheet","risk_assessment":"Volatility within limits","rationale":"Trend and fundamentals agree while risk is contained","conditions":["Price holds above the 50-day average"],"warnings":[]}"#,
            )
    }

    pub fn with_reply(mut self, agent: &str, text: &str) -> Self {
        self.replies.insert(agent.to_string(), Completion::text(text));
        self
    }

    pub fn with_completion(mut self, agent: &str, completion: Completion) -> Self {
        self.replies.insert(agent.to_string(), completion);
        self
    }

    /// Make every call from `agent` fail as if the service were down
    pub fn with_unavailable(mut self, agent: &str) -> Self {
        self.unavailable.push(agent.to_string());
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn requests_for(&self, agent: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.agent == agent)
            .collect()
    }
}

impl Default for ScriptedCompletionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletionService {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                agent: request.agent.to_string(),
                instructions: request.instructions.to_string(),
                input: request.input.to_string(),
            });
        }

        if self.unavailable.iter().any(|a| a == request.agent) {
            return Err(OrchestrationError::CollaboratorUnavailable(format!(
                "{}: scripted outage",
                request.agent
            )));
        }

        Ok(self
            .replies
            .get(request.agent)
            .cloned()
            .unwrap_or_else(|| Completion::text(format!("No scripted reply for {}.", request.agent))))
    }
}
