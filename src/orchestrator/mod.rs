//! Main orchestrator - implements the strategy workflow
//!
//! CLASSIFY → SELECT → DELEGATE (in order, sharing findings) → SYNTHESIZE
//!
//! The streaming variant runs the same workflow and emits one event per
//! stage, always terminating with exactly one `strategy` event.

pub mod risk;
pub mod state;

use crate::agents::{build_analyst, AgentRegistry, AnalystRole, Delegate, DelegateContext, DelegateOutput};
use crate::config::{RunSettings, Settings};
use crate::error::OrchestrationError;
use crate::events::{EventKind, StreamEvent};
use crate::llm::{CompletionRequest, CompletionService, GeminiClient, ScriptedCompletionService};
use crate::memory::ConversationLog;
use crate::models::{AnalysisType, ClassificationResult, Strategy};
use crate::recovery::{preview, recover};
use crate::Result;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use risk::{score_risk, RiskScore};
pub use state::{Findings, RunState, WorkflowStage};

const CLASSIFIER_AGENT: &str = "classifier";
const SYNTHESIZER_AGENT: &str = "synthesizer";

/// Characters of the raw classifier text kept in a fallback intent
const INTENT_PREVIEW_CHARS: usize = 200;
/// Characters of each finding kept in a fallback strategy
const FINDING_PREVIEW_CHARS: usize = 500;
/// Characters of analyst output sent with `analyst_end`
const SUMMARY_PREVIEW_CHARS: usize = 300;
const EVENT_CHANNEL_CAPACITY: usize = 32;

const CLASSIFIER_INSTRUCTIONS: &str = r#"You are an NLU classifier for a securities trading system.
Given the user's message, classify it into exactly one of: technical, fundamental, both, risk_only, unknown.
- technical: user asks about price, charts, volume, trends, moving averages, technical indicators.
- fundamental: user asks about earnings, financials, balance sheet, macro, valuation, growth.
- both: user asks for full analysis or a trading strategy combining technical and fundamental.
- risk_only: user asks only about risk, volatility, limits, drawdown.
- unknown: cannot determine or general question.
Extract: security (ticker/symbol if mentioned, e.g. AAPL), sector (if mentioned), time_horizon (short_term/medium_term/long_term if mentioned), and raw_intent (one-line summary).
Respond with ONLY a valid JSON object with these exact keys: analysis_type, security, sector, time_horizon, raw_intent. Use null for missing optional fields."#;

const SYNTHESIZER_INSTRUCTIONS: &str = r#"You are the synthesis step of a multi-agent trading system.
You receive findings from the Technical Analyst, Fundamental Analyst, and Risk Management Agent.
Produce a single structured Securities Trading Strategy as ONLY a valid JSON object with keys:
security, direction (BUY/SELL/HOLD), confidence (LOW/MEDIUM/HIGH), technical_summary, fundamental_summary,
risk_assessment, rationale, conditions (array of strings), warnings (array of strings).
Be concise and base the strategy strictly on the provided findings. Do not invent data."#;

const DEGRADED_SYNTHESIS_WARNING: &str = "Structured parsing failed; review raw output.";

/// Orchestrator coordinating classifier, analysts and synthesizer.
/// One instance serves many concurrent runs.
pub struct Orchestrator {
    service: Arc<dyn CompletionService>,
    registry: Arc<AgentRegistry>,
    settings: RunSettings,
    conversation_log: ConversationLog,
}

impl Orchestrator {
    pub fn new(
        service: Arc<dyn CompletionService>,
        registry: Arc<AgentRegistry>,
        settings: RunSettings,
    ) -> Self {
        Self {
            service,
            registry,
            settings,
            conversation_log: ConversationLog::new(),
        }
    }

    /// Wire the Gemini backend (or the offline demo service when no key is
    /// configured) and the sector table from process settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let registry = Arc::new(AgentRegistry::with_sector_table(&settings.sector_analysts)?);

        let service: Arc<dyn CompletionService> = match &settings.gemini_api_key {
            Some(key) => Arc::new(GeminiClient::new(key.clone(), settings.gemini_model.clone())?),
            None => {
                warn!("GEMINI_API_KEY not set, using the offline demo completion service");
                Arc::new(ScriptedCompletionService::demo())
            }
        };

        Ok(Self::new(service, registry, settings.run_settings()))
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Completed (query, strategy) exchanges; never read by the workflow
    pub fn conversation_log(&self) -> &ConversationLog {
        &self.conversation_log
    }

    /// Run the workflow and return the final strategy
    pub async fn run_workflow(&self, query: &str) -> Result<Strategy> {
        if query.trim().is_empty() {
            return Err(OrchestrationError::EmptyQuery);
        }
        self.execute(query, None).await
    }

    /// Run the workflow, sending one event per stage to `events`.
    /// Exactly one terminal `strategy` event is sent, with a null payload
    /// when the query is empty or the run fails. If the receiver is
    /// dropped the run stops at the next stage boundary.
    pub async fn run_streaming(&self, query: &str, events: mpsc::Sender<StreamEvent>) {
        let terminal = if query.trim().is_empty() {
            debug!("Empty query, closing stream without running");
            EventKind::Strategy {
                payload: None,
                error: None,
            }
        } else {
            match self.execute(query, Some(&events)).await {
                Ok(strategy) => EventKind::Strategy {
                    payload: Some(strategy),
                    error: None,
                },
                Err(OrchestrationError::Cancelled(reason)) => {
                    info!(reason = %reason, "Streaming workflow stopped");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "Streaming workflow failed");
                    EventKind::Strategy {
                        payload: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        };

        emit(Some(&events), terminal).await;
    }

    /// Spawn a streaming run and return its event stream
    pub fn stream(self: Arc<Self>, query: String) -> ReceiverStream<StreamEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            self.run_streaming(&query, tx).await;
        });
        ReceiverStream::new(rx)
    }

    /// Classify a query; unparsable classifier output degrades to UNKNOWN
    pub async fn classify(&self, query: &str) -> Result<ClassificationResult> {
        let completion = self
            .with_timeout(
                CLASSIFIER_AGENT,
                self.service.complete(CompletionRequest {
                    agent: CLASSIFIER_AGENT,
                    instructions: CLASSIFIER_INSTRUCTIONS,
                    input: query,
                    json_output: true,
                }),
            )
            .await?;

        let recovered = recover(&completion, |raw| {
            let source = if raw.is_empty() { query } else { raw };
            ClassificationResult::unknown(preview(source, INTENT_PREVIEW_CHARS))
        });

        debug!(source = recovered.source(), "Classifier output recovered");
        Ok(recovered.into_inner().normalized())
    }

    async fn execute(
        &self,
        query: &str,
        events: Option<&mpsc::Sender<StreamEvent>>,
    ) -> Result<Strategy> {
        let run_id = Uuid::new_v4();
        let start_time = Instant::now();

        info!(%run_id, query = %query, "Orchestrator: starting workflow");
        enter(run_id, WorkflowStage::Idle);

        // === CLASSIFY ===
        enter(run_id, WorkflowStage::Classifying);
        let classification = self.classify(query).await?;

        info!(
            %run_id,
            analysis_type = %classification.analysis_type,
            security = ?classification.security,
            sector = ?classification.sector,
            "Query classified"
        );

        emit(
            events,
            EventKind::Classification {
                payload: classification.clone(),
            },
        )
        .await;

        // === SELECT ===
        enter(run_id, WorkflowStage::Selecting);
        let selection_type = match classification.analysis_type {
            AnalysisType::Unknown => AnalysisType::Both,
            other => other,
        };
        let selected = self.registry.select_analysts(
            selection_type,
            classification.security.as_deref(),
            classification.sector.as_deref(),
        );

        // === DELEGATE ===
        let mut state = RunState::new();

        for (k, role) in selected.iter().copied().enumerate() {
            ensure_listening(events)?;
            enter(run_id, WorkflowStage::Delegating(k));

            let context = state.context_for(&classification);

            emit(
                events,
                EventKind::AnalystStart {
                    agent: role,
                    instruction: context.instruction.clone(),
                },
            )
            .await;

            if events.is_some() {
                for (tool, args) in expected_tool_calls(role, classification.security.as_deref()) {
                    emit(
                        events,
                        EventKind::ToolCall {
                            agent: role,
                            tool: tool.to_string(),
                            args,
                        },
                    )
                    .await;
                }
            }

            let output = self.run_analyst(role, &context).await?;

            emit(
                events,
                EventKind::AnalystEnd {
                    agent: role,
                    summary: preview(&output.text, SUMMARY_PREVIEW_CHARS),
                },
            )
            .await;

            debug!(%run_id, role = %role, chars = output.text.len(), "Analyst finished");
            state.record(role, output.text);
        }

        // === SYNTHESIZE ===
        ensure_listening(events)?;
        enter(run_id, WorkflowStage::Synthesizing);
        let findings = state.findings();

        let risk = score_risk(&findings.risk);
        emit(
            events,
            EventKind::RiskScore {
                score: risk.score,
                label: risk.label.to_string(),
            },
        )
        .await;

        let strategy = self.synthesize(query, &classification, &findings).await?;

        // === DONE ===
        enter(run_id, WorkflowStage::Done);

        let answer = serde_json::to_string(&strategy)?;
        self.conversation_log
            .append_exchange(run_id, query, answer)
            .await;

        info!(
            %run_id,
            direction = %strategy.direction,
            confidence = %strategy.confidence,
            degraded = strategy.is_degraded(),
            analysts = selected.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Workflow complete"
        );

        Ok(strategy)
    }

    /// Resolve the role's delegate, constructing the default on first use
    async fn resolve_delegate(&self, role: AnalystRole) -> Arc<dyn Delegate> {
        self.registry
            .get_or_register(role, || {
                build_analyst(role, self.service.clone(), &self.settings.risk_limits)
            })
            .await
    }

    async fn run_analyst(&self, role: AnalystRole, context: &DelegateContext) -> Result<DelegateOutput> {
        let delegate = self.resolve_delegate(role).await;
        let message = context.render();
        self.with_timeout(role.as_str(), delegate.run(&message)).await
    }

    async fn synthesize(
        &self,
        query: &str,
        classification: &ClassificationResult,
        findings: &Findings,
    ) -> Result<Strategy> {
        let input = synthesis_input(query, findings);

        let completion = self
            .with_timeout(
                SYNTHESIZER_AGENT,
                self.service.complete(CompletionRequest {
                    agent: SYNTHESIZER_AGENT,
                    instructions: SYNTHESIZER_INSTRUCTIONS,
                    input: &input,
                    json_output: true,
                }),
            )
            .await?;

        let recovered = recover(&completion, |raw| {
            fallback_strategy(classification.security.clone(), findings, raw)
        });

        if recovered.is_fallback() {
            warn!("Synthesis output unparsable, returning degraded HOLD strategy");
        }

        let mut strategy = recovered.into_inner();
        let has_security = strategy
            .security
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false);
        if !has_security {
            strategy.security = classification.security.clone();
        }

        Ok(strategy)
    }

    /// Bound a collaborator call by the configured timeout
    async fn with_timeout<T, F>(&self, collaborator: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.settings.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(collaborator, timeout = ?self.settings.call_timeout, "Collaborator call timed out");
                Err(OrchestrationError::Timeout(format!(
                    "{} did not respond within {:?}",
                    collaborator, self.settings.call_timeout
                )))
            }
        }
    }
}

fn enter(run_id: Uuid, stage: WorkflowStage) {
    debug!(%run_id, %stage, "Workflow stage");
}

/// A streaming run whose receiver is gone stops at the next stage boundary
fn ensure_listening(events: Option<&mpsc::Sender<StreamEvent>>) -> Result<()> {
    match events {
        Some(events) if events.is_closed() => Err(OrchestrationError::Cancelled(
            "stream receiver dropped".to_string(),
        )),
        _ => Ok(()),
    }
}

async fn emit(events: Option<&mpsc::Sender<StreamEvent>>, kind: EventKind) {
    let Some(events) = events else {
        return;
    };

    let event = StreamEvent::now(kind);
    let name = event.name();
    if events.send(event).await.is_err() {
        debug!(event = name, "Stream receiver dropped, event discarded");
    }
}

fn synthesis_input(query: &str, findings: &Findings) -> String {
    format!(
        "User query: {}\n\n\
         Technical Analyst findings:\n{}\n\n\
         Fundamental Analyst findings:\n{}\n\n\
         Risk Management findings:\n{}\n\n\
         Produce the structured Securities Trading Strategy (direction, confidence, summaries, rationale, conditions, warnings).",
        query, findings.technical, findings.fundamental, findings.risk
    )
}

fn fallback_strategy(security: Option<String>, findings: &Findings, raw: &str) -> Strategy {
    Strategy {
        security,
        direction: "HOLD".to_string(),
        confidence: "LOW".to_string(),
        technical_summary: preview(&findings.technical, FINDING_PREVIEW_CHARS),
        fundamental_summary: preview(&findings.fundamental, FINDING_PREVIEW_CHARS),
        risk_assessment: preview(&findings.risk, FINDING_PREVIEW_CHARS),
        rationale: if raw.is_empty() {
            "Synthesis failed.".to_string()
        } else {
            preview(raw, FINDING_PREVIEW_CHARS)
        },
        conditions: vec![],
        warnings: vec![DEGRADED_SYNTHESIS_WARNING.to_string()],
    }
}

/// Lookups an analyst is expected to make for a known security
fn expected_tool_calls(role: AnalystRole, security: Option<&str>) -> Vec<(&'static str, Value)> {
    let Some(symbol) = security else {
        return Vec::new();
    };

    match role {
        AnalystRole::Technical => vec![
            ("get_price_history", json!({ "symbol": symbol, "period": "1mo" })),
            ("get_volume_analysis", json!({ "symbol": symbol })),
        ],
        AnalystRole::Fundamental => vec![("get_earnings_summary", json!({ "symbol": symbol }))],
        AnalystRole::Risk => vec![("evaluate_volatility", json!({ "symbol": symbol }))],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedCompletionService;
    use async_trait::async_trait;
    use std::time::Duration;

    const MSFT_CLASSIFICATION: &str = r#"{"analysis_type":"both","security":"MSFT","sector":"technology","time_horizon":null,"raw_intent":"trading strategy for MSFT"}"#;
    const MSFT_STRATEGY: &str = r#"{"security":"MSFT","direction":"BUY","confidence":"HIGH","technical_summary":"uptrend","fundamental_summary":"strong cloud growth","risk_assessment":"within limits","rationale":"aligned signals","conditions":["holds above 50-day MA"],"warnings":[]}"#;

    fn msft_service() -> ScriptedCompletionService {
        ScriptedCompletionService::new()
            .with_reply("classifier", MSFT_CLASSIFICATION)
            .with_reply("technical_analyst", "MSFT is above its 200-day moving average.")
            .with_reply("fundamental_analyst", "Azure revenue grew strongly; margins expanding.")
            .with_reply("risk_analyst", "Annualized volatility 24%. Result: WITHIN limit.")
            .with_reply("synthesizer", MSFT_STRATEGY)
    }

    fn orchestrator(service: Arc<ScriptedCompletionService>) -> Orchestrator {
        Orchestrator::new(service, Arc::new(AgentRegistry::new()), RunSettings::default())
    }

    async fn collect(orchestrator: &Orchestrator, query: &str) -> Vec<StreamEvent> {
        let (tx, mut rx) = mpsc::channel(64);
        orchestrator.run_streaming(query, tx).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_end_to_end_order_and_context_propagation() {
        let service = Arc::new(msft_service());
        let orchestrator = orchestrator(service.clone());

        let strategy = orchestrator
            .run_workflow("Give me a trading strategy for MSFT")
            .await
            .unwrap();

        assert_eq!(strategy.direction, "BUY");
        assert_eq!(strategy.security.as_deref(), Some("MSFT"));
        assert!(!strategy.is_degraded());

        let agents: Vec<String> = service.requests().into_iter().map(|r| r.agent).collect();
        assert_eq!(
            agents,
            vec!["classifier", "technical_analyst", "fundamental_analyst", "risk_analyst", "synthesizer"]
        );

        let technical = &service.requests_for("technical_analyst")[0].input;
        let fundamental = &service.requests_for("fundamental_analyst")[0].input;
        let risk = &service.requests_for("risk_analyst")[0].input;

        assert!(fundamental.contains("Technical: MSFT is above its 200-day moving average."));
        assert!(!technical.contains("Shared facts"));
        assert!(!technical.contains("Fundamental:"));
        assert!(risk.contains("Technical: MSFT"));
        assert!(risk.contains("Fundamental: Azure"));
        assert!(risk.contains("Security/ticker: MSFT"));

        let synthesis = &service.requests_for("synthesizer")[0].input;
        assert!(synthesis.starts_with("User query: Give me a trading strategy for MSFT"));
        assert!(synthesis.contains("Risk Management findings:\nAnnualized volatility 24%"));
    }

    #[tokio::test]
    async fn test_unparsable_classification_runs_default_analysts() {
        let service = Arc::new(
            ScriptedCompletionService::new()
                .with_reply("classifier", "Sure! Let me think about markets in general.")
                .with_reply("synthesizer", "I cannot comply."),
        );
        let orchestrator = orchestrator(service.clone());

        let classification = orchestrator.classify("markets?").await.unwrap();
        assert_eq!(classification.analysis_type, AnalysisType::Unknown);
        assert_eq!(classification.raw_intent, "Sure! Let me think about markets in general.");

        let strategy = orchestrator.run_workflow("markets?").await.unwrap();

        let analysts: Vec<String> = service
            .requests()
            .into_iter()
            .map(|r| r.agent)
            .filter(|a| a.ends_with("_analyst"))
            .collect();
        // Two classify calls above, one workflow: technical then fundamental, no risk
        assert_eq!(analysts, vec!["technical_analyst", "fundamental_analyst"]);

        assert_eq!(strategy.direction, "HOLD");
        assert_eq!(strategy.confidence, "LOW");
        assert!(strategy.security.is_none());
        assert_eq!(strategy.rationale, "I cannot comply.");
        assert_eq!(strategy.risk_assessment, state::NO_RISK);
        assert!(!strategy.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_degraded_synthesis_keeps_classified_security() {
        let service = Arc::new(
            ScriptedCompletionService::new()
                .with_reply(
                    "classifier",
                    r#"{"analysis_type":"risk_only","security":"TSLA","raw_intent":"TSLA risk"}"#,
                )
                .with_reply("risk_analyst", "Volatility EXCEEDS limit.")
                .with_reply("synthesizer", "I cannot comply."),
        );
        let orchestrator = orchestrator(service.clone());

        let strategy = orchestrator.run_workflow("How risky is TSLA?").await.unwrap();

        assert_eq!(service.requests_for("risk_analyst").len(), 1);
        assert!(service.requests_for("technical_analyst").is_empty());
        assert_eq!(strategy.security.as_deref(), Some("TSLA"));
        assert_eq!(strategy.technical_summary, state::NO_TECHNICAL);
        assert!(strategy.is_degraded());
    }

    #[tokio::test]
    async fn test_missing_security_filled_from_classification() {
        let service = Arc::new(
            ScriptedCompletionService::new()
                .with_reply(
                    "classifier",
                    r#"{"analysis_type":"technical","security":"AAPL","raw_intent":"AAPL chart"}"#,
                )
                .with_reply(
                    "synthesizer",
                    "```json\n{\"direction\":\"SELL\",\"confidence\":\"MEDIUM\",\"technical_summary\":\"t\",\"fundamental_summary\":\"f\",\"risk_assessment\":\"r\",\"rationale\":\"x\"}\n```",
                ),
        );
        let orchestrator = orchestrator(service);

        let strategy = orchestrator.run_workflow("AAPL chart?").await.unwrap();
        assert_eq!(strategy.direction, "SELL");
        assert_eq!(strategy.security.as_deref(), Some("AAPL"));
        assert!(strategy.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_single_shot() {
        let service = Arc::new(msft_service());
        let orchestrator = orchestrator(service.clone());

        let result = orchestrator.run_workflow("   ").await;
        assert!(matches!(result, Err(OrchestrationError::EmptyQuery)));
        assert!(service.requests().is_empty());
    }

    #[tokio::test]
    async fn test_streaming_empty_query_emits_single_null_strategy() {
        let service = Arc::new(msft_service());
        let orchestrator = orchestrator(service.clone());

        let events = collect(&orchestrator, "").await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "strategy");
        assert!(matches!(
            events[0].kind,
            EventKind::Strategy { payload: None, .. }
        ));
        assert!(service.requests().is_empty());
    }

    #[tokio::test]
    async fn test_streaming_event_order() {
        let orchestrator = orchestrator(Arc::new(msft_service()));

        let events = collect(&orchestrator, "Give me a trading strategy for MSFT").await;
        let names: Vec<&str> = events.iter().map(|e| e.name()).collect();

        assert_eq!(
            names,
            vec![
                "classification",
                "analyst_start",
                "tool_call",
                "tool_call",
                "analyst_end",
                "analyst_start",
                "tool_call",
                "analyst_end",
                "analyst_start",
                "tool_call",
                "analyst_end",
                "risk_score",
                "strategy",
            ]
        );
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

        match &events[11].kind {
            EventKind::RiskScore { score, label } => {
                assert_eq!(*score, 25);
                assert_eq!(label, "Moderate");
            }
            other => panic!("expected risk_score, got {:?}", other),
        }

        match &events[12].kind {
            EventKind::Strategy { payload: Some(strategy), error: None } => {
                assert_eq!(strategy.direction, "BUY");
            }
            other => panic!("expected strategy, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_streaming_classifier_outage_still_terminates() {
        let service = Arc::new(ScriptedCompletionService::new().with_unavailable("classifier"));
        let orchestrator = orchestrator(service);

        let events = collect(&orchestrator, "strategy for NVDA").await;

        assert_eq!(events.len(), 1);
        match &events[0].kind {
            EventKind::Strategy { payload: None, error: Some(error) } => {
                assert!(error.contains("unavailable"));
            }
            other => panic!("expected null strategy, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_blank_security_is_treated_as_absent() {
        let service = Arc::new(
            ScriptedCompletionService::new()
                .with_reply(
                    "classifier",
                    r#"{"analysis_type":"technical","security":"","raw_intent":"chart reading"}"#,
                )
                .with_reply("synthesizer", MSFT_STRATEGY),
        );
        let orchestrator = orchestrator(service.clone());

        let events = collect(&orchestrator, "read the chart").await;
        let names: Vec<&str> = events.iter().map(|e| e.name()).collect();

        assert_eq!(
            names,
            vec!["classification", "analyst_start", "analyst_end", "risk_score", "strategy"]
        );
        match &events[0].kind {
            EventKind::Classification { payload } => assert!(payload.security.is_none()),
            other => panic!("expected classification, got {:?}", other),
        }
        let technical = &service.requests_for("technical_analyst")[0].input;
        assert!(!technical.contains("Security/ticker"));
        assert!(service.requests_for("risk_analyst").is_empty());
    }

    struct Gated {
        release: tokio::sync::Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl Delegate for Gated {
        fn role(&self) -> AnalystRole {
            AnalystRole::Technical
        }

        async fn run(&self, _message: &str) -> Result<DelegateOutput> {
            if let Some(release) = self.release.lock().await.take() {
                let _ = release.await;
            }
            Ok(DelegateOutput {
                text: "gated view".to_string(),
                value: None,
            })
        }
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_streaming_run() {
        let service = Arc::new(msft_service());
        let registry = Arc::new(AgentRegistry::new());
        let (release_tx, release_rx) = tokio::sync::oneshot::channel();
        registry
            .register(
                AnalystRole::Technical,
                Arc::new(Gated {
                    release: tokio::sync::Mutex::new(Some(release_rx)),
                }),
            )
            .await;
        let orchestrator = Orchestrator::new(service.clone(), registry, RunSettings::default());

        let (tx, mut rx) = mpsc::channel::<StreamEvent>(64);
        let client = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(event) = rx.recv().await {
                let name = event.name();
                seen.push(name);
                if name == "analyst_start" {
                    break;
                }
            }
            // Disconnect while the technical analyst is still running
            drop(rx);
            let _ = release_tx.send(());
            seen
        });

        orchestrator
            .run_streaming("Give me a trading strategy for MSFT", tx)
            .await;

        let seen = client.await.unwrap();
        assert_eq!(seen, vec!["classification", "analyst_start"]);
        assert!(service.requests_for("fundamental_analyst").is_empty());
        assert!(service.requests_for("risk_analyst").is_empty());
        assert!(service.requests_for("synthesizer").is_empty());
        assert_eq!(orchestrator.conversation_log().message_count().await, 0);
    }

    #[tokio::test]
    async fn test_analyst_outage_fails_run() {
        let service = Arc::new(msft_service().with_unavailable("fundamental_analyst"));
        let orchestrator = orchestrator(service.clone());

        let result = orchestrator.run_workflow("Give me a trading strategy for MSFT").await;

        assert!(matches!(result, Err(OrchestrationError::CollaboratorUnavailable(_))));
        assert!(service.requests_for("risk_analyst").is_empty());
        assert!(service.requests_for("synthesizer").is_empty());
        assert_eq!(orchestrator.conversation_log().message_count().await, 0);
    }

    struct Stalled;

    #[async_trait]
    impl Delegate for Stalled {
        fn role(&self) -> AnalystRole {
            AnalystRole::Technical
        }

        async fn run(&self, _message: &str) -> Result<DelegateOutput> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(DelegateOutput::default())
        }
    }

    #[tokio::test]
    async fn test_stalled_analyst_times_out() {
        let service = Arc::new(msft_service());
        let registry = Arc::new(AgentRegistry::new());
        registry.register(AnalystRole::Technical, Arc::new(Stalled)).await;

        let settings = RunSettings {
            call_timeout: Duration::from_millis(50),
            ..RunSettings::default()
        };
        let orchestrator = Orchestrator::new(service, registry, settings);

        let result = orchestrator.run_workflow("Give me a trading strategy for MSFT").await;
        assert!(matches!(result, Err(OrchestrationError::Timeout(ref m)) if m.contains("technical_analyst")));
    }

    struct Canned(AnalystRole, &'static str);

    #[async_trait]
    impl Delegate for Canned {
        fn role(&self) -> AnalystRole {
            self.0
        }

        async fn run(&self, _message: &str) -> Result<DelegateOutput> {
            Ok(DelegateOutput {
                text: self.1.to_string(),
                value: None,
            })
        }
    }

    #[tokio::test]
    async fn test_registered_delegates_are_reused() {
        let service = Arc::new(msft_service());
        let registry = Arc::new(AgentRegistry::new());
        registry
            .register(AnalystRole::Technical, Arc::new(Canned(AnalystRole::Technical, "registered view")))
            .await;
        let orchestrator = Orchestrator::new(service.clone(), registry.clone(), RunSettings::default());

        orchestrator.run_workflow("strategy for MSFT").await.unwrap();
        orchestrator.run_workflow("strategy for MSFT again").await.unwrap();

        assert!(service.requests_for("technical_analyst").is_empty());
        let fundamental = service.requests_for("fundamental_analyst");
        assert_eq!(fundamental.len(), 2);
        assert!(fundamental[0].input.contains("Technical: registered view"));
        assert_eq!(
            registry.registered_roles().await,
            vec![AnalystRole::Technical, AnalystRole::Fundamental, AnalystRole::Risk]
        );
        assert_eq!(orchestrator.conversation_log().message_count().await, 4);
    }

    #[test]
    fn test_expected_tool_calls_need_security() {
        assert!(expected_tool_calls(AnalystRole::Technical, None).is_empty());
        let calls = expected_tool_calls(AnalystRole::Risk, Some("TSLA"));
        assert_eq!(calls[0].0, "evaluate_volatility");
        assert_eq!(calls[0].1["symbol"], "TSLA");
    }
}
