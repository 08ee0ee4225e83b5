//! Core data models for the trading strategy workflow

use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Enums =================
//

/// Which analysis path(s) a user query requires
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    #[serde(alias = "TECHNICAL")]
    Technical,
    #[serde(alias = "FUNDAMENTAL")]
    Fundamental,
    #[serde(alias = "BOTH")]
    Both,
    #[serde(alias = "RISK_ONLY")]
    RiskOnly,
    #[serde(alias = "UNKNOWN")]
    Unknown,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Technical => "technical",
            AnalysisType::Fundamental => "fundamental",
            AnalysisType::Both => "both",
            AnalysisType::RiskOnly => "risk_only",
            AnalysisType::Unknown => "unknown",
        }
    }
}

//
// ================= Classification =================
//

/// Output of the intent classifier. Produced once per run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationResult {
    pub analysis_type: AnalysisType,
    #[serde(default)]
    pub security: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub time_horizon: Option<String>,
    pub raw_intent: String,
}

impl ClassificationResult {
    /// Fallback record used when the classifier output cannot be parsed
    pub fn unknown(raw_intent: String) -> Self {
        Self {
            analysis_type: AnalysisType::Unknown,
            security: None,
            sector: None,
            time_horizon: None,
            raw_intent,
        }
    }

    /// Trim optional fields and drop blank ones, so "" never reads as a symbol
    pub fn normalized(mut self) -> Self {
        for field in [&mut self.security, &mut self.sector, &mut self.time_horizon] {
            *field = field
                .take()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        self
    }
}

//
// ================= Strategy =================
//

/// Final structured output of a workflow run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Strategy {
    #[serde(default)]
    pub security: Option<String>,
    /// BUY / SELL / HOLD, as chosen by synthesis
    pub direction: String,
    /// LOW / MEDIUM / HIGH
    pub confidence: String,
    pub technical_summary: String,
    pub fundamental_summary: String,
    pub risk_assessment: String,
    pub rationale: String,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Strategy {
    /// Degraded synthesis flags itself through `warnings`
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        let thin = "-".repeat(60);

        writeln!(f, "{}", rule)?;
        writeln!(f, "SECURITIES TRADING STRATEGY")?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Security:     {}", self.security.as_deref().unwrap_or("N/A"))?;
        writeln!(f, "Direction:    {}", self.direction)?;
        writeln!(f, "Confidence:   {}", self.confidence)?;
        writeln!(f, "{}", thin)?;
        writeln!(f, "Technical summary:\n{}", self.technical_summary)?;
        writeln!(f, "{}", thin)?;
        writeln!(f, "Fundamental summary:\n{}", self.fundamental_summary)?;
        writeln!(f, "{}", thin)?;
        writeln!(f, "Risk assessment:\n{}", self.risk_assessment)?;
        writeln!(f, "{}", thin)?;
        writeln!(f, "Rationale:\n{}", self.rationale)?;
        if !self.conditions.is_empty() {
            writeln!(f, "Conditions: {:?}", self.conditions)?;
        }
        if !self.warnings.is_empty() {
            writeln!(f, "Warnings: {:?}", self.warnings)?;
        }
        write!(f, "{}", rule)
    }
}
