//! Analyst roles

use crate::error::OrchestrationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const TECHNICAL_ANALYST: &str = "technical_analyst";
pub const FUNDAMENTAL_ANALYST: &str = "fundamental_analyst";
pub const RISK_ANALYST: &str = "risk_analyst";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AnalystRole {
    #[serde(rename = "technical_analyst")]
    Technical,
    #[serde(rename = "fundamental_analyst")]
    Fundamental,
    #[serde(rename = "risk_analyst")]
    Risk,
}

impl AnalystRole {
    pub const ALL: [AnalystRole; 3] = [
        AnalystRole::Technical,
        AnalystRole::Fundamental,
        AnalystRole::Risk,
    ];

    /// Wire name, also used as the agent name for completion calls
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalystRole::Technical => TECHNICAL_ANALYST,
            AnalystRole::Fundamental => FUNDAMENTAL_ANALYST,
            AnalystRole::Risk => RISK_ANALYST,
        }
    }

    /// Prefix for shared facts
    pub fn label(&self) -> &'static str {
        match self {
            AnalystRole::Technical => "Technical",
            AnalystRole::Fundamental => "Fundamental",
            AnalystRole::Risk => "Risk",
        }
    }

    /// Whether later analysts see this role's findings.
    /// Risk always runs last, so its output is never re-shared.
    pub fn shares_findings(&self) -> bool {
        !matches!(self, AnalystRole::Risk)
    }
}

impl FromStr for AnalystRole {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            TECHNICAL_ANALYST => Ok(AnalystRole::Technical),
            FUNDAMENTAL_ANALYST => Ok(AnalystRole::Fundamental),
            RISK_ANALYST => Ok(AnalystRole::Risk),
            other => Err(OrchestrationError::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for AnalystRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_roles() {
        for role in AnalystRole::ALL {
            assert_eq!(role.as_str().parse::<AnalystRole>().unwrap(), role);
        }
    }

    #[test]
    fn test_unknown_role_is_error() {
        let err = "macro_analyst".parse::<AnalystRole>().unwrap_err();
        assert!(matches!(err, OrchestrationError::UnknownRole(ref r) if r == "macro_analyst"));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&AnalystRole::Risk).unwrap();
        assert_eq!(json, "\"risk_analyst\"");
    }
}
