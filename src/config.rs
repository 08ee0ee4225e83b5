//! Environment configuration
//!
//! Binaries call `dotenv::dotenv()` first, then `Settings::from_env()`.

use crate::error::OrchestrationError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_MAX_POSITION_PCT: f64 = 10.0;
pub const DEFAULT_MAX_VOLATILITY_PCT: f64 = 50.0;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PORT: u16 = 8000;

/// Trading limits handed to the risk analyst
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RiskLimits {
    pub max_position_pct: f64,
    pub max_volatility_pct: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_pct: DEFAULT_MAX_POSITION_PCT,
            max_volatility_pct: DEFAULT_MAX_VOLATILITY_PCT,
        }
    }
}

/// Per-run knobs consumed by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSettings {
    /// Upper bound on every classification / delegate / synthesis call
    pub call_timeout: Duration,
    pub risk_limits: RiskLimits,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            risk_limits: RiskLimits::default(),
        }
    }
}

/// Process configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub risk_limits: RiskLimits,
    pub call_timeout: Duration,
    /// Sector → ordered role names, merged over the built-in table
    pub sector_analysts: HashMap<String, Vec<String>>,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout_secs: u64 = parse_or(get("COLLABORATOR_TIMEOUT_SECS"), "COLLABORATOR_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(OrchestrationError::ConfigError(
                "COLLABORATOR_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        let sector_analysts = match get("SECTOR_ANALYSTS") {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                OrchestrationError::ConfigError(format!("SECTOR_ANALYSTS is not a JSON object of role lists: {}", e))
            })?,
            None => HashMap::new(),
        };

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => parse_value(&raw, "PORT")?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            risk_limits: RiskLimits {
                max_position_pct: parse_or(get("MAX_POSITION_PCT"), "MAX_POSITION_PCT", DEFAULT_MAX_POSITION_PCT)?,
                max_volatility_pct: parse_or(get("MAX_VOLATILITY_PCT"), "MAX_VOLATILITY_PCT", DEFAULT_MAX_VOLATILITY_PCT)?,
            },
            call_timeout: Duration::from_secs(timeout_secs),
            sector_analysts,
            port,
        })
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            call_timeout: self.call_timeout,
            risk_limits: self.risk_limits,
        }
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T> {
    match raw {
        Some(raw) => parse_value(&raw, key),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(raw: &str, key: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        OrchestrationError::ConfigError(format!("{} has invalid value '{}'", key, raw))
    })
}
