//! Agent registry
//!
//! Decides which analysts run for a classification, and holds the
//! lazily-constructed delegate for each role for the process lifetime.

use crate::agents::delegate::Delegate;
use crate::agents::roles::AnalystRole;
use crate::error::OrchestrationError;
use crate::models::AnalysisType;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub const DEFAULT_SECTOR: &str = "default";

/// Registry of analysts and the sector selection table
pub struct AgentRegistry {
    sector_to_analysts: HashMap<String, Vec<AnalystRole>>,
    agents: RwLock<HashMap<AnalystRole, Arc<dyn Delegate>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        use crate::agents::roles::AnalystRole::{Fundamental, Technical};

        let sector_to_analysts = HashMap::from([
            ("technology".to_string(), vec![Technical, Fundamental]),
            ("financials".to_string(), vec![Fundamental, Technical]),
            ("healthcare".to_string(), vec![Fundamental, Technical]),
            ("energy".to_string(), vec![Fundamental, Technical]),
            (DEFAULT_SECTOR.to_string(), vec![Technical, Fundamental]),
        ]);

        Self {
            sector_to_analysts,
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Built-in table with `overrides` merged on top.
    /// Any role name outside the fixed set is a configuration error. Sector
    /// lists name technical / fundamental analysts only: risk is appended
    /// by selection so it always runs last.
    pub fn with_sector_table(overrides: &HashMap<String, Vec<String>>) -> Result<Self> {
        let mut registry = Self::new();

        for (sector, roles) in overrides {
            let mut parsed: Vec<AnalystRole> = Vec::with_capacity(roles.len());
            for name in roles {
                let role: AnalystRole = name.parse()?;
                if role == AnalystRole::Risk {
                    return Err(OrchestrationError::ConfigError(format!(
                        "sector '{}' lists {}; risk is added automatically for a known security",
                        sector, role
                    )));
                }
                if !parsed.contains(&role) {
                    parsed.push(role);
                }
            }
            if parsed.is_empty() {
                return Err(OrchestrationError::ConfigError(format!(
                    "sector '{}' has no analysts",
                    sector
                )));
            }
            registry
                .sector_to_analysts
                .insert(normalize_sector(sector), parsed);
        }

        Ok(registry)
    }

    /// Bind a delegate to a role, replacing any previous one
    pub async fn register(&self, role: AnalystRole, agent: Arc<dyn Delegate>) {
        let mut agents = self.agents.write().await;
        agents.insert(role, agent);
    }

    pub async fn get_agent(&self, role: AnalystRole) -> Option<Arc<dyn Delegate>> {
        let agents = self.agents.read().await;
        agents.get(&role).cloned()
    }

    /// Return the role's delegate, constructing and registering it on first use.
    /// Concurrent first calls construct exactly once.
    pub async fn get_or_register<F>(&self, role: AnalystRole, build: F) -> Arc<dyn Delegate>
    where
        F: FnOnce() -> Arc<dyn Delegate>,
    {
        {
            let agents = self.agents.read().await;
            if let Some(agent) = agents.get(&role) {
                return agent.clone();
            }
        }

        let mut agents = self.agents.write().await;
        agents
            .entry(role)
            .or_insert_with(|| {
                info!(role = %role, "Constructing analyst delegate");
                build()
            })
            .clone()
    }

    pub async fn registered_roles(&self) -> Vec<AnalystRole> {
        let agents = self.agents.read().await;
        AnalystRole::ALL
            .into_iter()
            .filter(|role| agents.contains_key(role))
            .collect()
    }

    /// Ordered, duplicate-free analyst roles for a classification.
    /// A known security always pulls in the risk analyst last.
    pub fn select_analysts(
        &self,
        analysis_type: AnalysisType,
        security: Option<&str>,
        sector: Option<&str>,
    ) -> Vec<AnalystRole> {
        let mut selected = match analysis_type {
            AnalysisType::Technical => vec![AnalystRole::Technical],
            AnalysisType::Fundamental => vec![AnalystRole::Fundamental],
            AnalysisType::RiskOnly => vec![AnalystRole::Risk],
            AnalysisType::Both | AnalysisType::Unknown => self.sector_analysts(sector),
        };

        let has_security = security.map(|s| !s.trim().is_empty()).unwrap_or(false);
        if has_security && !selected.contains(&AnalystRole::Risk) {
            selected.push(AnalystRole::Risk);
        }

        debug!(
            analysis_type = %analysis_type,
            ?security,
            ?sector,
            ?selected,
            "Analysts selected"
        );

        selected
    }

    fn sector_analysts(&self, sector: Option<&str>) -> Vec<AnalystRole> {
        let key = sector
            .map(normalize_sector)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SECTOR.to_string());

        self.sector_to_analysts
            .get(&key)
            .or_else(|| self.sector_to_analysts.get(DEFAULT_SECTOR))
            .cloned()
            .unwrap_or_else(|| vec![AnalystRole::Technical, AnalystRole::Fundamental])
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_sector(sector: &str) -> String {
    sector.trim().to_lowercase()
}
