//! Registry of configured specialist agents.

use crate::agents::SpecialistAgent;
use crate::engine::InferenceClient;
use crate::error::{CouncilError, Result};
use crate::models::Specialty;
use std::sync::Arc;

/// Name and specialty lookup over the configured set of specialists.
pub struct AgentRegistry {
    agents: Vec<Arc<SpecialistAgent>>,
}

impl AgentRegistry {
    /// Build one agent per configured specialty, all sharing the engine.
    pub fn new(engine: Arc<dyn InferenceClient>, specialties: &[Specialty]) -> Self {
        let agents = specialties
            .iter()
            .map(|&s| Arc::new(SpecialistAgent::new(s, Arc::clone(&engine))))
            .collect();
        Self { agents }
    }

    /// Resolve an agent by specialty; unknown specialties are a
    /// request-fatal configuration error.
    pub fn by_specialty(&self, specialty: Specialty) -> Result<Arc<SpecialistAgent>> {
        self.agents
            .iter()
            .find(|a| a.specialty() == specialty)
            .cloned()
            .ok_or_else(|| CouncilError::UnknownSpecialty(specialty.to_string()))
    }

    /// Resolve an agent by registered name.
    pub fn by_name(&self, name: &str) -> Option<Arc<SpecialistAgent>> {
        self.agents.iter().find(|a| a.name() == name).cloned()
    }

    /// All registered agents, in configuration order.
    pub fn agents(&self) -> &[Arc<SpecialistAgent>] {
        &self.agents
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// True when no agents are configured.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
