//! Worker profiles and the read-only registry that holds them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::WorkerId;

/// Part a worker plays in a collaboration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerRole {
    Primary,
    Reviewer,
    Validator,
    Synthesizer,
}

impl WorkerRole {
    /// Produces a response during parallel generation
    pub fn generates(&self) -> bool {
        matches!(self, Self::Primary | Self::Synthesizer)
    }

    /// Reviews other workers' responses
    pub fn reviews(&self) -> bool {
        matches!(self, Self::Reviewer | Self::Validator)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Reviewer => "reviewer",
            Self::Validator => "validator",
            Self::Synthesizer => "synthesizer",
        }
    }
}

impl std::fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub id: WorkerId,
    pub name: String,
    pub expertise: Vec<String>,
    pub role: WorkerRole,
    pub min_confidence: f32,
    pub review_capabilities: Vec<String>,
}

impl WorkerProfile {
    pub fn new(id: &str, name: &str, role: WorkerRole) -> Self {
        Self {
            id: WorkerId::new(id),
            name: name.to_string(),
            expertise: Vec::new(),
            role,
            min_confidence: 0.5,
            review_capabilities: Vec::new(),
        }
    }

    pub fn with_expertise(mut self, tags: &[&str]) -> Self {
        self.expertise = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_review_capabilities(mut self, caps: &[&str]) -> Self {
        self.review_capabilities = caps.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
        self
    }

    /// Persona line used in prompts
    pub fn persona(&self) -> String {
        if self.expertise.is_empty() {
            format!("You are the {} ({}).", self.name, self.role)
        } else {
            format!(
                "You are the {} ({}), expert in {}.",
                self.name,
                self.role,
                self.expertise.join(", ")
            )
        }
    }
}

// =============================================================================
// Standard Workers
// =============================================================================

pub mod ids {
    pub const PROCUREMENT: &str = "procurement_specialist";
    pub const RISK: &str = "risk_specialist";
    pub const FINANCIAL: &str = "financial_specialist";
    pub const GENERALIST: &str = "generalist_analyst";
    pub const PEER_REVIEWER: &str = "peer_reviewer";
    pub const DOMAIN_REVIEWER: &str = "domain_reviewer";
    pub const DATA_VALIDATOR: &str = "data_validator";
    pub const GENERALIST_VALIDATOR: &str = "generalist_validator";
    pub const SYNTHESIZER: &str = "executive_synthesizer";
}

pub fn generalist_analyst() -> WorkerProfile {
    WorkerProfile::new(ids::GENERALIST, "Generalist Analyst", WorkerRole::Primary)
        .with_expertise(&["descriptive statistics", "trend analysis"])
}

pub fn generalist_validator() -> WorkerProfile {
    WorkerProfile::new(
        ids::GENERALIST_VALIDATOR,
        "Generalist Validator",
        WorkerRole::Validator,
    )
    .with_review_capabilities(&["data accuracy", "logical consistency"])
}

/// Immutable set of worker profiles, shared behind `Arc`
#[derive(Debug, Clone, Default)]
pub struct WorkerRegistry {
    profiles: Vec<Arc<WorkerProfile>>,
}

impl WorkerRegistry {
    pub fn new(profiles: Vec<WorkerProfile>) -> Self {
        Self {
            profiles: profiles.into_iter().map(Arc::new).collect(),
        }
    }

    /// Specialists, reviewers, validators and the executive synthesizer
    pub fn standard() -> Self {
        Self::new(vec![
            WorkerProfile::new(ids::PROCUREMENT, "Procurement Specialist", WorkerRole::Primary)
                .with_expertise(&["supplier performance", "spend analysis", "contracts"])
                .with_min_confidence(0.6),
            WorkerProfile::new(ids::RISK, "Risk Specialist", WorkerRole::Primary)
                .with_expertise(&["supply risk", "concentration", "compliance"])
                .with_min_confidence(0.6),
            WorkerProfile::new(ids::FINANCIAL, "Financial Specialist", WorkerRole::Primary)
                .with_expertise(&["cost structure", "margins", "budget variance"])
                .with_min_confidence(0.6),
            generalist_analyst(),
            WorkerProfile::new(ids::PEER_REVIEWER, "Peer Reviewer", WorkerRole::Reviewer)
                .with_review_capabilities(&["reasoning quality", "evidence use"]),
            WorkerProfile::new(ids::DOMAIN_REVIEWER, "Domain Reviewer", WorkerRole::Reviewer)
                .with_review_capabilities(&["domain assumptions", "business relevance"]),
            WorkerProfile::new(ids::DATA_VALIDATOR, "Data Validator", WorkerRole::Validator)
                .with_review_capabilities(&["figure accuracy", "query correctness"])
                .with_min_confidence(0.7),
            generalist_validator(),
            WorkerProfile::new(ids::SYNTHESIZER, "Executive Synthesizer", WorkerRole::Synthesizer)
                .with_expertise(&["executive communication", "decision framing"]),
        ])
    }

    pub fn get(&self, id: &str) -> Option<Arc<WorkerProfile>> {
        self.profiles.iter().find(|p| p.id == id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<WorkerProfile>> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
