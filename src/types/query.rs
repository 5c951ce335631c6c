//! Request-level types shared by every subsystem.

use serde::{Deserialize, Serialize};

use crate::constants::collaboration::DEFAULT_CONSENSUS_THRESHOLD;

/// Audience the final answer is tailored for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Analyst,
    Executive,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyst => "analyst",
            Self::Executive => "executive",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-declared difficulty of a question
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    #[default]
    Moderate,
    Complex,
    Expert,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
            Self::Expert => "expert",
        }
    }

    /// Complex and expert questions get extra review coverage
    pub fn is_demanding(&self) -> bool {
        matches!(self, Self::Complex | Self::Expert)
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Review outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approve,
    #[default]
    Revise,
    Reject,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Revise => "revise",
            Self::Reject => "reject",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One analytical question. Immutable for the lifetime of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub dataset_id: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default = "default_consensus_threshold")]
    pub consensus_threshold: f32,
    /// Overrides the configured critique loop bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,
}

fn default_consensus_threshold() -> f32 {
    DEFAULT_CONSENSUS_THRESHOLD
}

impl Query {
    pub fn new(text: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            dataset_id: dataset_id.into(),
            role: Role::default(),
            complexity: Complexity::default(),
            consensus_threshold: DEFAULT_CONSENSUS_THRESHOLD,
            max_iterations: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    /// Threshold is clamped into [0, 1]
    pub fn with_consensus_threshold(mut self, threshold: f32) -> Self {
        self.consensus_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_defaults() {
        let q = Query::new("top suppliers by spend", "purchases");
        assert_eq!(q.role, Role::Analyst);
        assert_eq!(q.complexity, Complexity::Moderate);
        assert!((q.consensus_threshold - 0.7).abs() < f32::EPSILON);
        assert!(q.max_iterations.is_none());
    }

    #[test]
    fn test_consensus_threshold_clamped() {
        let q = Query::new("x", "d").with_consensus_threshold(1.7);
        assert_eq!(q.consensus_threshold, 1.0);
        let q = Query::new("x", "d").with_consensus_threshold(-0.2);
        assert_eq!(q.consensus_threshold, 0.0);
    }

    #[test]
    fn test_query_deserialize_with_defaults() {
        let q: Query =
            serde_json::from_str(r#"{"text":"q","dataset_id":"d","role":"executive"}"#).unwrap();
        assert_eq!(q.role, Role::Executive);
        assert_eq!(q.complexity, Complexity::Moderate);
        assert!((q.consensus_threshold - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_complexity_demanding() {
        assert!(!Complexity::Simple.is_demanding());
        assert!(!Complexity::Moderate.is_demanding());
        assert!(Complexity::Complex.is_demanding());
        assert!(Complexity::Expert.is_demanding());
    }
}
