//! Reflection pipeline types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pipeline stage recorded in the trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Planning,
    Analysis,
    Validation,
    Critique,
    Refinement,
    Synthesis,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Analysis => "analysis",
            Self::Validation => "validation",
            Self::Critique => "critique",
            Self::Refinement => "refinement",
            Self::Synthesis => "synthesis",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one stage. Appended to the trace, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Stage,
    /// 0 outside the critique loop
    pub iteration: usize,
    pub narrative: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Generator failed and a fixed fallback stood in
    #[serde(default)]
    pub degraded: bool,
}

impl StageResult {
    pub fn new(stage: Stage, narrative: impl Into<String>, confidence: f32) -> Self {
        Self {
            stage,
            iteration: 0,
            narrative: narrative.into(),
            data: None,
            confidence: confidence.clamp(0.0, 1.0),
            errors: Vec::new(),
            suggestions: Vec::new(),
            degraded: false,
        }
    }

    pub fn degraded(stage: Stage, narrative: impl Into<String>, confidence: f32, error: String) -> Self {
        Self {
            errors: vec![error],
            degraded: true,
            ..Self::new(stage, narrative, confidence)
        }
    }

    pub fn at_iteration(mut self, iteration: usize) -> Self {
        self.iteration = iteration;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Plan produced by the planning stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisPlan {
    pub complexity: String,
    pub data_requirements: Vec<String>,
    pub analysis_steps: Vec<String>,
    pub validation_checks: Vec<String>,
    pub confidence_threshold: f32,
    pub estimated_time_secs: u64,
}

impl Default for AnalysisPlan {
    fn default() -> Self {
        Self {
            complexity: "medium".to_string(),
            data_requirements: vec!["Rows relevant to the question".to_string()],
            analysis_steps: vec![
                "Query the dataset".to_string(),
                "Summarize the key figures".to_string(),
                "State caveats".to_string(),
            ],
            validation_checks: vec![
                "Figures match the query result".to_string(),
                "Conclusions follow from the data".to_string(),
            ],
            confidence_threshold: 0.7,
            estimated_time_secs: 60,
        }
    }
}

/// Where the answer's data came from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataProvenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    pub row_count: usize,
    pub cache_hit: bool,
    pub validation_passed: bool,
    /// Schema snippets the pipeline was grounded on
    #[serde(default)]
    pub schema_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionResult {
    pub final_answer: String,
    pub confidence: f32,
    pub plan: AnalysisPlan,
    pub stage_trace: Vec<StageResult>,
    pub data_provenance: DataProvenance,
    pub follow_ups: Vec<String>,
    pub limitations: Vec<String>,
    pub elapsed_ms: u64,
}

impl ReflectionResult {
    /// Data payload of the analysis stage, if any
    pub fn analysis_data(&self) -> Option<&Value> {
        self.stage_trace
            .iter()
            .find(|s| s.stage == Stage::Analysis)
            .and_then(|s| s.data.as_ref())
    }

    pub fn stages(&self, stage: Stage) -> impl Iterator<Item = &StageResult> {
        self.stage_trace.iter().filter(move |s| s.stage == stage)
    }
}

/// Weighted mean with weight `index + 1`, so later stages count more
pub fn recency_weighted_mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let (sum, weights) = values
        .iter()
        .enumerate()
        .fold((0.0f32, 0.0f32), |(sum, weights), (i, v)| {
            let w = (i + 1) as f32;
            (sum + v * w, weights + w)
        });
    (sum / weights).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recency_weighted_mean() {
        assert_eq!(recency_weighted_mean(&[]), 0.0);
        assert!((recency_weighted_mean(&[0.6]) - 0.6).abs() < 1e-6);
        // (0.9*1 + 0.3*2) / 3
        assert!((recency_weighted_mean(&[0.9, 0.3]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_plan_partial_json_fills_defaults() {
        let plan: AnalysisPlan =
            serde_json::from_str(r#"{"complexity":"high","analysis_steps":["rank"]}"#).unwrap();
        assert_eq!(plan.complexity, "high");
        assert_eq!(plan.analysis_steps, vec!["rank"]);
        assert_eq!(plan.estimated_time_secs, 60);
    }

    #[test]
    fn test_stage_confidence_clamped() {
        let s = StageResult::new(Stage::Critique, "ok", 1.4);
        assert_eq!(s.confidence, 1.0);
        let d = StageResult::degraded(Stage::Analysis, "fallback", 0.4, "boom".into());
        assert!(d.degraded);
        assert_eq!(d.errors, vec!["boom"]);
    }
}
