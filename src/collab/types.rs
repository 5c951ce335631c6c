//! Collaboration types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GenerationMode;
use crate::types::{Query, QuorumError, Result, Verdict, WorkerId};

/// One worker's answer. Revisions are new values, never edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub id: String,
    pub worker_id: WorkerId,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_of: Option<String>,
    pub content: String,
    /// Data the answer was grounded on (SQL, sample rows, insights)
    #[serde(default)]
    pub analysis: Value,
    pub confidence: f32,
    #[serde(default)]
    pub reasoning_steps: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub uncertainties: Vec<String>,
    /// Fixed fallback standing in for a failed generation
    #[serde(default)]
    pub degraded: bool,
}

impl WorkerResponse {
    pub fn new(worker_id: WorkerId, content: impl Into<String>, confidence: f32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            worker_id,
            version: 1,
            revision_of: None,
            content: content.into(),
            analysis: Value::Null,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning_steps: Vec::new(),
            evidence: Vec::new(),
            uncertainties: Vec::new(),
            degraded: false,
        }
    }

    /// Next version with a new id, pointing back at this one
    pub fn revise(&self, content: String, confidence: f32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            version: self.version + 1,
            revision_of: Some(self.id.clone()),
            content,
            confidence: confidence.clamp(0.0, 1.0),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerReview {
    pub reviewer_id: WorkerId,
    pub target_response_id: String,
    pub target_worker_id: WorkerId,
    pub agreement: f32,
    #[serde(default)]
    pub critiques: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub confidence_delta: f32,
    pub verdict: Verdict,
    /// Fixed default standing in for a failed review
    #[serde(default)]
    pub degraded: bool,
}

impl PeerReview {
    /// Errors when the reviewer authored the target response
    pub fn new(
        reviewer_id: WorkerId,
        target: &WorkerResponse,
        agreement: f32,
        confidence_delta: f32,
        verdict: Verdict,
    ) -> Result<Self> {
        if reviewer_id == target.worker_id {
            return Err(QuorumError::orchestration(
                "review",
                format!("{} cannot review its own response", reviewer_id),
            ));
        }
        Ok(Self {
            reviewer_id,
            target_response_id: target.id.clone(),
            target_worker_id: target.worker_id.clone(),
            agreement: agreement.clamp(0.0, 1.0),
            critiques: Vec::new(),
            suggestions: Vec::new(),
            confidence_delta,
            verdict,
            degraded: false,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub narrative: String,
    pub consensus_level: f32,
    pub confidence: f32,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    pub limitations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborativeResult {
    pub query: Query,
    pub mode: GenerationMode,
    pub workers: Vec<WorkerId>,
    /// Every version, originals first (by confidence), then revisions
    pub responses: Vec<WorkerResponse>,
    pub reviews: Vec<PeerReview>,
    pub synthesis: SynthesisResult,
    pub consensus_reached: bool,
    /// Single-worker fallback produced this result
    pub degraded: bool,
    pub elapsed_ms: u64,
}

impl CollaborativeResult {
    /// Latest version of each worker's response
    pub fn final_responses(&self) -> Vec<&WorkerResponse> {
        latest_versions(&self.responses)
    }
}

/// Latest version per worker, in first-seen worker order
pub fn latest_versions(responses: &[WorkerResponse]) -> Vec<&WorkerResponse> {
    let mut latest: Vec<&WorkerResponse> = Vec::new();
    for response in responses {
        match latest.iter_mut().find(|r| r.worker_id == response.worker_id) {
            Some(slot) if response.version > slot.version => *slot = response,
            Some(_) => {}
            None => latest.push(response),
        }
    }
    latest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_rejects_own_response() {
        let response = WorkerResponse::new(WorkerId::new("a"), "answer", 0.8);
        assert!(PeerReview::new(WorkerId::new("a"), &response, 0.9, 0.0, Verdict::Approve).is_err());
        let review = PeerReview::new(WorkerId::new("b"), &response, 1.3, 0.0, Verdict::Approve).unwrap();
        assert_eq!(review.target_worker_id, "a");
        assert_eq!(review.agreement, 1.0);
    }

    #[test]
    fn test_revision_keeps_history() {
        let original = WorkerResponse::new(WorkerId::new("a"), "v1", 0.8);
        let revised = original.revise("v2".into(), 0.5);
        assert_eq!(revised.version, 2);
        assert_eq!(revised.revision_of.as_deref(), Some(original.id.as_str()));
        assert_ne!(revised.id, original.id);

        let all = vec![original.clone(), revised.clone()];
        let latest = latest_versions(&all);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].content, "v2");
    }
}
