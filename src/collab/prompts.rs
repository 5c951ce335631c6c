//! Collaboration Prompts

use super::registry::WorkerProfile;
use super::types::{PeerReview, WorkerResponse};
use crate::ai::provider::{role_instruction, task_header};
use crate::types::{Query, truncate_chars};

pub const TASK_WORKER: &str = "worker_analysis";
pub const TASK_REVIEW: &str = "peer_review";
pub const TASK_SELF_CRITIQUE: &str = "self_critique";
pub const TASK_SYNTHESIS: &str = "consensus_synthesis";

const MAX_RESPONSE_CHARS: usize = 3000;

fn question(query: &Query) -> String {
    format!(
        "# Question\n\n{}\n\nDataset: {} | Audience: {} | Complexity: {}\n\n",
        query.text, query.dataset_id, query.role, query.complexity
    )
}

pub fn build_worker_prompt(profile: &WorkerProfile, query: &Query, data: &str) -> String {
    let mut prompt = task_header(TASK_WORKER);
    prompt.push_str(&format!("\n{}\n{}\n\n", profile.persona(), role_instruction(query.role)));
    prompt.push_str(&question(query));
    prompt.push_str(&format!("# Data\n\n{}\n\n", data));
    prompt.push_str(
        "# Output\n\n\
         Your answer first, then:\n\n\
         ## Reasoning\n- ...\n\n## Evidence\n- ...\n\n## Uncertainties\n- ...\n\n\
         Confidence: <0-1>\n",
    );
    prompt
}

pub fn build_review_prompt(reviewer: &WorkerProfile, query: &Query, response: &WorkerResponse) -> String {
    let mut prompt = task_header(TASK_REVIEW);
    prompt.push_str(&format!("\n{}\n", reviewer.persona()));
    if !reviewer.review_capabilities.is_empty() {
        prompt.push_str(&format!(
            "Focus on: {}.\n",
            reviewer.review_capabilities.join(", ")
        ));
    }
    prompt.push('\n');
    prompt.push_str(&question(query));
    prompt.push_str(&format!(
        "# Response by {} (confidence {:.2})\n\n{}\n\n",
        response.worker_id,
        response.confidence,
        truncate_chars(&response.content, MAX_RESPONSE_CHARS)
    ));
    prompt.push_str(
        "# Output\n\n\
         Agreement: <0-1>\n\
         Verdict: approve | revise | reject\n\
         Delta: <confidence adjustment between -0.5 and 0.5>\n\n\
         ## Critiques\n- ...\n\n## Suggestions\n- ...\n",
    );
    prompt
}

pub fn build_self_critique_prompt(
    profile_persona: &str,
    query: &Query,
    response: &WorkerResponse,
    reviews: &[&PeerReview],
) -> String {
    let mut prompt = task_header(TASK_SELF_CRITIQUE);
    prompt.push_str(&format!("\n{}\nRevise your answer using the peer feedback.\n\n", profile_persona));
    prompt.push_str(&question(query));
    prompt.push_str(&format!("# Your answer\n\n{}\n\n# Feedback\n\n", response.content));
    for review in reviews {
        for critique in &review.critiques {
            prompt.push_str(&format!("- Critique ({}): {}\n", review.reviewer_id, critique));
        }
        for suggestion in &review.suggestions {
            prompt.push_str(&format!("- Suggestion ({}): {}\n", review.reviewer_id, suggestion));
        }
    }
    prompt.push_str("\nReply with the revised answer only.\n");
    prompt
}

pub fn build_synthesis_prompt(
    query: &Query,
    responses: &[&WorkerResponse],
    critiques: &[String],
) -> String {
    let mut prompt = task_header(TASK_SYNTHESIS);
    prompt.push_str(&format!(
        "\nCombine the worker answers into one.\n{}\n\n",
        role_instruction(query.role)
    ));
    prompt.push_str(&question(query));
    for response in responses {
        prompt.push_str(&format!(
            "# {} (confidence {:.2})\n\n{}\n\n",
            response.worker_id,
            response.confidence,
            truncate_chars(&response.content, MAX_RESPONSE_CHARS)
        ));
    }
    if !critiques.is_empty() {
        prompt.push_str("# Open critiques\n\n");
        for critique in critiques {
            prompt.push_str(&format!("- {}\n", critique));
        }
        prompt.push('\n');
    }
    prompt.push_str(
        "Write the combined answer, then:\n\n\
         ## Strengths\n- ...\n\n## Weaknesses\n- ...\n\n\
         ## Recommendations\n- ...\n\n## Limitations\n- ...\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::task_name;
    use crate::collab::registry::{generalist_analyst, generalist_validator};
    use crate::types::WorkerId;

    #[test]
    fn test_review_prompt_names_author_and_focus() {
        let response = WorkerResponse::new(WorkerId::new("generalist_analyst"), "Sales rose.", 0.7);
        let p = build_review_prompt(&generalist_validator(), &Query::new("q", "d"), &response);
        assert_eq!(task_name(&p), Some(TASK_REVIEW));
        assert!(p.contains("Response by generalist_analyst (confidence 0.70)"));
        assert!(p.contains("Focus on: data accuracy"));
    }

    #[test]
    fn test_worker_prompt_embeds_data() {
        let p = build_worker_prompt(&generalist_analyst(), &Query::new("q", "d"), "3 rows");
        assert_eq!(task_name(&p), Some(TASK_WORKER));
        assert!(p.contains("# Data\n\n3 rows"));
    }
}
