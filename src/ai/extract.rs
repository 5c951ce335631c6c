//! Structured Signal Extraction
//!
//! Free-form generated text is turned into typed values here. Every extractor
//! is total: malformed, adversarial or empty input yields the typed default,
//! never an error.
//!
//! | Extractor | Yields | Default |
//! |---|---|---|
//! | `extract_confidence` | score in [0,1] | caller-supplied |
//! | `extract_number` | labelled number | `None` |
//! | `extract_verdict` | approve/revise/reject | revise |
//! | `extract_list` | items under a heading | empty |
//! | `extract_bullets` | every bullet line | empty |
//! | `extract_preamble` | prose before the first heading | empty |
//! | `extract_checks` | pass/fail audit lines | empty |
//! | `extract_json` | typed JSON payload | `None` |

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai::json_repair::parse_json_lenient;
use crate::types::{ParseWithDefault, Verdict};

static CONFIDENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)confidence(?:\s+(?:score|level))?\s*(?:is|of)?\s*[:=]?\s*\**\s*(\d+(?:\.\d+)?)\s*(%)?",
    )
    .expect("valid confidence regex")
});

static VERDICT_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)verdict\s*[:=\-]?\s*\**\s*([a-z][a-z ]*)").expect("valid verdict regex")
});

static VERDICT_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(approve|approved|reject|rejected|revise|revision)\b")
        .expect("valid verdict word regex")
});

static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•+]|\d+[.)])\s+(.+?)\s*$").expect("valid bullet regex")
});

static CONFIDENCE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*[*_]*\s*confidence\b").expect("valid confidence line regex")
});

static HIGH_SEVERITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(high|critical|severe)\b").expect("valid severity regex")
});

// =============================================================================
// Numbers
// =============================================================================

/// Extract a confidence score in [0, 1]
///
/// Accepts `0.85`, `85%` and `85`; values above 1 are read as percentages.
pub fn extract_confidence(text: &str, default: f32) -> f32 {
    let Some(caps) = CONFIDENCE_RE.captures(text) else {
        return default;
    };
    let Some(raw) = caps.get(1).and_then(|m| m.as_str().parse::<f32>().ok()) else {
        return default;
    };
    if !raw.is_finite() {
        return default;
    }

    let value = if caps.get(2).is_some() || raw > 1.0 {
        raw / 100.0
    } else {
        raw
    };
    value.clamp(0.0, 1.0)
}

/// Extract the first number following `label` on the same line
pub fn extract_number(text: &str, label: &str) -> Option<f64> {
    let pattern = format!(
        r"(?i)\b{}\b[^\n0-9\-]{{0,24}}(-?\d+(?:\.\d+)?)",
        regex::escape(label)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(text)?
        .get(1)?
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Extract a labelled fraction in [0,1], e.g. `Agreement: 0.8` or `80%`
pub fn extract_fraction(text: &str, label: &str, default: f32) -> f32 {
    match extract_number(text, label) {
        Some(v) if v > 1.0 => (v / 100.0).clamp(0.0, 1.0) as f32,
        Some(v) => v.clamp(0.0, 1.0) as f32,
        None => default,
    }
}

// =============================================================================
// Enums
// =============================================================================

/// Extract a review verdict
///
/// An explicit `Verdict: X` label wins; otherwise the first verdict keyword
/// in the text. Nothing recognisable yields `Revise`.
pub fn extract_verdict(text: &str) -> Verdict {
    if let Some(caps) = VERDICT_LABEL_RE.captures(text)
        && let Some(word) = caps.get(1)
        && let Some(first) = word.as_str().split_whitespace().next()
        && let Some(verdict) = Verdict::try_parse(first)
    {
        return verdict;
    }

    VERDICT_WORD_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Verdict::try_parse(m.as_str()))
        .unwrap_or_else(Verdict::default_value)
}

// =============================================================================
// Lists
// =============================================================================

fn bullet_item(line: &str) -> Option<String> {
    BULLET_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_matches(['*', '_']).trim().to_string())
        .filter(|s| !s.is_empty())
}

fn is_heading(line: &str) -> bool {
    let t = line.trim();
    t.starts_with('#')
        || (t.ends_with(':') && bullet_item(t).is_none())
        || (t.starts_with("**") && t.ends_with("**") && t.len() > 4)
}

/// Extract bullet/numbered items listed under a heading containing `heading`
///
/// Collection stops at the next heading or at a blank line after items.
pub fn extract_list(text: &str, heading: &str) -> Vec<String> {
    let needle = heading.to_lowercase();
    let mut lines = text.lines();

    let found = lines
        .by_ref()
        .any(|line| is_heading(line) && line.to_lowercase().contains(&needle));
    if !found {
        return Vec::new();
    }

    let mut items = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            if items.is_empty() {
                continue;
            }
            break;
        }
        if let Some(item) = bullet_item(line) {
            items.push(item);
        } else if is_heading(line) {
            break;
        }
    }
    items
}

/// Extract every bullet/numbered item in the text
pub fn extract_bullets(text: &str) -> Vec<String> {
    text.lines().filter_map(bullet_item).collect()
}

/// Prose before the first markdown heading, without `Confidence:` lines
pub fn extract_preamble(text: &str) -> String {
    text.lines()
        .take_while(|line| !line.trim_start().starts_with('#'))
        .filter(|line| !CONFIDENCE_LINE_RE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

// =============================================================================
// Checks
// =============================================================================

/// One audit line from a validation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub description: String,
    pub passed: bool,
    pub high_severity: bool,
}

static PASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bPASS(?:ED|ES)?\b|[✓✅]").expect("valid pass regex"));

static FAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bFAIL(?:ED|S|URE)?\b|[✗❌]").expect("valid fail regex"));

fn check_outcome(upper: &str) -> Option<bool> {
    let fail = FAIL_RE.is_match(upper);
    let pass = PASS_RE.is_match(upper);
    match (pass, fail) {
        (_, true) => Some(false),
        (true, false) => Some(true),
        _ => None,
    }
}

/// Extract pass/fail check lines
///
/// A line is a check when it carries a PASS/FAIL (or ✓/✗) marker. Failed
/// checks mentioning high/critical/severe are high severity.
pub fn extract_checks(text: &str) -> Vec<Check> {
    text.lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return None;
            }
            let passed = check_outcome(&trimmed.to_uppercase())?;
            let high_severity = !passed && HIGH_SEVERITY_RE.is_match(trimmed);
            let description = bullet_item(trimmed).unwrap_or_else(|| trimmed.to_string());
            Some(Check {
                description,
                passed,
                high_severity,
            })
        })
        .collect()
}

// =============================================================================
// JSON
// =============================================================================

/// Extract and deserialize a JSON payload, repairing common damage
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Option<T> {
    let value = match parse_json_lenient(text) {
        Ok(v) => v,
        Err(e) => {
            debug!("Extract: no JSON payload: {}", e);
            return None;
        }
    };
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("Extract: JSON payload has unexpected shape: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_confidence_formats() {
        assert_eq!(extract_confidence("Confidence: 0.85", 0.5), 0.85);
        assert_eq!(extract_confidence("confidence score = 72%", 0.5), 0.72);
        assert_eq!(extract_confidence("My confidence is 90", 0.5), 0.9);
        assert_eq!(extract_confidence("**Confidence:** 0.6", 0.5), 0.6);
        assert_eq!(extract_confidence("Confidence: 450", 0.5), 1.0);
    }

    #[test]
    fn test_confidence_missing_uses_default() {
        assert_eq!(extract_confidence("no score given", 0.75), 0.75);
        assert_eq!(extract_confidence("", 0.3), 0.3);
    }

    #[test]
    fn test_extract_number() {
        assert_eq!(extract_number("Agreement: 0.8\nOther: 3", "agreement"), Some(0.8));
        assert_eq!(extract_number("confidence delta = -0.15", "delta"), Some(-0.15));
        assert_eq!(extract_number("agreement is high", "agreement"), None);
        assert_eq!(extract_number("x(1", "x("), Some(1.0));
    }

    #[test]
    fn test_extract_fraction() {
        assert_eq!(extract_fraction("Agreement: 80%", "agreement", 0.7), 0.8);
        assert_eq!(extract_fraction("Agreement: 0.4", "agreement", 0.7), 0.4);
        assert_eq!(extract_fraction("nothing", "agreement", 0.7), 0.7);
    }

    #[test]
    fn test_verdict_label_wins() {
        let text = "I would not reject this outright.\nVerdict: APPROVE";
        assert_eq!(extract_verdict(text), Verdict::Approve);
    }

    #[test]
    fn test_verdict_keyword_fallback() {
        assert_eq!(extract_verdict("The analysis should be rejected."), Verdict::Reject);
        assert_eq!(extract_verdict("Looks fine overall."), Verdict::Revise);
        assert_eq!(extract_verdict("Verdict: banana"), Verdict::Revise);
    }

    #[test]
    fn test_extract_list_under_heading() {
        let text = "Summary here.\n\nCritiques:\n- Missing Q4 data\n2. Totals unverified\n\nSuggestions:\n- Add Q4\n";
        assert_eq!(
            extract_list(text, "critiques"),
            vec!["Missing Q4 data", "Totals unverified"]
        );
        assert_eq!(extract_list(text, "suggestions"), vec!["Add Q4"]);
        assert!(extract_list(text, "risks").is_empty());
    }

    #[test]
    fn test_extract_list_markdown_heading() {
        let text = "## Follow-up questions\n\n* Which region drives growth?\n* Is churn seasonal?";
        assert_eq!(extract_list(text, "follow-up").len(), 2);
    }

    #[test]
    fn test_extract_bullets() {
        let text = "Intro\n- one\n  * two\n3) three\nnot a bullet";
        assert_eq!(extract_bullets(text), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_extract_preamble() {
        let text = "Acme leads.\n**Confidence:** 0.8\n\n## Strengths\n- clear";
        assert_eq!(extract_preamble(text), "Acme leads.");
        assert_eq!(extract_preamble("## Only headings"), "");
    }

    #[test]
    fn test_extract_checks() {
        let text = "- PASS: totals reconcile\n- FAIL: critical join duplicates rows\n✗ date range incomplete\nnarrative line";
        let checks = extract_checks(text);
        assert_eq!(checks.len(), 3);
        assert!(checks[0].passed);
        assert!(!checks[1].passed && checks[1].high_severity);
        assert!(!checks[2].passed && !checks[2].high_severity);
    }

    #[test]
    fn test_extract_checks_needs_whole_words() {
        let text = "- Filters bypass the archive table
- The compass view is fine
- Totals PASSED
- Join FAILS on nulls";
        let checks = extract_checks(text);
        assert_eq!(checks.len(), 2);
        assert!(checks[0].passed);
        assert!(!checks[1].passed);
    }

    #[test]
    fn test_extract_json_typed() {
        #[derive(Deserialize)]
        struct Plan {
            complexity: String,
        }
        let plan: Option<Plan> = extract_json("```json\n{\"complexity\": \"high\",}\n```");
        assert_eq!(plan.unwrap().complexity, "high");
        let none: Option<Plan> = extract_json("[1, 2, 3]");
        assert!(none.is_none());
    }

    proptest! {
        #[test]
        fn prop_confidence_always_in_bounds(text in ".{0,200}") {
            let c = extract_confidence(&text, 0.5);
            prop_assert!((0.0..=1.0).contains(&c));
        }

        #[test]
        fn prop_extractors_never_panic(text in ".{0,300}") {
            let _ = extract_verdict(&text);
            let _ = extract_list(&text, "critiques");
            let _ = extract_checks(&text);
            let _ = extract_number(&text, "agreement");
            let _ = extract_json::<serde_json::Value>(&text);
        }
    }
}
