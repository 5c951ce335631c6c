//! JSON Repair
//!
//! Generated text asked for JSON rarely arrives as clean JSON. Handled here:
//! - Markdown code fences (```json ... ```)
//! - JSON embedded in explanatory prose
//! - Trailing commas
//! - Truncated output (unclosed strings, brackets, braces)

use serde_json::Value;
use tracing::debug;

use crate::types::{QuorumError, Result};

/// Parse JSON out of generated text, repairing common damage
pub fn parse_json_lenient(content: &str) -> Result<Value> {
    JsonRepairer::new().parse_or_repair(content).map(|(v, _)| v)
}

/// JSON repair strategies, applied in order of increasing aggressiveness
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRepairer;

impl JsonRepairer {
    pub fn new() -> Self {
        Self
    }

    /// Parse JSON, attempting repair if the direct parse fails
    ///
    /// Returns (Value, was_repaired)
    pub fn parse_or_repair(&self, raw: &str) -> Result<(Value, bool)> {
        let cleaned = strip_code_fences(raw.trim().trim_start_matches('\u{feff}'));

        if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
            return Ok((value, false));
        }

        let candidates = [
            embedded_json(&cleaned).map(str::to_string),
            Some(balance(&remove_trailing_commas(&cleaned))),
            embedded_prefix(&cleaned).map(|s| balance(&remove_trailing_commas(s))),
        ];

        for (level, candidate) in candidates.into_iter().enumerate() {
            let Some(candidate) = candidate else { continue };
            if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
                debug!("JSON: repaired at level {}", level + 1);
                return Ok((value, true));
            }
        }

        Err(QuorumError::generation(format!(
            "Unparseable JSON in generated text: {}...",
            cleaned.chars().take(120).collect::<String>()
        )))
    }
}

fn strip_code_fences(s: &str) -> String {
    let mut body = s;
    if body.starts_with("```") {
        body = match body.find('\n') {
            Some(idx) => &body[idx + 1..],
            None => "",
        };
    }
    if let Some(stripped) = body.trim_end().strip_suffix("```") {
        body = stripped;
    }
    body.trim().to_string()
}

/// Text from the first `{`/`[` onward (may be truncated)
fn embedded_prefix(s: &str) -> Option<&str> {
    s.find(['{', '[']).map(|start| &s[start..])
}

/// First complete top-level JSON object/array inside surrounding prose
fn embedded_json(s: &str) -> Option<&str> {
    let start = s.find(['{', '['])?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (i, ch) in s[start..].char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn remove_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in chars.iter().enumerate() {
        if escape {
            escape = false;
            out.push(ch);
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            ',' if !in_string => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if matches!(next, Some(']') | Some('}')) {
                    continue;
                }
            }
            _ => {}
        }
        out.push(ch);
    }
    out
}

/// Close an unterminated string and any open brackets, innermost first
fn balance(s: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for ch in s.chars() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            '{' if !in_string => stack.push('}'),
            '[' if !in_string => stack.push(']'),
            '}' | ']' if !in_string => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = s.trim_end().to_string();
    if in_string {
        out.push('"');
    }
    while out.ends_with(',') {
        out.pop();
    }
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_json() {
        let (_, repaired) = JsonRepairer::new()
            .parse_or_repair(r#"{"complexity": "high"}"#)
            .unwrap();
        assert!(!repaired);
    }

    #[test]
    fn test_strip_code_fences() {
        let value = parse_json_lenient("```json\n{\"steps\": [1, 2]}\n```").unwrap();
        assert_eq!(value["steps"][1], 2);
    }

    #[test]
    fn test_fix_trailing_comma() {
        let (value, repaired) = JsonRepairer::new()
            .parse_or_repair(r#"{"checks": ["a", "b",],}"#)
            .unwrap();
        assert!(repaired);
        assert_eq!(value["checks"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_truncated_output() {
        let value = parse_json_lenient(r#"{"steps": ["load", "aggr"#).unwrap();
        assert_eq!(value["steps"][1], "aggr");
    }

    #[test]
    fn test_extract_from_prose() {
        let input = "Here is the plan:\n{\"complexity\": \"low\", \"steps\": []}\nLet me know.";
        let value = parse_json_lenient(input).unwrap();
        assert_eq!(value["complexity"], "low");
    }

    #[test]
    fn test_comma_inside_string_kept() {
        let value = parse_json_lenient(r#"{"note": "a, ]b",}"#).unwrap();
        assert_eq!(value["note"], "a, ]b");
    }

    #[test]
    fn test_hopeless_input_errors() {
        assert!(parse_json_lenient("no json here at all").is_err());
    }
}
