//! Thinking/answer separation.
//!
//! Generators may interleave reasoning wrapped in `<thinking>...</thinking>`
//! with the answer. Every delimited span is collected into the thinking
//! segment; the rest is the answer. Without delimiters the whole text is the
//! answer.

use crate::constants::generation::{THINKING_CLOSE, THINKING_OPEN};

/// Split raw generated text into (answer, thinking)
///
/// An unclosed opening delimiter treats everything after it as thinking.
pub fn split_thinking(raw: &str) -> (String, Option<String>) {
    let mut answer = String::with_capacity(raw.len());
    let mut thinking: Vec<&str> = Vec::new();
    let mut rest = raw;

    while let Some(open) = rest.find(THINKING_OPEN) {
        answer.push_str(&rest[..open]);
        let after_open = &rest[open + THINKING_OPEN.len()..];
        match after_open.find(THINKING_CLOSE) {
            Some(close) => {
                thinking.push(after_open[..close].trim());
                rest = &after_open[close + THINKING_CLOSE.len()..];
            }
            None => {
                thinking.push(after_open.trim());
                rest = "";
            }
        }
    }
    answer.push_str(rest);

    let thinking: Vec<&str> = thinking.into_iter().filter(|t| !t.is_empty()).collect();
    let thinking = if thinking.is_empty() {
        None
    } else {
        Some(thinking.join("\n\n"))
    };

    (answer.trim().to_string(), thinking)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_delimiters() {
        let (answer, thinking) = split_thinking("  Revenue grew 12%.  ");
        assert_eq!(answer, "Revenue grew 12%.");
        assert!(thinking.is_none());
    }

    #[test]
    fn test_leading_thinking() {
        let (answer, thinking) =
            split_thinking("<thinking>sum q1..q4</thinking>\nTotal spend is $4.2M.");
        assert_eq!(answer, "Total spend is $4.2M.");
        assert_eq!(thinking.as_deref(), Some("sum q1..q4"));
    }

    #[test]
    fn test_interleaved_thinking() {
        let raw = "A <thinking>one</thinking>B <thinking>two</thinking>C";
        let (answer, thinking) = split_thinking(raw);
        assert_eq!(answer, "A B C");
        assert_eq!(thinking.as_deref(), Some("one\n\ntwo"));
    }

    #[test]
    fn test_unclosed_thinking() {
        let (answer, thinking) = split_thinking("Answer first. <thinking>trailing notes");
        assert_eq!(answer, "Answer first.");
        assert_eq!(thinking.as_deref(), Some("trailing notes"));
    }

    #[test]
    fn test_empty_thinking_is_none() {
        let (answer, thinking) = split_thinking("<thinking>  </thinking>ok");
        assert_eq!(answer, "ok");
        assert!(thinking.is_none());
    }
}
