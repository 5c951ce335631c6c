//! Safety Pass
//!
//! Mandatory static check applied to every statement before it can reach an
//! executor: destructive keywords are a hard error, and a row limit is
//! appended when missing. Keywords inside string literals or quoted
//! identifiers do not count.

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::sql::DESTRUCTIVE_KEYWORDS;
use crate::types::{QuorumError, Result, ValidationError};

static DESTRUCTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"(?i)\b({})\b", DESTRUCTIVE_KEYWORDS.join("|"));
    Regex::new(&pattern).expect("valid destructive keyword regex")
});

static LIMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\s+\d+").expect("valid limit regex"));

/// Blank out the contents of quoted spans, keeping byte offsets intact
///
/// Handles `'...'`, `"..."` and `` `...` ``. Doubled quotes (`'it''s'`) close
/// and reopen the span, which leaves the content masked either way.
/// `--` and `/* */` comments are kept verbatim and quotes inside them do not
/// open a span, so a stray quote in a comment cannot hide what follows.
pub fn mask_literals(sql: &str) -> String {
    mask(sql, false)
}

/// Like [`mask_literals`] but comment bodies are blanked too
pub fn mask_literals_and_comments(sql: &str) -> String {
    mask(sql, true)
}

fn mask(sql: &str, blank_comments: bool) -> String {
    #[derive(Clone, Copy)]
    enum State {
        Code,
        Quoted(char),
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(sql.len());
    let mut state = State::Code;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            State::Quoted(q) if c == q => {
                state = State::Code;
                out.push(c);
            }
            State::Quoted(_) => {
                for _ in 0..c.len_utf8() {
                    out.push(' ');
                }
            }
            State::LineComment if c == '\n' => {
                state = State::Code;
                out.push(c);
            }
            State::BlockComment if c == '*' && chars.peek() == Some(&'/') => {
                chars.next();
                out.push_str("*/");
                state = State::Code;
            }
            State::LineComment | State::BlockComment => {
                if blank_comments {
                    for _ in 0..c.len_utf8() {
                        out.push(' ');
                    }
                } else {
                    out.push(c);
                }
            }
            State::Code => {
                out.push(c);
                match c {
                    '\'' | '"' | '`' => state = State::Quoted(c),
                    '-' if chars.peek() == Some(&'-') => {
                        chars.next();
                        out.push('-');
                        state = State::LineComment;
                    }
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        out.push('*');
                        state = State::BlockComment;
                    }
                    _ => {}
                }
            }
        }
    }
    out
}

/// First destructive keyword outside quoted spans, uppercased
pub fn find_destructive_keyword(sql: &str) -> Option<&'static str> {
    let masked = mask_literals(sql);
    let found = DESTRUCTIVE_RE.find(&masked)?;
    let upper = found.as_str().to_uppercase();
    DESTRUCTIVE_KEYWORDS.iter().copied().find(|k| *k == upper)
}

pub fn has_limit(sql: &str) -> bool {
    LIMIT_RE.is_match(&mask_literals_and_comments(sql))
}

/// Reject destructive statements and bound the row count
///
/// Returns the statement with trailing semicolons removed and ` LIMIT
/// <row_limit>` appended when it has no LIMIT clause.
pub fn enforce_safety(sql: &str, row_limit: usize) -> Result<String> {
    if let Some(keyword) = find_destructive_keyword(sql) {
        tracing::warn!("Safety: rejected statement containing {}", keyword);
        return Err(QuorumError::Validation(ValidationError::destructive(keyword)));
    }

    let trimmed = sql.trim().trim_end_matches(';').trim_end();
    if has_limit(trimmed) {
        return Ok(trimmed.to_string());
    }

    // A trailing line comment would swallow the appended clause
    let masked = mask_literals(trimmed);
    let separator = match masked.rsplit('\n').next() {
        Some(last_line) if last_line.contains("--") => "\n",
        _ => " ",
    };
    Ok(format!("{}{}LIMIT {}", trimmed, separator, row_limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_appends_limit() {
        assert_eq!(
            enforce_safety("SELECT * FROM orders;", 100).unwrap(),
            "SELECT * FROM orders LIMIT 100"
        );
        assert_eq!(
            enforce_safety("select id from t limit 5", 100).unwrap(),
            "select id from t limit 5"
        );
        assert_eq!(
            enforce_safety("SELECT id FROM t -- top rows", 100).unwrap(),
            "SELECT id FROM t -- top rows\nLIMIT 100"
        );
        // LIMIT inside a comment is not a LIMIT clause
        assert_eq!(
            enforce_safety("SELECT id FROM t /* LIMIT 5 */", 100).unwrap(),
            "SELECT id FROM t /* LIMIT 5 */ LIMIT 100"
        );
    }

    #[test]
    fn test_rejects_destructive() {
        for sql in [
            "DELETE FROM orders WHERE amount > 1000000",
            "drop table orders",
            "SELECT 1; UPDATE t SET x = 1",
            "WITH x AS (SELECT 1) INSERT INTO t SELECT * FROM x",
            "SELECT 1 -- it's fine\nDROP TABLE orders -- '",
            "SELECT 1 /* ' */; DELETE FROM orders; /* ' */",
            "SELECT 1 -- DELETE FROM orders",
        ] {
            let err = enforce_safety(sql, 100).unwrap_err();
            assert!(err.is_unsafe_sql(), "{}", sql);
        }
    }

    #[test]
    fn test_identifiers_and_literals_are_not_keywords() {
        assert!(enforce_safety("SELECT created_at, update_count FROM t", 10).is_ok());
        assert!(enforce_safety("SELECT * FROM log WHERE action = 'DELETE'", 10).is_ok());
        assert!(enforce_safety("SELECT \"drop\" FROM t", 10).is_ok());
        // LIMIT inside a literal is not a LIMIT clause
        assert!(enforce_safety("SELECT 'limit 5' FROM t", 10).unwrap().ends_with("LIMIT 10"));
    }

    #[test]
    fn test_comment_quotes_do_not_open_literals() {
        let sql = "SELECT 1 /* don't */ FROM t WHERE a = 'x'";
        let masked = mask_literals(sql);
        assert_eq!(masked, "SELECT 1 /* don't */ FROM t WHERE a = ' '");
        assert_eq!(mask_literals("SELECT '--' -- 'c'\nFROM t"), "SELECT '  ' -- 'c'\nFROM t");
    }

    #[test]
    fn test_mask_keeps_length() {
        let sql = "SELECT 'héllo' FROM t";
        assert_eq!(mask_literals(sql).len(), sql.len());
        assert_eq!(find_destructive_keyword("truncate t"), Some("TRUNCATE"));
    }

    proptest! {
        #[test]
        fn prop_destructive_keyword_always_rejected(
            idx in 0..DESTRUCTIVE_KEYWORDS.len(),
            prefix in "[a-zA-Z0-9 ,()*=]{0,30}",
            suffix in "[a-zA-Z0-9 ,()*=]{0,30}",
            lower in any::<bool>(),
        ) {
            let keyword = if lower {
                DESTRUCTIVE_KEYWORDS[idx].to_lowercase()
            } else {
                DESTRUCTIVE_KEYWORDS[idx].to_string()
            };
            let sql = format!("{} {} {}", prefix, keyword, suffix);
            let result = enforce_safety(&sql, 100);
            prop_assert!(result.is_err());
            prop_assert!(result.unwrap_err().is_unsafe_sql());
        }

        #[test]
        fn prop_comment_quotes_never_hide_keywords(
            idx in 0..DESTRUCTIVE_KEYWORDS.len(),
            quote in prop::sample::select(vec!['\'', '"', '`']),
            block in any::<bool>(),
        ) {
            let sql = if block {
                format!("SELECT 1 /* {q} */; {k} t; /* {q} */", q = quote, k = DESTRUCTIVE_KEYWORDS[idx])
            } else {
                format!("SELECT 1 -- {q}\n{k} t -- {q}", q = quote, k = DESTRUCTIVE_KEYWORDS[idx])
            };
            let result = enforce_safety(&sql, 100);
            prop_assert!(result.is_err());
            prop_assert!(result.unwrap_err().is_unsafe_sql());
        }

        #[test]
        fn prop_safe_output_has_limit(table in "[a-z]{3,10}", n in 1usize..1000) {
            let sql = format!("SELECT * FROM {}", table);
            if find_destructive_keyword(&sql).is_none() {
                let safe = enforce_safety(&sql, n).unwrap();
                prop_assert!(has_limit(&safe));
            }
        }
    }
}
