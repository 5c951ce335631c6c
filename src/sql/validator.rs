//! Tiered SQL Validation
//!
//! | Tier | Checks |
//! |---|---|
//! | basic | SELECT present, balanced parentheses, single statement, destructive keywords |
//! | strict | + catalog probes, timing functions, tautologies, comment injection, missing LIMIT, leading-wildcard LIKE |
//! | comprehensive | + aggregate/GROUP BY consistency, join conditions |
//!
//! Results are memoized per `(tier, sql)` when a cache is attached.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::safety::{find_destructive_keyword, has_limit, mask_literals};
use super::types::{RiskLevel, SqlValidationResult, ValidationTier};
use crate::cache::ContentCache;
use crate::constants::sql::MEDIUM_RISK_WARNING_COUNT;

static SELECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bSELECT\b").expect("valid select regex"));

static CATALOG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(sqlite_master|sqlite_schema|sqlite_temp_master|information_schema|pg_catalog|pg_shadow|pg_user|mysql\.user|sys\.[a-z_]+)\b",
    )
    .expect("valid catalog regex")
});

static TIMING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(pg_sleep|sleep|benchmark)\s*\(|\bwaitfor\s+delay\b")
        .expect("valid timing regex")
});

static TAUTOLOGY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bOR\s+('[^']*'|\d+)\s*=\s*('[^']*'|\d+)").expect("valid tautology regex")
});

static OR_TRUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bOR\s+TRUE\b").expect("valid or-true regex"));

static LEADING_WILDCARD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIKE\s+'%").expect("valid like regex"));

static SELECT_STAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bSELECT\s+(DISTINCT\s+)?\*").expect("valid star regex"));

static AGGREGATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(COUNT|SUM|AVG|MIN|MAX|TOTAL|GROUP_CONCAT)\s*\(").expect("valid agg regex")
});

static GROUP_BY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bGROUP\s+BY\b").expect("valid group-by regex"));

static HAVING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bHAVING\b").expect("valid having regex"));

static JOIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(CROSS\s+|NATURAL\s+(?:LEFT\s+|INNER\s+)?)?JOIN\b").expect("valid join regex")
});

static JOIN_CONDITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(ON|USING)\b").expect("valid join condition regex"));

static COMMA_JOIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bFROM\s+[\w.]+(?:\s+(?:AS\s+)?\w+)?\s*,\s*[\w.]+").expect("valid comma join regex")
});

static WHERE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bWHERE\b").expect("valid where regex"));

static SELECT_LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\bSELECT\s+(?:DISTINCT\s+)?(.*?)\s+\bFROM\b").expect("valid select list regex")
});

/// Findings accumulated by the individual checks
#[derive(Default)]
struct Findings {
    errors: Vec<String>,
    warnings: Vec<String>,
    suggestions: Vec<String>,
}

impl Findings {
    fn into_result(self) -> SqlValidationResult {
        let risk = if !self.errors.is_empty() {
            RiskLevel::High
        } else if self.warnings.len() > MEDIUM_RISK_WARNING_COUNT {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };
        SqlValidationResult {
            is_valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
            suggestions: self.suggestions,
            corrected_sql: None,
            risk,
        }
    }
}

/// Run every check the tier includes. Pure and deterministic.
pub fn check_sql(sql: &str, tier: ValidationTier) -> SqlValidationResult {
    let masked = mask_literals(sql);
    let mut findings = Findings::default();

    check_basic(&masked, &mut findings);
    if tier.includes(ValidationTier::Strict) {
        check_strict(sql, &masked, &mut findings);
    }
    if tier.includes(ValidationTier::Comprehensive) {
        check_comprehensive(&masked, &mut findings);
    }

    findings.into_result()
}

fn check_basic(masked: &str, f: &mut Findings) {
    if !SELECT_RE.is_match(masked) {
        f.errors.push("No SELECT statement found".to_string());
    }

    let mut depth: i64 = 0;
    let mut balanced = true;
    for c in masked.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    balanced = false;
                }
            }
            _ => {}
        }
    }
    if !balanced || depth != 0 {
        f.errors.push("Unbalanced parentheses".to_string());
    }

    if masked.trim().trim_end_matches(';').contains(';') {
        f.errors
            .push("Multiple statements are not allowed".to_string());
    }

    if let Some(keyword) = find_destructive_keyword(masked) {
        f.errors
            .push(format!("Destructive keyword {} is not allowed", keyword));
    }
}

fn check_strict(sql: &str, masked: &str, f: &mut Findings) {
    if let Some(m) = CATALOG_RE.find(masked) {
        f.errors
            .push(format!("System catalog access: {}", m.as_str()));
    }

    if let Some(m) = TIMING_RE.find(masked) {
        f.errors.push(format!(
            "Timing function not allowed: {}",
            m.as_str().trim_end_matches('(').trim()
        ));
    }

    // Match on the masked text, compare operands from the original
    let tautology = TAUTOLOGY_RE
        .captures_iter(masked)
        .filter_map(|caps| Some((caps.get(1)?.range(), caps.get(2)?.range())))
        .any(|(left, right)| sql[left].eq_ignore_ascii_case(&sql[right]))
        || OR_TRUE_RE.is_match(masked);
    if tautology {
        f.errors
            .push("Tautological OR condition".to_string());
    }

    if masked.contains("--") || masked.contains("/*") {
        f.errors
            .push("Inline comments are not allowed".to_string());
    }

    if !has_limit(sql) {
        f.warnings.push("No LIMIT clause".to_string());
        f.suggestions
            .push("Add a LIMIT clause to bound the result size".to_string());
    }

    if LEADING_WILDCARD_RE.is_match(sql) {
        f.warnings
            .push("Leading wildcard LIKE cannot use an index".to_string());
        f.suggestions
            .push("Anchor LIKE patterns at the start where possible".to_string());
    }

    if SELECT_STAR_RE.is_match(masked) {
        f.warnings
            .push("SELECT * returns every column".to_string());
        f.suggestions
            .push("Select only the columns the question needs".to_string());
    }
}

fn check_comprehensive(masked: &str, f: &mut Findings) {
    let has_group_by = GROUP_BY_RE.is_match(masked);

    if let Some(caps) = SELECT_LIST_RE.captures(masked) {
        let items = split_top_level(&caps[1]);
        let aggregated = items.iter().filter(|i| AGGREGATE_RE.is_match(i)).count();
        let plain = items
            .iter()
            .filter(|i| !AGGREGATE_RE.is_match(i) && !is_constant(i))
            .count();

        if aggregated > 0 && plain > 0 && !has_group_by {
            f.errors.push(
                "Mixed aggregate and non-aggregate columns without GROUP BY".to_string(),
            );
            f.suggestions
                .push("Add GROUP BY for every non-aggregated column".to_string());
        }
        if has_group_by && aggregated == 0 {
            f.warnings
                .push("GROUP BY without an aggregate function".to_string());
        }
    }

    if HAVING_RE.is_match(masked) && !has_group_by {
        f.warnings.push("HAVING without GROUP BY".to_string());
    }

    let needs_condition = JOIN_RE
        .captures_iter(masked)
        .filter(|caps| caps.get(1).is_none())
        .count();
    let conditions = JOIN_CONDITION_RE.find_iter(masked).count();
    if needs_condition > conditions {
        f.errors
            .push("JOIN without ON/USING condition".to_string());
        f.suggestions
            .push("Give every JOIN an explicit ON condition".to_string());
    }

    if COMMA_JOIN_RE.is_match(masked) && !WHERE_RE.is_match(masked) {
        f.warnings
            .push("Implicit cross join between comma-separated tables".to_string());
    }
}

/// Split a select list on commas outside parentheses
fn split_top_level(list: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in list.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                items.push(std::mem::take(&mut current).trim().to_string());
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    if !current.trim().is_empty() {
        items.push(current.trim().to_string());
    }
    items
}

fn is_constant(item: &str) -> bool {
    let head = item.split_whitespace().next().unwrap_or("");
    head.starts_with('\'') || head.parse::<f64>().is_ok()
}

// =============================================================================
// Validator
// =============================================================================

/// Validator with optional result memoization
#[derive(Clone, Default)]
pub struct SqlValidator {
    cache: Option<ContentCache<SqlValidationResult>>,
}

impl SqlValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: ContentCache<SqlValidationResult>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn validate(&self, sql: &str, tier: ValidationTier) -> SqlValidationResult {
        let key = [tier.as_str(), sql];
        if let Some(cache) = &self.cache
            && let Some(hit) = cache.get(&key).await
        {
            return hit;
        }

        let result = check_sql(sql, tier);
        debug!(
            "Validator: {} tier -> valid={} risk={} ({} errors, {} warnings)",
            tier,
            result.is_valid,
            result.risk,
            result.errors.len(),
            result.warnings.len()
        );

        if let Some(cache) = &self.cache {
            cache.put(&key, &result).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_basic_well_formed() {
        let r = check_sql("SELECT id FROM orders LIMIT 10", ValidationTier::Basic);
        assert!(r.is_valid);
        assert_eq!(r.risk, RiskLevel::Low);
    }

    #[test]
    fn test_basic_errors() {
        let r = check_sql("VALUES (1", ValidationTier::Basic);
        assert!(!r.is_valid);
        assert!(r.errors.iter().any(|e| e.contains("SELECT")));
        assert!(r.errors.iter().any(|e| e.contains("parentheses")));
        assert_eq!(r.risk, RiskLevel::High);

        let r = check_sql("SELECT 1; SELECT 2", ValidationTier::Basic);
        assert!(r.errors.iter().any(|e| e.contains("Multiple")));

        let r = check_sql("SELECT 1; DROP TABLE t", ValidationTier::Basic);
        assert!(r.errors.iter().any(|e| e.contains("DROP")));
    }

    #[test]
    fn test_basic_ignores_strict_findings() {
        let r = check_sql("SELECT * FROM sqlite_master", ValidationTier::Basic);
        assert!(r.is_valid);
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn test_strict_security_patterns() {
        let catalog = check_sql("SELECT name FROM sqlite_master LIMIT 5", ValidationTier::Strict);
        assert!(catalog.errors.iter().any(|e| e.contains("catalog")));

        let timing = check_sql("SELECT pg_sleep(10) LIMIT 1", ValidationTier::Strict);
        assert!(timing.errors.iter().any(|e| e.contains("Timing")));

        let taut = check_sql(
            "SELECT id FROM users WHERE name = 'x' OR '1'='1' LIMIT 5",
            ValidationTier::Strict,
        );
        assert!(taut.errors.iter().any(|e| e.contains("Tautological")));

        let comment = check_sql("SELECT id FROM t -- hidden\nLIMIT 5", ValidationTier::Strict);
        assert!(comment.errors.iter().any(|e| e.contains("comments")));
    }

    #[test]
    fn test_strict_literal_dashes_are_fine() {
        let r = check_sql(
            "SELECT id FROM t WHERE note = 'a--b' LIMIT 5",
            ValidationTier::Strict,
        );
        assert!(r.is_valid, "{:?}", r.errors);
    }

    #[test]
    fn test_strict_tautology_inside_literal_is_fine() {
        let r = check_sql(
            "SELECT id FROM t WHERE note = 'x OR 1=1' LIMIT 5",
            ValidationTier::Strict,
        );
        assert!(r.is_valid, "{:?}", r.errors);

        let r = check_sql(
            "SELECT id FROM t WHERE a = 1 OR 'a' = 'b' LIMIT 5",
            ValidationTier::Strict,
        );
        assert!(r.is_valid, "{:?}", r.errors);
    }

    #[test]
    fn test_basic_comment_quotes_do_not_hide_statements() {
        let r = check_sql(
            "SELECT 1 /* ' */; DELETE FROM orders; /* ' */",
            ValidationTier::Basic,
        );
        assert!(!r.is_valid);
        assert!(r.errors.iter().any(|e| e.contains("Multiple")));
        assert!(r.errors.iter().any(|e| e.contains("DELETE")));
        assert_eq!(r.risk, RiskLevel::High);
    }

    #[test]
    fn test_strict_performance_warnings_raise_risk() {
        let r = check_sql(
            "SELECT * FROM suppliers WHERE name LIKE '%corp'",
            ValidationTier::Strict,
        );
        assert!(r.is_valid);
        assert_eq!(r.warnings.len(), 3);
        assert_eq!(r.risk, RiskLevel::Medium);
        assert!(!r.suggestions.is_empty());
    }

    #[test]
    fn test_comprehensive_group_by() {
        let r = check_sql(
            "SELECT region, SUM(spend) FROM orders LIMIT 10",
            ValidationTier::Comprehensive,
        );
        assert!(r.errors.iter().any(|e| e.contains("GROUP BY")));

        let ok = check_sql(
            "SELECT region, SUM(spend) AS total FROM orders GROUP BY region LIMIT 10",
            ValidationTier::Comprehensive,
        );
        assert!(ok.is_valid, "{:?}", ok.errors);

        let constant = check_sql(
            "SELECT 'all', COUNT(*) FROM orders LIMIT 1",
            ValidationTier::Comprehensive,
        );
        assert!(constant.is_valid, "{:?}", constant.errors);
    }

    #[test]
    fn test_comprehensive_joins() {
        let r = check_sql(
            "SELECT o.id FROM orders o JOIN suppliers s LIMIT 10",
            ValidationTier::Comprehensive,
        );
        assert!(r.errors.iter().any(|e| e.contains("JOIN")));

        let ok = check_sql(
            "SELECT o.id FROM orders o JOIN suppliers s ON s.id = o.supplier_id LIMIT 10",
            ValidationTier::Comprehensive,
        );
        assert!(ok.is_valid, "{:?}", ok.errors);

        let cross = check_sql(
            "SELECT o.id FROM orders o CROSS JOIN suppliers s LIMIT 10",
            ValidationTier::Comprehensive,
        );
        assert!(cross.is_valid, "{:?}", cross.errors);
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("a, COALESCE(b, 0), c"),
            vec!["a", "COALESCE(b, 0)", "c"]
        );
    }

    #[tokio::test]
    async fn test_validator_caches_per_tier() {
        let cache: ContentCache<SqlValidationResult> = ContentCache::new(
            Arc::new(MemoryCache::new()),
            "sql_validation",
            Duration::from_secs(60),
        );
        let validator = SqlValidator::new().with_cache(cache.clone());
        let sql = "SELECT * FROM t";

        let strict = validator.validate(sql, ValidationTier::Strict).await;
        let basic = validator.validate(sql, ValidationTier::Basic).await;
        assert_ne!(strict.warnings.len(), basic.warnings.len());
        assert_eq!(cache.get(&["strict", sql]).await, Some(strict));
        assert_eq!(cache.get(&["basic", sql]).await, Some(basic));
    }
}
