//! Deterministic worker selection.
//!
//! One primary is picked from a keyword rule table (most hits wins, ties go to
//! the earlier rule, no hits means the generalist). Reviewers, validators and
//! the synthesizer are then added from the query's complexity and role.

use std::sync::Arc;

use tracing::debug;

use super::registry::{WorkerProfile, WorkerRegistry, generalist_analyst, generalist_validator, ids};
use crate::types::{Query, Role};

pub struct SelectionRule {
    pub worker_id: &'static str,
    pub keywords: &'static [&'static str],
}

/// Primary specialist rules, in tie-break order
pub const PRIMARY_RULES: &[SelectionRule] = &[
    SelectionRule {
        worker_id: ids::PROCUREMENT,
        keywords: &[
            "supplier", "vendor", "procure", "purchas", "spend", "sourcing", "contract", "order",
        ],
    },
    SelectionRule {
        worker_id: ids::RISK,
        keywords: &[
            "risk", "exposure", "complian", "fraud", "anomal", "volatil", "concentration",
            "disruption",
        ],
    },
    SelectionRule {
        worker_id: ids::FINANCIAL,
        keywords: &[
            "revenue", "profit", "margin", "cost", "budget", "cash", "forecast", "roi",
            "financ", "expense",
        ],
    },
];

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

/// Keyword hits per rule, a keyword matching any word prefix
pub fn keyword_hits(text: &str, rule: &SelectionRule) -> usize {
    let words = words(text);
    rule.keywords
        .iter()
        .filter(|kw| words.iter().any(|w| w.starts_with(*kw)))
        .count()
}

/// Id of the primary specialist for a question, `None` for the generalist
pub fn primary_for(text: &str) -> Option<&'static str> {
    let mut best: Option<(&'static str, usize)> = None;
    for rule in PRIMARY_RULES {
        let hits = keyword_hits(text, rule);
        if hits > 0 && best.is_none_or(|(_, b)| hits > b) {
            best = Some((rule.worker_id, hits));
        }
    }
    best.map(|(id, _)| id)
}

fn lookup(registry: &WorkerRegistry, id: &str) -> Option<Arc<WorkerProfile>> {
    let found = registry.get(id);
    if found.is_none() {
        debug!("Selection: {} not in registry", id);
    }
    found
}

/// Workers for a query; always at least two
pub fn select_workers(query: &Query, registry: &WorkerRegistry) -> Vec<Arc<WorkerProfile>> {
    let mut selected: Vec<Arc<WorkerProfile>> = Vec::new();

    let primary = primary_for(&query.text)
        .and_then(|id| lookup(registry, id))
        .or_else(|| lookup(registry, ids::GENERALIST))
        .unwrap_or_else(|| Arc::new(generalist_analyst()));
    selected.push(primary);

    let mut extras = vec![ids::PEER_REVIEWER];
    if query.complexity.is_demanding() {
        extras.extend([ids::DATA_VALIDATOR, ids::DOMAIN_REVIEWER]);
    }
    if query.role == Role::Executive {
        extras.push(ids::SYNTHESIZER);
    }
    for id in extras {
        if let Some(profile) = lookup(registry, id)
            && !selected.iter().any(|p| p.id == profile.id)
        {
            selected.push(profile);
        }
    }

    if selected.len() < 2 {
        let validator = lookup(registry, ids::GENERALIST_VALIDATOR)
            .unwrap_or_else(|| Arc::new(generalist_validator()));
        debug!("Selection: forcing {} to keep two workers", validator.id);
        selected.push(validator);
    }

    debug!(
        "Selection: {}",
        selected
            .iter()
            .map(|p| format!("{}({})", p.id, p.role))
            .collect::<Vec<_>>()
            .join(", ")
    );
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::registry::WorkerRole;
    use crate::types::Complexity;

    fn ids_of(workers: &[Arc<WorkerProfile>]) -> Vec<&str> {
        workers.iter().map(|w| w.id.as_str()).collect()
    }

    #[test]
    fn test_top_suppliers_by_spend() {
        let registry = WorkerRegistry::standard();
        let workers = select_workers(&Query::new("top suppliers by spend", "purchases"), &registry);
        let primaries: Vec<_> = workers
            .iter()
            .filter(|w| w.role == WorkerRole::Primary)
            .collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].id, ids::PROCUREMENT);
        assert!(!workers.iter().any(|w| w.id == ids::GENERALIST_VALIDATOR));
        assert!(workers.len() >= 2);
        assert!(workers.iter().any(|w| w.role.reviews()));
    }

    #[test]
    fn test_no_keywords_uses_generalist() {
        let registry = WorkerRegistry::standard();
        let workers = select_workers(&Query::new("how many rows are there", "d"), &registry);
        assert_eq!(workers[0].id, ids::GENERALIST);
        assert!(workers.len() >= 2);
    }

    #[test]
    fn test_tie_goes_to_table_order() {
        // one procurement hit, one risk hit
        assert_eq!(primary_for("supplier risk"), Some(ids::PROCUREMENT));
        // two risk hits beat one procurement hit
        assert_eq!(primary_for("supplier risk exposure"), Some(ids::RISK));
        assert_eq!(primary_for("weather today"), None);
    }

    #[test]
    fn test_demanding_executive_query_adds_workers() {
        let registry = WorkerRegistry::standard();
        let query = Query::new("margin trend by quarter", "ledger")
            .with_complexity(Complexity::Expert)
            .with_role(Role::Executive);
        let workers = select_workers(&query, &registry);
        assert_eq!(
            ids_of(&workers),
            vec![
                ids::FINANCIAL,
                ids::PEER_REVIEWER,
                ids::DATA_VALIDATOR,
                ids::DOMAIN_REVIEWER,
                ids::SYNTHESIZER
            ]
        );
    }

    #[test]
    fn test_single_worker_forces_validator() {
        let registry = WorkerRegistry::new(vec![generalist_analyst()]);
        let workers = select_workers(&Query::new("anything", "d"), &registry);
        assert_eq!(ids_of(&workers), vec![ids::GENERALIST, ids::GENERALIST_VALIDATOR]);

        let empty = WorkerRegistry::default();
        assert_eq!(select_workers(&Query::new("x", "d"), &empty).len(), 2);
    }
}
