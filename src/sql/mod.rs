//! SQL Tool Framework
//!
//! Natural-language question in, safe executed SQL plus derived insights out.
//!
//! ## Modules
//!
//! - `safety`: mandatory destructive-keyword rejection and row limiting
//! - `validator`: basic / strict / comprehensive validation tiers
//! - `generator`: schema-aware generation and one-shot correction
//! - `executor`: `QueryExecutor` trait and the SQLite implementation
//! - `insights`: insight, recommendation and follow-up derivation
//! - `tool_chain`: the end-to-end pipeline

mod executor;
mod generator;
mod insights;
mod prompts;
mod safety;
mod tool_chain;
mod types;
mod validator;

pub use executor::{QueryExecutor, SharedExecutor, SqliteExecutor};
pub use generator::{GeneratedSql, SqlGenerator, extract_sql, fallback_sql};
pub use insights::{Derivations, InsightDeriver};
pub use safety::{enforce_safety, find_destructive_keyword, has_limit, mask_literals};
pub use tool_chain::{SqlToolChain, execution_confidence};
pub use types::{
    ExecutionMetadata, QueryRows, RiskLevel, SqlExecutionResult, SqlValidationResult, ToolCall,
    ToolCallResult, ValidationTier,
};
pub use validator::{SqlValidator, check_sql};
