//! QuorumQL - Collaborative Natural-Language Data Analysis
//!
//! Answers analytical questions over SQL datasets with a quorum of AI
//! workers that generate, cross-review, revise and synthesize, optionally
//! each running a self-reflective critique loop.
//!
//! ## Core Features
//!
//! - **SQL Tool Chain**: generate → safety pass → tiered validation → one
//!   correction attempt → bounded execution → insights
//! - **Reflection Pipeline**: plan, analyze, validate, critique/refine with
//!   best-seen tracking, synthesize
//! - **Collaborative Framework**: keyword-driven worker selection, parallel
//!   generation, peer review, self-critique, consensus scoring
//! - **Provider Chain**: multiple LLM backends with retry and fallback
//! - **Content Cache**: TTL memoization of text, SQL validation and results
//!
//! ## Quick Start
//!
//! ```ignore
//! use quorumql::cli::CommandContext;
//! use quorumql::Query;
//!
//! let ctx = CommandContext::load(None)?;
//! let stack = ctx.analysis_stack(Some(Path::new("sales.db")))?;
//! let framework = ctx.collaborative_framework(&stack, ValidationTier::Strict, None);
//! let result = framework.analyze(&Query::new("Which regions grew?", "sales")).await?;
//! println!("{}", result.synthesis.narrative);
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: provider abstraction and tolerant text extraction
//! - [`sql`]: SQL generation, validation, execution and insights
//! - [`reflection`]: staged self-critique pipeline
//! - [`collab`]: multi-worker collaboration
//! - [`cache`]: TTL key/value cache with memory and SQLite backends
//! - [`schema`]: schema snippet retrieval
//! - [`storage`]: pooled SQLite access
//! - [`config`]: layered configuration

pub mod ai;
pub mod cache;
pub mod cli;
pub mod collab;
pub mod config;
pub mod constants;
pub mod reflection;
pub mod schema;
pub mod sql;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader, GenerationMode};

// Error Types
pub use types::error::{FailureKind, Result, ResultExt, QuorumError};

// Request
pub use types::{Complexity, Query, Role, Verdict, WorkerId};

// Storage
pub use storage::database::PoolConfig;
pub use storage::{Database, SharedDatabase};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use collab::{CollaborativeFramework, CollaborativeResult, WorkerRegistry};
pub use reflection::{ReflectionPipeline, ReflectionResult, Stage};
pub use sql::{SqlToolChain, ToolCall, ToolCallResult, ValidationTier};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    CachedGenerator, Generation, GenerationParams, ProviderChain, ProviderChainBuilder,
    SharedGenerator, TextGenerator, with_timeout,
};
pub use cache::{Cache, ContentCache, SharedCache};
