//! Global Constants
//!
//! Centralized defaults for configuration and tuning.
//! Confidence policies here are calibration defaults; every one of them is
//! overridable through the matching config section.

/// Provider chain constants
pub mod chain {
    /// Maximum total attempts across all providers
    pub const MAX_TOTAL_ATTEMPTS: usize = 8;

    /// Default maximum retries per provider
    pub const DEFAULT_MAX_RETRIES: usize = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;
}

/// Text generation defaults
pub mod generation {
    pub const DEFAULT_TEMPERATURE: f32 = 0.2;
    pub const DEFAULT_TOP_P: f32 = 0.9;
    pub const DEFAULT_MAX_TOKENS: usize = 2048;

    /// Advisory thinking budget (tokens). Not enforced as a timeout.
    pub const DEFAULT_THINKING_BUDGET: u32 = 1024;

    /// Delimiters marking interleaved thinking content
    pub const THINKING_OPEN: &str = "<thinking>";
    pub const THINKING_CLOSE: &str = "</thinking>";
}

/// SQL tool chain constants
pub mod sql {
    /// Hard execution timeout (milliseconds)
    pub const EXECUTION_TIMEOUT_MS: u64 = 30_000;

    /// Only results faster than this are cached (milliseconds)
    pub const CACHEABLE_RUNTIME_MS: u64 = 10_000;

    /// Execution result cache TTL (seconds)
    pub const RESULT_CACHE_TTL_SECS: u64 = 30 * 60;

    /// Validation result cache TTL (seconds)
    pub const VALIDATION_CACHE_TTL_SECS: u64 = 60 * 60;

    /// Row limit appended by the safety pass
    pub const DEFAULT_ROW_LIMIT: usize = 100;

    /// Rows passed to the generator when deriving insights
    pub const INSIGHT_SAMPLE_ROWS: usize = 20;

    /// Warnings above this count raise the risk tier to medium
    pub const MEDIUM_RISK_WARNING_COUNT: usize = 2;

    /// Keywords the safety pass rejects unconditionally
    pub const DESTRUCTIVE_KEYWORDS: &[&str] = &[
        "DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE",
    ];

    /// Execution confidence scoring
    pub mod confidence {
        pub const BASE: f32 = 0.8;
        pub const VALIDATION_BONUS: f32 = 0.05;
        pub const FAST_BONUS: f32 = 0.05;
        pub const FAST_THRESHOLD_MS: u64 = 5_000;
        pub const NON_EMPTY_BONUS: f32 = 0.05;
        pub const NO_WARNINGS_BONUS: f32 = 0.05;
    }
}

/// Reflection pipeline constants
pub mod reflection {
    pub const MAX_ITERATIONS: usize = 3;

    /// Critique confidence at or above this ends the loop early
    pub const CRITIQUE_THRESHOLD: f32 = 0.85;

    /// Planning only plans; it asserts no facts
    pub const PLANNING_CONFIDENCE: f32 = 0.9;

    pub const ANALYSIS_DEFAULT_CONFIDENCE: f32 = 0.75;
    pub const LIMITED_DATA_FLOOR: f32 = 0.3;

    pub const VALIDATION_FLOOR: f32 = 0.3;
    pub const VALIDATION_NEUTRAL: f32 = 0.7;
    pub const HIGH_SEVERITY_PENALTY: f32 = 0.1;

    pub const CRITIQUE_DEFAULT_CONFIDENCE: f32 = 0.6;

    pub const REFINEMENT_BONUS: f32 = 0.05;
    pub const REFINEMENT_CAP: f32 = 0.95;

    /// Confidence carried by a stage that fell back to its fixed default
    pub const DEGRADED_CONFIDENCE: f32 = 0.4;

    /// Schema/fact snippets fetched before analysis
    pub const CONTEXT_SNIPPETS: usize = 5;
}

/// Collaborative framework constants
pub mod collaboration {
    /// Concurrent worker generations / reviews
    pub const MAX_CONCURRENCY: usize = 4;

    pub const DEFAULT_CONSENSUS_THRESHOLD: f32 = 0.7;

    /// Consensus reported when the framework degrades to a single worker
    pub const FALLBACK_CONSENSUS: f32 = 0.6;

    /// Consensus when no reviews exist to aggregate
    pub const NEUTRAL_CONSENSUS: f32 = 0.5;

    pub const WORKER_DEFAULT_CONFIDENCE: f32 = 0.7;
    pub const FALLBACK_RESPONSE_CONFIDENCE: f32 = 0.3;

    /// Defaults for a review that failed to run
    pub const FALLBACK_AGREEMENT: f32 = 0.7;

    /// Self-critique clamp bounds
    pub const SELF_CRITIQUE_MIN: f32 = 0.1;
    pub const SELF_CRITIQUE_MAX: f32 = 1.0;

    /// Review confidence deltas are clamped to +/- this
    pub const MAX_CONFIDENCE_DELTA: f32 = 0.5;

    /// Items kept per synthesis list
    pub const MAX_LIST_ITEMS: usize = 5;
}

/// Cache constants
pub mod cache {
    /// Generated text cache TTL (seconds)
    pub const TEXT_TTL_SECS: u64 = 60 * 60;

    /// Schema context cache TTL (seconds)
    pub const SCHEMA_TTL_SECS: u64 = 10 * 60;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}
