//! Unified Error Type System
//!
//! One error type for the whole crate, plus the classification used by the
//! provider chain to decide between retrying and falling back.
//!
//! ## Failure Kinds
//!
//! - **Generation**: text service unreachable or produced unusable output
//! - **Validation**: SQL failed the safety pass or structural checks
//! - **Execution**: query timed out or the data store rejected it
//! - **Orchestration**: a stage had no fallback path left
//! - **Infrastructure**: config, IO, storage plumbing
//!
//! Generation and execution failures are almost always recovered locally with
//! fixed default results. Orchestration failures are the only kind meant to
//! reach a caller.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// Categories used to route generator errors to retry or fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry same provider
    RateLimit,
    /// Context/token limit exceeded - fallback
    TokenLimit,
    /// Authentication failed - fail fast on this provider
    Auth,
    /// Network/connectivity issues - retry with backoff
    Network,
    /// Provider unavailable - fallback to next
    Unavailable,
    /// Invalid request - don't retry
    BadRequest,
    /// Temporary server issues - retry same provider
    Transient,
    /// Unknown error - conservative retry
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::TokenLimit => write!(f, "TOKEN_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is retryable on the same provider
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Network | Self::Transient | Self::Unknown
        )
    }

    /// Check if this category should move on to the next provider
    pub fn should_fallback(&self) -> bool {
        matches!(self, Self::TokenLimit | Self::Unavailable | Self::Auth)
    }
}

// =============================================================================
// LLM Error
// =============================================================================

/// Text generation error with category and provider context
#[derive(Debug, Clone)]
pub struct LlmError {
    pub category: ErrorCategory,
    pub message: String,
    pub provider: Option<String>,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{}:{}] {}", provider, self.category, self.message)
        } else {
            write!(f, "[{}] {}", self.category, self.message)
        }
    }
}

impl std::error::Error for LlmError {}

impl LlmError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            provider: None,
        }
    }

    pub fn with_provider(
        category: ErrorCategory,
        message: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            category,
            message: message.into(),
            provider: Some(provider.into()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }

    pub fn should_fallback(&self) -> bool {
        self.category.should_fallback()
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Classifies raw provider failures into routing categories
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any provider
    pub fn classify(message: &str, provider: &str) -> LlmError {
        let lower = message.to_lowercase();

        let category = if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
        {
            ErrorCategory::RateLimit
        } else if lower.contains("context length")
            || lower.contains("too large")
            || (lower.contains("token") && lower.contains("limit"))
        {
            ErrorCategory::TokenLimit
        } else if lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("unauthorized")
        {
            ErrorCategory::Auth
        } else if lower.contains("connect")
            || lower.contains("timed out")
            || lower.contains("timeout")
            || lower.contains("dns")
        {
            ErrorCategory::Network
        } else if lower.contains("503")
            || lower.contains("502")
            || lower.contains("unavailable")
            || lower.contains("not found")
        {
            ErrorCategory::Unavailable
        } else if lower.contains("400") || lower.contains("bad request") {
            ErrorCategory::BadRequest
        } else if lower.contains("500") || lower.contains("overloaded") || lower.contains("retry")
        {
            ErrorCategory::Transient
        } else {
            ErrorCategory::Unknown
        };

        LlmError::with_provider(category, message, provider)
    }

    /// Classify an HTTP status code directly
    pub fn classify_http_status(status: u16, message: &str, provider: &str) -> LlmError {
        let category = match status {
            429 => ErrorCategory::RateLimit,
            401 | 403 => ErrorCategory::Auth,
            400 => ErrorCategory::BadRequest,
            404 => ErrorCategory::Unavailable,
            413 => ErrorCategory::TokenLimit,
            500..=599 => ErrorCategory::Transient,
            _ => ErrorCategory::Unknown,
        };
        LlmError::with_provider(category, message, provider)
    }

    /// Classify a crate error produced by a provider call
    pub fn classify_error(err: &QuorumError, provider: &str) -> LlmError {
        match err {
            QuorumError::Generation(llm) => llm.clone(),
            QuorumError::Timeout { .. } | QuorumError::Io(_) => {
                LlmError::with_provider(ErrorCategory::Network, err.to_string(), provider)
            }
            QuorumError::Config(_) => {
                LlmError::with_provider(ErrorCategory::BadRequest, err.to_string(), provider)
            }
            other => Self::classify(&other.to_string(), provider),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Structured SQL validation failure
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
    /// Offending fragment (keyword, pattern, statement)
    pub fragment: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.fragment {
            Some(fragment) => write!(f, "{} ({}): {}", self.kind, fragment, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fragment: None,
        }
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// Safety-pass rejection of a destructive statement
    pub fn destructive(keyword: &str) -> Self {
        Self::new(
            ValidationErrorKind::Safety,
            "destructive SQL is never executed",
        )
        .with_fragment(keyword)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Destructive keyword found by the safety pass
    Safety,
}

impl std::fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safety => write!(f, "SAFETY"),
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

/// Failure taxonomy used for propagation decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Generation,
    Validation,
    Execution,
    Orchestration,
    Infrastructure,
}

#[derive(Debug, Error)]
pub enum QuorumError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // -------------------------------------------------------------------------
    // Core failures
    // -------------------------------------------------------------------------
    #[error("Generation failure: {0}")]
    Generation(LlmError),

    #[error("Validation failure: {0}")]
    Validation(ValidationError),

    #[error("Execution failure on {source_id}: {message}")]
    Execution { source_id: String, message: String },

    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("Orchestration failure in {stage}: {message}")]
    Orchestration { stage: String, message: String },

    // -------------------------------------------------------------------------
    // Infrastructure
    // -------------------------------------------------------------------------
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl From<LlmError> for QuorumError {
    fn from(err: LlmError) -> Self {
        QuorumError::Generation(err)
    }
}

impl From<ValidationError> for QuorumError {
    fn from(err: ValidationError) -> Self {
        QuorumError::Validation(err)
    }
}

impl From<r2d2::Error> for QuorumError {
    fn from(err: r2d2::Error) -> Self {
        QuorumError::Storage(format!("Connection pool error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, QuorumError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl QuorumError {
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Generation failure from a plain message
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(LlmError::new(ErrorCategory::Unknown, message))
    }

    pub fn execution(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    pub fn orchestration(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Orchestration {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Where this error sits in the failure taxonomy
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Generation(_) => FailureKind::Generation,
            Self::Validation(_) => FailureKind::Validation,
            Self::Execution { .. } | Self::Timeout { .. } | Self::Database(_) => {
                FailureKind::Execution
            }
            Self::Orchestration { .. } => FailureKind::Orchestration,
            _ => FailureKind::Infrastructure,
        }
    }

    /// True for the safety-pass rejection of destructive SQL
    pub fn is_unsafe_sql(&self) -> bool {
        matches!(self, Self::Validation(v) if v.kind == ValidationErrorKind::Safety)
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| QuorumError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| QuorumError::Storage(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_routing() {
        assert!(ErrorCategory::RateLimit.is_retryable());
        assert!(ErrorCategory::Network.is_retryable());
        assert!(!ErrorCategory::BadRequest.is_retryable());
        assert!(ErrorCategory::Unavailable.should_fallback());
        assert!(ErrorCategory::Auth.should_fallback());
        assert!(!ErrorCategory::Transient.should_fallback());
    }

    #[test]
    fn test_classify_messages() {
        let err = ErrorClassifier::classify("Rate limit exceeded, slow down", "openai");
        assert_eq!(err.category, ErrorCategory::RateLimit);

        let err = ErrorClassifier::classify("Failed to connect to localhost:11434", "ollama");
        assert_eq!(err.category, ErrorCategory::Network);

        let err = ErrorClassifier::classify("maximum context length is 8192 tokens", "openai");
        assert_eq!(err.category, ErrorCategory::TokenLimit);

        let err = ErrorClassifier::classify("Something weird happened", "test");
        assert_eq!(err.category, ErrorCategory::Unknown);
    }

    #[test]
    fn test_classify_http_status() {
        assert_eq!(
            ErrorClassifier::classify_http_status(429, "slow", "p").category,
            ErrorCategory::RateLimit
        );
        assert_eq!(
            ErrorClassifier::classify_http_status(401, "no", "p").category,
            ErrorCategory::Auth
        );
        assert_eq!(
            ErrorClassifier::classify_http_status(502, "gateway", "p").category,
            ErrorCategory::Transient
        );
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(
            QuorumError::generation("boom").kind(),
            FailureKind::Generation
        );
        assert_eq!(
            QuorumError::timeout("sql", Duration::from_secs(30)).kind(),
            FailureKind::Execution
        );
        assert_eq!(
            QuorumError::orchestration("planning", "empty query").kind(),
            FailureKind::Orchestration
        );
        assert_eq!(
            QuorumError::Config("bad".into()).kind(),
            FailureKind::Infrastructure
        );
    }

    #[test]
    fn test_unsafe_sql_detection() {
        let err: QuorumError = ValidationError::destructive("DROP").into();
        assert!(err.is_unsafe_sql());
        assert_eq!(err.kind(), FailureKind::Validation);

        assert!(!QuorumError::generation("timeout").is_unsafe_sql());
    }

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::with_provider(ErrorCategory::RateLimit, "Too many requests", "openai");
        assert_eq!(err.to_string(), "[openai:RATE_LIMIT] Too many requests");
    }
}
