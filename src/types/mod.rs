pub mod error;
pub mod query;
pub mod utils;

pub use error::{
    ErrorCategory, ErrorClassifier, FailureKind, LlmError, QuorumError, Result, ResultExt,
    ValidationError, ValidationErrorKind,
};
pub use query::{Complexity, Query, Role, Verdict};
pub use utils::{
    ParseWithDefault, content_hash, enum_to_str, json_f64, json_string, json_string_array,
    json_string_or, json_u64, log_filter_error, log_filter_warn, truncate_chars,
};

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;

/// Type-safe wrapper for worker IDs
///
/// Keeps worker identifiers from mixing with response or dataset IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for WorkerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for WorkerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for WorkerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod newtype_tests {
    use super::*;

    #[test]
    fn test_worker_id() {
        let id = WorkerId::new("risk_analyst");
        assert_eq!(id.as_str(), "risk_analyst");
        assert_eq!(format!("{}", id), "risk_analyst");
        assert_eq!(id, "risk_analyst");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"risk_analyst\"");
    }
}
