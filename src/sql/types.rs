//! SQL tool chain types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Validation
// =============================================================================

/// How much scrutiny a statement receives before execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValidationTier {
    /// Well-formedness and destructive keywords
    Basic,
    /// + security patterns and performance heuristics
    #[default]
    Strict,
    /// + aggregation and join consistency
    Comprehensive,
}

impl ValidationTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Strict => "strict",
            Self::Comprehensive => "comprehensive",
        }
    }

    pub fn includes(&self, other: ValidationTier) -> bool {
        *self >= other
    }
}

impl PartialOrd for ValidationTier {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ValidationTier {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (*self as u8).cmp(&(*other as u8))
    }
}

impl std::fmt::Display for ValidationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ValidationTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "strict" => Ok(Self::Strict),
            "comprehensive" | "full" => Ok(Self::Comprehensive),
            _ => Err(format!(
                "Invalid validation tier: '{}'. Use: basic, strict, comprehensive",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    /// Replacement statement produced by the correction step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_sql: Option<String>,
    pub risk: RiskLevel,
}

// =============================================================================
// Execution
// =============================================================================

/// Rows as JSON objects keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub rows: Vec<Value>,
    pub row_count: usize,
}

impl QueryRows {
    pub fn new(rows: Vec<Value>) -> Self {
        let row_count = rows.len();
        Self { rows, row_count }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub source_id: String,
    pub cache_hit: bool,
    pub validation_passed: bool,
    pub confidence: f32,
}

/// Outcome of exactly one execution attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlExecutionResult {
    pub success: bool,
    pub rows: Vec<Value>,
    pub execution_time_ms: u64,
    pub row_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata: ExecutionMetadata,
}

// =============================================================================
// Tool Call
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Natural-language question
    pub query: String,
    pub dataset_id: String,
    pub tier: ValidationTier,
    pub error_correction: bool,
}

impl ToolCall {
    pub fn new(query: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            dataset_id: dataset_id.into(),
            tier: ValidationTier::default(),
            error_correction: true,
        }
    }

    pub fn with_tier(mut self, tier: ValidationTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_error_correction(mut self, enabled: bool) -> Self {
        self.error_correction = enabled;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Statement that was executed
    pub sql: String,
    /// Generated statement, when correction replaced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_sql: Option<String>,
    pub validation: SqlValidationResult,
    pub execution: SqlExecutionResult,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub follow_ups: Vec<String>,
}

impl ToolCallResult {
    pub fn has_data(&self) -> bool {
        self.execution.success && self.execution.row_count > 0
    }
}
