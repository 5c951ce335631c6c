//! Reflection Pipeline
//!
//! Plans, analyzes real query results, audits the analysis, then runs a
//! bounded critique/refine loop before a role-tailored synthesis.
//!
//! | Stage | Confidence |
//! |---|---|
//! | planning | fixed `planning_confidence` |
//! | analysis | extracted, or `max(default × 0.5, floor)` without data |
//! | validation | `passed/total − penalty × high failures`, floored |
//! | critique | extracted; at or above threshold ends the loop |
//! | refinement | extracted + bonus, capped |
//! | synthesis | recency-weighted mean of every prior stage |

mod pipeline;
mod prompts;
mod types;

pub use pipeline::{ReflectionPipeline, validation_confidence};
pub use types::{
    AnalysisPlan, DataProvenance, ReflectionResult, Stage, StageResult, recency_weighted_mean,
};
