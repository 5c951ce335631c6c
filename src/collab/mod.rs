//! Collaborative Framework
//!
//! Several workers answer the same question, review each other, revise, and
//! converge on a scored synthesis.
//!
//! ## Modules
//!
//! - `registry`: worker profiles and the immutable `WorkerRegistry`
//! - `selection`: keyword rule table choosing who participates
//! - `framework`: generation, peer review, self-critique and synthesis

mod framework;
mod prompts;
pub mod registry;
pub mod selection;
mod types;

pub use framework::{CollaborativeFramework, consensus_level, self_critique_confidence};
pub use registry::{WorkerProfile, WorkerRegistry, WorkerRole};
pub use selection::select_workers;
pub use types::{CollaborativeResult, PeerReview, SynthesisResult, WorkerResponse, latest_versions};
