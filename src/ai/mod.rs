//! AI Integration Layer
//!
//! Text generation providers plus the helpers that turn free-form generated
//! text into typed signals.

pub mod extract;
pub mod json_repair;
pub mod provider;
pub mod thinking;
pub mod timeout;

pub use extract::{
    Check, extract_bullets, extract_checks, extract_confidence, extract_fraction, extract_json,
    extract_list, extract_number, extract_preamble, extract_verdict,
};
pub use json_repair::{JsonRepairer, parse_json_lenient};
pub use provider::{
    CachedGenerator, ChainConfig, ChainedProvider, ErrorCategory, ErrorClassifier, Generation,
    GenerationParams, LlmError, ProviderChain, ProviderChainBuilder, ProviderConfig,
    ResponseMetadata, ResponseTiming, SharedGenerator, TextGenerator, TokenUsage,
};
pub use thinking::split_thinking;
pub use timeout::with_timeout;
