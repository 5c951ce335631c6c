//! Configuration Module
//!
//! Layered configuration: defaults → global → project → environment.

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
