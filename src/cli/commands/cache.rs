//! Cache Command
//!
//! Inspect or empty the configured cache backend.
//!
//! Usage:
//!   quorumql cache stats [-f json]
//!   quorumql cache clear

use std::path::Path;

use crate::cache::create_cache;
use crate::cli::output::{Output, OutputFormat};
use crate::cli::util::load_config;
use crate::types::Result;

pub async fn stats(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    let cache = create_cache(&config.cache)?;
    let stats = cache.stats().await?;

    format.emit(&stats, |s| {
        Output::header("Cache");
        Output::field("backend", &s.backend);
        Output::field("entries", s.entries);
        Output::field("expired", s.expired);
        Output::field("hits", s.total_hits);
    })
}

pub async fn clear(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let cache = create_cache(&config.cache)?;
    let removed = cache.clear().await?;
    Output::success(&format!(
        "Removed {} entries from the {} cache",
        removed,
        cache.backend()
    ));
    Ok(())
}
