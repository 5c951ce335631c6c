//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (`$XDG_CONFIG_HOME/quorumql/config.toml`)
//! 3. Project config (`.quorumql/config.toml`)
//! 4. Environment variables (`QUORUMQL_*` prefix)

use directories::BaseDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{QuorumError, Result};

const APP_DIR: &str = "quorumql";
const PROJECT_DIR: &str = ".quorumql";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Config: loading global config from {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Config: loading project config from {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // e.g. QUORUMQL_LLM_TEMPERATURE -> llm.temperature
        figment = figment.merge(Env::prefixed("QUORUMQL_").split('_').lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| QuorumError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| QuorumError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Global config directory (`$XDG_CONFIG_HOME/quorumql/`)
    pub fn global_dir() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.config_dir().join(APP_DIR))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Global cache directory (`$XDG_CACHE_HOME/quorumql/`)
    pub fn global_cache_dir() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.cache_dir().join(APP_DIR))
    }

    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    pub fn project_dir() -> PathBuf {
        PathBuf::from(PROJECT_DIR)
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Print config and cache locations
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());

        if let Some(cache) = Self::global_cache_dir() {
            let exists = if cache.exists() { "✓" } else { "✗" };
            println!("  Cache:   {} {}", exists, cache.display());
        }
    }

    /// Effective configuration as TOML
    pub fn render_toml(config: &Config) -> Result<String> {
        toml::to_string_pretty(config).map_err(|e| QuorumError::Config(e.to_string()))
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            QuorumError::Config("Cannot determine global config directory".to_string())
        })?;

        fs::create_dir_all(&global_dir)?;
        if let Some(cache_dir) = Self::global_cache_dir() {
            fs::create_dir_all(&cache_dir)?;
        }

        let config_path = global_dir.join("config.toml");
        Self::write_config(&config_path, &Self::default_global_config(), force)?;
        Ok(config_path)
    }

    /// Initialize project configuration under `root`
    pub fn init_project(root: &Path, force: bool) -> Result<PathBuf> {
        let project_dir = root.join(PROJECT_DIR);
        fs::create_dir_all(&project_dir)?;

        let config_path = project_dir.join("config.toml");
        Self::write_config(&config_path, &Self::default_project_config(), force)?;
        Ok(config_path)
    }

    fn write_config(path: &Path, content: &str, force: bool) -> Result<()> {
        if !path.exists() || force {
            fs::write(path, content)?;
            info!("Config: created {}", path.display());
        } else {
            info!("Config: {} already exists", path.display());
        }
        Ok(())
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn default_global_config() -> String {
        r#"# quorumql Global Configuration
# User-wide defaults. Project settings in .quorumql/config.toml override these.

version = "1.0"

[llm]
temperature = 0.2
max_tokens = 2048
max_retries = 3

# Providers are tried in order; later entries are fallbacks.
[[llm.providers]]
provider = "ollama"
model = "llama3.1:8b"
timeout_secs = 120

# [[llm.providers]]
# provider = "openai"
# model = "gpt-4o-mini"
# api_key read from OPENAI_API_KEY when omitted

[cache]
backend = "sqlite"
"#
        .to_string()
    }

    fn default_project_config() -> String {
        r#"# quorumql Project Configuration
# Project-specific settings that override global defaults.

version = "1.0"

[dataset]
# path = "data/analytics.db"
# default_id = "orders"

[sql]
default_tier = "strict"
error_correction = true

[reflection]
max_iterations = 3
critique_threshold = 0.85

[collaboration]
generation_mode = "direct"
consensus_threshold = 0.7
max_concurrency = 4
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationMode;
    use tempfile::TempDir;

    #[test]
    fn test_load_default_config() {
        let config = ConfigLoader::load().unwrap();
        assert_eq!(config.version, "1.0");
    }

    #[test]
    fn test_init_project_templates_parse() {
        let temp_dir = TempDir::new().unwrap();
        let path = ConfigLoader::init_project(temp_dir.path(), false).unwrap();
        assert!(path.ends_with(".quorumql/config.toml"));

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.collaboration.generation_mode, GenerationMode::Direct);
        assert_eq!(config.reflection.max_iterations, 3);
    }

    #[test]
    fn test_init_project_keeps_existing_unless_forced() {
        let temp_dir = TempDir::new().unwrap();
        let path = ConfigLoader::init_project(temp_dir.path(), false).unwrap();
        fs::write(&path, "version = \"custom\"\n").unwrap();

        ConfigLoader::init_project(temp_dir.path(), false).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("custom"));

        ConfigLoader::init_project(temp_dir.path(), true).unwrap();
        assert!(!fs::read_to_string(&path).unwrap().contains("custom"));
    }

    #[test]
    fn test_global_template_parses() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, ConfigLoader::default_global_config()).unwrap();
        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.llm.providers.len(), 1);
        assert_eq!(config.llm.providers[0].model.as_deref(), Some("llama3.1:8b"));
    }

    #[test]
    fn test_invalid_file_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[reflection]\ncritique_threshold = 3.0\n").unwrap();
        assert!(matches!(
            ConfigLoader::load_from_file(&path),
            Err(QuorumError::Config(_))
        ));
    }

    #[test]
    fn test_env_override() {
        // SAFETY: This test runs in isolation
        unsafe {
            std::env::set_var("QUORUMQL_LLM_TEMPERATURE", "0.5");
        }
        let config = ConfigLoader::load().unwrap();
        assert!((config.llm.temperature - 0.5).abs() < f32::EPSILON);
        unsafe {
            std::env::remove_var("QUORUMQL_LLM_TEMPERATURE");
        }
    }

    #[test]
    fn test_render_toml() {
        let rendered = ConfigLoader::render_toml(&Config::default()).unwrap();
        assert!(rendered.contains("[collaboration]"));
    }
}
