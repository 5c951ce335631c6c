//! CLI Common Utilities
//!
//! Shared initialization for command handlers: configuration, cache, the
//! provider chain, and the dataset-backed analysis stack.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::ai::provider::{CachedGenerator, ProviderChain, SharedGenerator};
use crate::cache::{ContentCache, SharedCache, create_cache};
use crate::collab::{CollaborativeFramework, WorkerRegistry};
use crate::config::{Config, ConfigLoader, GenerationMode};
use crate::reflection::ReflectionPipeline;
use crate::schema::{SharedSchemaContext, SqliteSchemaContext};
use crate::sql::{SqlToolChain, SqliteExecutor, ValidationTier};
use crate::storage::Database;
use crate::types::{Complexity, ParseWithDefault, Query, QuorumError, Result, Role};

const SCHEMA_NAMESPACE: &str = "schema";

/// Question-level flags shared by `ask`, `reflect` and `sql`
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub text: String,
    /// Dataset (table) id; falls back to `dataset.default_id`
    pub dataset: Option<String>,
    /// SQLite dataset file; falls back to `dataset.path`
    pub db: Option<PathBuf>,
    pub role: Option<String>,
    pub complexity: Option<String>,
    pub consensus_threshold: Option<f32>,
    pub max_iterations: Option<usize>,
    pub tier: Option<ValidationTier>,
}

/// Load configuration from `path` when given, else the layered defaults
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(QuorumError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            ConfigLoader::load_from_file(path)
        }
        None => ConfigLoader::load(),
    }
}

/// Command execution context
///
/// Holds the resources every analysis command needs. Dataset handles are
/// opened per command through [`CommandContext::analysis_stack`].
#[derive(Clone)]
pub struct CommandContext {
    pub config: Config,
    pub cache: SharedCache,
    pub generator: SharedGenerator,
}

/// Tool chain and schema context bound to one dataset file
pub struct AnalysisStack {
    pub tool_chain: Arc<SqlToolChain>,
    pub schema: SharedSchemaContext,
}

impl CommandContext {
    /// Load config, open the cache and build the provider chain
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config(config_path)?;
        let cache = create_cache(&config.cache)?;
        let generator = build_generator(&config, &cache)?;
        Ok(Self {
            config,
            cache,
            generator,
        })
    }

    /// Resolve the request into a [`Query`], applying configured defaults
    pub fn query(&self, options: &QueryOptions) -> Result<Query> {
        let dataset = options
            .dataset
            .clone()
            .or_else(|| self.config.dataset.default_id.clone())
            .ok_or_else(|| {
                QuorumError::Config(
                    "No dataset id given. Pass --dataset or set dataset.default_id".to_string(),
                )
            })?;

        if options.max_iterations == Some(0) {
            return Err(QuorumError::Config(
                "--max-iterations must be greater than 0".to_string(),
            ));
        }

        let mut query = Query::new(options.text.trim(), dataset)
            .with_consensus_threshold(
                options
                    .consensus_threshold
                    .unwrap_or(self.config.collaboration.consensus_threshold),
            )
            .with_max_iterations(options.max_iterations);

        if let Some(role) = &options.role {
            query = query.with_role(parse_flag::<Role>(role)?);
        }
        if let Some(complexity) = &options.complexity {
            query = query.with_complexity(parse_flag::<Complexity>(complexity)?);
        }
        Ok(query)
    }

    pub fn tier(&self, options: &QueryOptions) -> ValidationTier {
        options.tier.unwrap_or(self.config.sql.default_tier)
    }

    /// Open the dataset read-only and wire executor, schema and tool chain
    pub fn analysis_stack(&self, db: Option<&Path>) -> Result<AnalysisStack> {
        let path = db
            .map(Path::to_path_buf)
            .or_else(|| self.config.dataset.path.clone())
            .ok_or_else(|| {
                QuorumError::Config(
                    "No dataset file given. Pass --db or set dataset.path".to_string(),
                )
            })?;

        let database = Arc::new(Database::open_read_only(&path)?);
        let source_id = path.display().to_string();
        debug!("CLI: dataset {} opened read-only", source_id);

        let schema: SharedSchemaContext = Arc::new(
            SqliteSchemaContext::new(Arc::clone(&database), source_id.clone()).with_cache(
                ContentCache::new(
                    self.cache.clone(),
                    SCHEMA_NAMESPACE,
                    self.config.cache.schema_ttl(),
                ),
            ),
        );
        let executor = Arc::new(SqliteExecutor::new(database, source_id));
        let tool_chain = SqlToolChain::new(
            self.generator.clone(),
            schema.clone(),
            executor,
            self.config.llm.generation_params(),
            self.config.sql.clone(),
        )
        .with_cache(self.cache.clone());

        Ok(AnalysisStack {
            tool_chain: Arc::new(tool_chain),
            schema,
        })
    }

    pub fn reflection_pipeline(
        &self,
        stack: &AnalysisStack,
        tier: ValidationTier,
    ) -> ReflectionPipeline {
        ReflectionPipeline::new(
            self.generator.clone(),
            stack.schema.clone(),
            Arc::clone(&stack.tool_chain),
            self.config.llm.generation_params(),
            self.config.reflection.clone(),
        )
        .with_sql_options(tier, self.config.sql.error_correction)
    }

    /// Framework over the standard registry; `mode` overrides the configured one
    pub fn collaborative_framework(
        &self,
        stack: &AnalysisStack,
        tier: ValidationTier,
        mode: Option<GenerationMode>,
    ) -> CollaborativeFramework {
        let mut config = self.config.collaboration.clone();
        if let Some(mode) = mode {
            config.generation_mode = mode;
        }
        let reflective = config.generation_mode == GenerationMode::Reflective;

        let framework = CollaborativeFramework::new(
            Arc::new(WorkerRegistry::standard()),
            self.generator.clone(),
            Arc::clone(&stack.tool_chain),
            self.config.llm.generation_params(),
            config,
        )
        .with_sql_options(tier, self.config.sql.error_correction);

        if reflective {
            framework.with_reflection(Arc::new(self.reflection_pipeline(stack, tier)))
        } else {
            framework
        }
    }
}

/// Provider chain in configured order, behind the text cache when enabled
fn build_generator(config: &Config, cache: &SharedCache) -> Result<SharedGenerator> {
    let chain = ProviderChain::from_configs(&config.llm.providers, config.llm.chain_config())?;
    info!("CLI: provider chain with {} provider(s)", chain.len());
    let chain: SharedGenerator = Arc::new(chain);

    if config.llm.cache_text {
        Ok(Arc::new(CachedGenerator::new(
            chain,
            cache.clone(),
            config.cache.text_ttl(),
        )))
    } else {
        Ok(chain)
    }
}

/// Strict flag parsing; free-text fallbacks are for generated text only
fn parse_flag<T: ParseWithDefault>(value: &str) -> Result<T> {
    T::try_parse(value).ok_or_else(|| {
        QuorumError::Config(format!("Invalid {} value: '{}'", T::type_name(), value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::testing::ScriptedGenerator;

    fn context(config: Config) -> CommandContext {
        CommandContext {
            config,
            cache: Arc::new(MemoryCache::new()),
            generator: Arc::new(ScriptedGenerator::new()),
        }
    }

    #[test]
    fn test_query_applies_defaults_and_flags() {
        let mut config = Config::default();
        config.dataset.default_id = Some("purchase_orders".into());
        let ctx = context(config);

        let options = QueryOptions {
            text: "  Which suppliers are late?  ".into(),
            role: Some("executive".into()),
            complexity: Some("complex".into()),
            max_iterations: Some(1),
            ..Default::default()
        };
        let query = ctx.query(&options).unwrap();
        assert_eq!(query.text, "Which suppliers are late?");
        assert_eq!(query.dataset_id, "purchase_orders");
        assert_eq!(query.role, Role::Executive);
        assert!(query.complexity.is_demanding());
        assert_eq!(query.max_iterations, Some(1));
        assert_eq!(
            query.consensus_threshold,
            ctx.config.collaboration.consensus_threshold
        );
    }

    #[test]
    fn test_query_rejects_bad_flags() {
        let ctx = context(Config::default());
        let missing = QueryOptions {
            text: "q".into(),
            ..Default::default()
        };
        assert!(matches!(ctx.query(&missing), Err(QuorumError::Config(_))));

        let bad_role = QueryOptions {
            text: "q".into(),
            dataset: Some("d".into()),
            role: Some("intern".into()),
            ..Default::default()
        };
        assert!(matches!(ctx.query(&bad_role), Err(QuorumError::Config(_))));

        let zero_iterations = QueryOptions {
            text: "q".into(),
            dataset: Some("d".into()),
            max_iterations: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            ctx.query(&zero_iterations),
            Err(QuorumError::Config(_))
        ));
    }

    #[test]
    fn test_analysis_stack_requires_dataset() {
        let ctx = context(Config::default());
        assert!(matches!(
            ctx.analysis_stack(None),
            Err(QuorumError::Config(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.db");
        assert!(ctx.analysis_stack(Some(&missing)).is_err());
    }

    #[test]
    fn test_analysis_stack_opens_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE sales (region TEXT, amount REAL);")
                .unwrap();
        }
        let ctx = context(Config::default());
        let stack = ctx.analysis_stack(Some(&path)).unwrap();
        assert_eq!(stack.tool_chain.source_id(), path.display().to_string());
    }
}
