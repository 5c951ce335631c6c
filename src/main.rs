use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quorumql::cli::{CommandContext, OutputFormat, QueryOptions, commands};
use quorumql::{GenerationMode, ValidationTier};

#[derive(Parser)]
#[command(name = "quorumql")]
#[command(
    version,
    about = "Collaborative AI analysis of SQL datasets in natural language"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, help = "Load this config file instead of the layered defaults")]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Args)]
struct QueryArgs {
    #[arg(help = "Question (or SQL statement with --statement)")]
    text: String,
    #[arg(short = 'd', long, help = "Dataset id (table name)")]
    dataset: Option<String>,
    #[arg(long, help = "SQLite dataset file")]
    db: Option<PathBuf>,
    #[arg(short = 'r', long, help = "Audience: analyst, executive")]
    role: Option<String>,
    #[arg(long, help = "Complexity: simple, moderate, complex, expert")]
    complexity: Option<String>,
    #[arg(long, help = "Consensus threshold override (0.0-1.0)")]
    consensus_threshold: Option<f32>,
    #[arg(long, help = "Critique loop bound override")]
    max_iterations: Option<usize>,
    #[arg(long, help = "Validation tier: basic, strict, comprehensive")]
    tier: Option<ValidationTier>,
    #[arg(
        short = 'f',
        long,
        default_value = "text",
        help = "Output format: text, json, yaml"
    )]
    format: OutputFormat,
}

impl QueryArgs {
    fn options(&self) -> QueryOptions {
        QueryOptions {
            text: self.text.clone(),
            dataset: self.dataset.clone(),
            db: self.db.clone(),
            role: self.role.clone(),
            complexity: self.complexity.clone(),
            consensus_threshold: self.consensus_threshold,
            max_iterations: self.max_iterations,
            tier: self.tier,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Collaborative multi-worker analysis
    Ask {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, help = "Worker generation mode: direct, reflective")]
        mode: Option<GenerationMode>,
    },

    /// Single-voice reflection pipeline
    Reflect {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Run the SQL tool chain for a question or a statement
    Sql {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, help = "Treat the text as SQL and skip generation")]
        statement: bool,
    },

    /// Validate a SQL statement offline
    ValidateSql {
        sql: String,
        #[arg(long, default_value = "strict", help = "Validation tier: basic, strict, comprehensive")]
        tier: ValidationTier,
        #[arg(short = 'f', long, default_value = "text", help = "Output format: text, json, yaml")]
        format: OutputFormat,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Inspect or clear the cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json, yaml"
        )]
        format: OutputFormat,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry counts and hits
    Stats {
        #[arg(short = 'f', long, default_value = "text", help = "Output format: text, json, yaml")]
        format: OutputFormat,
    },
    /// Remove every entry
    Clear,
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mQuorumQL encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Default hook prints the backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Ask { query, mode } => {
            let ctx = CommandContext::load(config_path)?;
            let rt = Runtime::new()?;
            rt.block_on(commands::ask::run(&ctx, &query.options(), mode, query.format))?;
        }
        Commands::Reflect { query } => {
            let ctx = CommandContext::load(config_path)?;
            let rt = Runtime::new()?;
            rt.block_on(commands::reflect::run(&ctx, &query.options(), query.format))?;
        }
        Commands::Sql { query, statement } => {
            let ctx = CommandContext::load(config_path)?;
            let rt = Runtime::new()?;
            rt.block_on(commands::sql::run(
                &ctx,
                &query.options(),
                statement,
                query.format,
            ))?;
        }
        Commands::ValidateSql { sql, tier, format } => {
            if !commands::validate_sql::run(&sql, tier, format)? {
                anyhow::bail!("SQL failed {} validation", tier);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => commands::config::show(config_path, format)?,
            ConfigAction::Path => commands::config::path()?,
            ConfigAction::Init { global, force } => commands::config::init(global, force)?,
        },
        Commands::Cache { action } => {
            let rt = Runtime::new()?;
            match action {
                CacheAction::Stats { format } => {
                    rt.block_on(commands::cache::stats(config_path, format))?
                }
                CacheAction::Clear => rt.block_on(commands::cache::clear(config_path))?,
            }
        }
    }

    Ok(())
}
