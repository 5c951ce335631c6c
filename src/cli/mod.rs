pub mod commands;
pub mod output;
pub mod util;

pub use output::{Output, OutputFormat};
pub use util::{AnalysisStack, CommandContext, QueryOptions, load_config};
