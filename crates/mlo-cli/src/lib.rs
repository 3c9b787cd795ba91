pub mod commands;
pub mod error;
pub mod output;

pub use commands::{ConfigCommand, PipelineCommand, ProcessArgs, RecallArgs, RememberArgs};
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, format_timestamp, truncate_string};
