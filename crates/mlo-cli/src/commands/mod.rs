pub mod config;
pub mod memory;
pub mod pipeline;

pub use config::ConfigCommand;
pub use memory::{ProcessArgs, RecallArgs, RememberArgs};
pub use pipeline::PipelineCommand;
