use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mlo::{Config, Orchestrator};
use mlo_cli::commands::{ConfigCommand, PipelineCommand, ProcessArgs, RecallArgs, RememberArgs};
use mlo_cli::error::CliResult;
use mlo_cli::output::OutputFormat;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mlo")]
#[command(about = "Mlo - Run memory items through configurable lifecycle pipelines")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(long, short, global = true, help = "Only log warnings and errors")]
    pub quiet: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Store content as episodic or semantic memory")]
    Remember(RememberArgs),

    #[clap(about = "Run queries through the retrieval pipeline")]
    Recall(RecallArgs),

    #[clap(about = "Run a single item through the pipeline for a memory type")]
    Process(ProcessArgs),

    #[clap(about = "Inspect built pipelines and processors")]
    Pipeline(PipelineCommand),

    #[clap(about = "Configuration commands")]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info,mlo=debug" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> CliResult<()> {
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    if let Command::Config(cmd) = &cli.command {
        return cmd.execute(cli.config.as_deref(), format).await;
    }

    let config = Config::discover(cli.config.as_deref())?;
    tracing::debug!(
        tenant_id = %config.context.tenant_id,
        agent_id = %config.context.agent_id,
        "Loaded configuration"
    );
    let orchestrator = Orchestrator::with_builtins(config)?;

    let result = match &cli.command {
        Command::Remember(args) => args.execute(&orchestrator, format).await,
        Command::Recall(args) => args.execute(&orchestrator, format).await,
        Command::Process(args) => args.execute(&orchestrator, format).await,
        Command::Pipeline(cmd) => cmd.execute(&orchestrator, format).await,
        Command::Config(cmd) => cmd.execute(cli.config.as_deref(), format).await,
    };

    orchestrator.shutdown().await;
    result
}
