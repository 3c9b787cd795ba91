use std::path::Path;

use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use mlo::config::default_config_paths;
use mlo::{ComponentRegistry, Config, Intent};

use crate::error::CliResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct ConfigCommand {
    #[clap(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    #[clap(about = "Print the effective configuration")]
    Show,

    #[clap(about = "Check every configured implementation name against its slot")]
    Validate,

    #[clap(about = "List the locations searched for a config file")]
    Paths,
}

impl ConfigCommand {
    pub async fn execute(&self, config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            ConfigSubcommand::Show => Self::show(config_path, format),
            ConfigSubcommand::Validate => Self::validate(config_path, format),
            ConfigSubcommand::Paths => Self::paths(config_path, format),
        }
    }

    fn show(config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
        let config = Config::discover(config_path)?;

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
            OutputFormat::Table => print!("{}", toml::to_string_pretty(&config)?),
        }

        Ok(())
    }

    fn validate(config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
        let config = Config::discover(config_path)?;
        let registry = ComponentRegistry::with_builtins();
        let result = registry.validate(&config);

        let configured: Vec<Intent> = Intent::ALL
            .into_iter()
            .filter(|intent| {
                config
                    .memory_types
                    .get(*intent)
                    .is_some_and(|definition| !definition.stages.assigned().is_empty())
            })
            .collect();

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "valid": result.is_ok(),
                    "error": result.as_ref().err().map(ToString::to_string),
                    "memory_types": configured,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if let Err(e) = &result {
                    println!("Configuration is invalid: {e}");
                } else if configured.is_empty() {
                    println!("Configuration is valid (no pipelines configured).");
                } else {
                    let names: Vec<&str> = configured.iter().map(Intent::as_str).collect();
                    println!("Configuration is valid: {}", names.join(", "));
                }
            }
        }

        result.map_err(Into::into)
    }

    fn paths(config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
        let mut paths = default_config_paths();
        if let Some(path) = config_path {
            paths.insert(0, path.to_path_buf());
        }

        match format {
            OutputFormat::Json => {
                let output: Vec<_> = paths
                    .iter()
                    .map(|p| {
                        serde_json::json!({
                            "path": p.display().to_string(),
                            "exists": p.exists(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Path", "Exists"]);

                for path in &paths {
                    table.add_row([
                        path.display().to_string(),
                        if path.exists() { "yes" } else { "no" }.to_string(),
                    ]);
                }

                println!("{table}");
            }
        }

        Ok(())
    }
}
