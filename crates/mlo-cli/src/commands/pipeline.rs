use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use mlo::{MemoryItem, Orchestrator, Slot};

use crate::commands::memory::parse_intent;
use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp};

#[derive(Parser)]
pub struct PipelineCommand {
    #[clap(subcommand)]
    pub command: PipelineSubcommand,
}

#[derive(Subcommand)]
pub enum PipelineSubcommand {
    #[clap(about = "Show the built pipeline for each memory type")]
    Show,

    #[clap(about = "List registered processor implementations per slot")]
    Processors,

    #[clap(about = "Run sample items through a pipeline and show its metrics")]
    Metrics(MetricsArgs),
}

#[derive(Parser)]
pub struct MetricsArgs {
    #[clap(long, short, default_value = "episodicLTM", help = "Pipeline to exercise")]
    pub intent: String,

    #[clap(required = true, help = "Sample payloads, processed in order")]
    pub samples: Vec<String>,
}

impl PipelineCommand {
    pub async fn execute(&self, orchestrator: &Orchestrator, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            PipelineSubcommand::Show => Self::show(orchestrator, format).await,
            PipelineSubcommand::Processors => Self::processors(orchestrator, format),
            PipelineSubcommand::Metrics(args) => Self::metrics(orchestrator, args, format).await,
        }
    }

    async fn show(orchestrator: &Orchestrator, format: OutputFormat) -> CliResult<()> {
        let summary = orchestrator.pipeline_summary().await;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            OutputFormat::Table => {
                if summary.is_empty() {
                    println!("No pipelines configured.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Memory Type", "#", "Processor", "Implementation"]);

                for pipeline in &summary {
                    for (index, (label, implementation)) in pipeline.processors.iter().enumerate() {
                        table.add_row([
                            pipeline.intent.to_string(),
                            (index + 1).to_string(),
                            label.clone(),
                            implementation.clone(),
                        ]);
                    }
                }

                println!("{table}");
            }
        }

        Ok(())
    }

    fn processors(orchestrator: &Orchestrator, format: OutputFormat) -> CliResult<()> {
        let registry = orchestrator.registry();

        match format {
            OutputFormat::Json => {
                let output: serde_json::Map<String, serde_json::Value> = Slot::ALL
                    .iter()
                    .map(|slot| (slot.label(), registry.names_for_slot(*slot).into()))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Stage", "Slot", "Implementations"]);

                for slot in Slot::ALL {
                    table.add_row([
                        slot.stage().to_string(),
                        slot.to_string(),
                        registry.names_for_slot(slot).join(", "),
                    ]);
                }

                println!("{table}");
            }
        }

        Ok(())
    }

    async fn metrics(
        orchestrator: &Orchestrator,
        args: &MetricsArgs,
        format: OutputFormat,
    ) -> CliResult<()> {
        let intent = parse_intent(&args.intent)?;

        let mut survived = 0;
        for sample in &args.samples {
            let item = MemoryItem::new(sample.as_str(), intent);
            if orchestrator.process_memory_item(item, None).await.success {
                survived += 1;
            }
        }

        let pipeline = orchestrator.get_metrics().await;
        let processors = orchestrator.processor_metrics(intent).await;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "intent": intent,
                    "samples": args.samples.len(),
                    "survived": survived,
                    "pipeline": pipeline,
                    "processors": processors
                        .iter()
                        .map(|(label, metrics)| serde_json::json!({ "processor": label, "metrics": metrics }))
                        .collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Processor", "Processed", "Dropped", "Failed", "Emitted", "Time (ms)"]);

                for (label, metrics) in &processors {
                    table.add_row([
                        label.clone(),
                        metrics.items_processed.to_string(),
                        metrics.items_dropped.to_string(),
                        metrics.items_failed.to_string(),
                        metrics.items_emitted.to_string(),
                        format!("{:.3}", metrics.processing_time_ms),
                    ]);
                }

                println!("{table}");
                println!(
                    "\n{survived}/{} samples survived; {} dropped; avg {:.3} ms per item",
                    args.samples.len(),
                    pipeline.total_items_dropped,
                    pipeline.average_processing_time_ms,
                );
                if let Some(last) = pipeline.last_processed_at {
                    println!("Last processed: {}", format_timestamp(&last));
                }
            }
        }

        Ok(())
    }
}
