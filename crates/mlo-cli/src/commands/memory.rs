use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use futures::future::join_all;
use mlo::{
    Intent, MemoryItem, MemoryKind, OperationResult, Orchestrator, RecallOptions,
    RememberOptions,
};
use serde_json::Value;

use crate::error::CliResult;
use crate::output::{OutputFormat, display_value, truncate_string};

#[derive(Parser)]
pub struct RememberArgs {
    #[clap(help = "Memory content text")]
    pub text: String,

    #[clap(long, short, default_value = "episodic", help = "Memory type (episodic, semantic)")]
    pub r#type: String,

    #[clap(long, help = "Agent to attribute the memory to")]
    pub agent: Option<String>,

    #[clap(
        long = "meta",
        value_name = "KEY=VALUE",
        help = "Extra metadata field (repeatable)"
    )]
    pub metadata: Vec<String>,
}

#[derive(Parser)]
pub struct RecallArgs {
    #[clap(required = true, help = "One or more queries, run concurrently")]
    pub queries: Vec<String>,

    #[clap(long, short, help = "Memory type to recall from (episodic, semantic)")]
    pub r#type: Option<String>,

    #[clap(long, short, help = "Maximum results per query")]
    pub limit: Option<usize>,
}

#[derive(Parser)]
pub struct ProcessArgs {
    #[clap(help = "Item payload")]
    pub data: String,

    #[clap(
        long,
        short,
        help = "Pipeline to run (workingMemory, semanticLTM, episodicLTM, retrieval)"
    )]
    pub intent: String,

    #[clap(long, help = "Parse the payload as JSON")]
    pub json_data: bool,
}

fn parse_memory_kind(s: &str) -> CliResult<MemoryKind> {
    match s {
        "episodic" => Ok(MemoryKind::Episodic),
        "semantic" => Ok(MemoryKind::Semantic),
        t => Err(format!("Unknown memory type: {t}. Use episodic or semantic.").into()),
    }
}

pub(crate) fn parse_intent(s: &str) -> CliResult<Intent> {
    match s.to_ascii_lowercase().as_str() {
        "workingmemory" | "working" => Ok(Intent::WorkingMemory),
        "semanticltm" | "semantic" => Ok(Intent::SemanticLtm),
        "episodicltm" | "episodic" => Ok(Intent::EpisodicLtm),
        "retrieval" => Ok(Intent::Retrieval),
        _ => Err(format!(
            "Unknown intent: {s}. Use workingMemory, semanticLTM, episodicLTM, or retrieval."
        )
        .into()),
    }
}

fn parse_metadata(pair: &str) -> CliResult<(String, Value)> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| format!("Invalid metadata '{pair}', expected KEY=VALUE"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

impl RememberArgs {
    pub async fn execute(&self, orchestrator: &Orchestrator, format: OutputFormat) -> CliResult<()> {
        let mut options = RememberOptions {
            memory_type: parse_memory_kind(&self.r#type)?,
            agent_id: self.agent.clone(),
            ..Default::default()
        };
        for pair in &self.metadata {
            let (key, value) = parse_metadata(pair)?;
            options.metadata.insert(key, value);
        }

        let result = orchestrator.remember(self.text.as_str(), options).await;
        print_operation(&result, format)
    }
}

impl ProcessArgs {
    pub async fn execute(&self, orchestrator: &Orchestrator, format: OutputFormat) -> CliResult<()> {
        let intent = parse_intent(&self.intent)?;
        let data = if self.json_data {
            serde_json::from_str(&self.data)?
        } else {
            Value::String(self.data.clone())
        };

        let result = orchestrator
            .process_memory_item(MemoryItem::new(data, intent), None)
            .await;
        print_operation(&result, format)
    }
}

impl RecallArgs {
    pub async fn execute(&self, orchestrator: &Orchestrator, format: OutputFormat) -> CliResult<()> {
        let memory_type = self.r#type.as_deref().map(parse_memory_kind).transpose()?;
        let options = RecallOptions {
            memory_type,
            limit: self.limit,
            ..Default::default()
        };

        let results = join_all(
            self.queries
                .iter()
                .map(|query| orchestrator.recall(query.as_str(), options.clone())),
        )
        .await;

        match format {
            OutputFormat::Json => {
                let output: Vec<_> = self
                    .queries
                    .iter()
                    .zip(&results)
                    .map(|(query, items)| serde_json::json!({ "query": query, "results": items }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if results.iter().all(Vec::is_empty) {
                    println!("No results.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Query", "ID", "Content", "History"]);

                for (query, items) in self.queries.iter().zip(&results) {
                    for item in items {
                        table.add_row([
                            truncate_string(query, 24),
                            truncate_string(&item.id.to_string(), 8),
                            truncate_string(&display_value(&item.data), 50),
                            item.history().join(" > "),
                        ]);
                    }
                }

                println!("{table}");
                let total: usize = results.iter().map(Vec::len).sum();
                println!("\nTotal: {total} results");
            }
        }

        Ok(())
    }
}

fn print_operation(result: &OperationResult, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Table => {
            if !result.success {
                let reason = result
                    .error()
                    .unwrap_or("all items were dropped by the pipeline");
                println!("Not stored: {reason}");
                return Ok(());
            }

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL_CONDENSED)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(["ID", "Content", "History"]);

            for item in &result.processed_items {
                table.add_row([
                    truncate_string(&item.id.to_string(), 8),
                    truncate_string(&display_value(&item.data), 50),
                    item.history().join(" > "),
                ]);
            }

            println!("{table}");
            println!(
                "\n{} item(s) -> {} in {:.2} ms ({} stages, {} dropped)",
                result.processed_items.len(),
                result.target_store,
                result.metadata.processing_time_ms,
                result.metadata.stages_executed,
                result.metadata.items_dropped,
            );
        }
    }

    Ok(())
}
