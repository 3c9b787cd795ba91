//! Pipeline construction and execution
//!
//! A `Pipeline` is an ordered, immutable list of live processors for one
//! intent. The builder walks the six stages in fixed order and asks the
//! registry for each included slot. Execution drives items through the
//! processors one at a time, handling fan-out, drops and per-item failures.

pub mod metrics;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::{Config, MemoryTypeConfig};
use crate::error::Result;
use crate::memory::{Intent, MemoryItem};
use crate::registry::ComponentRegistry;
use crate::stage::{ComponentConfig, EnablePolicy, Stage, StageProcessor};

pub use metrics::{PipelineMetrics, StageMetrics};

/// Ordered processors for one intent
pub struct Pipeline {
    intent: Intent,
    processors: Vec<Arc<dyn StageProcessor>>,
}

impl Pipeline {
    pub fn new(intent: Intent, processors: Vec<Arc<dyn StageProcessor>>) -> Self {
        Self { intent, processors }
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn processors(&self) -> &[Arc<dyn StageProcessor>] {
        &self.processors
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// `"<stage>:<component>"` labels in execution order
    pub fn labels(&self) -> Vec<String> {
        self.processors.iter().map(|p| p.label()).collect()
    }

    /// Drive one item through every processor.
    ///
    /// Items within a stage are processed sequentially so history and
    /// counters stay order-stable. A processor error drops only the item
    /// that caused it. Execution stops early once no items remain.
    pub async fn execute(&self, item: MemoryItem) -> PipelineRun {
        let mut current = vec![item];
        let mut stages = Vec::with_capacity(self.processors.len());

        for processor in &self.processors {
            let label = processor.label();
            let items_in = current.len();
            let stage_started = Instant::now();
            let mut next = Vec::with_capacity(items_in);

            for item in current {
                let item_id = item.id;
                let call_started = Instant::now();
                match processor.process(item).await {
                    Ok(output) => {
                        processor.stats().record(output.len(), call_started.elapsed());
                        for mut survivor in output.into_items() {
                            survivor.metadata.processing_history.push(label.clone());
                            next.push(survivor);
                        }
                    }
                    Err(e) => {
                        processor.stats().record_failure(call_started.elapsed());
                        warn!(
                            stage = processor.stage_name(),
                            component = processor.component_name(),
                            item_id = %item_id,
                            error = %e,
                            "Processor failed, dropping item"
                        );
                    }
                }
            }

            stages.push(StageRun {
                stage: processor.stage(),
                label,
                items_in,
                items_out: next.len(),
                elapsed_ms: stage_started.elapsed().as_secs_f64() * 1000.0,
            });
            current = next;

            if current.is_empty() {
                debug!(
                    intent = %self.intent,
                    stage = processor.stage_name(),
                    component = processor.component_name(),
                    "All items dropped, stopping pipeline early"
                );
                break;
            }
        }

        PipelineRun {
            items: current,
            stages,
        }
    }
}

/// What happened at one processor during a run
#[derive(Debug, Clone, PartialEq)]
pub struct StageRun {
    pub stage: Stage,
    pub label: String,
    pub items_in: usize,
    pub items_out: usize,
    pub elapsed_ms: f64,
}

impl StageRun {
    pub fn dropped(&self) -> usize {
        self.items_in.saturating_sub(self.items_out)
    }
}

/// Result of running one item through a pipeline
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Items that survived every executed processor
    pub items: Vec<MemoryItem>,
    /// One entry per executed processor; shorter than the pipeline on early exit
    pub stages: Vec<StageRun>,
}

impl PipelineRun {
    pub fn items_dropped(&self) -> usize {
        self.stages.iter().map(StageRun::dropped).sum()
    }
}

/// Built pipelines for every configured intent. Replaced wholesale on reconfiguration.
#[derive(Default)]
pub struct PipelineSet {
    pipelines: HashMap<Intent, Arc<Pipeline>>,
    log_stage_metrics: bool,
}

impl PipelineSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build pipelines for all intents. Any failure aborts the whole build.
    pub fn build(registry: &ComponentRegistry, config: &Config) -> Result<Self> {
        let builder = PipelineBuilder::new(registry, config);
        let mut pipelines = HashMap::new();

        for intent in Intent::ALL {
            let Some(definition) = config.memory_types.get(intent) else {
                continue;
            };
            let pipeline = builder.build(intent, definition)?;
            if pipeline.is_empty() {
                debug!(intent = %intent, "No processors configured");
                continue;
            }
            tracing::info!(
                intent = %intent,
                processors = pipeline.len(),
                "Built pipeline: {}",
                pipeline.labels().join(" -> ")
            );
            pipelines.insert(intent, Arc::new(pipeline));
        }

        Ok(Self {
            pipelines,
            log_stage_metrics: config.global.monitoring.log_stage_metrics,
        })
    }

    pub fn get(&self, intent: Intent) -> Option<Arc<Pipeline>> {
        self.pipelines.get(&intent).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn log_stage_metrics(&self) -> bool {
        self.log_stage_metrics
    }
}

/// Turns a memory type definition into a live pipeline
pub struct PipelineBuilder<'a> {
    registry: &'a ComponentRegistry,
    base_config: ComponentConfig,
    context_config: ComponentConfig,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(registry: &'a ComponentRegistry, config: &Config) -> Self {
        let mut context_config = ComponentConfig::new();
        context_config.insert("tenant_id".to_string(), config.context.tenant_id.clone().into());
        context_config.insert("agent_id".to_string(), config.context.agent_id.clone().into());

        Self {
            registry,
            base_config: config.global.as_component_config(),
            context_config,
        }
    }

    /// Global fields, then the slot's own config, then call-scoped context
    fn component_config(&self, own: Option<&ComponentConfig>) -> ComponentConfig {
        let mut merged = self.base_config.clone();
        if let Some(own) = own {
            merged.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged.extend(
            self.context_config
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        merged
    }

    pub fn build(&self, intent: Intent, definition: &MemoryTypeConfig) -> Result<Pipeline> {
        let mut processors: Vec<Arc<dyn StageProcessor>> = Vec::new();

        for stage in Stage::ALL {
            if definition.enabled_stages.get(stage) == Some(false) {
                debug!(intent = %intent, stage = %stage, "Stage disabled, skipping");
                continue;
            }

            for &slot in stage.slots() {
                let Some(assignment) = definition.stages.get(slot) else {
                    continue;
                };

                let include = match slot.enable_policy() {
                    EnablePolicy::Always => true,
                    EnablePolicy::UnlessDisabled => assignment.is_enabled(),
                };
                if !include {
                    debug!(intent = %intent, slot = %slot, "Component disabled, skipping");
                    continue;
                }

                let config = self.component_config(assignment.config());
                let processor =
                    self.registry
                        .create_in_slot(slot, assignment.implementation(), &config)?;
                processors.push(processor);
            }
        }

        Ok(Pipeline::new(intent, processors))
    }
}
