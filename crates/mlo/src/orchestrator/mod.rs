//! Orchestrator: the public entry point for memory processing
//!
//! Owns the held configuration, the built pipelines (one per intent) and
//! pipeline-wide metrics. Items are routed by intent to their pipeline and
//! the survivors are returned together with the store they are bound for.
//! Pipelines are rebuilt and swapped atomically on `configure`; calls in
//! flight keep the pipeline set they started with.

pub mod types;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::{Config, ConfigPatch};
use crate::error::{MloError, Result};
use crate::memory::{Intent, MemoryItem};
use crate::pipeline::{PipelineMetrics, PipelineRun, PipelineSet};
use crate::registry::ComponentRegistry;
use crate::stage::{ComponentConfig, ProcessorMetrics, Slot, Stage};

pub use types::{
    MemoryKind, OperationMetadata, OperationResult, PipelineSummary, RecallOptions,
    RememberOptions,
};

/// Routes memory items through per-intent stage pipelines
pub struct Orchestrator {
    registry: Arc<ComponentRegistry>,
    config: RwLock<Config>,
    pipelines: RwLock<Arc<PipelineSet>>,
    metrics: Mutex<PipelineMetrics>,
}

impl Orchestrator {
    /// Build every configured pipeline. Fails on the first unknown or
    /// misplaced implementation name.
    pub fn new(config: Config, registry: Arc<ComponentRegistry>) -> Result<Self> {
        let pipelines = PipelineSet::build(&registry, &config)?;
        info!(
            tenant_id = %config.context.tenant_id,
            agent_id = %config.context.agent_id,
            pipelines = pipelines.len(),
            "Orchestrator initialized"
        );

        Ok(Self {
            registry,
            config: RwLock::new(config),
            pipelines: RwLock::new(Arc::new(pipelines)),
            metrics: Mutex::new(PipelineMetrics::new()),
        })
    }

    /// Orchestrator backed by the built-in component registry
    pub fn with_builtins(config: Config) -> Result<Self> {
        Self::new(config, Arc::new(ComponentRegistry::with_builtins()))
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    async fn current_pipelines(&self) -> Arc<PipelineSet> {
        self.pipelines.read().await.clone()
    }

    /// Run one item through the pipeline for `memory_type` (or the item's own intent).
    ///
    /// Never fails: a missing pipeline or an item dropped along the way is
    /// reported as `success == false`.
    pub async fn process_memory_item(
        &self,
        mut item: MemoryItem,
        memory_type: Option<Intent>,
    ) -> OperationResult {
        let started = Instant::now();
        let intent = memory_type.unwrap_or(item.intent);
        item.intent = intent;

        let pipelines = self.current_pipelines().await;
        let Some(pipeline) = pipelines.get(intent) else {
            self.metrics.lock().await.record_unrouted();
            warn!(intent = %intent, item_id = %item.id, "No processors configured for memory type");
            return OperationResult {
                success: false,
                processed_items: Vec::new(),
                target_store: intent.target_store(),
                metadata: OperationMetadata {
                    intent,
                    processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
                    stages_executed: 0,
                    items_dropped: 0,
                    error: Some(format!("No processors configured for memory type: {intent}")),
                    completed_at: Utc::now(),
                },
            };
        };

        debug!(intent = %intent, item_id = %item.id, processors = pipeline.len(), "Processing item");
        let run = pipeline.execute(item).await;
        let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        let success = !run.items.is_empty();

        self.record_run(&run, processing_time_ms, success).await;
        if pipelines.log_stage_metrics() {
            for stage in &run.stages {
                debug!(
                    intent = %intent,
                    processor = %stage.label,
                    items_in = stage.items_in,
                    items_out = stage.items_out,
                    elapsed_ms = stage.elapsed_ms,
                    "Stage metrics"
                );
            }
        }

        let items_dropped = run.items_dropped();
        let stages_executed = run.stages.len();
        OperationResult {
            success,
            processed_items: run.items,
            target_store: intent.target_store(),
            metadata: OperationMetadata {
                intent,
                processing_time_ms,
                stages_executed,
                items_dropped,
                error: None,
                completed_at: Utc::now(),
            },
        }
    }

    async fn record_run(&self, run: &PipelineRun, processing_time_ms: f64, success: bool) {
        let mut metrics = self.metrics.lock().await;
        for stage in &run.stages {
            metrics.record_stage(
                stage.stage.as_str(),
                stage.items_in,
                stage.items_out,
                stage.elapsed_ms,
            );
        }
        metrics.record_item(processing_time_ms, !success);
    }

    /// New item stamped with the configured tenant and agent
    async fn new_item(
        &self,
        data: Value,
        intent: Intent,
        operation: &str,
        agent_id: Option<String>,
    ) -> MemoryItem {
        let config = self.config.read().await;
        let agent_id = agent_id.unwrap_or_else(|| config.context.agent_id.clone());
        MemoryItem::new(data, intent)
            .with_context(config.context.tenant_id.clone(), agent_id)
            .with_source_operation(operation)
    }

    /// Store content as semantic or episodic memory
    pub async fn remember(
        &self,
        content: impl Into<Value>,
        options: RememberOptions,
    ) -> OperationResult {
        let intent = options.memory_type.intent();
        let mut item = self
            .new_item(content.into(), intent, "remember", options.agent_id)
            .await;
        if let Some(data_type) = options.data_type {
            item.data_type = data_type;
        }
        item.metadata.extend(options.metadata);

        self.process_memory_item(item, Some(intent)).await
    }

    /// Run a query through the retrieval pipeline and return the survivors
    pub async fn recall(&self, query: impl Into<Value>, options: RecallOptions) -> Vec<MemoryItem> {
        let mut item = self
            .new_item(query.into(), Intent::Retrieval, "recall", options.agent_id)
            .await;
        if let Some(kind) = options.memory_type {
            item.metadata.insert("recall_type", kind.as_str());
        }

        let mut items = self
            .process_memory_item(item, Some(Intent::Retrieval))
            .await
            .processed_items;
        if let Some(limit) = options.limit {
            items.truncate(limit);
        }
        items
    }

    /// Merge a partial configuration and rebuild every pipeline.
    ///
    /// The new pipelines replace the old ones only if all of them build;
    /// on error both the held configuration and the pipelines are unchanged.
    pub async fn configure(&self, patch: ConfigPatch) -> Result<()> {
        let mut config = self.config.write().await;
        let mut updated = config.clone();
        updated.apply(patch);

        let pipelines = PipelineSet::build(&self.registry, &updated)?;
        let count = pipelines.len();
        *self.pipelines.write().await = Arc::new(pipelines);
        *config = updated;

        info!(pipelines = count, "Orchestrator reconfigured");
        Ok(())
    }

    /// Push a partial config into the live processor filling `slot` in
    /// `memory_type`'s pipeline. Fields the processor does not know are ignored.
    pub async fn configure_component(
        &self,
        memory_type: Intent,
        slot: Slot,
        config: &ComponentConfig,
    ) -> Result<()> {
        let pipelines = self.current_pipelines().await;
        let processor = pipelines
            .get(memory_type)
            .and_then(|pipeline| {
                pipeline
                    .processors()
                    .iter()
                    .find(|p| p.slot() == slot)
                    .cloned()
            })
            .ok_or_else(|| {
                MloError::Config(format!("No {slot} processor in the {memory_type} pipeline"))
            })?;

        if let Err(e) = processor.configure(config).await {
            warn!(
                intent = %memory_type,
                stage = processor.stage_name(),
                component = processor.component_name(),
                error = %e,
                "Rejected component reconfiguration"
            );
            return Err(e.into());
        }
        debug!(intent = %memory_type, processor = %processor.label(), "Component reconfigured");
        Ok(())
    }

    /// Copy of the pipeline-wide metrics
    pub async fn get_metrics(&self) -> PipelineMetrics {
        self.metrics.lock().await.clone()
    }

    pub async fn reset_metrics(&self) {
        self.metrics.lock().await.reset();
        debug!("Pipeline metrics reset");
    }

    /// Whether `stage` is enabled for `memory_type` in the held configuration
    pub async fn is_stage_enabled(&self, stage: Stage, memory_type: Intent) -> bool {
        self.config.read().await.is_stage_enabled(stage, memory_type)
    }

    /// Copy of the held configuration
    pub async fn get_configuration(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Processor labels and implementations for every built pipeline
    pub async fn pipeline_summary(&self) -> Vec<PipelineSummary> {
        let pipelines = self.current_pipelines().await;
        Intent::ALL
            .into_iter()
            .filter_map(|intent| pipelines.get(intent))
            .map(|pipeline| PipelineSummary {
                intent: pipeline.intent(),
                processors: pipeline
                    .processors()
                    .iter()
                    .map(|p| (p.label(), p.implementation().to_string()))
                    .collect(),
            })
            .collect()
    }

    /// Per-processor counters for one intent's pipeline
    pub async fn processor_metrics(&self, memory_type: Intent) -> Vec<(String, ProcessorMetrics)> {
        let pipelines = self.current_pipelines().await;
        pipelines
            .get(memory_type)
            .map(|pipeline| {
                pipeline
                    .processors()
                    .iter()
                    .map(|p| (p.label(), p.metrics()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Release all pipelines and clear metrics. Later calls behave as if
    /// nothing were configured.
    pub async fn shutdown(&self) {
        *self.pipelines.write().await = Arc::new(PipelineSet::empty());
        self.metrics.lock().await.reset();
        info!("Orchestrator shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemoryTypeConfig, MemoryTypes};
    use crate::memory::TargetStore;
    use crate::stage::Slot;

    fn episodic_config() -> Config {
        Config {
            memory_types: MemoryTypes::default().with(
                Intent::EpisodicLtm,
                MemoryTypeConfig::new().with_slot(Slot::Filter, "PassThrough"),
            ),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_remember_routes_to_episodic_store() {
        let orchestrator = Orchestrator::with_builtins(episodic_config()).unwrap();
        let result = orchestrator
            .remember("hello", RememberOptions::default())
            .await;

        assert!(result.success);
        assert_eq!(result.target_store, TargetStore::EpisodicLtm);
        assert_eq!(result.processed_items.len(), 1);
        let item = &result.processed_items[0];
        assert_eq!(item.history(), ["acquisition:filter"]);
        assert_eq!(item.metadata.source_operation, "remember");
        assert_eq!(item.metadata.tenant_id, "default");
    }

    #[tokio::test]
    async fn test_unrouted_item_reports_error() {
        let orchestrator = Orchestrator::with_builtins(episodic_config()).unwrap();
        let result = orchestrator
            .remember("fact", RememberOptions::semantic())
            .await;

        assert!(!result.success);
        assert_eq!(result.target_store, TargetStore::SemanticLtm);
        assert_eq!(
            result.error(),
            Some("No processors configured for memory type: semanticLTM")
        );

        let metrics = orchestrator.get_metrics().await;
        assert_eq!(metrics.total_items_dropped, 1);
        assert_eq!(metrics.total_items_processed, 0);
    }

    #[tokio::test]
    async fn test_memory_type_overrides_item_intent() {
        let orchestrator = Orchestrator::with_builtins(episodic_config()).unwrap();
        let item = MemoryItem::new("note", Intent::WorkingMemory);
        let result = orchestrator
            .process_memory_item(item, Some(Intent::EpisodicLtm))
            .await;
        assert!(result.success);
        assert_eq!(result.processed_items[0].intent, Intent::EpisodicLtm);
    }

    #[tokio::test]
    async fn test_shutdown_releases_pipelines() {
        let orchestrator = Orchestrator::with_builtins(episodic_config()).unwrap();
        orchestrator.remember("a", RememberOptions::default()).await;
        orchestrator.shutdown().await;

        assert!(orchestrator.pipeline_summary().await.is_empty());
        assert_eq!(orchestrator.get_metrics().await, PipelineMetrics::default());
        let result = orchestrator.remember("b", RememberOptions::default()).await;
        assert!(!result.success);
    }
}
