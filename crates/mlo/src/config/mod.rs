//! Pipeline configuration model
//!
//! A declarative, per-memory-type description of which implementation
//! fills each stage slot, with optional per-component payloads and
//! stage-level enable flags. Loaded from TOML (or JSON) and merged with
//! partial updates at runtime.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MloError, Result};
use crate::memory::Intent;
use crate::stage::{ComponentConfig, Slot, Stage};

/// Main configuration structure for Mlo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Call-scoped identity merged into component configs and new items
    #[serde(default)]
    pub context: ContextConfig,
    /// Cross-cutting settings passed through to every component
    #[serde(default)]
    pub global: GlobalConfig,
    /// Per-intent pipeline definitions
    #[serde(default)]
    pub memory_types: MemoryTypes,
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MloError::Config(format!("Failed to parse config: {e}")))
    }

    /// Parse a JSON document (profile-store format)
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| MloError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load a config file. `.json` files are parsed as JSON, everything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!("Loading config from: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            MloError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    /// Load from an explicit path, or the first default location that exists.
    ///
    /// Falls back to an empty configuration when no file is found.
    pub fn discover(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load(path);
        }

        for path in default_config_paths() {
            if path.exists() {
                return Self::load(&path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| MloError::Serialization(e.to_string()))
    }

    /// Merge a partial configuration into this one.
    ///
    /// Sections present in the patch replace the held ones; memory types
    /// present in the patch replace that memory type's definition.
    pub fn apply(&mut self, patch: ConfigPatch) {
        if let Some(context) = patch.context {
            self.context = context;
        }
        if let Some(global) = patch.global {
            self.global = global;
        }
        for intent in Intent::ALL {
            if let Some(definition) = patch.memory_types.get(intent) {
                self.memory_types.set(intent, definition.clone());
            }
        }
    }

    /// Whether a stage is enabled for a memory type.
    ///
    /// Unconfigured memory types have no enabled stages; for configured
    /// ones a stage is enabled unless `enabled_stages` sets it to false.
    pub fn is_stage_enabled(&self, stage: Stage, intent: Intent) -> bool {
        self.memory_types
            .get(intent)
            .is_some_and(|definition| definition.enabled_stages.get(stage).unwrap_or(true))
    }
}

/// Candidate config file locations, most specific first
pub fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::home_dir().map(|h| h.join(".mlo").join("config.toml")),
        dirs::config_dir().map(|c| c.join("mlo").join("config.toml")),
        Some(PathBuf::from("mlo.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Tenant and agent identity for this orchestrator instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,
    #[serde(default = "default_agent_id")]
    pub agent_id: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            tenant_id: default_tenant_id(),
            agent_id: default_agent_id(),
        }
    }
}

fn default_tenant_id() -> String {
    "default".to_string()
}

fn default_agent_id() -> String {
    "default".to_string()
}

/// Cross-cutting settings. Not interpreted by the engine beyond
/// monitoring; merged underneath every component's own config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Concurrency hint for processors that fan work out internally
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Default model provider for processors that call one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_provider: Option<String>,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Anything else, passed through untouched
    #[serde(flatten)]
    pub extra: ComponentConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            default_provider: None,
            monitoring: MonitoringConfig::default(),
            extra: ComponentConfig::new(),
        }
    }
}

impl GlobalConfig {
    /// Flattened view used as the base layer of component configs
    pub fn as_component_config(&self) -> ComponentConfig {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => ComponentConfig::new(),
        }
    }
}

fn default_max_concurrency() -> usize {
    4
}

/// Monitoring flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Hint for components that keep their own telemetry. Passed through in
    /// every component's config; engine metrics are always collected.
    #[serde(default = "default_monitoring_enabled")]
    pub enabled: bool,
    /// Log per-stage counts after every processed item
    #[serde(default)]
    pub log_stage_metrics: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: default_monitoring_enabled(),
            log_stage_metrics: false,
        }
    }
}

fn default_monitoring_enabled() -> bool {
    true
}

/// Pipeline definitions for the four memory types
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryTypes {
    #[serde(default, alias = "workingMemory", skip_serializing_if = "Option::is_none")]
    pub working_memory: Option<MemoryTypeConfig>,
    #[serde(default, alias = "semanticLTM", skip_serializing_if = "Option::is_none")]
    pub semantic_ltm: Option<MemoryTypeConfig>,
    #[serde(default, alias = "episodicLTM", skip_serializing_if = "Option::is_none")]
    pub episodic_ltm: Option<MemoryTypeConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<MemoryTypeConfig>,
}

impl MemoryTypes {
    pub fn get(&self, intent: Intent) -> Option<&MemoryTypeConfig> {
        match intent {
            Intent::WorkingMemory => self.working_memory.as_ref(),
            Intent::SemanticLtm => self.semantic_ltm.as_ref(),
            Intent::EpisodicLtm => self.episodic_ltm.as_ref(),
            Intent::Retrieval => self.retrieval.as_ref(),
        }
    }

    pub fn set(&mut self, intent: Intent, definition: MemoryTypeConfig) {
        let slot = match intent {
            Intent::WorkingMemory => &mut self.working_memory,
            Intent::SemanticLtm => &mut self.semantic_ltm,
            Intent::EpisodicLtm => &mut self.episodic_ltm,
            Intent::Retrieval => &mut self.retrieval,
        };
        *slot = Some(definition);
    }

    /// Builder-style variant of `set`
    pub fn with(mut self, intent: Intent, definition: MemoryTypeConfig) -> Self {
        self.set(intent, definition);
        self
    }
}

/// Pipeline definition for one memory type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryTypeConfig {
    #[serde(default)]
    pub stages: StageAssignments,
    #[serde(default, alias = "enabledStages")]
    pub enabled_stages: EnabledStages,
}

impl MemoryTypeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign an implementation name to a slot
    pub fn with_slot(mut self, slot: Slot, implementation: impl Into<String>) -> Self {
        self.stages
            .set(slot, SlotAssignment::Name(implementation.into()));
        self
    }

    /// Assign an implementation with a component config payload
    pub fn with_slot_config(
        mut self,
        slot: Slot,
        implementation: impl Into<String>,
        config: ComponentConfig,
    ) -> Self {
        self.stages.set(
            slot,
            SlotAssignment::Detailed(SlotSpec {
                implementation: implementation.into(),
                config,
            }),
        );
        self
    }

    pub fn with_stage_enabled(mut self, stage: Stage, enabled: bool) -> Self {
        self.enabled_stages.set(stage, enabled);
        self
    }
}

/// Implementation assignment for one slot: a bare name or a name plus config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotAssignment {
    Name(String),
    Detailed(SlotSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlotSpec {
    pub implementation: String,
    #[serde(default)]
    pub config: ComponentConfig,
}

impl SlotAssignment {
    pub fn implementation(&self) -> &str {
        match self {
            SlotAssignment::Name(name) => name,
            SlotAssignment::Detailed(spec) => &spec.implementation,
        }
    }

    pub fn config(&self) -> Option<&ComponentConfig> {
        match self {
            SlotAssignment::Name(_) => None,
            SlotAssignment::Detailed(spec) => Some(&spec.config),
        }
    }

    /// False only when the component config explicitly sets `enabled = false`
    pub fn is_enabled(&self) -> bool {
        !matches!(
            self.config().and_then(|c| c.get("enabled")),
            Some(Value::Bool(false))
        )
    }
}

/// Slot assignments for all six stages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageAssignments {
    #[serde(default)]
    pub acquisition: AcquisitionSlots,
    #[serde(default)]
    pub encoding: EncodingSlots,
    #[serde(default)]
    pub derivation: DerivationSlots,
    #[serde(default)]
    pub retrieval: RetrievalSlots,
    #[serde(default, alias = "neuralMemory")]
    pub neural_memory: NeuralMemorySlots,
    #[serde(default)]
    pub utilization: UtilizationSlots,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcquisitionSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<SlotAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressor: Option<SlotAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consolidator: Option<SlotAssignment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncodingSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attention: Option<SlotAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fusion: Option<SlotAssignment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerivationSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reflection: Option<SlotAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarization: Option<SlotAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distillation: Option<SlotAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forgetting: Option<SlotAssignment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexing: Option<SlotAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching: Option<SlotAssignment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeuralMemorySlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associative: Option<SlotAssignment>,
    #[serde(
        default,
        alias = "parameterIntegration",
        skip_serializing_if = "Option::is_none"
    )]
    pub parameter_integration: Option<SlotAssignment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UtilizationSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag: Option<SlotAssignment>,
    #[serde(default, alias = "longContext", skip_serializing_if = "Option::is_none")]
    pub long_context: Option<SlotAssignment>,
    #[serde(
        default,
        alias = "hallucinationMitigation",
        skip_serializing_if = "Option::is_none"
    )]
    pub hallucination_mitigation: Option<SlotAssignment>,
}

impl StageAssignments {
    /// Assignment for a slot, if one is configured
    pub fn get(&self, slot: Slot) -> Option<&SlotAssignment> {
        match slot {
            Slot::Filter => self.acquisition.filter.as_ref(),
            Slot::Compressor => self.acquisition.compressor.as_ref(),
            Slot::Consolidator => self.acquisition.consolidator.as_ref(),
            Slot::Attention => self.encoding.attention.as_ref(),
            Slot::Fusion => self.encoding.fusion.as_ref(),
            Slot::Reflection => self.derivation.reflection.as_ref(),
            Slot::Summarization => self.derivation.summarization.as_ref(),
            Slot::Distillation => self.derivation.distillation.as_ref(),
            Slot::Forgetting => self.derivation.forgetting.as_ref(),
            Slot::Indexing => self.retrieval.indexing.as_ref(),
            Slot::Matching => self.retrieval.matching.as_ref(),
            Slot::Associative => self.neural_memory.associative.as_ref(),
            Slot::ParameterIntegration => self.neural_memory.parameter_integration.as_ref(),
            Slot::Rag => self.utilization.rag.as_ref(),
            Slot::LongContext => self.utilization.long_context.as_ref(),
            Slot::HallucinationMitigation => self.utilization.hallucination_mitigation.as_ref(),
        }
    }

    pub fn set(&mut self, slot: Slot, assignment: SlotAssignment) {
        let target = match slot {
            Slot::Filter => &mut self.acquisition.filter,
            Slot::Compressor => &mut self.acquisition.compressor,
            Slot::Consolidator => &mut self.acquisition.consolidator,
            Slot::Attention => &mut self.encoding.attention,
            Slot::Fusion => &mut self.encoding.fusion,
            Slot::Reflection => &mut self.derivation.reflection,
            Slot::Summarization => &mut self.derivation.summarization,
            Slot::Distillation => &mut self.derivation.distillation,
            Slot::Forgetting => &mut self.derivation.forgetting,
            Slot::Indexing => &mut self.retrieval.indexing,
            Slot::Matching => &mut self.retrieval.matching,
            Slot::Associative => &mut self.neural_memory.associative,
            Slot::ParameterIntegration => &mut self.neural_memory.parameter_integration,
            Slot::Rag => &mut self.utilization.rag,
            Slot::LongContext => &mut self.utilization.long_context,
            Slot::HallucinationMitigation => &mut self.utilization.hallucination_mitigation,
        };
        *target = Some(assignment);
    }

    /// Configured slots in pipeline order
    pub fn assigned(&self) -> Vec<(Slot, &SlotAssignment)> {
        Slot::ALL
            .iter()
            .filter_map(|slot| self.get(*slot).map(|a| (*slot, a)))
            .collect()
    }
}

/// Stage-level enable flags. Absent means enabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnabledStages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acquisition: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<bool>,
    #[serde(default, alias = "neuralMemory", skip_serializing_if = "Option::is_none")]
    pub neural_memory: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization: Option<bool>,
}

impl EnabledStages {
    pub fn get(&self, stage: Stage) -> Option<bool> {
        match stage {
            Stage::Acquisition => self.acquisition,
            Stage::Encoding => self.encoding,
            Stage::Derivation => self.derivation,
            Stage::Retrieval => self.retrieval,
            Stage::NeuralMemory => self.neural_memory,
            Stage::Utilization => self.utilization,
        }
    }

    pub fn set(&mut self, stage: Stage, enabled: bool) {
        let target = match stage {
            Stage::Acquisition => &mut self.acquisition,
            Stage::Encoding => &mut self.encoding,
            Stage::Derivation => &mut self.derivation,
            Stage::Retrieval => &mut self.retrieval,
            Stage::NeuralMemory => &mut self.neural_memory,
            Stage::Utilization => &mut self.utilization,
        };
        *target = Some(enabled);
    }
}

/// Partial configuration accepted by `Orchestrator::configure`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<GlobalConfig>,
    #[serde(default)]
    pub memory_types: MemoryTypes,
}

impl ConfigPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_type(mut self, intent: Intent, definition: MemoryTypeConfig) -> Self {
        self.memory_types.set(intent, definition);
        self
    }

    pub fn with_global(mut self, global: GlobalConfig) -> Self {
        self.global = Some(global);
        self
    }

    pub fn with_context(mut self, context: ContextConfig) -> Self {
        self.context = Some(context);
        self
    }
}
