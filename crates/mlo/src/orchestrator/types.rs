//! Request and result types for orchestrator operations

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::memory::{DataType, Intent, MemoryItem, TargetStore};

/// Long-term store a `remember` call writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Semantic,
    #[default]
    Episodic,
}

impl MemoryKind {
    pub fn intent(&self) -> Intent {
        match self {
            MemoryKind::Semantic => Intent::SemanticLtm,
            MemoryKind::Episodic => Intent::EpisodicLtm,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Semantic => "semantic",
            MemoryKind::Episodic => "episodic",
        }
    }
}

impl FromStr for MemoryKind {
    type Err = std::convert::Infallible;

    /// Anything other than `semantic` is episodic
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.eq_ignore_ascii_case("semantic") {
            MemoryKind::Semantic
        } else {
            MemoryKind::Episodic
        })
    }
}

/// Options for `Orchestrator::remember`
#[derive(Debug, Clone, Default)]
pub struct RememberOptions {
    pub memory_type: MemoryKind,
    /// Overrides the payload-inferred data type
    pub data_type: Option<DataType>,
    /// Overrides the configured agent
    pub agent_id: Option<String>,
    /// Extra metadata fields copied onto the item
    pub metadata: Map<String, Value>,
}

impl RememberOptions {
    pub fn semantic() -> Self {
        Self {
            memory_type: MemoryKind::Semantic,
            ..Default::default()
        }
    }

    pub fn episodic() -> Self {
        Self::default()
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Options for `Orchestrator::recall`
#[derive(Debug, Clone, Default)]
pub struct RecallOptions {
    /// Recorded on the query item as `recall_type`
    pub memory_type: Option<MemoryKind>,
    /// Truncate the returned items
    pub limit: Option<usize>,
    pub agent_id: Option<String>,
}

impl RecallOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_memory_type(mut self, memory_type: MemoryKind) -> Self {
        self.memory_type = Some(memory_type);
        self
    }
}

/// Outcome of one `process_memory_item` call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    /// True iff at least one item survived the pipeline
    pub success: bool,
    pub processed_items: Vec<MemoryItem>,
    pub target_store: TargetStore,
    pub metadata: OperationMetadata,
}

impl OperationResult {
    pub fn error(&self) -> Option<&str> {
        self.metadata.error.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetadata {
    pub intent: Intent,
    pub processing_time_ms: f64,
    /// Processors that ran (fewer than the pipeline length on early exit)
    pub stages_executed: usize,
    /// Items dropped across all executed processors
    pub items_dropped: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Snapshot of one built pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub intent: Intent,
    /// `(label, implementation)` pairs in execution order
    pub processors: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_kind_parsing_defaults_to_episodic() {
        assert_eq!("semantic".parse::<MemoryKind>(), Ok(MemoryKind::Semantic));
        assert_eq!("SEMANTIC".parse::<MemoryKind>(), Ok(MemoryKind::Semantic));
        assert_eq!("episodic".parse::<MemoryKind>(), Ok(MemoryKind::Episodic));
        assert_eq!("procedural".parse::<MemoryKind>(), Ok(MemoryKind::Episodic));
    }

    #[test]
    fn test_memory_kind_intent() {
        assert_eq!(MemoryKind::Semantic.intent(), Intent::SemanticLtm);
        assert_eq!(MemoryKind::Episodic.intent(), Intent::EpisodicLtm);
        assert_eq!(RememberOptions::default().memory_type, MemoryKind::Episodic);
        assert_eq!(RememberOptions::semantic().memory_type, MemoryKind::Semantic);
    }
}
