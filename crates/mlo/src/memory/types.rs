//! Memory item types for the Mlo system
//!
//! A `MemoryItem` carries a type-erased payload, the intent that selects
//! which pipeline it traverses, and a metadata record. The metadata has a
//! fixed core (tenant, agent, source operation, timestamp, processing
//! history) plus an open side-channel for fields added by stage processors.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Memory kind used to select which pipeline an item traverses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Intent {
    /// Short-lived context for the current task
    #[serde(rename = "workingMemory")]
    WorkingMemory,
    /// Facts and knowledge
    #[serde(rename = "semanticLTM")]
    SemanticLtm,
    /// What happened (conversations, events)
    #[serde(rename = "episodicLTM")]
    EpisodicLtm,
    /// Queries against stored memory
    #[serde(rename = "retrieval")]
    Retrieval,
}

impl Intent {
    /// All intents in pipeline build order
    pub const ALL: [Intent; 4] = [
        Intent::WorkingMemory,
        Intent::SemanticLtm,
        Intent::EpisodicLtm,
        Intent::Retrieval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::WorkingMemory => "workingMemory",
            Intent::SemanticLtm => "semanticLTM",
            Intent::EpisodicLtm => "episodicLTM",
            Intent::Retrieval => "retrieval",
        }
    }

    /// Store that successfully processed items of this intent are routed to
    pub fn target_store(&self) -> TargetStore {
        match self {
            Intent::WorkingMemory => TargetStore::WorkingMemory,
            Intent::SemanticLtm => TargetStore::SemanticLtm,
            Intent::EpisodicLtm => TargetStore::EpisodicLtm,
            Intent::Retrieval => TargetStore::QueryResult,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination of a processed item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetStore {
    #[serde(rename = "workingMemory")]
    WorkingMemory,
    #[serde(rename = "semanticLTM")]
    SemanticLtm,
    #[serde(rename = "episodicLTM")]
    EpisodicLtm,
    #[serde(rename = "queryResult")]
    QueryResult,
}

impl TargetStore {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStore::WorkingMemory => "workingMemory",
            TargetStore::SemanticLtm => "semanticLTM",
            TargetStore::EpisodicLtm => "episodicLTM",
            TargetStore::QueryResult => "queryResult",
        }
    }
}

impl fmt::Display for TargetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of an item's payload. Informational only to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    Text,
    Structured,
}

impl DataType {
    /// Infer the data type from a payload
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => DataType::Text,
            _ => DataType::Structured,
        }
    }
}

/// Metadata carried alongside every item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub tenant_id: String,
    pub agent_id: String,
    /// Operation that created the item (remember, recall, process)
    pub source_operation: String,
    pub timestamp: DateTime<Utc>,
    /// Ordered `"<stage>:<component>"` labels of every processor the item survived
    #[serde(default)]
    pub processing_history: Vec<String>,
    /// Set on items produced by fan-out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    /// Fields added by stage processors (scores, summaries, flags)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemMetadata {
    pub fn new(tenant_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            agent_id: agent_id.into(),
            source_operation: "process".to_string(),
            timestamp: Utc::now(),
            processing_history: Vec::new(),
            parent_id: None,
            extra: Map::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Add a processor or caller field. Keys naming one of the core fields
    /// are ignored so they cannot shadow them when the item is serialized.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if Self::is_reserved(&key) {
            tracing::debug!(key = %key, "Ignoring metadata field that shadows a core field");
            return;
        }
        self.extra.insert(key, value.into());
    }

    /// Insert every field of `fields`, skipping reserved keys
    pub fn extend(&mut self, fields: impl IntoIterator<Item = (String, Value)>) {
        for (key, value) in fields {
            self.insert(key, value);
        }
    }

    /// True for keys that belong to the core metadata fields
    pub fn is_reserved(key: &str) -> bool {
        RESERVED_METADATA_KEYS.contains(&key)
    }
}

/// Core metadata field names that extra fields may not reuse
pub const RESERVED_METADATA_KEYS: [&str; 6] = [
    "tenant_id",
    "agent_id",
    "source_operation",
    "timestamp",
    "processing_history",
    "parent_id",
];

impl Default for ItemMetadata {
    fn default() -> Self {
        Self::new("default", "default")
    }
}

/// A single unit of memory content flowing through a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Unique identifier for this item
    pub id: Uuid,
    /// Payload (text or structured value)
    pub data: Value,
    pub data_type: DataType,
    /// Selects which pipeline the item traverses
    pub intent: Intent,
    pub metadata: ItemMetadata,
}

impl MemoryItem {
    /// Create a new item with default metadata
    pub fn new(data: impl Into<Value>, intent: Intent) -> Self {
        let data = data.into();
        Self {
            id: Uuid::new_v4(),
            data_type: DataType::of(&data),
            data,
            intent,
            metadata: ItemMetadata::default(),
        }
    }

    /// Set the tenant and agent the item belongs to
    pub fn with_context(mut self, tenant_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        self.metadata.tenant_id = tenant_id.into();
        self.metadata.agent_id = agent_id.into();
        self
    }

    pub fn with_source_operation(mut self, operation: impl Into<String>) -> Self {
        self.metadata.source_operation = operation.into();
        self
    }

    /// Text payload, if the item carries one
    pub fn text(&self) -> Option<&str> {
        self.data.as_str()
    }

    /// Replace the payload, keeping id and metadata
    pub fn set_data(&mut self, data: impl Into<Value>) {
        self.data = data.into();
        self.data_type = DataType::of(&self.data);
    }

    /// Create a child item for fan-out.
    ///
    /// The child gets a fresh id and a copy of this item's metadata,
    /// including the processing history accumulated so far.
    pub fn derive(&self, data: impl Into<Value>) -> Self {
        let data = data.into();
        let mut metadata = self.metadata.clone();
        metadata.parent_id = Some(self.id);
        Self {
            id: Uuid::new_v4(),
            data_type: DataType::of(&data),
            data,
            intent: self.intent,
            metadata,
        }
    }

    pub fn history(&self) -> &[String] {
        &self.metadata.processing_history
    }
}
