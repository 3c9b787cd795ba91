//! Memory item model
//!
//! Defines the unit of content that flows through the lifecycle
//! pipelines, along with the routing intents and target stores.

pub mod types;

pub use types::{DataType, Intent, ItemMetadata, MemoryItem, RESERVED_METADATA_KEYS, TargetStore};
