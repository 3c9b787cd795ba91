//! Stage processor trait and shared processor plumbing
//!
//! Every pluggable unit of work implements `StageProcessor`. A processor
//! takes one item and produces zero, one, or many items. The engine
//! records per-processor statistics through `ProcessorStats`, so leaf
//! implementations only have to provide their transformation logic.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::MloError;
use crate::memory::MemoryItem;
use crate::stage::{Slot, Stage};

/// Free-form configuration payload for a single component
pub type ComponentConfig = Map<String, Value>;

/// Outcome of processing one item
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutput {
    /// Item intentionally filtered out
    Drop,
    /// Pass-through or transform
    Single(MemoryItem),
    /// One input produced many outputs
    FanOut(Vec<MemoryItem>),
}

impl ProcessOutput {
    /// Number of items this output contributes to the next stage
    pub fn len(&self) -> usize {
        match self {
            ProcessOutput::Drop => 0,
            ProcessOutput::Single(_) => 1,
            ProcessOutput::FanOut(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_items(self) -> Vec<MemoryItem> {
        match self {
            ProcessOutput::Drop => Vec::new(),
            ProcessOutput::Single(item) => vec![item],
            ProcessOutput::FanOut(items) => items,
        }
    }
}

impl From<MemoryItem> for ProcessOutput {
    fn from(item: MemoryItem) -> Self {
        ProcessOutput::Single(item)
    }
}

impl From<Option<MemoryItem>> for ProcessOutput {
    fn from(item: Option<MemoryItem>) -> Self {
        item.map_or(ProcessOutput::Drop, ProcessOutput::Single)
    }
}

impl From<Vec<MemoryItem>> for ProcessOutput {
    fn from(items: Vec<MemoryItem>) -> Self {
        ProcessOutput::FanOut(items)
    }
}

/// Errors raised by stage processors
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Processing failed: {0}")]
    Failed(String),
}

impl From<ProcessorError> for MloError {
    fn from(e: ProcessorError) -> Self {
        match e {
            ProcessorError::InvalidConfig(msg) => MloError::Config(msg),
            other => MloError::Processor(other.to_string()),
        }
    }
}

/// Contract every pipeline component implements
#[async_trait]
pub trait StageProcessor: Send + Sync {
    /// Slot this instance fills
    fn slot(&self) -> Slot;

    /// Registered implementation name (e.g. `LengthFilter`)
    fn implementation(&self) -> &str;

    fn stage(&self) -> Stage {
        self.slot().stage()
    }

    fn stage_name(&self) -> &'static str {
        self.stage().as_str()
    }

    /// Component name is the slot name
    fn component_name(&self) -> &'static str {
        self.slot().as_str()
    }

    fn stage_number(&self) -> u8 {
        self.stage().number()
    }

    /// `"<stage>:<component>"` label appended to surviving items' history
    fn label(&self) -> String {
        self.slot().label()
    }

    /// Process a single item
    async fn process(&self, item: MemoryItem) -> Result<ProcessOutput, ProcessorError>;

    /// Merge named fields into the processor's settings. Unknown fields are ignored.
    async fn configure(&self, config: &ComponentConfig) -> Result<(), ProcessorError>;

    fn stats(&self) -> &ProcessorStats;

    fn metrics(&self) -> ProcessorMetrics {
        self.stats().snapshot()
    }
}

/// Lock-free counters owned by each processor instance
#[derive(Debug, Default)]
pub struct ProcessorStats {
    processed: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
    emitted: AtomicU64,
    time_micros: AtomicU64,
    last_processed_ms: AtomicI64,
}

impl ProcessorStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call that produced `outputs` items
    pub fn record(&self, outputs: usize, elapsed: Duration) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if outputs == 0 {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.emitted.fetch_add(outputs as u64, Ordering::Relaxed);
        self.finish(elapsed);
    }

    /// Record one call that raised an error. Counted as a drop.
    pub fn record_failure(&self, elapsed: Duration) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.finish(elapsed);
    }

    fn finish(&self, elapsed: Duration) {
        self.time_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.last_processed_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProcessorMetrics {
        let last_ms = self.last_processed_ms.load(Ordering::Relaxed);
        ProcessorMetrics {
            items_processed: self.processed.load(Ordering::Relaxed),
            items_dropped: self.dropped.load(Ordering::Relaxed),
            items_failed: self.failed.load(Ordering::Relaxed),
            items_emitted: self.emitted.load(Ordering::Relaxed),
            processing_time_ms: self.time_micros.load(Ordering::Relaxed) as f64 / 1000.0,
            last_processed_at: if last_ms == 0 {
                None
            } else {
                Utc.timestamp_millis_opt(last_ms).single()
            },
        }
    }
}

/// Point-in-time view of a processor's counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorMetrics {
    pub items_processed: u64,
    pub items_dropped: u64,
    /// Calls that raised an error (subset of `items_dropped`)
    pub items_failed: u64,
    pub items_emitted: u64,
    pub processing_time_ms: f64,
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// Typed settings behind an async lock, updated by `configure`
#[derive(Debug)]
pub struct Settings<T> {
    inner: RwLock<T>,
}

impl<T> Settings<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    /// Build settings from a component config payload.
    ///
    /// `T` must carry `#[serde(default)]` so missing fields fall back to
    /// defaults; fields `T` does not know are ignored.
    pub fn from_config(config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self::new(parse_config(config)?))
    }

    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(value),
        }
    }

    pub async fn current(&self) -> T {
        self.inner.read().await.clone()
    }

    /// Overlay the fields of `partial` that `T` knows about
    pub async fn merge(&self, partial: &ComponentConfig) -> Result<(), ProcessorError> {
        let mut guard = self.inner.write().await;
        let merged = merge_known_fields(&*guard, partial)?;
        *guard = merged;
        Ok(())
    }

    /// Like `merge`, but leaves the settings untouched when `check` rejects the result
    pub async fn merge_checked<F>(&self, partial: &ComponentConfig, check: F) -> Result<(), ProcessorError>
    where
        F: FnOnce(&T) -> Result<(), ProcessorError>,
    {
        let mut guard = self.inner.write().await;
        let merged = merge_known_fields(&*guard, partial)?;
        check(&merged)?;
        *guard = merged;
        Ok(())
    }
}

/// Deserialize a component config payload into typed settings
pub fn parse_config<T: DeserializeOwned>(config: &ComponentConfig) -> Result<T, ProcessorError> {
    serde_json::from_value(Value::Object(config.clone()))
        .map_err(|e| ProcessorError::InvalidConfig(e.to_string()))
}

fn merge_known_fields<T>(current: &T, partial: &ComponentConfig) -> Result<T, ProcessorError>
where
    T: Serialize + DeserializeOwned,
{
    let mut base = match serde_json::to_value(current) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => return Err(ProcessorError::InvalidConfig(e.to_string())),
    };
    for (key, value) in partial {
        if base.contains_key(key) {
            base.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(Value::Object(base))
        .map_err(|e| ProcessorError::InvalidConfig(e.to_string()))
}
