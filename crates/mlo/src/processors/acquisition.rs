//! Acquisition stage processors: filter, compressor, consolidator

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashSet, VecDeque};
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::memory::MemoryItem;
use crate::processors::text::{collapse_whitespace, truncate_chars};
use crate::stage::{
    ComponentConfig, ProcessOutput, ProcessorError, ProcessorStats, Settings, Slot, StageProcessor,
};

/// Minimum content length for the length filter (in characters)
const DEFAULT_MIN_LENGTH: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthFilterSettings {
    pub min_length: usize,
}

impl Default for LengthFilterSettings {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
        }
    }
}

/// Drops blank text and text shorter than `min_length`.
///
/// Structured payloads are kept unless they are null.
pub struct LengthFilter {
    settings: Settings<LengthFilterSettings>,
    stats: ProcessorStats,
}

impl LengthFilter {
    pub const NAME: &'static str = "LengthFilter";

    pub fn new(config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            settings: Settings::from_config(config)?,
            stats: ProcessorStats::new(),
        })
    }
}

#[async_trait]
impl StageProcessor for LengthFilter {
    fn slot(&self) -> Slot {
        Slot::Filter
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        let settings = self.settings.current().await;
        let keep = match &item.data {
            Value::String(text) => {
                let text = text.trim();
                !text.is_empty() && text.chars().count() >= settings.min_length
            }
            Value::Null => false,
            _ => true,
        };
        Ok(if keep {
            ProcessOutput::Single(item)
        } else {
            ProcessOutput::Drop
        })
    }

    async fn configure(&self, config: &ComponentConfig) -> Result<(), ProcessorError> {
        self.settings.merge(config).await
    }

    fn stats(&self) -> &ProcessorStats {
        &self.stats
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitespaceCompressorSettings {
    /// Truncate to this many characters after collapsing (unset = no limit)
    pub max_chars: Option<usize>,
}

/// Collapses whitespace runs and optionally truncates text payloads
pub struct WhitespaceCompressor {
    settings: Settings<WhitespaceCompressorSettings>,
    stats: ProcessorStats,
}

impl WhitespaceCompressor {
    pub const NAME: &'static str = "WhitespaceCompressor";

    pub fn new(config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            settings: Settings::from_config(config)?,
            stats: ProcessorStats::new(),
        })
    }
}

#[async_trait]
impl StageProcessor for WhitespaceCompressor {
    fn slot(&self) -> Slot {
        Slot::Compressor
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        let Some(text) = item.text() else {
            return Ok(ProcessOutput::Single(item));
        };

        let settings = self.settings.current().await;
        let original_length = text.chars().count();
        let mut compressed = collapse_whitespace(text);
        if let Some(max_chars) = settings.max_chars {
            compressed = truncate_chars(&compressed, max_chars);
        }

        if compressed.chars().count() != original_length {
            item.metadata.insert("original_length", original_length);
        }
        item.set_data(compressed);
        Ok(ProcessOutput::Single(item))
    }

    async fn configure(&self, config: &ComponentConfig) -> Result<(), ProcessorError> {
        self.settings.merge(config).await
    }

    fn stats(&self) -> &ProcessorStats {
        &self.stats
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConsolidatorSettings {
    /// Number of recent fingerprints remembered
    pub capacity: usize,
    /// Namespace used when an item carries no tenant
    pub tenant_id: String,
}

impl Default for DedupConsolidatorSettings {
    fn default() -> Self {
        Self {
            capacity: 1024,
            tenant_id: "default".to_string(),
        }
    }
}

#[derive(Default)]
struct SeenFingerprints {
    set: HashSet<u64>,
    order: VecDeque<u64>,
}

/// Drops items whose normalized content was already seen for the same tenant
pub struct DedupConsolidator {
    settings: Settings<DedupConsolidatorSettings>,
    seen: Mutex<SeenFingerprints>,
    stats: ProcessorStats,
}

impl DedupConsolidator {
    pub const NAME: &'static str = "DedupConsolidator";

    pub fn new(config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            settings: Settings::from_config(config)?,
            seen: Mutex::new(SeenFingerprints::default()),
            stats: ProcessorStats::new(),
        })
    }

    fn fingerprint(tenant: &str, data: &Value) -> u64 {
        let normalized = match data {
            Value::String(text) => collapse_whitespace(text).to_lowercase(),
            other => other.to_string(),
        };
        let mut hasher = DefaultHasher::new();
        tenant.hash(&mut hasher);
        normalized.hash(&mut hasher);
        hasher.finish()
    }
}

#[async_trait]
impl StageProcessor for DedupConsolidator {
    fn slot(&self) -> Slot {
        Slot::Consolidator
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        let settings = self.settings.current().await;
        let tenant = if item.metadata.tenant_id.is_empty() {
            settings.tenant_id.as_str()
        } else {
            item.metadata.tenant_id.as_str()
        };
        let fingerprint = Self::fingerprint(tenant, &item.data);

        let mut seen = self.seen.lock().await;
        if seen.set.contains(&fingerprint) {
            return Ok(ProcessOutput::Drop);
        }

        seen.set.insert(fingerprint);
        seen.order.push_back(fingerprint);
        while seen.order.len() > settings.capacity.max(1) {
            if let Some(oldest) = seen.order.pop_front() {
                seen.set.remove(&oldest);
            }
        }
        Ok(ProcessOutput::Single(item))
    }

    async fn configure(&self, config: &ComponentConfig) -> Result<(), ProcessorError> {
        self.settings.merge(config).await
    }

    fn stats(&self) -> &ProcessorStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Intent;
    use serde_json::json;

    fn config(value: Value) -> ComponentConfig {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_length_filter_drops_short_and_blank_text() {
        let filter = LengthFilter::new(&ComponentConfig::new()).unwrap();

        let short = MemoryItem::new("short", Intent::EpisodicLtm);
        assert!(filter.process(short).await.unwrap().is_empty());

        let blank = MemoryItem::new("   \n\t   ", Intent::EpisodicLtm);
        assert!(filter.process(blank).await.unwrap().is_empty());

        let exact = MemoryItem::new("1234567890", Intent::EpisodicLtm);
        assert_eq!(filter.process(exact).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_length_filter_keeps_structured_payloads() {
        let filter = LengthFilter::new(&ComponentConfig::new()).unwrap();
        let item = MemoryItem::new(json!({"k": 1}), Intent::SemanticLtm);
        assert_eq!(filter.process(item).await.unwrap().len(), 1);

        let null = MemoryItem::new(Value::Null, Intent::SemanticLtm);
        assert!(filter.process(null).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_length_filter_configure_changes_threshold() {
        let filter = LengthFilter::new(&config(json!({"min_length": 3}))).unwrap();
        let item = MemoryItem::new("abcd", Intent::EpisodicLtm);
        assert_eq!(filter.process(item.clone()).await.unwrap().len(), 1);

        filter
            .configure(&config(json!({"min_length": 5, "unrelated": "x"})))
            .await
            .unwrap();
        assert!(filter.process(item).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_compressor_collapses_and_truncates() {
        let compressor = WhitespaceCompressor::new(&config(json!({"max_chars": 5}))).unwrap();
        let item = MemoryItem::new("  hello   big \n world ", Intent::EpisodicLtm);
        let out = compressor.process(item).await.unwrap().into_items();
        assert_eq!(out[0].text(), Some("hello"));
        assert_eq!(out[0].metadata.get("original_length"), Some(&json!(22)));
    }

    #[tokio::test]
    async fn test_dedup_consolidator_drops_repeats_per_tenant() {
        let consolidator = DedupConsolidator::new(&ComponentConfig::new()).unwrap();

        let first = MemoryItem::new("User likes tea", Intent::SemanticLtm).with_context("t1", "a");
        let repeat =
            MemoryItem::new("user   likes TEA", Intent::SemanticLtm).with_context("t1", "a");
        let other_tenant =
            MemoryItem::new("User likes tea", Intent::SemanticLtm).with_context("t2", "a");

        assert_eq!(consolidator.process(first).await.unwrap().len(), 1);
        assert!(consolidator.process(repeat).await.unwrap().is_empty());
        assert_eq!(consolidator.process(other_tenant).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dedup_consolidator_forgets_oldest_beyond_capacity() {
        let consolidator = DedupConsolidator::new(&config(json!({"capacity": 1}))).unwrap();
        let a = MemoryItem::new("alpha", Intent::SemanticLtm);
        let b = MemoryItem::new("beta", Intent::SemanticLtm);

        assert_eq!(consolidator.process(a.clone()).await.unwrap().len(), 1);
        assert_eq!(consolidator.process(b).await.unwrap().len(), 1);
        assert_eq!(consolidator.process(a).await.unwrap().len(), 1);
    }
}
