//! Encoding stage processors: attention, fusion

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::memory::MemoryItem;
use crate::processors::text::words;
use crate::stage::{
    ComponentConfig, ProcessOutput, ProcessorError, ProcessorStats, Settings, Slot, StageProcessor,
};

/// Metadata key written by attention processors
pub const ATTENTION_SCORE_KEY: &str = "attention_score";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordAttentionSettings {
    pub keywords: Vec<String>,
    pub base_score: f64,
    pub keyword_weight: f64,
    /// Text longer than this many characters gets `length_bonus`
    pub long_text_chars: usize,
    pub length_bonus: f64,
}

impl Default for KeywordAttentionSettings {
    fn default() -> Self {
        Self {
            keywords: ["important", "remember", "always", "never", "prefer", "must"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            base_score: 0.3,
            keyword_weight: 0.2,
            long_text_chars: 100,
            length_bonus: 0.1,
        }
    }
}

/// Scores salience from keyword hits and length, writing `attention_score` in [0, 1]
pub struct KeywordAttention {
    settings: Settings<KeywordAttentionSettings>,
    stats: ProcessorStats,
}

impl KeywordAttention {
    pub const NAME: &'static str = "KeywordAttention";

    pub fn new(config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            settings: Settings::from_config(config)?,
            stats: ProcessorStats::new(),
        })
    }

    fn score(text: &str, settings: &KeywordAttentionSettings) -> f64 {
        let tokens = words(text);
        let hits = settings
            .keywords
            .iter()
            .filter(|k| tokens.iter().any(|t| t.eq_ignore_ascii_case(k)))
            .count();
        let mut score = settings.base_score + hits as f64 * settings.keyword_weight;
        if text.chars().count() > settings.long_text_chars {
            score += settings.length_bonus;
        }
        score.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl StageProcessor for KeywordAttention {
    fn slot(&self) -> Slot {
        Slot::Attention
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        let settings = self.settings.current().await;
        let score = match item.text() {
            Some(text) => Self::score(text, &settings),
            None => settings.base_score.clamp(0.0, 1.0),
        };
        item.metadata.insert(ATTENTION_SCORE_KEY, score);
        Ok(ProcessOutput::Single(item))
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
pub struct MetadataFusionSettings {
    /// Fields merged into every item's metadata
    pub fields: ComponentConfig,
    /// Replace fields the item already carries
    pub overwrite: bool,
}

/// Merges a configured set of fields into item metadata
pub struct MetadataFusion {
    settings: Settings<MetadataFusionSettings>,
    stats: ProcessorStats,
}

impl MetadataFusion {
    pub const NAME: &'static str = "MetadataFusion";

    pub fn new(config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            settings: Settings::from_config(config)?,
            stats: ProcessorStats::new(),
        })
    }
}

#[async_trait]
impl StageProcessor for MetadataFusion {
    fn slot(&self) -> Slot {
        Slot::Fusion
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        let settings = self.settings.current().await;
        for (key, value) in settings.fields {
            if settings.overwrite || item.metadata.get(&key).is_none() {
                item.metadata.insert(key, value);
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
    use serde_json::{Value, json};

    fn config(value: Value) -> ComponentConfig {
        value.as_object().cloned().unwrap()
    }

    fn score_of(item: &MemoryItem) -> f64 {
        item.metadata
            .get(ATTENTION_SCORE_KEY)
            .and_then(Value::as_f64)
            .unwrap()
    }

    #[tokio::test]
    async fn test_keyword_attention_scores_keywords() {
        let attention = KeywordAttention::new(&ComponentConfig::new()).unwrap();

        let plain = MemoryItem::new("the sky is blue", Intent::SemanticLtm);
        let plain = attention.process(plain).await.unwrap().into_items().remove(0);
        assert!((score_of(&plain) - 0.3).abs() < 1e-9);

        let salient = MemoryItem::new("Always remember: I prefer tea", Intent::SemanticLtm);
        let salient = attention.process(salient).await.unwrap().into_items().remove(0);
        assert!((score_of(&salient) - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_keyword_attention_clamps_to_one() {
        let attention = KeywordAttention::new(&config(json!({"keyword_weight": 0.5}))).unwrap();
        let item = MemoryItem::new("important: always remember", Intent::SemanticLtm);
        let item = attention.process(item).await.unwrap().into_items().remove(0);
        assert_eq!(score_of(&item), 1.0);
    }

    #[tokio::test]
    async fn test_metadata_fusion_respects_overwrite() {
        let fusion = MetadataFusion::new(&config(json!({
            "fields": {"source": "chat", "channel": "web"}
        })))
        .unwrap();

        let mut item = MemoryItem::new("x", Intent::EpisodicLtm);
        item.metadata.insert("source", "email");
        let item = fusion.process(item).await.unwrap().into_items().remove(0);
        assert_eq!(item.metadata.get("source"), Some(&json!("email")));
        assert_eq!(item.metadata.get("channel"), Some(&json!("web")));

        fusion
            .configure(&config(json!({"overwrite": true})))
            .await
            .unwrap();
        let item = fusion.process(item).await.unwrap().into_items().remove(0);
        assert_eq!(item.metadata.get("source"), Some(&json!("chat")));
    }
}
