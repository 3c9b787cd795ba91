//! Derivation stage processors: reflection, summarization, distillation, forgetting

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::MemoryItem;
use crate::processors::encoding::ATTENTION_SCORE_KEY;
use crate::processors::text::split_sentences;
use crate::stage::{
    ComponentConfig, ProcessOutput, ProcessorError, ProcessorStats, Settings, Slot, StageProcessor,
};

/// Tags items as questions or statements and counts open questions
pub struct QuestionReflection {
    stats: ProcessorStats,
}

impl QuestionReflection {
    pub const NAME: &'static str = "QuestionReflection";

    pub fn new(_config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            stats: ProcessorStats::new(),
        })
    }
}

#[async_trait]
impl StageProcessor for QuestionReflection {
    fn slot(&self) -> Slot {
        Slot::Reflection
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        let open_questions = item
            .text()
            .map(|text| {
                split_sentences(text)
                    .iter()
                    .filter(|s| s.ends_with('?'))
                    .count()
            })
            .unwrap_or(0);
        let reflection = if open_questions > 0 { "question" } else { "statement" };
        item.metadata.insert("reflection", reflection);
        item.metadata.insert("open_questions", open_questions);
        Ok(ProcessOutput::Single(item))
    }

    async fn configure(&self, _config: &ComponentConfig) -> Result<(), ProcessorError> {
        Ok(())
    }

    fn stats(&self) -> &ProcessorStats {
        &self.stats
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractiveSummarizerSettings {
    pub max_sentences: usize,
}

impl Default for ExtractiveSummarizerSettings {
    fn default() -> Self {
        Self { max_sentences: 2 }
    }
}

/// Writes `summary`: the leading sentences of the text
pub struct ExtractiveSummarizer {
    settings: Settings<ExtractiveSummarizerSettings>,
    stats: ProcessorStats,
}

impl ExtractiveSummarizer {
    pub const NAME: &'static str = "ExtractiveSummarizer";

    pub fn new(config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            settings: Settings::from_config(config)?,
            stats: ProcessorStats::new(),
        })
    }
}

#[async_trait]
impl StageProcessor for ExtractiveSummarizer {
    fn slot(&self) -> Slot {
        Slot::Summarization
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        let settings = self.settings.current().await;
        if let Some(text) = item.text() {
            let summary = split_sentences(text)
                .into_iter()
                .take(settings.max_sentences)
                .collect::<Vec<_>>()
                .join(" ");
            item.metadata.insert("summary", summary);
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

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentenceDistillerSettings {
    /// Only split text with at least this many sentences
    pub min_sentences: usize,
}

impl Default for SentenceDistillerSettings {
    fn default() -> Self {
        Self { min_sentences: 2 }
    }
}

/// Fans multi-sentence text out into one item per sentence
pub struct SentenceDistiller {
    settings: Settings<SentenceDistillerSettings>,
    stats: ProcessorStats,
}

impl SentenceDistiller {
    pub const NAME: &'static str = "SentenceDistiller";

    pub fn new(config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            settings: Settings::from_config(config)?,
            stats: ProcessorStats::new(),
        })
    }
}

#[async_trait]
impl StageProcessor for SentenceDistiller {
    fn slot(&self) -> Slot {
        Slot::Distillation
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        let settings = self.settings.current().await;
        let sentences = match item.text() {
            Some(text) => split_sentences(text),
            None => return Ok(ProcessOutput::Single(item)),
        };
        if sentences.len() < settings.min_sentences.max(2) {
            return Ok(ProcessOutput::Single(item));
        }

        let children = sentences
            .into_iter()
            .enumerate()
            .map(|(index, sentence)| {
                let mut child = item.derive(sentence);
                child.metadata.insert("sentence_index", index);
                child
            })
            .collect();
        Ok(ProcessOutput::FanOut(children))
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
pub struct ThresholdForgettingSettings {
    pub threshold: f64,
    /// Metadata field holding the score to compare
    pub score_field: String,
}

impl Default for ThresholdForgettingSettings {
    fn default() -> Self {
        Self {
            threshold: 0.2,
            score_field: ATTENTION_SCORE_KEY.to_string(),
        }
    }
}

/// Drops items scored below `threshold`. Items without a score are kept.
pub struct ThresholdForgetting {
    settings: Settings<ThresholdForgettingSettings>,
    stats: ProcessorStats,
}

impl ThresholdForgetting {
    pub const NAME: &'static str = "ThresholdForgetting";

    pub fn new(config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            settings: Settings::from_config(config)?,
            stats: ProcessorStats::new(),
        })
    }
}

#[async_trait]
impl StageProcessor for ThresholdForgetting {
    fn slot(&self) -> Slot {
        Slot::Forgetting
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        let settings = self.settings.current().await;
        let score = match item.metadata.get(&settings.score_field) {
            None | Some(Value::Null) => return Ok(ProcessOutput::Single(item)),
            Some(value) => value.as_f64().ok_or_else(|| {
                ProcessorError::InvalidInput(format!(
                    "{} is not a number: {}",
                    settings.score_field, value
                ))
            })?,
        };
        Ok(if score < settings.threshold {
            ProcessOutput::Drop
        } else {
            ProcessOutput::Single(item)
        })
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
    async fn test_reflection_counts_questions() {
        let reflection = QuestionReflection::new(&ComponentConfig::new()).unwrap();
        let item = MemoryItem::new("Where is it? I lost it. Why?", Intent::EpisodicLtm);
        let item = reflection.process(item).await.unwrap().into_items().remove(0);
        assert_eq!(item.metadata.get("reflection"), Some(&json!("question")));
        assert_eq!(item.metadata.get("open_questions"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_summarizer_takes_leading_sentences() {
        let summarizer = ExtractiveSummarizer::new(&ComponentConfig::new()).unwrap();
        let item = MemoryItem::new("One. Two. Three.", Intent::EpisodicLtm);
        let item = summarizer.process(item).await.unwrap().into_items().remove(0);
        assert_eq!(item.metadata.get("summary"), Some(&json!("One. Two.")));
        assert_eq!(item.text(), Some("One. Two. Three."));
    }

    #[tokio::test]
    async fn test_distiller_fans_out_sentences() {
        let distiller = SentenceDistiller::new(&ComponentConfig::new()).unwrap();
        let parent = MemoryItem::new("Tea is hot. Ice is cold.", Intent::SemanticLtm);
        let parent_id = parent.id;

        let children = distiller.process(parent).await.unwrap().into_items();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].text(), Some("Tea is hot."));
        assert_eq!(children[1].text(), Some("Ice is cold."));
        assert!(children.iter().all(|c| c.metadata.parent_id == Some(parent_id)));
        assert_eq!(children[1].metadata.get("sentence_index"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_distiller_keeps_single_sentence() {
        let distiller = SentenceDistiller::new(&config(json!({"min_sentences": 3}))).unwrap();
        let item = MemoryItem::new("A. B.", Intent::SemanticLtm);
        let output = distiller.process(item.clone()).await.unwrap();
        assert_eq!(output, ProcessOutput::Single(item));
    }

    #[tokio::test]
    async fn test_forgetting_drops_low_scores() {
        let forgetting = ThresholdForgetting::new(&ComponentConfig::new()).unwrap();

        let mut low = MemoryItem::new("x", Intent::EpisodicLtm);
        low.metadata.insert(ATTENTION_SCORE_KEY, 0.1);
        assert!(forgetting.process(low).await.unwrap().is_empty());

        let mut high = MemoryItem::new("y", Intent::EpisodicLtm);
        high.metadata.insert(ATTENTION_SCORE_KEY, 0.6);
        assert_eq!(forgetting.process(high).await.unwrap().len(), 1);

        let unscored = MemoryItem::new("z", Intent::EpisodicLtm);
        assert_eq!(forgetting.process(unscored).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_forgetting_rejects_non_numeric_scores() {
        let forgetting = ThresholdForgetting::new(&ComponentConfig::new()).unwrap();
        let mut item = MemoryItem::new("x", Intent::EpisodicLtm);
        item.metadata.insert(ATTENTION_SCORE_KEY, "high");
        let err = forgetting.process(item).await.unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidInput(_)));
    }
}
