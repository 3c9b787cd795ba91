//! Retrieval stage processors: indexing, matching

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::memory::MemoryItem;
use crate::processors::text::{content_terms, is_stopword, words};
use crate::stage::{
    ComponentConfig, ProcessOutput, ProcessorError, ProcessorStats, Settings, Slot, StageProcessor,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordIndexerSettings {
    pub max_keywords: usize,
    pub min_word_length: usize,
}

impl Default for KeywordIndexerSettings {
    fn default() -> Self {
        Self {
            max_keywords: 5,
            min_word_length: 3,
        }
    }
}

/// Writes `keywords`: the most frequent content words, ties broken by first appearance
pub struct KeywordIndexer {
    settings: Settings<KeywordIndexerSettings>,
    stats: ProcessorStats,
}

impl KeywordIndexer {
    pub const NAME: &'static str = "KeywordIndexer";

    pub fn new(config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            settings: Settings::from_config(config)?,
            stats: ProcessorStats::new(),
        })
    }

    fn keywords(text: &str, settings: &KeywordIndexerSettings) -> Vec<String> {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        for (position, word) in words(text).into_iter().enumerate() {
            if word.chars().count() < settings.min_word_length || is_stopword(&word) {
                continue;
            }
            counts.entry(word).or_insert((0, position)).0 += 1;
        }

        let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));
        ranked
            .into_iter()
            .take(settings.max_keywords)
            .map(|(word, _)| word)
            .collect()
    }
}

#[async_trait]
impl StageProcessor for KeywordIndexer {
    fn slot(&self) -> Slot {
        Slot::Indexing
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        let settings = self.settings.current().await;
        if let Some(text) = item.text() {
            let keywords = Self::keywords(text, &settings);
            item.metadata.insert("keywords", keywords);
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
pub struct TermMatcherSettings {
    pub min_term_length: usize,
}

impl Default for TermMatcherSettings {
    fn default() -> Self {
        Self { min_term_length: 3 }
    }
}

/// Writes `query_terms`: unique content terms a store can match against
pub struct TermMatcher {
    settings: Settings<TermMatcherSettings>,
    stats: ProcessorStats,
}

impl TermMatcher {
    pub const NAME: &'static str = "TermMatcher";

    pub fn new(config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            settings: Settings::from_config(config)?,
            stats: ProcessorStats::new(),
        })
    }
}

#[async_trait]
impl StageProcessor for TermMatcher {
    fn slot(&self) -> Slot {
        Slot::Matching
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        let settings = self.settings.current().await;
        if let Some(text) = item.text() {
            let terms = content_terms(text, settings.min_term_length);
            item.metadata.insert("query_terms", terms);
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
