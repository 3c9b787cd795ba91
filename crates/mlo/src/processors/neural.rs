//! Neural memory stage processors: associative, parameter integration

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::MemoryItem;
use crate::stage::{
    ComponentConfig, ProcessOutput, ProcessorError, ProcessorStats, Settings, Slot, StageProcessor,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityAssociatorSettings {
    pub max_associations: usize,
}

impl Default for EntityAssociatorSettings {
    fn default() -> Self {
        Self {
            max_associations: 10,
        }
    }
}

/// Writes `associations`: capitalized tokens that look like named entities
pub struct EntityAssociator {
    settings: Settings<EntityAssociatorSettings>,
    stats: ProcessorStats,
}

impl EntityAssociator {
    pub const NAME: &'static str = "EntityAssociator";

    pub fn new(config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            settings: Settings::from_config(config)?,
            stats: ProcessorStats::new(),
        })
    }

    fn entities(text: &str, limit: usize) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for token in text.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            let starts_upper = token.chars().next().is_some_and(char::is_uppercase);
            if starts_upper && token.chars().count() > 1 && !found.iter().any(|f| f == token) {
                found.push(token.to_string());
                if found.len() >= limit {
                    break;
                }
            }
        }
        found
    }
}

#[async_trait]
impl StageProcessor for EntityAssociator {
    fn slot(&self) -> Slot {
        Slot::Associative
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        let settings = self.settings.current().await;
        if let Some(text) = item.text() {
            let associations = Self::entities(text, settings.max_associations);
            item.metadata.insert("associations", associations);
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

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterTaggerSettings {
    /// Parameters attached to every item
    pub parameters: ComponentConfig,
}

/// Attaches a configured `parameters` table to items
pub struct ParameterTagger {
    settings: Settings<ParameterTaggerSettings>,
    stats: ProcessorStats,
}

impl ParameterTagger {
    pub const NAME: &'static str = "ParameterTagger";

    pub fn new(config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            settings: Settings::from_config(config)?,
            stats: ProcessorStats::new(),
        })
    }
}

#[async_trait]
impl StageProcessor for ParameterTagger {
    fn slot(&self) -> Slot {
        Slot::ParameterIntegration
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        let settings = self.settings.current().await;
        item.metadata
            .insert("parameters", Value::Object(settings.parameters));
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

    #[tokio::test]
    async fn test_associator_collects_capitalized_tokens() {
        let associator = EntityAssociator::new(&ComponentConfig::new()).unwrap();
        let item = MemoryItem::new(
            "John Smith moved to Seattle, then John visited Paris.",
            Intent::SemanticLtm,
        );
        let item = associator.process(item).await.unwrap().into_items().remove(0);
        assert_eq!(
            item.metadata.get("associations"),
            Some(&json!(["John", "Smith", "Seattle", "Paris"]))
        );
    }

    #[tokio::test]
    async fn test_parameter_tagger_attaches_parameters() {
        let config = json!({"parameters": {"model": "small", "rank": 4}})
            .as_object()
            .cloned()
            .unwrap();
        let tagger = ParameterTagger::new(&config).unwrap();
        let item = MemoryItem::new("x", Intent::SemanticLtm);
        let item = tagger.process(item).await.unwrap().into_items().remove(0);
        assert_eq!(
            item.metadata.get("parameters"),
            Some(&json!({"model": "small", "rank": 4}))
        );
    }
}
