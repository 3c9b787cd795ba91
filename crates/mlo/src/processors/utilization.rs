//! Utilization stage processors: rag, long context, hallucination mitigation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::MemoryItem;
use crate::stage::{
    ComponentConfig, ProcessOutput, ProcessorError, ProcessorStats, Settings, Slot, StageProcessor,
    parse_config,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextAssemblerSettings {
    pub prefix: String,
}

impl Default for ContextAssemblerSettings {
    fn default() -> Self {
        Self {
            prefix: "Relevant memory: ".to_string(),
        }
    }
}

/// Writes `rag_context`: the text framed for injection into a prompt
pub struct ContextAssembler {
    settings: Settings<ContextAssemblerSettings>,
    stats: ProcessorStats,
}

impl ContextAssembler {
    pub const NAME: &'static str = "ContextAssembler";

    pub fn new(config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            settings: Settings::from_config(config)?,
            stats: ProcessorStats::new(),
        })
    }
}

#[async_trait]
impl StageProcessor for ContextAssembler {
    fn slot(&self) -> Slot {
        Slot::Rag
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        let settings = self.settings.current().await;
        let body = match &item.data {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        item.metadata
            .insert("rag_context", format!("{}{}", settings.prefix, body));
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
pub struct WindowChunkerSettings {
    /// Window size in characters
    pub window: usize,
    /// Characters shared between consecutive windows
    pub overlap: usize,
}

impl Default for WindowChunkerSettings {
    fn default() -> Self {
        Self {
            window: 2000,
            overlap: 0,
        }
    }
}

impl WindowChunkerSettings {
    fn validate(&self) -> Result<(), ProcessorError> {
        if self.window == 0 || self.overlap >= self.window {
            return Err(ProcessorError::InvalidConfig(format!(
                "window ({}) must be positive and larger than overlap ({})",
                self.window, self.overlap
            )));
        }
        Ok(())
    }
}

/// Fans text longer than `window` out into overlapping windows
pub struct WindowChunker {
    settings: Settings<WindowChunkerSettings>,
    stats: ProcessorStats,
}

impl WindowChunker {
    pub const NAME: &'static str = "WindowChunker";

    pub fn new(config: &ComponentConfig) -> Result<Self, ProcessorError> {
        let settings: WindowChunkerSettings = parse_config(config)?;
        settings.validate()?;
        Ok(Self {
            settings: Settings::new(settings),
            stats: ProcessorStats::new(),
        })
    }

    fn chunks(text: &str, window: usize, overlap: usize) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = window.saturating_sub(overlap).max(1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + window).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

#[async_trait]
impl StageProcessor for WindowChunker {
    fn slot(&self) -> Slot {
        Slot::LongContext
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        let settings = self.settings.current().await;
        let chunks = match item.text() {
            Some(text) if text.chars().count() > settings.window => {
                Self::chunks(text, settings.window, settings.overlap)
            }
            _ => return Ok(ProcessOutput::Single(item)),
        };

        let total = chunks.len();
        let children = chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| {
                let mut child = item.derive(chunk);
                child.metadata.insert("chunk_index", index);
                child.metadata.insert("chunk_count", total);
                child
            })
            .collect();
        Ok(ProcessOutput::FanOut(children))
    }

    async fn configure(&self, config: &ComponentConfig) -> Result<(), ProcessorError> {
        self.settings
            .merge_checked(config, WindowChunkerSettings::validate)
            .await
    }

    fn stats(&self) -> &ProcessorStats {
        &self.stats
    }
}

/// Drops items with empty payloads and marks survivors `grounded`
pub struct GroundingGuard {
    stats: ProcessorStats,
}

impl GroundingGuard {
    pub const NAME: &'static str = "GroundingGuard";

    pub fn new(_config: &ComponentConfig) -> Result<Self, ProcessorError> {
        Ok(Self {
            stats: ProcessorStats::new(),
        })
    }

    fn is_empty(data: &Value) -> bool {
        match data {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => o.is_empty(),
            _ => false,
        }
    }
}

#[async_trait]
impl StageProcessor for GroundingGuard {
    fn slot(&self) -> Slot {
        Slot::HallucinationMitigation
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, mut item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        if Self::is_empty(&item.data) {
            return Ok(ProcessOutput::Drop);
        }
        item.metadata.insert("grounded", true);
        Ok(ProcessOutput::Single(item))
    }

    async fn configure(&self, _config: &ComponentConfig) -> Result<(), ProcessorError> {
        Ok(())
    }

    fn stats(&self) -> &ProcessorStats {
        &self.stats
    }
}
