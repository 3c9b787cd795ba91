//! Pass-through processor, legal in every slot

use async_trait::async_trait;

use crate::memory::MemoryItem;
use crate::stage::{ComponentConfig, ProcessOutput, ProcessorError, ProcessorStats, Slot, StageProcessor};

/// Returns every item unchanged. Takes the identity of the slot it fills.
#[derive(Debug)]
pub struct PassThrough {
    slot: Slot,
    stats: ProcessorStats,
}

impl PassThrough {
    pub const NAME: &'static str = "PassThrough";

    pub fn new(slot: Slot) -> Self {
        Self {
            slot,
            stats: ProcessorStats::new(),
        }
    }
}

#[async_trait]
impl StageProcessor for PassThrough {
    fn slot(&self) -> Slot {
        self.slot
    }

    fn implementation(&self) -> &str {
        Self::NAME
    }

    async fn process(&self, item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        Ok(ProcessOutput::Single(item))
    }

    async fn configure(&self, _config: &ComponentConfig) -> Result<(), ProcessorError> {
        Ok(())
    }

    fn stats(&self) -> &ProcessorStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Intent;

    #[tokio::test]
    async fn test_pass_through_returns_item_unchanged() {
        let processor = PassThrough::new(Slot::Rag);
        let item = MemoryItem::new("hello", Intent::SemanticLtm);
        let output = processor.process(item.clone()).await.unwrap();
        assert_eq!(output, ProcessOutput::Single(item));
        assert_eq!(processor.label(), "utilization:rag");
        assert_eq!(processor.stage_number(), 6);
        assert_eq!(processor.component_name(), "rag");
    }
}
