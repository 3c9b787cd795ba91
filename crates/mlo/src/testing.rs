//! Test utilities for mlo - scripted processors and config builders
//!
//! `ScriptedProcessor` decides per item whether to pass, drop, fan out or
//! fail, so pipeline behavior can be exercised without real processors.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::{Config, MemoryTypeConfig, MemoryTypes};
use crate::memory::{Intent, MemoryItem};
use crate::registry::ComponentRegistry;
use crate::stage::{
    ComponentConfig, ProcessOutput, ProcessorError, ProcessorStats, Slot, StageProcessor,
};

/// What a scripted processor does with one item
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Pass,
    Drop,
    /// Emit this many children derived from the item
    FanOut(usize),
    /// Raise `ProcessorError::Failed` with this message
    Fail(String),
}

pub type Script = Arc<dyn Fn(&MemoryItem) -> Action + Send + Sync>;

/// Processor whose behavior is decided by a closure
pub struct ScriptedProcessor {
    slot: Slot,
    name: String,
    script: Script,
    config: ComponentConfig,
    reconfigured: Mutex<Vec<ComponentConfig>>,
    calls: AtomicUsize,
    stats: ProcessorStats,
}

impl ScriptedProcessor {
    pub fn new(
        slot: Slot,
        name: impl Into<String>,
        script: impl Fn(&MemoryItem) -> Action + Send + Sync + 'static,
    ) -> Self {
        Self::from_script(slot, name, Arc::new(script), ComponentConfig::new())
    }

    fn from_script(
        slot: Slot,
        name: impl Into<String>,
        script: Script,
        config: ComponentConfig,
    ) -> Self {
        Self {
            slot,
            name: name.into(),
            script,
            config,
            reconfigured: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            stats: ProcessorStats::new(),
        }
    }

    pub fn passing(slot: Slot) -> Self {
        Self::new(slot, "Passing", |_| Action::Pass)
    }

    pub fn dropping(slot: Slot) -> Self {
        Self::new(slot, "Dropping", |_| Action::Drop)
    }

    pub fn failing(slot: Slot) -> Self {
        Self::new(slot, "Failing", |_| Action::Fail("scripted failure".to_string()))
    }

    pub fn fan_out(slot: Slot, count: usize) -> Self {
        Self::new(slot, "FanOut", move |_| Action::FanOut(count))
    }

    /// Config the processor was constructed with
    pub fn config(&self) -> &ComponentConfig {
        &self.config
    }

    /// Payloads passed to `configure`, oldest first
    pub async fn reconfigurations(&self) -> Vec<ComponentConfig> {
        self.reconfigured.lock().await.clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StageProcessor for ScriptedProcessor {
    fn slot(&self) -> Slot {
        self.slot
    }

    fn implementation(&self) -> &str {
        &self.name
    }

    async fn process(&self, item: MemoryItem) -> Result<ProcessOutput, ProcessorError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match (self.script)(&item) {
            Action::Pass => Ok(ProcessOutput::Single(item)),
            Action::Drop => Ok(ProcessOutput::Drop),
            Action::FanOut(count) => {
                let base = item.text().unwrap_or_default().to_string();
                let children = (0..count)
                    .map(|index| {
                        let mut child = item.derive(format!("{base}#{index}"));
                        child.metadata.insert("fan_index", index);
                        child
                    })
                    .collect();
                Ok(ProcessOutput::FanOut(children))
            }
            Action::Fail(message) => Err(ProcessorError::Failed(message)),
        }
    }

    async fn configure(&self, config: &ComponentConfig) -> Result<(), ProcessorError> {
        self.reconfigured.lock().await.push(config.clone());
        Ok(())
    }

    fn stats(&self) -> &ProcessorStats {
        &self.stats
    }
}

/// Register a scripted implementation legal in every slot
pub fn register_scripted(
    registry: &mut ComponentRegistry,
    name: &str,
    script: impl Fn(&MemoryItem) -> Action + Send + Sync + 'static,
) {
    let script: Script = Arc::new(script);
    let registered = name.to_string();
    registry.register(name, Slot::ALL, move |slot, config| {
        Ok(Arc::new(ScriptedProcessor::from_script(
            slot,
            registered.clone(),
            script.clone(),
            config.clone(),
        )))
    });
}

/// Built-in registry plus `Pass`, `Drop` and `Fail` scripted implementations
pub fn scripted_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::with_builtins();
    register_scripted(&mut registry, "Pass", |_| Action::Pass);
    register_scripted(&mut registry, "Drop", |_| Action::Drop);
    register_scripted(&mut registry, "Fail", |_| {
        Action::Fail("scripted failure".to_string())
    });
    registry
}

/// Config with one memory type whose slots are filled as given
pub fn config_with(intent: Intent, slots: &[(Slot, &str)]) -> Config {
    let definition = slots
        .iter()
        .fold(MemoryTypeConfig::new(), |definition, (slot, name)| {
            definition.with_slot(*slot, *name)
        });
    Config {
        memory_types: MemoryTypes::default().with(intent, definition),
        ..Default::default()
    }
}

/// Config with one memory type whose slots are all `PassThrough`
pub fn passthrough_config(intent: Intent, slots: &[Slot]) -> Config {
    let pairs: Vec<(Slot, &str)> = slots.iter().map(|slot| (*slot, "PassThrough")).collect();
    config_with(intent, &pairs)
}
