//! Component registry
//!
//! Maps implementation names to constructors. Every registration carries
//! the list of slots it may fill; generic creation only checks that the
//! name exists, while slot-scoped creation also enforces the allow-list.
//! The registry is an explicit value passed to the orchestrator, so
//! tenants and tests can each hold their own.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{MloError, Result};
use crate::memory::Intent;
use crate::processors::{
    ContextAssembler, DedupConsolidator, EntityAssociator, ExtractiveSummarizer, GroundingGuard,
    KeywordAttention, KeywordIndexer, LengthFilter, MetadataFusion, ParameterTagger, PassThrough,
    QuestionReflection, SentenceDistiller, TermMatcher, ThresholdForgetting, WhitespaceCompressor,
    WindowChunker,
};
use crate::stage::{ComponentConfig, ProcessorError, Slot, StageProcessor};

/// Constructs a processor for a slot from its merged component config
pub type Constructor = Arc<
    dyn Fn(Slot, &ComponentConfig) -> std::result::Result<Arc<dyn StageProcessor>, ProcessorError>
        + Send
        + Sync,
>;

struct Registration {
    slots: Vec<Slot>,
    constructor: Constructor,
}

/// Name-to-constructor table for all pipeline components
#[derive(Default)]
pub struct ComponentRegistry {
    entries: BTreeMap<String, Registration>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl ComponentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with `PassThrough` in every slot and the
    /// built-in rule-based processor for each slot
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(PassThrough::NAME, Slot::ALL, |slot, _| {
            Ok(Arc::new(PassThrough::new(slot)))
        });

        registry.register_builtin(Slot::Filter, LengthFilter::NAME, |c| {
            Ok(Arc::new(LengthFilter::new(c)?))
        });
        registry.register_builtin(Slot::Compressor, WhitespaceCompressor::NAME, |c| {
            Ok(Arc::new(WhitespaceCompressor::new(c)?))
        });
        registry.register_builtin(Slot::Consolidator, DedupConsolidator::NAME, |c| {
            Ok(Arc::new(DedupConsolidator::new(c)?))
        });
        registry.register_builtin(Slot::Attention, KeywordAttention::NAME, |c| {
            Ok(Arc::new(KeywordAttention::new(c)?))
        });
        registry.register_builtin(Slot::Fusion, MetadataFusion::NAME, |c| {
            Ok(Arc::new(MetadataFusion::new(c)?))
        });
        registry.register_builtin(Slot::Reflection, QuestionReflection::NAME, |c| {
            Ok(Arc::new(QuestionReflection::new(c)?))
        });
        registry.register_builtin(Slot::Summarization, ExtractiveSummarizer::NAME, |c| {
            Ok(Arc::new(ExtractiveSummarizer::new(c)?))
        });
        registry.register_builtin(Slot::Distillation, SentenceDistiller::NAME, |c| {
            Ok(Arc::new(SentenceDistiller::new(c)?))
        });
        registry.register_builtin(Slot::Forgetting, ThresholdForgetting::NAME, |c| {
            Ok(Arc::new(ThresholdForgetting::new(c)?))
        });
        registry.register_builtin(Slot::Indexing, KeywordIndexer::NAME, |c| {
            Ok(Arc::new(KeywordIndexer::new(c)?))
        });
        registry.register_builtin(Slot::Matching, TermMatcher::NAME, |c| {
            Ok(Arc::new(TermMatcher::new(c)?))
        });
        registry.register_builtin(Slot::Associative, EntityAssociator::NAME, |c| {
            Ok(Arc::new(EntityAssociator::new(c)?))
        });
        registry.register_builtin(Slot::ParameterIntegration, ParameterTagger::NAME, |c| {
            Ok(Arc::new(ParameterTagger::new(c)?))
        });
        registry.register_builtin(Slot::Rag, ContextAssembler::NAME, |c| {
            Ok(Arc::new(ContextAssembler::new(c)?))
        });
        registry.register_builtin(Slot::LongContext, WindowChunker::NAME, |c| {
            Ok(Arc::new(WindowChunker::new(c)?))
        });
        registry.register_builtin(Slot::HallucinationMitigation, GroundingGuard::NAME, |c| {
            Ok(Arc::new(GroundingGuard::new(c)?))
        });

        registry
    }

    fn register_builtin<F>(&mut self, slot: Slot, name: &str, build: F)
    where
        F: Fn(&ComponentConfig) -> std::result::Result<Arc<dyn StageProcessor>, ProcessorError>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, [slot], move |_, config| build(config));
    }

    /// Register an implementation for the given slots.
    ///
    /// The first slot is the implementation's primary slot, used by the
    /// generic `create`. Registering an existing name replaces it.
    pub fn register<S, F>(&mut self, name: impl Into<String>, slots: S, constructor: F)
    where
        S: IntoIterator<Item = Slot>,
        F: Fn(Slot, &ComponentConfig) -> std::result::Result<Arc<dyn StageProcessor>, ProcessorError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        let slots: Vec<Slot> = slots.into_iter().collect();
        if self.entries.contains_key(&name) {
            tracing::debug!("Replacing registered processor {}", name);
        }
        self.entries.insert(
            name,
            Registration {
                slots,
                constructor: Arc::new(constructor),
            },
        );
    }

    /// All registered implementation names, sorted
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Implementation names legal for a slot, sorted
    pub fn names_for_slot(&self, slot: Slot) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, r)| r.slots.contains(&slot))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn lookup(&self, name: &str) -> Result<&Registration> {
        self.entries
            .get(name)
            .ok_or_else(|| MloError::UnknownProcessor {
                name: name.to_string(),
                available: self.names(),
            })
    }

    /// Instantiate by name alone, in the implementation's primary slot
    pub fn create(&self, name: &str, config: &ComponentConfig) -> Result<Arc<dyn StageProcessor>> {
        let registration = self.lookup(name)?;
        let slot = registration.slots.first().copied().ok_or_else(|| {
            MloError::Config(format!("Processor {name} is not registered for any slot"))
        })?;
        Ok((registration.constructor)(slot, config)?)
    }

    /// Check that `name` may fill `slot` without constructing anything
    pub fn check_slot(&self, slot: Slot, name: &str) -> Result<()> {
        let registration = self.lookup(name)?;
        if registration.slots.contains(&slot) {
            Ok(())
        } else {
            Err(MloError::InvalidSlot {
                slot,
                name: name.to_string(),
                allowed: self.names_for_slot(slot),
            })
        }
    }

    /// Instantiate `name` for `slot`, enforcing the slot's allow-list
    pub fn create_in_slot(
        &self,
        slot: Slot,
        name: &str,
        config: &ComponentConfig,
    ) -> Result<Arc<dyn StageProcessor>> {
        self.check_slot(slot, name)?;
        let registration = self.lookup(name)?;
        Ok((registration.constructor)(slot, config)?)
    }

    pub fn create_filter(&self, name: &str, config: &ComponentConfig) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::Filter, name, config)
    }

    pub fn create_compressor(&self, name: &str, config: &ComponentConfig) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::Compressor, name, config)
    }

    pub fn create_consolidator(&self, name: &str, config: &ComponentConfig) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::Consolidator, name, config)
    }

    pub fn create_attention(&self, name: &str, config: &ComponentConfig) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::Attention, name, config)
    }

    pub fn create_fusion(&self, name: &str, config: &ComponentConfig) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::Fusion, name, config)
    }

    pub fn create_reflection(&self, name: &str, config: &ComponentConfig) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::Reflection, name, config)
    }

    pub fn create_summarizer(&self, name: &str, config: &ComponentConfig) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::Summarization, name, config)
    }

    pub fn create_distiller(&self, name: &str, config: &ComponentConfig) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::Distillation, name, config)
    }

    pub fn create_forgetting(&self, name: &str, config: &ComponentConfig) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::Forgetting, name, config)
    }

    pub fn create_indexer(&self, name: &str, config: &ComponentConfig) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::Indexing, name, config)
    }

    pub fn create_matcher(&self, name: &str, config: &ComponentConfig) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::Matching, name, config)
    }

    pub fn create_associative(&self, name: &str, config: &ComponentConfig) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::Associative, name, config)
    }

    pub fn create_parameter_integration(
        &self,
        name: &str,
        config: &ComponentConfig,
    ) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::ParameterIntegration, name, config)
    }

    pub fn create_rag(&self, name: &str, config: &ComponentConfig) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::Rag, name, config)
    }

    pub fn create_long_context(&self, name: &str, config: &ComponentConfig) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::LongContext, name, config)
    }

    pub fn create_hallucination_mitigation(
        &self,
        name: &str,
        config: &ComponentConfig,
    ) -> Result<Arc<dyn StageProcessor>> {
        self.create_in_slot(Slot::HallucinationMitigation, name, config)
    }

    /// Check every configured implementation name against its slot.
    ///
    /// Returns the first error found, in intent and pipeline order.
    pub fn validate(&self, config: &Config) -> Result<()> {
        for intent in Intent::ALL {
            let Some(definition) = config.memory_types.get(intent) else {
                continue;
            };
            for (slot, assignment) in definition.stages.assigned() {
                self.check_slot(slot, assignment.implementation())?;
            }
        }
        Ok(())
    }
}
