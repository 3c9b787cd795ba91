//! Integration tests for the component registry
//!
//! Tests the registry's ability to:
//! - Enumerate legal names globally and per slot
//! - Reject unknown names and misplaced slot assignments
//! - Accept custom registrations alongside the built-ins

use std::sync::Arc;

use mlo::config::MemoryTypeConfig;
use mlo::processors::PassThrough;
use mlo::stage::ComponentConfig;
use mlo::testing::{config_with, register_scripted, Action};
use mlo::{ComponentRegistry, Config, Intent, MemoryItem, MloError, Slot, Stage};

#[test]
fn test_per_slot_creators_accept_their_builtin() {
    let registry = ComponentRegistry::with_builtins();
    let config = ComponentConfig::new();

    let cases: Vec<(Slot, Arc<dyn mlo::StageProcessor>)> = vec![
        (Slot::Filter, registry.create_filter("LengthFilter", &config).unwrap()),
        (
            Slot::Compressor,
            registry.create_compressor("WhitespaceCompressor", &config).unwrap(),
        ),
        (
            Slot::Consolidator,
            registry.create_consolidator("DedupConsolidator", &config).unwrap(),
        ),
        (
            Slot::Attention,
            registry.create_attention("KeywordAttention", &config).unwrap(),
        ),
        (Slot::Fusion, registry.create_fusion("MetadataFusion", &config).unwrap()),
        (
            Slot::Reflection,
            registry.create_reflection("QuestionReflection", &config).unwrap(),
        ),
        (
            Slot::Summarization,
            registry.create_summarizer("ExtractiveSummarizer", &config).unwrap(),
        ),
        (
            Slot::Distillation,
            registry.create_distiller("SentenceDistiller", &config).unwrap(),
        ),
        (
            Slot::Forgetting,
            registry.create_forgetting("ThresholdForgetting", &config).unwrap(),
        ),
        (Slot::Indexing, registry.create_indexer("KeywordIndexer", &config).unwrap()),
        (Slot::Matching, registry.create_matcher("TermMatcher", &config).unwrap()),
        (
            Slot::Associative,
            registry.create_associative("EntityAssociator", &config).unwrap(),
        ),
        (
            Slot::ParameterIntegration,
            registry
                .create_parameter_integration("ParameterTagger", &config)
                .unwrap(),
        ),
        (Slot::Rag, registry.create_rag("ContextAssembler", &config).unwrap()),
        (
            Slot::LongContext,
            registry.create_long_context("WindowChunker", &config).unwrap(),
        ),
        (
            Slot::HallucinationMitigation,
            registry
                .create_hallucination_mitigation("GroundingGuard", &config)
                .unwrap(),
        ),
    ];

    for (slot, processor) in cases {
        assert_eq!(processor.slot(), slot);
        assert_eq!(processor.stage(), slot.stage());
        assert_eq!(processor.stage_number(), slot.stage().number());
        assert_eq!(processor.label(), format!("{}:{}", slot.stage(), slot));
    }
}

#[test]
fn test_attention_name_in_filter_slot_is_rejected() {
    let registry = ComponentRegistry::with_builtins();
    let err = registry
        .create_filter("KeywordAttention", &ComponentConfig::new())
        .err()
        .unwrap();

    assert!(err.is_configuration());
    assert_eq!(
        err.to_string(),
        "Invalid filter implementation: KeywordAttention. Valid options: LengthFilter, PassThrough"
    );
}

#[test]
fn test_invalid_component_settings_fail_pipeline_build() {
    let bad = serde_json::json!({"window": 3, "overlap": 5})
        .as_object()
        .cloned()
        .unwrap();
    let mut config = Config::default();
    config.memory_types.set(
        Intent::SemanticLtm,
        MemoryTypeConfig::new().with_slot_config(Slot::LongContext, "WindowChunker", bad),
    );

    let err = mlo::Orchestrator::new(config, Arc::new(ComponentRegistry::with_builtins()))
        .err()
        .unwrap();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("larger than overlap"));
}

#[test]
fn test_generic_create_accepts_any_known_name() {
    let registry = ComponentRegistry::with_builtins();
    let processor = registry
        .create("KeywordAttention", &ComponentConfig::new())
        .unwrap();
    assert_eq!(processor.slot(), Slot::Attention);
    assert_eq!(processor.implementation(), "KeywordAttention");
}

#[test]
fn test_unknown_name_enumerates_all_processors() {
    let registry = ComponentRegistry::with_builtins();
    let err = registry
        .create_matcher("VectorMatcher", &ComponentConfig::new())
        .err()
        .unwrap();

    let message = err.to_string();
    assert!(message.starts_with("Unknown processor: VectorMatcher. Available processors: "));
    for name in registry.names() {
        assert!(message.contains(&name), "missing {name}");
    }
}

#[test]
fn test_slot_taxonomy_is_closed() {
    let total: usize = Stage::ALL.iter().map(|stage| stage.slots().len()).sum();
    assert_eq!(total, Slot::ALL.len());
    for slot in Slot::ALL {
        assert!(slot.stage().slots().contains(&slot));
    }
}

#[tokio::test]
async fn test_custom_registration_runs_in_pipeline() {
    let mut registry = ComponentRegistry::with_builtins();
    register_scripted(&mut registry, "Shout", |_| Action::Pass);
    assert!(registry.names_for_slot(Slot::Rag).contains(&"Shout".to_string()));

    let config = config_with(Intent::Retrieval, &[(Slot::Rag, "Shout")]);
    registry.validate(&config).unwrap();

    let orchestrator = mlo::Orchestrator::new(config, Arc::new(registry)).unwrap();
    let result = orchestrator
        .process_memory_item(MemoryItem::new("q", Intent::Retrieval), None)
        .await;
    assert!(result.success);
    assert_eq!(result.processed_items[0].history(), ["utilization:rag"]);
}

#[test]
fn test_replacing_a_registration_narrows_its_slots() {
    let mut registry = ComponentRegistry::with_builtins();
    registry.register(PassThrough::NAME, [Slot::Filter], |slot, _| {
        Ok(Arc::new(PassThrough::new(slot)))
    });

    assert!(registry.check_slot(Slot::Filter, "PassThrough").is_ok());
    let err = registry.check_slot(Slot::Rag, "PassThrough").unwrap_err();
    assert!(matches!(err, MloError::InvalidSlot { slot: Slot::Rag, .. }));
}

#[test]
fn test_validate_walks_every_memory_type() {
    let registry = ComponentRegistry::with_builtins();
    let mut config = config_with(Intent::EpisodicLtm, &[(Slot::Filter, "LengthFilter")]);
    registry.validate(&config).unwrap();

    config.memory_types.set(
        Intent::Retrieval,
        MemoryTypeConfig::new().with_slot(Slot::Indexing, "TermMatcher"),
    );
    let err = registry.validate(&config).unwrap_err();
    assert!(err.to_string().contains("Invalid indexing implementation"));

    assert!(registry.validate(&Config::default()).is_ok());
}
