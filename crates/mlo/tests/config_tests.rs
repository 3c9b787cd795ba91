//! Integration tests for configuration loading
//!
//! Covers file loading (TOML and JSON), discovery fallbacks, and running
//! a file-defined pipeline of built-in processors end to end.

use std::io::Write;

use mlo::{Config, Intent, MloError, Orchestrator, RecallOptions, RememberOptions, Slot};
use serde_json::json;
use tempfile::{NamedTempFile, TempDir};

const PIPELINES_TOML: &str = r#"
[context]
tenant_id = "acme"
agent_id = "assistant"

[memory_types.episodic_ltm.stages.acquisition]
filter = { implementation = "LengthFilter", config = { min_length = 5 } }
compressor = "WhitespaceCompressor"

[memory_types.episodic_ltm.stages.encoding]
attention = "KeywordAttention"

[memory_types.episodic_ltm.stages.derivation]
summarization = { implementation = "ExtractiveSummarizer", config = { max_sentences = 1 } }

[memory_types.retrieval.stages.retrieval]
indexing = "KeywordIndexer"

[memory_types.retrieval.stages.utilization]
rag = "ContextAssembler"
"#;

fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write temp file");
    file
}

#[test]
fn test_load_toml_file() {
    let file = write_temp(".toml", PIPELINES_TOML);
    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.context.tenant_id, "acme");
    let episodic = config.memory_types.get(Intent::EpisodicLtm).unwrap();
    assert_eq!(episodic.stages.assigned().len(), 4);
    assert_eq!(
        episodic.stages.get(Slot::Filter).unwrap().implementation(),
        "LengthFilter"
    );
}

#[test]
fn test_load_json_profile_file() {
    let profile = json!({
        "memory_types": {
            "semanticLTM": {
                "stages": {
                    "acquisition": {"filter": "PassThrough"},
                    "neuralMemory": {"parameterIntegration": "ParameterTagger"}
                },
                "enabledStages": {"encoding": false}
            }
        }
    });
    let file = write_temp(".json", &profile.to_string());
    let config = Config::load(file.path()).unwrap();

    let semantic = config.memory_types.get(Intent::SemanticLtm).unwrap();
    assert_eq!(
        semantic
            .stages
            .get(Slot::ParameterIntegration)
            .unwrap()
            .implementation(),
        "ParameterTagger"
    );
    assert!(!config.is_stage_enabled(mlo::Stage::Encoding, Intent::SemanticLtm));
}

#[test]
fn test_load_missing_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let err = Config::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, MloError::Config(_)));
}

#[test]
fn test_discover_prefers_explicit_path() {
    let file = write_temp(".toml", PIPELINES_TOML);
    let config = Config::discover(Some(file.path())).unwrap();
    assert_eq!(config.context.agent_id, "assistant");
}

#[test]
fn test_unknown_slot_in_file_is_rejected() {
    let file = write_temp(
        ".toml",
        r#"
[memory_types.retrieval.stages.retrieval]
ranking = "TermMatcher"
"#,
    );
    let err = Config::load(file.path()).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_serialized_config_loads_back() {
    let config = Config::from_toml_str(PIPELINES_TOML).unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mlo.toml");
    std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

    assert_eq!(Config::load(&path).unwrap(), config);
}

#[tokio::test]
async fn test_file_defined_builtin_pipeline() {
    let config = Config::from_toml_str(PIPELINES_TOML).unwrap();
    let orchestrator = Orchestrator::with_builtins(config).unwrap();

    let short = orchestrator.remember("hi", RememberOptions::default()).await;
    assert!(!short.success);
    assert_eq!(short.metadata.stages_executed, 1);

    let result = orchestrator
        .remember(
            "The  deploy   failed twice.   Rollback restored service.",
            RememberOptions::default(),
        )
        .await;
    assert!(result.success);
    let item = &result.processed_items[0];
    assert_eq!(
        item.history(),
        [
            "acquisition:filter",
            "acquisition:compressor",
            "encoding:attention",
            "derivation:summarization",
        ]
    );
    assert_eq!(
        item.text(),
        Some("The deploy failed twice. Rollback restored service.")
    );
    assert_eq!(
        item.metadata.get("summary"),
        Some(&json!("The deploy failed twice."))
    );
    assert!(item.metadata.get("attention_score").is_some());
    assert_eq!(item.metadata.tenant_id, "acme");
    assert_eq!(item.metadata.agent_id, "assistant");

    let recalled = orchestrator
        .recall("deploy rollback", RecallOptions::default())
        .await;
    assert_eq!(recalled.len(), 1);
    assert!(recalled[0].metadata.get("rag_context").is_some());
}
