//! Mlo - Memory lifecycle orchestrator for agent memory
//!
//! Routes units of memory content through configurable sequences of
//! processing stages (acquisition, encoding, derivation, retrieval,
//! neural memory, utilization) before they are stored or returned as
//! query results. Pipelines are assembled from declarative configuration
//! through a component registry and can be rebuilt at runtime.

pub mod config;
pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod pipeline;
pub mod processors;
pub mod registry;
pub mod stage;
pub mod testing;

pub use config::{Config, ConfigPatch};
pub use error::{MloError, Result};
pub use memory::{DataType, Intent, MemoryItem, TargetStore};
pub use orchestrator::{
    MemoryKind, OperationResult, Orchestrator, PipelineSummary, RecallOptions, RememberOptions,
};
pub use pipeline::PipelineMetrics;
pub use registry::ComponentRegistry;
pub use stage::{ProcessOutput, ProcessorError, Slot, Stage, StageProcessor};
