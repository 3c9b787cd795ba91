//! Stage and slot taxonomy plus the stage processor contract
//!
//! The six lifecycle stages and the slots within each are a closed set.
//! Configuration and the component registry validate against these enums
//! so a misplaced implementation name is caught before any processing.

pub mod processor;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use processor::{
    ComponentConfig, ProcessOutput, ProcessorError, ProcessorMetrics, ProcessorStats, Settings,
    StageProcessor, parse_config,
};

/// One of the six fixed processing phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Acquisition,
    Encoding,
    Derivation,
    Retrieval,
    NeuralMemory,
    Utilization,
}

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Stage; 6] = [
        Stage::Acquisition,
        Stage::Encoding,
        Stage::Derivation,
        Stage::Retrieval,
        Stage::NeuralMemory,
        Stage::Utilization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Acquisition => "acquisition",
            Stage::Encoding => "encoding",
            Stage::Derivation => "derivation",
            Stage::Retrieval => "retrieval",
            Stage::NeuralMemory => "neuralMemory",
            Stage::Utilization => "utilization",
        }
    }

    /// Fixed stage number, 1 through 6
    pub fn number(&self) -> u8 {
        match self {
            Stage::Acquisition => 1,
            Stage::Encoding => 2,
            Stage::Derivation => 3,
            Stage::Retrieval => 4,
            Stage::NeuralMemory => 5,
            Stage::Utilization => 6,
        }
    }

    /// Slots belonging to this stage, in build order
    pub fn slots(&self) -> &'static [Slot] {
        match self {
            Stage::Acquisition => &[Slot::Filter, Slot::Compressor, Slot::Consolidator],
            Stage::Encoding => &[Slot::Attention, Slot::Fusion],
            Stage::Derivation => &[
                Slot::Reflection,
                Slot::Summarization,
                Slot::Distillation,
                Slot::Forgetting,
            ],
            Stage::Retrieval => &[Slot::Indexing, Slot::Matching],
            Stage::NeuralMemory => &[Slot::Associative, Slot::ParameterIntegration],
            Stage::Utilization => &[
                Slot::Rag,
                Slot::LongContext,
                Slot::HallucinationMitigation,
            ],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the builder consults a component's `enabled` flag.
///
/// The split is historical and uneven across slots; it is kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnablePolicy {
    /// Included whenever an implementation name is present
    Always,
    /// Included unless the component config sets `enabled = false`
    UnlessDisabled,
}

/// A named role within a stage, filled by exactly one implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Slot {
    Filter,
    Compressor,
    Consolidator,
    Attention,
    Fusion,
    Reflection,
    Summarization,
    Distillation,
    Forgetting,
    Indexing,
    Matching,
    Associative,
    ParameterIntegration,
    Rag,
    LongContext,
    HallucinationMitigation,
}

impl Slot {
    pub const ALL: [Slot; 16] = [
        Slot::Filter,
        Slot::Compressor,
        Slot::Consolidator,
        Slot::Attention,
        Slot::Fusion,
        Slot::Reflection,
        Slot::Summarization,
        Slot::Distillation,
        Slot::Forgetting,
        Slot::Indexing,
        Slot::Matching,
        Slot::Associative,
        Slot::ParameterIntegration,
        Slot::Rag,
        Slot::LongContext,
        Slot::HallucinationMitigation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Filter => "filter",
            Slot::Compressor => "compressor",
            Slot::Consolidator => "consolidator",
            Slot::Attention => "attention",
            Slot::Fusion => "fusion",
            Slot::Reflection => "reflection",
            Slot::Summarization => "summarization",
            Slot::Distillation => "distillation",
            Slot::Forgetting => "forgetting",
            Slot::Indexing => "indexing",
            Slot::Matching => "matching",
            Slot::Associative => "associative",
            Slot::ParameterIntegration => "parameterIntegration",
            Slot::Rag => "rag",
            Slot::LongContext => "longContext",
            Slot::HallucinationMitigation => "hallucinationMitigation",
        }
    }

    /// Stage this slot belongs to
    pub fn stage(&self) -> Stage {
        match self {
            Slot::Filter | Slot::Compressor | Slot::Consolidator => Stage::Acquisition,
            Slot::Attention | Slot::Fusion => Stage::Encoding,
            Slot::Reflection | Slot::Summarization | Slot::Distillation | Slot::Forgetting => {
                Stage::Derivation
            }
            Slot::Indexing | Slot::Matching => Stage::Retrieval,
            Slot::Associative | Slot::ParameterIntegration => Stage::NeuralMemory,
            Slot::Rag | Slot::LongContext | Slot::HallucinationMitigation => Stage::Utilization,
        }
    }

    pub fn enable_policy(&self) -> EnablePolicy {
        match self {
            Slot::Filter
            | Slot::Compressor
            | Slot::Summarization
            | Slot::Forgetting
            | Slot::Indexing
            | Slot::Matching
            | Slot::Rag
            | Slot::LongContext => EnablePolicy::Always,
            Slot::Consolidator
            | Slot::Attention
            | Slot::Fusion
            | Slot::Reflection
            | Slot::Distillation
            | Slot::Associative
            | Slot::ParameterIntegration
            | Slot::HallucinationMitigation => EnablePolicy::UnlessDisabled,
        }
    }

    /// History label, e.g. `acquisition:filter`
    pub fn label(&self) -> String {
        format!("{}:{}", self.stage().as_str(), self.as_str())
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
