//! Built-in stage processors
//!
//! Rule-based placeholder implementations for every slot. Each one is a
//! small, deterministic stand-in for a smarter component (LLM scoring,
//! learned summarization, entity alignment) behind the same contract.

pub mod acquisition;
pub mod derivation;
pub mod encoding;
pub mod neural;
pub mod passthrough;
pub mod retrieval;
pub mod text;
pub mod utilization;

pub use acquisition::{DedupConsolidator, LengthFilter, WhitespaceCompressor};
pub use derivation::{ExtractiveSummarizer, QuestionReflection, SentenceDistiller, ThresholdForgetting};
pub use encoding::{KeywordAttention, MetadataFusion};
pub use neural::{EntityAssociator, ParameterTagger};
pub use passthrough::PassThrough;
pub use retrieval::{KeywordIndexer, TermMatcher};
pub use utilization::{ContextAssembler, GroundingGuard, WindowChunker};
