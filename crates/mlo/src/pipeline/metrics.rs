//! Pipeline-wide metrics
//!
//! Counters accumulate additively across calls until explicitly reset.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Accumulated counters for one stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageMetrics {
    pub items_processed: u64,
    pub items_dropped: u64,
    pub processing_time_ms: f64,
}

/// Process-wide counters for an orchestrator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    /// Items submitted to `process_memory_item`
    pub total_items_processed: u64,
    /// Submitted items that produced no output (including unrouted ones)
    pub total_items_dropped: u64,
    /// Running mean of per-item processing time
    pub average_processing_time_ms: f64,
    /// Keyed by stage name
    pub stage_metrics: BTreeMap<String, StageMetrics>,
    pub last_processed_at: Option<DateTime<Utc>>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one stage pass: `before` items went in, `after` came out
    pub fn record_stage(&mut self, stage: &str, before: usize, after: usize, elapsed_ms: f64) {
        let entry = self.stage_metrics.entry(stage.to_string()).or_default();
        entry.items_processed += before as u64;
        entry.items_dropped += before.saturating_sub(after) as u64;
        entry.processing_time_ms += elapsed_ms;
    }

    /// Record a completed item and fold its time into the running average
    pub fn record_item(&mut self, processing_time_ms: f64, dropped: bool) {
        self.total_items_processed += 1;
        if dropped {
            self.total_items_dropped += 1;
        }
        let n = self.total_items_processed as f64;
        self.average_processing_time_ms =
            (self.average_processing_time_ms * (n - 1.0) + processing_time_ms) / n;
        self.last_processed_at = Some(Utc::now());
    }

    /// Record an item that had no pipeline to run through
    pub fn record_unrouted(&mut self) {
        self.total_items_dropped += 1;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
