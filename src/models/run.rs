//! Run settings and the per-run audit record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Settings read once when a run initializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSettings {
    /// Resources per batch
    pub batch_size: usize,

    /// Concurrent workers inside a batch
    pub max_concurrent: usize,
}

impl RunSettings {
    /// Clamp zero values to one so a run always makes progress.
    pub fn normalized(self) -> Self {
        Self {
            batch_size: self.batch_size.max(1),
            max_concurrent: self.max_concurrent.max(1),
        }
    }
}

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Initializing,
    FetchingCatalog,
    ProcessingBatches,
    Finalizing,
    Done,
}

impl RunPhase {
    pub const COUNT: usize = 5;

    pub fn ordinal(&self) -> usize {
        match self {
            RunPhase::Initializing => 1,
            RunPhase::FetchingCatalog => 2,
            RunPhase::ProcessingBatches => 3,
            RunPhase::Finalizing => 4,
            RunPhase::Done => 5,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Initializing => "initializing",
            RunPhase::FetchingCatalog => "fetching catalog",
            RunPhase::ProcessingBatches => "processing batches",
            RunPhase::Finalizing => "finalizing",
            RunPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Aggregated counters for a run or a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Resources whose pipeline completed (changed or not)
    pub checked: usize,
    pub changes_detected: usize,
    pub baselines_written: usize,
    pub notifications_sent: usize,
    pub channel_failures: usize,
    pub duplicates_suppressed: usize,
    pub fetch_failures: usize,
    pub orphans_removed: usize,
    pub preference_anomalies: usize,
}

impl std::ops::AddAssign for RunStats {
    fn add_assign(&mut self, other: Self) {
        self.checked += other.checked;
        self.changes_detected += other.changes_detected;
        self.baselines_written += other.baselines_written;
        self.notifications_sent += other.notifications_sent;
        self.channel_failures += other.channel_failures;
        self.duplicates_suppressed += other.duplicates_suppressed;
        self.fetch_failures += other.fetch_failures;
        self.orphans_removed += other.orphans_removed;
        self.preference_anomalies += other.preference_anomalies;
    }
}

/// Outcome of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub index: usize,
    pub size: usize,

    /// Resources whose pipeline ran to completion
    pub completed: usize,

    /// Resources skipped because the batch was abandoned
    pub abandoned: usize,

    /// The unexpected error that abandoned the batch, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    pub duration_ms: u64,
}

impl BatchOutcome {
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Audit record for one run.
///
/// Created when the run starts with no duration, finalized once at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    pub term: String,
    pub resource_count: usize,

    #[serde(default)]
    pub duration_ms: Option<u64>,

    pub settings: RunSettings,

    #[serde(default)]
    pub batches: Vec<BatchOutcome>,

    #[serde(default)]
    pub stats: RunStats,
}

impl RunRecord {
    pub fn begin(term: impl Into<String>, resource_count: usize, settings: RunSettings) -> Self {
        Self {
            started_at: Utc::now(),
            term: term.into(),
            resource_count,
            duration_ms: None,
            settings,
            batches: Vec::new(),
            stats: RunStats::default(),
        }
    }

    pub fn record_batch(&mut self, outcome: BatchOutcome, stats: RunStats) {
        self.batches.push(outcome);
        self.stats += stats;
    }

    /// Stamp the duration. Consumes the record so it cannot be mutated afterwards.
    pub fn finalize(mut self, finished_at: DateTime<Utc>) -> Self {
        let elapsed = (finished_at - self.started_at).num_milliseconds().max(0);
        self.duration_ms = Some(elapsed as u64);
        self
    }

    pub fn is_finalized(&self) -> bool {
        self.duration_ms.is_some()
    }

    pub fn failed_batches(&self) -> usize {
        self.batches.iter().filter(|b| b.failed()).count()
    }

    /// Resources per second, if the run took measurable time.
    pub fn throughput(&self) -> Option<f64> {
        match self.duration_ms {
            Some(ms) if ms > 0 => Some(self.resource_count as f64 / (ms as f64 / 1000.0)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RunSettings {
        RunSettings {
            batch_size: 10,
            max_concurrent: 4,
        }
    }

    #[test]
    fn test_normalized_settings_never_zero() {
        let s = RunSettings {
            batch_size: 0,
            max_concurrent: 0,
        }
        .normalized();
        assert_eq!(s.batch_size, 1);
        assert_eq!(s.max_concurrent, 1);
    }

    #[test]
    fn test_record_finalize_sets_duration() {
        let record = RunRecord::begin("202511", 3, settings());
        assert!(!record.is_finalized());

        let finished = record.started_at + chrono::Duration::milliseconds(1500);
        let record = record.finalize(finished);
        assert_eq!(record.duration_ms, Some(1500));
        assert!(record.throughput().unwrap() > 1.9);
    }

    #[test]
    fn test_record_batch_accumulates_stats() {
        let mut record = RunRecord::begin("202511", 2, settings());
        let outcome = BatchOutcome {
            index: 0,
            size: 2,
            completed: 1,
            abandoned: 1,
            failure: Some("boom".into()),
            duration_ms: 5,
        };
        let stats = RunStats {
            checked: 1,
            changes_detected: 1,
            ..RunStats::default()
        };
        record.record_batch(outcome.clone(), stats);
        record.record_batch(outcome, stats);
        assert_eq!(record.stats.checked, 2);
        assert_eq!(record.failed_batches(), 2);
    }
}
