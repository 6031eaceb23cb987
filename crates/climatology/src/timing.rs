//! Wall-clock timing of pipeline stages.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use metrics::histogram;
use serde::Serialize;
use tracing::debug;

/// Accumulated timings of one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageStats {
    pub count: u64,
    pub total_us: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub last_us: u64,
}

impl StageStats {
    fn record(&mut self, duration_us: u64) {
        self.count += 1;
        self.total_us += duration_us;
        self.last_us = duration_us;
        if self.min_us == 0 || duration_us < self.min_us {
            self.min_us = duration_us;
        }
        if duration_us > self.max_us {
            self.max_us = duration_us;
        }
    }

    pub fn total(&self) -> Duration {
        Duration::from_micros(self.total_us)
    }

    pub fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.total_us as f64 / self.count as f64) / 1000.0
        }
    }
}

/// Collects stage durations; shared by reference between pipeline steps.
#[derive(Debug, Default)]
pub struct TimingCollector {
    stages: Mutex<BTreeMap<String, StageStats>>,
}

impl TimingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time the enclosing scope as `stage`. The duration is recorded when the
    /// guard drops, including on early return.
    pub fn scope(&self, stage: impl Into<String>) -> TimingScope<'_> {
        TimingScope {
            collector: self,
            stage: stage.into(),
            start: Instant::now(),
        }
    }

    pub fn record(&self, stage: &str, elapsed: Duration) {
        let us = elapsed.as_micros() as u64;
        histogram!("era5_stage_seconds", "stage" => stage.to_string()).record(elapsed.as_secs_f64());
        debug!(stage, elapsed_ms = us as f64 / 1000.0, "Stage finished");

        let mut stages = match self.stages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        stages.entry(stage.to_string()).or_default().record(us);
    }

    pub fn get(&self, stage: &str) -> Option<StageStats> {
        self.snapshot().get(stage).copied()
    }

    pub fn snapshot(&self) -> BTreeMap<String, StageStats> {
        match self.stages.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Guard returned by [`TimingCollector::scope`].
pub struct TimingScope<'a> {
    collector: &'a TimingCollector,
    stage: String,
    start: Instant,
}

impl TimingScope<'_> {
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for TimingScope<'_> {
    fn drop(&mut self) {
        self.collector.record(&self.stage, self.start.elapsed());
    }
}
