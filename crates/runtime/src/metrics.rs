use std::collections::BTreeMap;
use std::time::Duration;

/// Counters and timings for one ingestion run.
///
/// Counter keys are `collection.outcome` (`wells.built`, `terrainLayers.failed`)
/// with skip reasons one level further down (`shapes.skipped.artifact`).
/// Sorted maps keep snapshots stable across runs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunMetrics {
    counters: BTreeMap<String, u64>,
    timings: BTreeMap<String, Histogram>,
}

/// Millisecond timing summary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Histogram {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
}

impl Histogram {
    pub fn record(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub counters: Vec<(String, u64)>,
    pub timings: Vec<(String, Histogram)>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.counters.clear();
        self.timings.clear();
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn inc_counter(&mut self, name: impl Into<String>, by: u64) {
        *self.counters.entry(name.into()).or_insert(0) += by;
    }

    pub fn record_built(&mut self, collection: &str) {
        self.inc_counter(format!("{collection}.built"), 1);
    }

    pub fn record_skipped(&mut self, collection: &str, reason: &str) {
        self.inc_counter(format!("{collection}.skipped"), 1);
        self.inc_counter(format!("{collection}.skipped.{reason}"), 1);
    }

    pub fn record_failed(&mut self, collection: &str) {
        self.inc_counter(format!("{collection}.failed"), 1);
    }

    pub fn built(&self, collection: &str) -> u64 {
        self.counter(&format!("{collection}.built"))
    }

    pub fn skipped(&self, collection: &str) -> u64 {
        self.counter(&format!("{collection}.skipped"))
    }

    pub fn failed(&self, collection: &str) -> u64 {
        self.counter(&format!("{collection}.failed"))
    }

    pub fn record_duration(&mut self, name: impl Into<String>, elapsed: Duration) {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.timings.entry(name.into()).or_default().record(ms);
    }

    pub fn timing(&self, name: &str) -> Option<Histogram> {
        self.timings.get(name).copied()
    }

    /// Fold `other` into `self`, summing counters and timings.
    pub fn merge(&mut self, other: &RunMetrics) {
        for (k, v) in &other.counters {
            self.inc_counter(k.clone(), *v);
        }
        for (k, h) in &other.timings {
            let dst = self.timings.entry(k.clone()).or_default();
            if h.count == 0 {
                continue;
            }
            if dst.count == 0 {
                *dst = *h;
            } else {
                dst.count += h.count;
                dst.sum += h.sum;
                dst.min = dst.min.min(h.min);
                dst.max = dst.max.max(h.max);
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            timings: self.timings.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        }
    }
}
