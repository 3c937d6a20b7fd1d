//! Observability for the translation pipeline: latency histograms per stage
//! and counters for cache hits/misses and provider failures.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A span measuring elapsed time from creation to `finish`.
pub struct TimingSpan {
    name: String,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    /// End the span, recording elapsed duration in microseconds.
    pub fn finish(self) -> f64 {
        let elapsed_us = self.start.elapsed().as_micros() as f64;
        self.registry.record(&self.name, elapsed_us);
        elapsed_us
    }
}

/// Fixed-capacity ring of latency samples.
struct SampleRing {
    samples: Vec<f64>,
    pos: usize,
    count: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            pos: 0,
            count: 0,
        }
    }

    fn push(&mut self, value: f64) {
        let capacity = self.samples.len();
        self.samples[self.pos] = value;
        self.pos = (self.pos + 1) % capacity;
        self.count = (self.count + 1).min(capacity);
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mut sorted = self.samples[..self.count].to_vec();
        sorted.sort_by(f64::total_cmp);
        let idx = ((p / 100.0) * (self.count as f64 - 1.0)).round() as usize;
        sorted[idx.min(self.count - 1)]
    }
}

#[derive(Default)]
struct Counters {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_errors: AtomicU64,
    provider_failures: AtomicU64,
    total_failures: AtomicU64,
}

/// Histograms keyed by metric name plus pipeline counters.
pub struct MetricsRegistry {
    histograms: Mutex<HashMap<String, SampleRing>>,
    counters: Counters,
    ring_capacity: usize,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            histograms: Mutex::new(HashMap::new()),
            counters: Counters::default(),
            ring_capacity: 512,
        }
    }

    /// Record a sample (in microseconds) for the named metric.
    pub fn record(&self, name: &str, value_us: f64) {
        let mut hists = self.histograms.lock();
        hists
            .entry(name.to_string())
            .or_insert_with(|| SampleRing::new(self.ring_capacity))
            .push(value_us);
        tracing::trace!(metric = name, value_us, "metric_recorded");
    }

    /// Start a timing span that records on finish.
    pub fn span(self: &Arc<Self>, name: impl Into<String>) -> TimingSpan {
        TimingSpan {
            name: name.into(),
            start: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    pub fn incr(&self, counter: Counter) {
        let c = match counter {
            Counter::CacheHit => &self.counters.cache_hits,
            Counter::CacheMiss => &self.counters.cache_misses,
            Counter::CacheError => &self.counters.cache_errors,
            Counter::ProviderFailure => &self.counters.provider_failures,
            Counter::TotalFailure => &self.counters.total_failures,
        };
        c.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let hists = self.histograms.lock();
        let latencies = hists
            .iter()
            .map(|(name, ring)| {
                (
                    name.clone(),
                    MetricSummary {
                        p50_us: ring.percentile(50.0),
                        p95_us: ring.percentile(95.0),
                        p99_us: ring.percentile(99.0),
                        count: ring.count,
                    },
                )
            })
            .collect();

        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            cache_hits: load(&self.counters.cache_hits),
            cache_misses: load(&self.counters.cache_misses),
            cache_errors: load(&self.counters.cache_errors),
            provider_failures: load(&self.counters.provider_failures),
            total_failures: load(&self.counters.total_failures),
            latencies,
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Counter {
    CacheHit,
    CacheMiss,
    CacheError,
    ProviderFailure,
    TotalFailure,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_errors: u64,
    pub provider_failures: u64,
    pub total_failures: u64,
    pub latencies: HashMap<String, MetricSummary>,
}

/// Well-known histogram names. Provider calls are recorded as
/// `provider_call.<provider id>`.
pub mod metric_names {
    pub const CACHE_LOOKUP: &str = "cache_lookup";
    pub const TRANSLATE_TOTAL: &str = "translate_total";
    pub const PROVIDER_CALL_PREFIX: &str = "provider_call";

    pub fn provider_call(provider_id: &str) -> String {
        format!("{PROVIDER_CALL_PREFIX}.{provider_id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_over_recorded_samples() {
        let registry = MetricsRegistry::new();
        for v in 1..=100 {
            registry.record("x", v as f64);
        }
        let snap = registry.snapshot();
        let summary = &snap.latencies["x"];
        assert_eq!(summary.count, 100);
        assert_eq!(summary.p50_us, 51.0);
        assert_eq!(summary.p99_us, 99.0);
    }

    #[test]
    fn ring_keeps_only_latest_samples() {
        let mut ring = SampleRing::new(4);
        for v in [100.0, 1.0, 2.0, 3.0, 4.0] {
            ring.push(v);
        }
        assert_eq!(ring.count, 4);
        assert_eq!(ring.percentile(100.0), 4.0);
    }

    #[test]
    fn counters_and_spans() {
        let registry = Arc::new(MetricsRegistry::new());
        registry.incr(Counter::CacheHit);
        registry.incr(Counter::CacheHit);
        registry.incr(Counter::ProviderFailure);
        registry.span(metric_names::provider_call("google")).finish();

        let snap = registry.snapshot();
        assert_eq!(snap.cache_hits, 2);
        assert_eq!(snap.provider_failures, 1);
        assert_eq!(snap.total_failures, 0);
        assert_eq!(snap.latencies["provider_call.google"].count, 1);
    }
}
