//! Prometheus-style metrics for the decision engine

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;

use super::decision::{AuthorizationDecision, ReasonCode};

/// Point-in-time engine metrics
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Total number of `can_communicate` evaluations
    pub total_requests: u64,

    pub allowed_decisions: u64,
    pub denied_decisions: u64,

    /// Decisions per reason code
    pub by_reason: BTreeMap<ReasonCode, u64>,

    pub cache_hits: u64,
    pub cache_misses: u64,

    /// Latency percentiles over the retained window
    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p99_ms: f64,
    pub avg_latency_ms: f64,
}

impl EngineMetrics {
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    pub fn allow_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / self.total_requests as f64
        }
    }
}

/// Thread-safe metrics collector
pub struct MetricsCollector {
    metrics: RwLock<EngineMetrics>,

    /// Recent latency samples in milliseconds
    latency_samples: Mutex<Vec<f64>>,

    max_samples: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_max_samples(10_000)
    }

    pub fn with_max_samples(max_samples: usize) -> Self {
        Self {
            metrics: RwLock::new(EngineMetrics::default()),
            latency_samples: Mutex::new(Vec::with_capacity(max_samples)),
            max_samples: max_samples.max(10),
        }
    }

    pub fn record_cache_hit(&self) {
        self.metrics.write().cache_hits += 1;
    }

    pub fn record_cache_miss(&self) {
        self.metrics.write().cache_misses += 1;
    }

    /// Record one decision and how long it took
    pub fn record_decision(&self, decision: &AuthorizationDecision, latency: Duration) {
        {
            let mut metrics = self.metrics.write();
            metrics.total_requests += 1;
            if decision.allowed {
                metrics.allowed_decisions += 1;
            } else {
                metrics.denied_decisions += 1;
            }
            *metrics.by_reason.entry(decision.reason_code).or_insert(0) += 1;
        }

        self.record_latency(latency);
    }

    fn record_latency(&self, latency: Duration) {
        let mut samples = self.latency_samples.lock();
        samples.push(latency.as_secs_f64() * 1000.0);

        if samples.len() > self.max_samples {
            let excess = samples.len() - self.max_samples + self.max_samples / 10;
            samples.drain(0..excess);
        }
    }

    /// Counters plus latency percentiles computed from the retained window
    pub fn get_metrics(&self) -> EngineMetrics {
        let mut sorted = self.latency_samples.lock().clone();
        let mut metrics = self.metrics.read().clone();

        if !sorted.is_empty() {
            sorted.sort_by(f64::total_cmp);
            metrics.avg_latency_ms = sorted.iter().sum::<f64>() / sorted.len() as f64;
            metrics.latency_p50_ms = percentile(&sorted, 0.50);
            metrics.latency_p90_ms = percentile(&sorted, 0.90);
            metrics.latency_p99_ms = percentile(&sorted, 0.99);
        }

        metrics
    }

    pub fn reset(&self) {
        *self.metrics.write() = EngineMetrics::default();
        self.latency_samples.lock().clear();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let metrics = self.get_metrics();
        let mut out = String::new();

        let _ = writeln!(out, "# HELP authz_requests_total Total number of authorization requests");
        let _ = writeln!(out, "# TYPE authz_requests_total counter");
        let _ = writeln!(out, "authz_requests_total {}", metrics.total_requests);

        let _ = writeln!(out, "# HELP authz_decisions_total Decisions by reason code");
        let _ = writeln!(out, "# TYPE authz_decisions_total counter");
        for code in ReasonCode::ALL {
            let count = metrics.by_reason.get(&code).copied().unwrap_or(0);
            let _ = writeln!(out, "authz_decisions_total{{reason=\"{}\"}} {}", code, count);
        }

        let _ = writeln!(out, "# HELP authz_cache_hits_total Cache hits");
        let _ = writeln!(out, "# TYPE authz_cache_hits_total counter");
        let _ = writeln!(out, "authz_cache_hits_total {}", metrics.cache_hits);

        let _ = writeln!(out, "# HELP authz_cache_misses_total Cache misses");
        let _ = writeln!(out, "# TYPE authz_cache_misses_total counter");
        let _ = writeln!(out, "authz_cache_misses_total {}", metrics.cache_misses);

        let _ = writeln!(out, "# HELP authz_latency_seconds Decision latency percentiles");
        let _ = writeln!(out, "# TYPE authz_latency_seconds summary");
        for (quantile, value) in [
            ("0.5", metrics.latency_p50_ms),
            ("0.9", metrics.latency_p90_ms),
            ("0.99", metrics.latency_p99_ms),
        ] {
            let _ = writeln!(
                out,
                "authz_latency_seconds{{quantile=\"{}\"}} {}",
                quantile,
                value / 1000.0
            );
        }

        out
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let idx = ((sorted.len() as f64) * p) as usize;
    sorted[idx.min(sorted.len() - 1)]
}
