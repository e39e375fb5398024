//! Call metrics collection.
//!
//! Thread-safe per-method counters recorded in the dispatch path and
//! served by the built-in `_metrics` and `_info` methods. Totals use
//! atomics; the per-method table takes a lock only when a call is
//! recorded.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Instant;

/// Counters for one call path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodMetrics {
    pub call_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_latency_us: u64,
}

/// Serializable snapshot of all collected metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub uptime_ms: u64,
    pub methods: HashMap<String, MethodMetrics>,
}

#[derive(Default)]
struct MethodAccum {
    calls: u64,
    successes: u64,
    failures: u64,
    total_latency_us: u64,
}

pub struct CallMetrics {
    started: Instant,
    total: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    methods: RwLock<HashMap<String, MethodAccum>>,
}

impl CallMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            methods: RwLock::new(HashMap::new()),
        }
    }

    /// Records one finished call.
    pub fn record_call(&self, method: &str, start: Instant, success: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        let latency_us = start.elapsed().as_micros() as u64;
        let mut methods = self.methods.write().unwrap_or_else(|e| e.into_inner());
        let accum = methods.entry(method.to_string()).or_default();
        accum.calls += 1;
        if success {
            accum.successes += 1;
        } else {
            accum.failures += 1;
        }
        accum.total_latency_us += latency_us;
    }

    pub fn uptime_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let methods = self.methods.read().unwrap_or_else(|e| e.into_inner());
        MetricsSnapshot {
            total_requests: self.total.load(Ordering::Relaxed),
            successful_requests: self.successes.load(Ordering::Relaxed),
            failed_requests: self.failures.load(Ordering::Relaxed),
            uptime_ms: self.uptime_ms(),
            methods: methods
                .iter()
                .map(|(name, accum)| {
                    (
                        name.clone(),
                        MethodMetrics {
                            call_count: accum.calls,
                            success_count: accum.successes,
                            failure_count: accum.failures,
                            avg_latency_us: if accum.calls > 0 {
                                accum.total_latency_us / accum.calls
                            } else {
                                0
                            },
                        },
                    )
                })
                .collect(),
        }
    }
}

impl Default for CallMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let metrics = CallMetrics::new();
        let start = Instant::now();
        metrics.record_call("Pump/StartFlow", start, true);
        metrics.record_call("Pump/StartFlow", start, false);
        metrics.record_call("Pump/StopFlow", start, true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.successful_requests, 2);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.methods["Pump/StartFlow"].call_count, 2);
        assert_eq!(snapshot.methods["Pump/StartFlow"].failure_count, 1);
        assert_eq!(snapshot.methods["Pump/StopFlow"].success_count, 1);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = CallMetrics::new().snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert!(snapshot.methods.is_empty());
    }
}
