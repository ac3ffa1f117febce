//! Export run metrics.
//!
//! Counters are atomics; duration samples sit behind a mutex and feed the
//! P50/P95/P99 figures of the snapshot.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Maximum number of duration samples to keep in memory.
const MAX_DURATION_SAMPLES: usize = 1000;

/// Collector shared by every run of one [`ExportDriver`](crate::driver::ExportDriver).
#[derive(Debug)]
pub struct ExportMetrics {
    pub exports_started: AtomicU64,
    pub exports_succeeded: AtomicU64,
    pub exports_failed: AtomicU64,
    /// Runs ended by the timeout kill. Also counted as failed.
    pub exports_timed_out: AtomicU64,
    /// Runs that finished while the child was still alive.
    pub early_completions: AtomicU64,
    pub soft_validation_retries: AtomicU64,
    /// DXF stubs published in place of a failed export.
    pub stub_fallbacks: AtomicU64,
    pub total_output_bytes: AtomicU64,
    duration_samples: Mutex<Vec<Duration>>,
}

impl ExportMetrics {
    pub fn new() -> Self {
        Self {
            exports_started: AtomicU64::new(0),
            exports_succeeded: AtomicU64::new(0),
            exports_failed: AtomicU64::new(0),
            exports_timed_out: AtomicU64::new(0),
            early_completions: AtomicU64::new(0),
            soft_validation_retries: AtomicU64::new(0),
            stub_fallbacks: AtomicU64::new(0),
            total_output_bytes: AtomicU64::new(0),
            duration_samples: Mutex::new(Vec::with_capacity(MAX_DURATION_SAMPLES)),
        }
    }

    pub fn record_started(&self) {
        self.exports_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, duration: Duration, output_bytes: u64) {
        self.exports_succeeded.fetch_add(1, Ordering::Relaxed);
        self.total_output_bytes
            .fetch_add(output_bytes, Ordering::Relaxed);
        self.add_duration_sample(duration);
    }

    pub fn record_failure(&self) {
        self.exports_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.exports_timed_out.fetch_add(1, Ordering::Relaxed);
        self.exports_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_early_completion(&self) {
        self.early_completions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_revalidation(&self) {
        self.soft_validation_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stub_fallback(&self) {
        self.stub_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    fn add_duration_sample(&self, duration: Duration) {
        if let Ok(mut samples) = self.duration_samples.lock() {
            if samples.len() >= MAX_DURATION_SAMPLES {
                samples.remove(0);
            }
            samples.push(duration);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let durations = self
            .duration_samples
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();

        let (p50, p95, p99) = Self::calculate_percentiles(&durations);

        MetricsSnapshot {
            exports_started: self.exports_started.load(Ordering::Relaxed),
            exports_succeeded: self.exports_succeeded.load(Ordering::Relaxed),
            exports_failed: self.exports_failed.load(Ordering::Relaxed),
            exports_timed_out: self.exports_timed_out.load(Ordering::Relaxed),
            early_completions: self.early_completions.load(Ordering::Relaxed),
            soft_validation_retries: self.soft_validation_retries.load(Ordering::Relaxed),
            stub_fallbacks: self.stub_fallbacks.load(Ordering::Relaxed),
            total_output_bytes: self.total_output_bytes.load(Ordering::Relaxed),
            duration_p50: p50,
            duration_p95: p95,
            duration_p99: p99,
            sample_count: durations.len() as u64,
        }
    }

    fn calculate_percentiles(
        durations: &[Duration],
    ) -> (Option<Duration>, Option<Duration>, Option<Duration>) {
        if durations.is_empty() {
            return (None, None, None);
        }

        let mut sorted = durations.to_vec();
        sorted.sort();
        let len = sorted.len();

        let p50 = sorted.get(len * 50 / 100).copied();
        let p95 = sorted.get(len * 95 / 100).copied();
        let p99 = sorted.get(len.saturating_sub(1) * 99 / 100).copied();

        (p50, p95, p99)
    }
}

impl Default for ExportMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time copy of [`ExportMetrics`]. Durations serialize as
/// milliseconds.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub exports_started: u64,
    pub exports_succeeded: u64,
    pub exports_failed: u64,
    pub exports_timed_out: u64,
    pub early_completions: u64,
    pub soft_validation_retries: u64,
    pub stub_fallbacks: u64,
    pub total_output_bytes: u64,
    #[serde(
        serialize_with = "serialize_opt_duration",
        deserialize_with = "deserialize_opt_duration"
    )]
    pub duration_p50: Option<Duration>,
    #[serde(
        serialize_with = "serialize_opt_duration",
        deserialize_with = "deserialize_opt_duration"
    )]
    pub duration_p95: Option<Duration>,
    #[serde(
        serialize_with = "serialize_opt_duration",
        deserialize_with = "deserialize_opt_duration"
    )]
    pub duration_p99: Option<Duration>,
    pub sample_count: u64,
}

fn serialize_opt_duration<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match duration {
        Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
        None => serializer.serialize_none(),
    }
}

fn deserialize_opt_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis: Option<u64> = serde::Deserialize::deserialize(deserializer)?;
    Ok(millis.map(Duration::from_millis))
}
