//! The result record of one (allocator, benchmark, configuration) run.
//!
//! Every `f64` metric that a workload does not measure holds [`METRIC_NA`].
//! In JSON the sentinel is written as `null` and `null` reads back as the
//! sentinel, so consumers never mistake "not measured" for zero.

use serde::{Deserialize, Serialize};

use crate::stats::LatencySummary;

/// "Not applicable" marker for floating-point metrics.
pub const METRIC_NA: f64 = -1.0;

#[inline]
pub fn is_na(value: f64) -> bool {
    value == METRIC_NA
}

/// `None` for the sentinel, `Some(value)` otherwise.
#[inline]
pub fn metric(value: f64) -> Option<f64> {
    if is_na(value) { None } else { Some(value) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchResult {
    pub total_time_ms: f64,
    #[serde(rename = "operations")]
    pub operations_count: u64,
    #[serde(with = "not_applicable")]
    pub alloc_ops_per_sec: f64,
    #[serde(with = "not_applicable")]
    pub free_ops_per_sec: f64,
    #[serde(with = "not_applicable")]
    pub realloc_ops_per_sec: f64,
    #[serde(with = "not_applicable")]
    pub total_ops_per_sec: f64,
    #[serde(with = "not_applicable")]
    pub avg_alloc_time_ns: f64,
    #[serde(with = "not_applicable")]
    pub min_alloc_time_ns: f64,
    #[serde(with = "not_applicable")]
    pub max_alloc_time_ns: f64,
    #[serde(with = "not_applicable")]
    pub p50_alloc_time_ns: f64,
    #[serde(with = "not_applicable")]
    pub p99_alloc_time_ns: f64,
    pub peak_rss_kb: u64,
    pub current_rss_kb: u64,
    #[serde(with = "not_applicable")]
    pub fragmentation_ratio: f64,
    pub total_allocated_bytes: u64,
    pub total_requested_bytes: u64,
    pub thread_count: usize,
    /// Set once a workload has decided the fragmentation ratio itself.
    #[serde(skip)]
    fragmentation_supplied: bool,
}

impl Default for BenchResult {
    fn default() -> Self {
        Self::new()
    }
}

impl BenchResult {
    /// A fresh record: counters at zero, every metric not applicable.
    pub fn new() -> Self {
        Self {
            total_time_ms: 0.0,
            operations_count: 0,
            alloc_ops_per_sec: METRIC_NA,
            free_ops_per_sec: METRIC_NA,
            realloc_ops_per_sec: METRIC_NA,
            total_ops_per_sec: METRIC_NA,
            avg_alloc_time_ns: METRIC_NA,
            min_alloc_time_ns: METRIC_NA,
            max_alloc_time_ns: METRIC_NA,
            p50_alloc_time_ns: METRIC_NA,
            p99_alloc_time_ns: METRIC_NA,
            peak_rss_kb: 0,
            current_rss_kb: 0,
            fragmentation_ratio: METRIC_NA,
            total_allocated_bytes: 0,
            total_requested_bytes: 0,
            thread_count: 1,
            fragmentation_supplied: false,
        }
    }

    pub fn apply_latency(&mut self, summary: &LatencySummary) {
        self.avg_alloc_time_ns = summary.avg_ns;
        self.min_alloc_time_ns = summary.min_ns;
        self.max_alloc_time_ns = summary.max_ns;
        self.p50_alloc_time_ns = summary.p50_ns;
        self.p99_alloc_time_ns = summary.p99_ns;
    }

    /// Fix the fragmentation ratio; [`METRIC_NA`] pins it as not applicable.
    pub fn supply_fragmentation(&mut self, ratio: f64) {
        self.fragmentation_ratio = ratio;
        self.fragmentation_supplied = true;
    }

    pub fn fragmentation_supplied(&self) -> bool {
        self.fragmentation_supplied
    }

    /// Derive `allocated / requested` unless the workload supplied a ratio.
    pub fn finalize_fragmentation(&mut self) {
        if self.fragmentation_supplied || self.total_requested_bytes == 0 {
            return;
        }
        self.fragmentation_ratio =
            self.total_allocated_bytes as f64 / self.total_requested_bytes as f64;
    }
}

/// Serde adapter: sentinel <-> `null`.
pub mod not_applicable {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::METRIC_NA;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        match super::metric(*value) {
            Some(v) if v.is_finite() => serializer.serialize_f64(v),
            _ => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(METRIC_NA))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_all_na() {
        let r = BenchResult::new();
        assert!(is_na(r.total_ops_per_sec));
        assert!(is_na(r.p99_alloc_time_ns));
        assert!(is_na(r.fragmentation_ratio));
        assert_eq!(r.operations_count, 0);
    }

    #[test]
    fn test_fragmentation_default_ratio() {
        let mut r = BenchResult::new();
        r.total_requested_bytes = 1000;
        r.total_allocated_bytes = 1250;
        r.finalize_fragmentation();
        assert_eq!(r.fragmentation_ratio, 1.25);
    }

    #[test]
    fn test_supplied_fragmentation_is_kept() {
        let mut r = BenchResult::new();
        r.total_requested_bytes = 1000;
        r.total_allocated_bytes = 1250;
        r.supply_fragmentation(METRIC_NA);
        r.finalize_fragmentation();
        assert!(is_na(r.fragmentation_ratio));
    }

    #[test]
    fn test_zero_requested_stays_na() {
        let mut r = BenchResult::new();
        r.finalize_fragmentation();
        assert!(is_na(r.fragmentation_ratio));
    }

    #[test]
    fn test_sentinel_serializes_as_null() {
        let mut r = BenchResult::new();
        r.total_ops_per_sec = 123.5;
        let v = serde_json::to_value(&r).unwrap();
        assert!(v["p99_alloc_time_ns"].is_null());
        assert!(v["fragmentation_ratio"].is_null());
        assert_eq!(v["total_ops_per_sec"], 123.5);
        assert_eq!(v["operations"], 0);
        assert!(v.get("fragmentation_supplied").is_none());
    }

    #[test]
    fn test_null_reads_back_as_sentinel() {
        let mut r = BenchResult::new();
        r.avg_alloc_time_ns = 41.75;
        r.operations_count = 2000;
        r.total_time_ms = 0.1 + 0.2;
        let json = serde_json::to_string(&r).unwrap();
        let back: BenchResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
        assert!(is_na(back.min_alloc_time_ns));
    }
}
