//! Latency distributions, rates and per-thread tallies.
//!
//! Latencies are collected as raw nanosecond samples in a buffer reserved
//! before timing starts, then sorted once. Percentiles use the nearest-rank
//! rule `sorted[floor(p * n)]` with no interpolation. Anything that would
//! divide by a zero count or a zero duration yields [`METRIC_NA`] instead.

use crate::error::{BenchError, bookkeeping};
use crate::result::METRIC_NA;

/// Raw per-operation latencies for one run.
#[derive(Debug, Default)]
pub struct LatencySamples {
    samples: Vec<u64>,
    total_ns: u64,
}

impl LatencySamples {
    /// Reserve room for `capacity` samples up front so that recording never
    /// reallocates inside a measured loop.
    pub fn with_capacity(capacity: usize) -> Result<Self, BenchError> {
        Ok(Self {
            samples: bookkeeping(capacity)?,
            total_ns: 0,
        })
    }

    #[inline]
    pub fn record(&mut self, ns: u64) {
        self.samples.push(ns);
        self.total_ns = self.total_ns.saturating_add(ns);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn total_ns(&self) -> u64 {
        self.total_ns
    }

    /// Sort and reduce to a [`LatencySummary`].
    pub fn summarize(mut self) -> LatencySummary {
        let n = self.samples.len();
        if n == 0 {
            return LatencySummary::not_applicable();
        }
        self.samples.sort_unstable();
        LatencySummary {
            count: n as u64,
            avg_ns: self.total_ns as f64 / n as f64,
            min_ns: self.samples[0] as f64,
            max_ns: self.samples[n - 1] as f64,
            p50_ns: nearest_rank(&self.samples, 0.50) as f64,
            p99_ns: nearest_rank(&self.samples, 0.99) as f64,
        }
    }
}

/// `sorted[floor(p * n)]`, clamped to the last element. `sorted` must be
/// non-empty and ascending.
pub fn nearest_rank(sorted: &[u64], p: f64) -> u64 {
    let idx = ((sorted.len() as f64) * p) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatencySummary {
    pub count: u64,
    pub avg_ns: f64,
    pub min_ns: f64,
    pub max_ns: f64,
    pub p50_ns: f64,
    pub p99_ns: f64,
}

impl LatencySummary {
    pub fn not_applicable() -> Self {
        Self {
            count: 0,
            avg_ns: METRIC_NA,
            min_ns: METRIC_NA,
            max_ns: METRIC_NA,
            p50_ns: METRIC_NA,
            p99_ns: METRIC_NA,
        }
    }
}

/// Mean nanoseconds per operation, or the sentinel when nothing ran.
#[inline]
pub fn mean_ns(total_ns: u64, count: u64) -> f64 {
    if count == 0 {
        METRIC_NA
    } else {
        total_ns as f64 / count as f64
    }
}

/// Operations per second over `ns` nanoseconds, or the sentinel when either
/// side is zero.
#[inline]
pub fn per_second(count: u64, ns: u64) -> f64 {
    if count == 0 || ns == 0 {
        METRIC_NA
    } else {
        count as f64 * 1e9 / ns as f64
    }
}

/// What one worker did, summed into the headline figures after join.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThreadTally {
    pub allocs: u64,
    pub frees: u64,
    pub alloc_ns: u64,
    pub free_ns: u64,
    pub requested_bytes: u64,
    pub consumed_bytes: u64,
}

impl ThreadTally {
    pub fn merge(&mut self, other: &ThreadTally) {
        self.allocs += other.allocs;
        self.frees += other.frees;
        self.alloc_ns = self.alloc_ns.saturating_add(other.alloc_ns);
        self.free_ns = self.free_ns.saturating_add(other.free_ns);
        self.requested_bytes += other.requested_bytes;
        self.consumed_bytes += other.consumed_bytes;
    }

    pub fn operations(&self) -> u64 {
        self.allocs + self.frees
    }
}

impl<'a> std::iter::Sum<&'a ThreadTally> for ThreadTally {
    fn sum<I: Iterator<Item = &'a ThreadTally>>(iter: I) -> Self {
        let mut total = ThreadTally::default();
        for tally in iter {
            total.merge(tally);
        }
        total
    }
}
