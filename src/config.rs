//! Run configuration and file-based settings.
//!
//! A [`RunConfig`] fully determines the decision sequence a workload
//! generates. [`Settings`] is the optional TOML file the CLI reads; every
//! section is defaulted so a partial file is fine:
//!
//! ```toml
//! output_dir = "results"
//! allocators = ["system", "mimalloc"]
//! csv = true
//!
//! [run]
//! iterations = 100000
//! min_size = 16
//! max_size = 1024
//! seed = 7
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BenchError;

/// Upper bound on worker threads for the threaded family.
pub const MAX_THREADS: usize = 16;

/// Iteration counts used by the sweep ("graph") mode.
pub const SWEEP_ITERATIONS: [usize; 9] = [
    1000, 5000, 10000, 25000, 50000, 100000, 250000, 500000, 1000000,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub iterations: usize,
    /// Smallest request size, inclusive.
    pub min_size: usize,
    /// Largest request size, inclusive.
    pub max_size: usize,
    pub thread_count: usize,
    pub seed: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            iterations: 1_000_000,
            min_size: 8,
            max_size: 4096,
            thread_count: 1,
            seed: 42,
        }
    }
}

impl RunConfig {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_threads(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_size_range(mut self, min_size: usize, max_size: usize) -> Self {
        self.min_size = min_size;
        self.max_size = max_size;
        self
    }

    /// Zero iterations is allowed (it produces a record full of sentinels);
    /// an inverted size range is not.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.min_size > self.max_size {
            return Err(BenchError::InvalidConfig(format!(
                "min_size ({}) is greater than max_size ({})",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }

    /// Thread count clamped to `1..=MAX_THREADS`.
    pub fn effective_threads(&self) -> usize {
        self.thread_count.clamp(1, MAX_THREADS)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output_dir: PathBuf,
    /// Only run these allocators (empty = all registered).
    pub allocators: Vec<String>,
    /// Only run these benchmarks (empty = all registered).
    pub benchmarks: Vec<String>,
    /// Also write a CSV next to the JSON log.
    pub csv: bool,
    pub run: RunConfig,
    pub sweep_iterations: Vec<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("results"),
            allocators: Vec::new(),
            benchmarks: Vec::new(),
            csv: false,
            run: RunConfig::default(),
            sweep_iterations: SWEEP_ITERATIONS.to_vec(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self, BenchError> {
        let settings: Settings = toml::from_str(text)?;
        settings.run.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, BenchError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn wants_allocator(&self, name: &str) -> bool {
        self.allocators.is_empty() || self.allocators.iter().any(|a| a == name)
    }

    pub fn wants_benchmark(&self, name: &str) -> bool {
        self.benchmarks.is_empty() || self.benchmarks.iter().any(|b| b == name)
    }
}
