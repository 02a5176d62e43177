//! allocbench: throughput, latency and fragmentation benchmarks for pluggable
//! memory allocators.
//!
//! The engine has four layers:
//! - Backends behind the [`Allocator`] contract (system, plus optional
//!   mimalloc/jemalloc)
//! - Workload generators, one function per allocation pattern
//! - Statistics: nearest-rank percentiles, rates, per-thread tallies
//! - A [`Harness`] session that runs the allocator x benchmark matrix
//!
//! # Usage
//!
//! ```no_run
//! use allocbench::{Harness, RunConfig};
//!
//! let mut harness = Harness::with_builtin();
//! let cfg = RunConfig::default().with_iterations(100_000);
//! let result = harness.run_single("system", "sequential_alloc", Some(&cfg))?;
//! println!("{:.2} M ops/sec", result.total_ops_per_sec / 1e6);
//! # Ok::<(), allocbench::BenchError>(())
//! ```

#[macro_use]
pub mod macros;

pub mod backend;
pub mod config;
pub mod containers;
pub mod error;
pub mod harness;
pub mod registry;
pub mod report;
pub mod result;
pub mod rng;
pub mod sampler;
pub mod size_class;
pub mod stats;
pub mod timer;
pub mod workloads;

pub use backend::{Allocator, SystemAllocator, TrackingAllocator};
pub use config::{RunConfig, Settings};
pub use error::BenchError;
pub use harness::{CellOutcome, CellReport, Harness};
pub use registry::{AllocatorRegistry, Benchmark, BenchmarkRegistry};
pub use report::{ResultsLog, SweepReport};
pub use result::{BenchResult, METRIC_NA};
