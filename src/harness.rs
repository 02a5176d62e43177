//! Batch execution across the allocator x benchmark matrix.
//!
//! A [`Harness`] owns both registries and the memory sampler for a session.
//! Nothing is global, so independent sessions (in tests, say) can coexist.
//!
//! One cell runs as: validate the config, reset the sampler, start the outer
//! timer, run the generator, stop the timer, sample memory, finalize the
//! fragmentation ratio. A cell that fails yields a [`CellOutcome::Failed`],
//! never a zeroed record, and the matrix moves on.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::{self, Allocator};
use crate::config::RunConfig;
use crate::error::{BenchError, RegistryKind};
use crate::registry::{AllocatorRegistry, Benchmark, BenchmarkRegistry};
use crate::report::SweepReport;
use crate::result::BenchResult;
use crate::sampler::{MemorySampler, ProcessSampler};
use crate::timer::Timer;
use crate::workloads;

/// Where an allocator is in its init/cleanup lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// `init` not called yet.
    Pending,
    Ready,
    /// `init` failed; the allocator is skipped for the rest of the session.
    Failed(String),
    /// `cleanup` has run.
    Closed,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CellOutcome {
    Completed(BenchResult),
    Failed(String),
}

impl CellOutcome {
    pub fn result(&self) -> Option<&BenchResult> {
        match self {
            CellOutcome::Completed(r) => Some(r),
            CellOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CellOutcome::Failed(_))
    }
}

impl From<Result<BenchResult, BenchError>> for CellOutcome {
    fn from(outcome: Result<BenchResult, BenchError>) -> Self {
        match outcome {
            Ok(r) => CellOutcome::Completed(r),
            Err(e) => CellOutcome::Failed(e.to_string()),
        }
    }
}

/// One (benchmark, allocator) cell of a matrix run.
#[derive(Clone, Debug, PartialEq)]
pub struct CellReport {
    pub benchmark: String,
    pub allocator: String,
    pub outcome: CellOutcome,
}

pub struct Harness {
    allocators: AllocatorRegistry,
    benchmarks: BenchmarkRegistry,
    lifecycle: Vec<Lifecycle>,
    sampler: Box<dyn MemorySampler>,
}

impl Harness {
    pub fn new(allocators: AllocatorRegistry, benchmarks: BenchmarkRegistry) -> Self {
        let lifecycle = vec![Lifecycle::Pending; allocators.len()];
        Self {
            allocators,
            benchmarks,
            lifecycle,
            sampler: Box::new(ProcessSampler::new()),
        }
    }

    /// Every compiled-in backend and every built-in workload.
    pub fn with_builtin() -> Self {
        let mut allocators = AllocatorRegistry::new();
        for alloc in backend::builtin() {
            allocators.register(alloc);
        }
        let mut benchmarks = BenchmarkRegistry::new();
        workloads::register_builtin(&mut benchmarks);
        Self::new(allocators, benchmarks)
    }

    pub fn with_sampler(mut self, sampler: impl MemorySampler + 'static) -> Self {
        self.sampler = Box::new(sampler);
        self
    }

    pub fn allocators(&self) -> &AllocatorRegistry {
        &self.allocators
    }

    pub fn benchmarks(&self) -> &BenchmarkRegistry {
        &self.benchmarks
    }

    pub fn lifecycle(&self, allocator: &str) -> Option<&Lifecycle> {
        self.allocators.index_of(allocator).map(|i| &self.lifecycle[i])
    }

    /// Run one cell. `config` overrides the benchmark's default.
    pub fn run_single(
        &mut self,
        allocator: &str,
        benchmark: &str,
        config: Option<&RunConfig>,
    ) -> Result<BenchResult, BenchError> {
        let a = self
            .allocators
            .index_of(allocator)
            .ok_or_else(|| BenchError::not_found(RegistryKind::Allocator, allocator))?;
        let bench = self.benchmarks.get(benchmark)?.clone();
        self.run_cell(a, &bench, config)
    }

    /// Run every selected benchmark against every selected allocator,
    /// benchmark-major. Empty selections mean "all".
    ///
    /// Unknown names are rejected before anything runs; after that, failures
    /// are recorded per cell and never stop the matrix.
    pub fn run_matrix(
        &mut self,
        allocators: &[String],
        benchmarks: &[String],
        config: Option<&RunConfig>,
    ) -> Result<Vec<CellReport>, BenchError> {
        let alloc_ids = self.select_allocators(allocators)?;
        let benches: Vec<Benchmark> = if benchmarks.is_empty() {
            self.benchmarks.iter().cloned().collect()
        } else {
            benchmarks
                .iter()
                .map(|name| self.benchmarks.get(name).cloned())
                .collect::<Result<_, _>>()?
        };

        let mut reports = Vec::with_capacity(alloc_ids.len() * benches.len());
        for bench in &benches {
            for &a in &alloc_ids {
                let outcome = CellOutcome::from(self.run_cell(a, bench, config));
                reports.push(CellReport {
                    benchmark: bench.name.clone(),
                    allocator: self.allocator_name(a),
                    outcome,
                });
            }
        }
        Ok(reports)
    }

    /// Re-run one benchmark at each iteration count in `points`, for every
    /// allocator (or only `allocator`). Failed points are kept as gaps.
    pub fn sweep(
        &mut self,
        benchmark: &str,
        points: &[usize],
        base: &RunConfig,
        allocator: Option<&str>,
    ) -> Result<SweepReport, BenchError> {
        let bench = self.benchmarks.get(benchmark)?.clone();
        let selection: Vec<String> = allocator.into_iter().map(str::to_string).collect();
        let alloc_ids = self.select_allocators(&selection)?;
        let names = alloc_ids.iter().map(|&a| self.allocator_name(a)).collect();

        let mut report = SweepReport::new(benchmark, points.to_vec(), names);
        for (p, &iterations) in points.iter().enumerate() {
            let cfg = base.with_iterations(iterations);
            for (slot, &a) in alloc_ids.iter().enumerate() {
                let outcome = CellOutcome::from(self.run_cell(a, &bench, Some(&cfg)));
                report.record(slot, p, outcome.result().cloned());
            }
        }
        Ok(report)
    }

    /// Call `cleanup` on every allocator that was initialized. Idempotent.
    pub fn shutdown(&mut self) {
        for (i, (name, alloc)) in self.allocators.iter().enumerate() {
            if self.lifecycle[i] == Lifecycle::Ready {
                debug!(allocator = name, "cleanup");
                alloc.cleanup();
                self.lifecycle[i] = Lifecycle::Closed;
            }
        }
    }

    fn select_allocators(&self, names: &[String]) -> Result<Vec<usize>, BenchError> {
        if names.is_empty() {
            return Ok((0..self.allocators.len()).collect());
        }
        names
            .iter()
            .map(|name| {
                self.allocators
                    .index_of(name)
                    .ok_or_else(|| BenchError::not_found(RegistryKind::Allocator, name))
            })
            .collect()
    }

    fn allocator_name(&self, index: usize) -> String {
        self.allocators
            .get_index(index)
            .map(|(name, _)| name.to_string())
            .unwrap_or_default()
    }

    /// Initialize the allocator on first use.
    fn ensure_ready(&mut self, index: usize) -> Result<Arc<dyn Allocator>, BenchError> {
        let Some((name, alloc)) = self.allocators.get_index(index) else {
            return Err(BenchError::not_found(RegistryKind::Allocator, &index.to_string()));
        };
        let failed = |reason: &str| BenchError::InitFailed {
            allocator: name.to_string(),
            reason: reason.to_string(),
        };
        match &self.lifecycle[index] {
            Lifecycle::Ready => return Ok(Arc::clone(alloc)),
            Lifecycle::Failed(reason) => return Err(failed(reason)),
            Lifecycle::Closed => return Err(failed("already cleaned up")),
            Lifecycle::Pending => {}
        }
        match alloc.init() {
            Ok(()) => {
                debug!(allocator = name, "initialized");
                let alloc = Arc::clone(alloc);
                self.lifecycle[index] = Lifecycle::Ready;
                Ok(alloc)
            }
            Err(reason) => {
                warn!(allocator = name, %reason, "init failed, skipping allocator");
                let err = failed(&reason);
                self.lifecycle[index] = Lifecycle::Failed(reason);
                Err(err)
            }
        }
    }

    fn run_cell(
        &mut self,
        index: usize,
        bench: &Benchmark,
        config: Option<&RunConfig>,
    ) -> Result<BenchResult, BenchError> {
        let cfg = config.copied().unwrap_or(bench.default_config);
        let alloc = match self.ensure_ready(index) {
            Ok(alloc) => alloc,
            Err(e) => {
                warn!(benchmark = %bench.name, error = %e, "cell skipped");
                return Err(e);
            }
        };
        debug!(
            allocator = alloc.name(),
            benchmark = %bench.name,
            iterations = cfg.iterations,
            "running cell"
        );
        match execute(self.sampler.as_mut(), alloc.as_ref(), bench, &cfg) {
            Ok(result) => {
                info!(
                    allocator = alloc.name(),
                    benchmark = %bench.name,
                    ops_per_sec = result.total_ops_per_sec,
                    time_ms = result.total_time_ms,
                    "cell complete"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(allocator = alloc.name(), benchmark = %bench.name, error = %e, "cell failed");
                Err(e)
            }
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Run one generator with the standard framing around it.
pub fn execute(
    sampler: &mut dyn MemorySampler,
    alloc: &dyn Allocator,
    bench: &Benchmark,
    cfg: &RunConfig,
) -> Result<BenchResult, BenchError> {
    cfg.validate()?;
    let mut result = BenchResult::new();

    sampler.reset();
    let mut timer = Timer::new();
    timer.start();
    let outcome = (bench.run)(alloc, &mut result, cfg);
    let elapsed_ns = timer.stop();
    outcome?;

    result.total_time_ms = elapsed_ns as f64 / 1e6;
    let memory = sampler.sample();
    result.peak_rss_kb = memory.peak_kb;
    result.current_rss_kb = memory.current_kb;
    result.finalize_fragmentation();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SystemAllocator, TrackingAllocator};
    use crate::result::is_na;
    use crate::sampler::MemorySample;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSampler(u64);

    impl MemorySampler for FixedSampler {
        fn reset(&mut self) {}
        fn sample(&mut self) -> MemorySample {
            MemorySample {
                peak_kb: self.0,
                current_kb: self.0 / 2,
            }
        }
    }

    fn ok_bench(_: &dyn Allocator, r: &mut BenchResult, _: &RunConfig) -> Result<(), BenchError> {
        r.operations_count = 10;
        r.total_requested_bytes = 100;
        r.total_allocated_bytes = 150;
        Ok(())
    }

    fn failing_bench(a: &dyn Allocator, _: &mut BenchResult, _: &RunConfig) -> Result<(), BenchError> {
        Err(BenchError::allocation_failed(a, backend::AllocOp::Allocate, 8))
    }

    /// Counts lifecycle hook calls; `init` fails when asked to.
    struct Hooked {
        name: &'static str,
        fail_init: bool,
        inits: AtomicUsize,
        cleanups: AtomicUsize,
    }

    impl Hooked {
        fn new(name: &'static str, fail_init: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail_init,
                inits: AtomicUsize::new(0),
                cleanups: AtomicUsize::new(0),
            })
        }
    }

    impl Allocator for Hooked {
        fn name(&self) -> &str {
            self.name
        }
        fn allocate(&self, size: usize) -> Option<std::ptr::NonNull<u8>> {
            SystemAllocator.allocate(size)
        }
        fn zeroed_allocate(&self, count: usize, size: usize) -> Option<std::ptr::NonNull<u8>> {
            SystemAllocator.zeroed_allocate(count, size)
        }
        unsafe fn reallocate(&self, ptr: std::ptr::NonNull<u8>, size: usize) -> Option<std::ptr::NonNull<u8>> {
            unsafe { SystemAllocator.reallocate(ptr, size) }
        }
        unsafe fn release(&self, ptr: std::ptr::NonNull<u8>) {
            unsafe { SystemAllocator.release(ptr) }
        }
        fn aligned_allocate(&self, alignment: usize, size: usize) -> Option<std::ptr::NonNull<u8>> {
            SystemAllocator.aligned_allocate(alignment, size)
        }
        unsafe fn aligned_release(&self, ptr: std::ptr::NonNull<u8>) {
            unsafe { SystemAllocator.aligned_release(ptr) }
        }
        fn init(&self) -> Result<(), String> {
            self.inits.fetch_add(1, Ordering::Relaxed);
            if self.fail_init { Err("no arena".into()) } else { Ok(()) }
        }
        fn cleanup(&self) {
            self.cleanups.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn system() -> Arc<dyn Allocator> {
        Arc::new(SystemAllocator)
    }

    fn harness(allocs: Vec<Arc<dyn Allocator>>) -> Harness {
        let mut allocators = AllocatorRegistry::new();
        for a in allocs {
            allocators.register(a);
        }
        let mut benchmarks = BenchmarkRegistry::new();
        benchmarks.register(Benchmark::new("ok", "ok", ok_bench));
        benchmarks.register(Benchmark::new("boom", "fails", failing_bench));
        Harness::new(allocators, benchmarks).with_sampler(FixedSampler(64))
    }

    #[test]
    fn test_single_cell_is_finalized() {
        let mut h = harness(vec![system()]);
        let r = h.run_single("system", "ok", None).unwrap();
        assert_eq!(r.operations_count, 10);
        assert_eq!(r.fragmentation_ratio, 1.5);
        assert_eq!((r.peak_rss_kb, r.current_rss_kb), (64, 32));
        assert!(r.total_time_ms >= 0.0);
    }

    #[test]
    fn test_lookup_failures() {
        let mut h = harness(vec![system()]);
        assert!(h.run_single("nope", "ok", None).unwrap_err().is_not_found());
        assert!(h.run_single("system", "nope", None).unwrap_err().is_not_found());
        assert!(h.run_matrix(&["nope".into()], &[], None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_invalid_config_fails_cell() {
        let mut h = harness(vec![system()]);
        let cfg = RunConfig::default().with_size_range(64, 8);
        let err = h.run_single("system", "ok", Some(&cfg)).unwrap_err();
        assert!(matches!(err, BenchError::InvalidConfig(_)));
    }

    #[test]
    fn test_matrix_isolates_failures() {
        let tracked: Arc<dyn Allocator> =
            Arc::new(TrackingAllocator::named("tracked", SystemAllocator));
        let mut h = harness(vec![system(), tracked]);
        let cells = h.run_matrix(&[], &[], None).unwrap();
        assert_eq!(cells.len(), 4);
        let failed: Vec<_> = cells
            .iter()
            .filter(|c| c.outcome.is_failed())
            .map(|c| (c.benchmark.as_str(), c.allocator.as_str()))
            .collect();
        assert_eq!(failed, vec![("boom", "system"), ("boom", "tracked")]);
        assert!(cells[0].outcome.result().is_some());
    }

    #[test]
    fn test_lifecycle_hooks_run_once() {
        let good = Hooked::new("good", false);
        let bad = Hooked::new("bad", true);
        {
            let mut h = harness(vec![good.clone() as Arc<dyn Allocator>, bad.clone()]);
            let cells = h.run_matrix(&[], &["ok".into(), "ok".into()], None).unwrap();
            assert_eq!(cells.len(), 4);
            assert!(cells.iter().all(|c| c.outcome.is_failed() == (c.allocator == "bad")));
            assert_eq!(h.lifecycle("good"), Some(&Lifecycle::Ready));
            assert!(matches!(h.lifecycle("bad"), Some(Lifecycle::Failed(_))));
        }
        assert_eq!(good.inits.load(Ordering::Relaxed), 1);
        assert_eq!(good.cleanups.load(Ordering::Relaxed), 1);
        assert_eq!(bad.inits.load(Ordering::Relaxed), 1);
        assert_eq!(bad.cleanups.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_sweep_keeps_failed_points_as_gaps() {
        let mut h = harness(vec![system()]);
        let report = h.sweep("ok", &[10, 20], &RunConfig::default(), None).unwrap();
        assert_eq!(report.iterations, vec![10, 20]);
        assert!(report.result(0, 1).is_some());

        let report = h.sweep("boom", &[10], &RunConfig::default(), Some("system")).unwrap();
        assert!(report.result(0, 0).is_none());
    }

    #[test]
    fn test_builtin_session_runs_real_workload() {
        let mut h = Harness::with_builtin().with_sampler(FixedSampler(0));
        let cfg = RunConfig::default().with_iterations(1000);
        let r = h.run_single("system", "sequential_alloc", Some(&cfg)).unwrap();
        assert_eq!(r.operations_count, 2000);
        assert!(!is_na(r.fragmentation_ratio));
        assert!(r.fragmentation_ratio >= 1.0);
    }
}
