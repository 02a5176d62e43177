//! Persistence and text rendering of results.
//!
//! [`ResultsLog`] is the matrix log: JSON (`benchmark_<stamp>.json`), CSV and
//! a per-benchmark text summary. [`SweepReport`] is the iteration sweep,
//! written as `graph_<benchmark>.json`. Sentinel metrics are `null` in JSON
//! and empty cells in CSV.

use std::fmt::{self, Write as _};
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::BenchError;
use crate::harness::{CellOutcome, CellReport};
use crate::result::{BenchResult, metric};

/// Stamp format used in file names and in the JSON header.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const CSV_HEADER: &str = "benchmark,allocator,total_time_ms,operations,alloc_ops_per_sec,\
free_ops_per_sec,total_ops_per_sec,avg_alloc_time_ns,p99_alloc_time_ns,peak_rss_kb,\
fragmentation_ratio,thread_count";

/// One entry of the JSON log. Failed cells carry `error` and no metrics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub benchmark: String,
    pub allocator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BenchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&CellReport> for LogEntry {
    fn from(cell: &CellReport) -> Self {
        let (metrics, error) = match &cell.outcome {
            CellOutcome::Completed(r) => (Some(r.clone()), None),
            CellOutcome::Failed(e) => (None, Some(e.clone())),
        };
        Self {
            benchmark: cell.benchmark.clone(),
            allocator: cell.allocator.clone(),
            metrics,
            error,
        }
    }
}

impl From<LogEntry> for CellReport {
    fn from(entry: LogEntry) -> Self {
        let outcome = match (entry.metrics, entry.error) {
            (Some(r), _) => CellOutcome::Completed(r),
            (None, e) => CellOutcome::Failed(e.unwrap_or_default()),
        };
        Self {
            benchmark: entry.benchmark,
            allocator: entry.allocator,
            outcome,
        }
    }
}

/// On-disk shape of the JSON log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogDocument {
    pub timestamp: String,
    pub results: Vec<LogEntry>,
}

impl LogDocument {
    pub fn load(path: &Path) -> Result<Self, BenchError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[derive(Clone, Debug)]
pub struct ResultsLog {
    started: DateTime<Local>,
    cells: Vec<CellReport>,
}

impl Default for ResultsLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultsLog {
    pub fn new() -> Self {
        Self::started_at(Local::now())
    }

    pub fn started_at(started: DateTime<Local>) -> Self {
        Self {
            started,
            cells: Vec::new(),
        }
    }

    pub fn timestamp(&self) -> String {
        self.started.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn push(&mut self, cell: CellReport) {
        self.cells.push(cell);
    }

    pub fn cells(&self) -> &[CellReport] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn document(&self) -> LogDocument {
        LogDocument {
            timestamp: self.timestamp(),
            results: self.cells.iter().map(LogEntry::from).collect(),
        }
    }

    /// `<dir>/benchmark_<stamp>.json`; `dir` is created if missing.
    pub fn json_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("benchmark_{}.json", self.timestamp()))
    }

    pub fn write_json(&self, dir: &Path) -> Result<PathBuf, BenchError> {
        fs::create_dir_all(dir)?;
        let path = self.json_path(dir);
        let text = serde_json::to_string_pretty(&self.document())?;
        fs::write(&path, text + "\n")?;
        Ok(path)
    }

    /// One row per completed cell; failed cells are left out.
    pub fn write_csv(&self, path: &Path) -> Result<(), BenchError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        writeln!(file, "{CSV_HEADER}")?;
        for cell in &self.cells {
            if let Some(r) = cell.outcome.result() {
                writeln!(file, "{}", csv_row(&cell.benchmark, &cell.allocator, r))?;
            }
        }
        Ok(())
    }

    /// Per-benchmark lines, grouped in run order.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Total benchmarks run: {}", self.cells.len());
        let mut current: Option<&str> = None;
        for cell in &self.cells {
            if current != Some(cell.benchmark.as_str()) {
                current = Some(&cell.benchmark);
                let _ = writeln!(out, "\n[{}]", cell.benchmark);
            }
            let _ = match &cell.outcome {
                CellOutcome::Completed(r) => writeln!(
                    out,
                    "  {}: {:.3} ms, {} M ops/sec, frag={}",
                    cell.allocator,
                    r.total_time_ms,
                    Fixed(metric(r.total_ops_per_sec).map(|v| v / 1e6), 2),
                    Fixed(metric(r.fragmentation_ratio), 3),
                ),
                CellOutcome::Failed(e) => writeln!(out, "  {}: ERROR ({e})", cell.allocator),
            };
        }
        out
    }
}

fn csv_field(value: f64, precision: usize) -> String {
    metric(value)
        .map(|v| format!("{v:.precision$}"))
        .unwrap_or_default()
}

fn csv_row(benchmark: &str, allocator: &str, r: &BenchResult) -> String {
    format!(
        "{benchmark},{allocator},{:.6},{},{},{},{},{},{},{},{},{}",
        r.total_time_ms,
        r.operations_count,
        csv_field(r.alloc_ops_per_sec, 2),
        csv_field(r.free_ops_per_sec, 2),
        csv_field(r.total_ops_per_sec, 2),
        csv_field(r.avg_alloc_time_ns, 2),
        csv_field(r.p99_alloc_time_ns, 2),
        r.peak_rss_kb,
        csv_field(r.fragmentation_ratio, 6),
        r.thread_count,
    )
}

/// Fixed-precision number, or `n/a` for a missing metric.
struct Fixed(Option<f64>, usize);

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:.*}", self.1, v),
            None => f.write_str("n/a"),
        }
    }
}

/// Detailed block for a single cell, as printed by the CLI.
pub fn render_detail(benchmark: &str, allocator: &str, r: &BenchResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {benchmark} [{allocator}] ===");
    let _ = writeln!(out, "  Total time:        {:.3} ms", r.total_time_ms);
    let _ = writeln!(out, "  Operations:        {}", r.operations_count);
    let rates = [
        ("Alloc ops/sec", r.alloc_ops_per_sec),
        ("Free ops/sec", r.free_ops_per_sec),
        ("Realloc ops/sec", r.realloc_ops_per_sec),
        ("Total ops/sec", r.total_ops_per_sec),
    ];
    for (label, value) in rates {
        if let Some(v) = metric(value) {
            let _ = writeln!(out, "  {:<18} {:.2} M", format!("{label}:"), v / 1e6);
        }
    }
    let latencies = [
        ("Avg alloc time", r.avg_alloc_time_ns),
        ("Min alloc time", r.min_alloc_time_ns),
        ("P50 alloc time", r.p50_alloc_time_ns),
        ("P99 alloc time", r.p99_alloc_time_ns),
        ("Max alloc time", r.max_alloc_time_ns),
    ];
    for (label, value) in latencies {
        if let Some(v) = metric(value) {
            let _ = writeln!(out, "  {:<18} {:.2} ns", format!("{label}:"), v);
        }
    }
    let _ = writeln!(out, "  Peak RSS:          {} KB", r.peak_rss_kb);
    let _ = writeln!(out, "  Threads:           {}", r.thread_count);
    if let Some(ratio) = metric(r.fragmentation_ratio) {
        let _ = writeln!(out, "  Fragmentation:     {ratio:.3}");
    }
    out
}

/// Metrics plotted by the sweep.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepMetric {
    TotalOpsPerSec,
    AllocOpsPerSec,
    FreeOpsPerSec,
    AvgAllocTimeNs,
    PeakRssKb,
}

impl SweepMetric {
    pub const ALL: [SweepMetric; 5] = [
        SweepMetric::TotalOpsPerSec,
        SweepMetric::AllocOpsPerSec,
        SweepMetric::FreeOpsPerSec,
        SweepMetric::AvgAllocTimeNs,
        SweepMetric::PeakRssKb,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SweepMetric::TotalOpsPerSec => "total_ops_per_sec",
            SweepMetric::AllocOpsPerSec => "alloc_ops_per_sec",
            SweepMetric::FreeOpsPerSec => "free_ops_per_sec",
            SweepMetric::AvgAllocTimeNs => "avg_alloc_time_ns",
            SweepMetric::PeakRssKb => "peak_rss_kb",
        }
    }

    /// `None` when the record does not measure this metric.
    pub fn read(self, r: &BenchResult) -> Option<f64> {
        match self {
            SweepMetric::TotalOpsPerSec => metric(r.total_ops_per_sec),
            SweepMetric::AllocOpsPerSec => metric(r.alloc_ops_per_sec),
            SweepMetric::FreeOpsPerSec => metric(r.free_ops_per_sec),
            SweepMetric::AvgAllocTimeNs => metric(r.avg_alloc_time_ns),
            SweepMetric::PeakRssKb => Some(r.peak_rss_kb as f64),
        }
    }
}

/// Results of one benchmark across iteration counts, per allocator.
#[derive(Clone, Debug)]
pub struct SweepReport {
    pub benchmark: String,
    pub iterations: Vec<usize>,
    pub allocators: Vec<String>,
    /// `[allocator][point]`; `None` where the run failed.
    results: Vec<Vec<Option<BenchResult>>>,
}

impl SweepReport {
    pub fn new(benchmark: impl Into<String>, iterations: Vec<usize>, allocators: Vec<String>) -> Self {
        let results = vec![vec![None; iterations.len()]; allocators.len()];
        Self {
            benchmark: benchmark.into(),
            iterations,
            allocators,
            results,
        }
    }

    pub fn record(&mut self, allocator: usize, point: usize, result: Option<BenchResult>) {
        self.results[allocator][point] = result;
    }

    pub fn result(&self, allocator: usize, point: usize) -> Option<&BenchResult> {
        self.results.get(allocator)?.get(point)?.as_ref()
    }

    pub fn series(&self, metric: SweepMetric, allocator: usize) -> Vec<Option<f64>> {
        (0..self.iterations.len())
            .map(|p| self.result(allocator, p).and_then(|r| metric.read(r)))
            .collect()
    }

    pub fn to_json(&self) -> Value {
        let mut metrics = Map::new();
        for m in SweepMetric::ALL {
            let per_alloc: Map<String, Value> = self
                .allocators
                .iter()
                .enumerate()
                .map(|(a, name)| (name.clone(), json!(self.series(m, a))))
                .collect();
            metrics.insert(m.name().to_string(), Value::Object(per_alloc));
        }
        json!({
            "mode": "graph",
            "benchmark": self.benchmark,
            "iterations": self.iterations,
            "allocators": self.allocators,
            "metrics": metrics,
        })
    }

    pub fn json_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("graph_{}.json", self.benchmark))
    }

    pub fn write_json(&self, dir: &Path) -> Result<PathBuf, BenchError> {
        fs::create_dir_all(dir)?;
        let path = self.json_path(dir);
        fs::write(&path, serde_json::to_string_pretty(&self.to_json())? + "\n")?;
        Ok(path)
    }

    /// Iterations down the side, one column of M ops/sec per allocator.
    pub fn table(&self) -> String {
        let mut out = format!("{:<12}", "Iterations");
        for name in &self.allocators {
            let _ = write!(out, "{name:>15}");
        }
        out.push('\n');
        for (p, iterations) in self.iterations.iter().enumerate() {
            let _ = write!(out, "{iterations:<12}");
            for a in 0..self.allocators.len() {
                match self.result(a, p) {
                    Some(r) => {
                        let ops = Fixed(metric(r.total_ops_per_sec).map(|v| v / 1e6), 2);
                        let _ = write!(out, "{:>15}", format!("{ops}M"));
                    }
                    None => {
                        let _ = write!(out, "{:>15}", "ERROR");
                    }
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::METRIC_NA;
    use chrono::TimeZone;

    fn completed(ops: f64) -> BenchResult {
        let mut r = BenchResult::new();
        r.total_time_ms = 1.5;
        r.operations_count = 2000;
        r.total_ops_per_sec = ops;
        r.alloc_ops_per_sec = ops;
        r.fragmentation_ratio = 1.25;
        r
    }

    fn log() -> ResultsLog {
        let stamp = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let mut log = ResultsLog::started_at(stamp);
        log.push(CellReport {
            benchmark: "sequential_alloc".into(),
            allocator: "system".into(),
            outcome: CellOutcome::Completed(completed(2.5e6)),
        });
        log.push(CellReport {
            benchmark: "sequential_alloc".into(),
            allocator: "broken".into(),
            outcome: CellOutcome::Failed("allocate of 8 bytes failed".into()),
        });
        log
    }

    #[test]
    fn test_json_path_uses_timestamp() {
        let path = log().json_path(Path::new("out"));
        assert_eq!(path, Path::new("out").join("benchmark_20240309_140507.json"));
    }

    #[test]
    fn test_document_shape() {
        let value = serde_json::to_value(log().document()).unwrap();
        assert_eq!(value["timestamp"], "20240309_140507");
        let ok = &value["results"][0];
        assert_eq!(ok["metrics"]["operations"], 2000);
        assert!(ok["metrics"]["p99_alloc_time_ns"].is_null());
        assert!(ok.get("error").is_none());
        let failed = &value["results"][1];
        assert!(failed.get("metrics").is_none());
        assert_eq!(failed["error"], "allocate of 8 bytes failed");
    }

    #[test]
    fn test_csv_row_blanks_sentinels() {
        let mut r = completed(1e6);
        r.fragmentation_ratio = METRIC_NA;
        let row = csv_row("b", "a", &r);
        let fields: Vec<_> = row.split(',').collect();
        assert_eq!(fields.len(), CSV_HEADER.split(',').count());
        assert_eq!(fields[4], "1000000.00");
        assert_eq!(fields[5], "");
        assert_eq!(fields[10], "");
    }

    #[test]
    fn test_summary_lists_failures() {
        let text = log().summary();
        assert!(text.contains("Total benchmarks run: 2"));
        assert!(text.contains("[sequential_alloc]"));
        assert!(text.contains("system: 1.500 ms, 2.50 M ops/sec, frag=1.250"));
        assert!(text.contains("broken: ERROR"));
    }

    #[test]
    fn test_detail_skips_unmeasured() {
        let text = render_detail("b", "a", &completed(3e6));
        assert!(text.contains("Total ops/sec:"));
        assert!(!text.contains("Realloc ops/sec"));
        assert!(!text.contains("P99"));
        assert!(text.contains("Fragmentation:     1.250"));
    }

    #[test]
    fn test_sweep_json_has_gaps() {
        let mut sweep = SweepReport::new("larson", vec![1000, 5000], vec!["system".into()]);
        sweep.record(0, 0, Some(completed(4e6)));
        let value = sweep.to_json();
        assert_eq!(value["mode"], "graph");
        assert_eq!(value["iterations"], json!([1000, 5000]));
        let series = &value["metrics"]["total_ops_per_sec"]["system"];
        assert_eq!(series[0], 4e6);
        assert!(series[1].is_null());
        // unmeasured metric is null even where the run succeeded
        assert!(value["metrics"]["alloc_ops_per_sec"]["system"][0].is_number());
        assert!(value["metrics"]["free_ops_per_sec"]["system"][0].is_null());
        assert!(sweep.table().contains("ERROR"));
    }
}
