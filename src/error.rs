//! Error type shared by the whole engine.
//!
//! Failures are scoped to a single (allocator, benchmark) cell. The harness
//! records them and moves on; nothing in here is fatal to the process.

use std::fmt;

use thiserror::Error;

use crate::backend::{AllocOp, Allocator};

/// Which registry a failed lookup went to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryKind {
    Allocator,
    Benchmark,
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryKind::Allocator => f.write_str("allocator"),
            RegistryKind::Benchmark => f.write_str("benchmark"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BenchError {
    /// The allocator under test returned null in the middle of a run.
    #[error("{op} of {size} bytes failed in allocator `{allocator}`")]
    AllocationFailed {
        allocator: String,
        op: AllocOp,
        size: usize,
    },
    /// The generator could not reserve its own bookkeeping buffers.
    #[error("workload setup failed: {0}")]
    Setup(String),
    #[error("{kind} `{name}` is not registered")]
    NotFound { kind: RegistryKind, name: String },
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),
    #[error("allocator `{allocator}` failed to initialize: {reason}")]
    InitFailed { allocator: String, reason: String },
    #[error("worker thread {index} panicked")]
    WorkerPanicked { index: usize },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl BenchError {
    pub fn allocation_failed(allocator: &dyn Allocator, op: AllocOp, size: usize) -> Self {
        BenchError::AllocationFailed {
            allocator: allocator.name().to_string(),
            op,
            size,
        }
    }

    pub fn not_found(kind: RegistryKind, name: &str) -> Self {
        BenchError::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    /// Lookup failures are configuration mistakes, not run failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BenchError::NotFound { .. })
    }
}

/// Reserve a bookkeeping buffer of exactly `len` slots without aborting on OOM.
pub(crate) fn bookkeeping<T>(len: usize) -> Result<Vec<T>, BenchError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|e| BenchError::Setup(format!("cannot reserve {len} slots: {e}")))?;
    Ok(buf)
}
