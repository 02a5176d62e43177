//! Name -> implementation tables for allocators and benchmarks.
//!
//! Both tables are filled before any run starts and only read afterwards.
//! Registering a name that already exists replaces the entry in place, so
//! the iteration order stays the order of first registration.

use std::sync::Arc;

use tracing::debug;

use crate::backend::Allocator;
use crate::config::RunConfig;
use crate::error::{BenchError, RegistryKind};
use crate::result::BenchResult;

/// A workload generator.
pub type WorkloadFn = fn(&dyn Allocator, &mut BenchResult, &RunConfig) -> Result<(), BenchError>;

#[derive(Clone, Debug)]
pub struct Benchmark {
    pub name: String,
    pub description: String,
    pub run: WorkloadFn,
    pub default_config: RunConfig,
}

impl Benchmark {
    pub fn new(name: impl Into<String>, description: impl Into<String>, run: WorkloadFn) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            run,
            default_config: RunConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.default_config = config;
        self
    }
}

#[derive(Clone, Default)]
pub struct AllocatorRegistry {
    entries: Vec<(String, Arc<dyn Allocator>)>,
}

impl AllocatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the allocator's own name.
    pub fn register(&mut self, alloc: Arc<dyn Allocator>) {
        let name = alloc.name().to_string();
        self.register_as(name, alloc);
    }

    pub fn register_as(&mut self, name: impl Into<String>, alloc: Arc<dyn Allocator>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => {
                debug!(allocator = %name, "replacing registered allocator");
                entry.1 = alloc;
            }
            None => self.entries.push((name, alloc)),
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    pub fn get_index(&self, index: usize) -> Option<(&str, &Arc<dyn Allocator>)> {
        self.entries.get(index).map(|(n, a)| (n.as_str(), a))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Allocator>)> {
        self.entries.iter().map(|(n, a)| (n.as_str(), a))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct BenchmarkRegistry {
    entries: Vec<Benchmark>,
}

impl BenchmarkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, bench: Benchmark) {
        match self.entries.iter_mut().find(|b| b.name == bench.name) {
            Some(entry) => {
                debug!(benchmark = %bench.name, "replacing registered benchmark");
                *entry = bench;
            }
            None => self.entries.push(bench),
        }
    }

    pub fn get(&self, name: &str) -> Result<&Benchmark, BenchError> {
        self.entries
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| BenchError::not_found(RegistryKind::Benchmark, name))
    }

    pub fn get_index(&self, index: usize) -> Option<&Benchmark> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Benchmark> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
