//! Process resident-memory sampling.
//!
//! The harness resets a sampler before each cell and samples it once after,
//! so the OS query is paid twice per run, never per operation. Readings are
//! reported relative to the baseline captured by `reset`, and the running
//! peak only grows until the next `reset`.

cfg_if::cfg_if! {
    if #[cfg(any(target_os = "linux", target_os = "android"))] {
        mod linux;
        use linux as os;
    } else if #[cfg(unix)] {
        mod unix;
        use unix as os;
    } else {
        mod fallback;
        use fallback as os;
    }
}

/// Usage above the last baseline, in KiB.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemorySample {
    pub peak_kb: u64,
    pub current_kb: u64,
}

pub trait MemorySampler: Send {
    /// Capture a new baseline and restart peak tracking from it.
    fn reset(&mut self);
    /// Usage above the baseline; folds the current reading into the peak.
    fn sample(&mut self) -> MemorySample;
}

/// Current resident set size of this process in KiB, if the OS exposes it.
pub fn current_rss_kb() -> Option<u64> {
    os::current_rss_kb()
}

type RssSource = Box<dyn FnMut() -> Option<u64> + Send>;

/// [`MemorySampler`] over the OS resident-set counter.
pub struct ProcessSampler {
    source: RssSource,
    baseline_kb: u64,
    peak_kb: u64,
}

impl Default for ProcessSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSampler {
    pub fn new() -> Self {
        Self::with_source(current_rss_kb)
    }

    /// Sample from an arbitrary reading source instead of the OS.
    pub fn with_source(source: impl FnMut() -> Option<u64> + Send + 'static) -> Self {
        let mut sampler = Self {
            source: Box::new(source),
            baseline_kb: 0,
            peak_kb: 0,
        };
        sampler.reset();
        sampler
    }

    fn read(&mut self) -> u64 {
        // An unreadable counter reads as the baseline, i.e. zero growth.
        (self.source)().unwrap_or(self.baseline_kb)
    }
}

impl MemorySampler for ProcessSampler {
    fn reset(&mut self) {
        let now = (self.source)().unwrap_or(0);
        self.baseline_kb = now;
        self.peak_kb = now;
    }

    fn sample(&mut self) -> MemorySample {
        let current = self.read();
        self.peak_kb = self.peak_kb.max(current);
        MemorySample {
            peak_kb: self.peak_kb.saturating_sub(self.baseline_kb),
            current_kb: current.saturating_sub(self.baseline_kb),
        }
    }
}
