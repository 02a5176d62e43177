//! High-resolution interval timer.
//!
//! Backed by [`quanta::Clock`]: on x86/x86_64 with an invariant TSC it reads
//! the cycle counter and scales to nanoseconds with a factor calibrated once
//! per process; elsewhere it falls back to the OS monotonic clock. Either way
//! a start/stop pair costs tens of nanoseconds, which is what lets the
//! generators time every single allocation.
//!
//! A `Timer` is owned by one thread. Workers in the threaded family each make
//! their own.

use quanta::Clock;

#[derive(Clone, Debug)]
pub struct Timer {
    clock: Clock,
    start: u64,
    running: bool,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            clock: Clock::new(),
            start: 0,
            running: false,
        }
    }

    /// Capture the reference point.
    #[inline(always)]
    pub fn start(&mut self) {
        self.running = true;
        self.start = self.clock.raw();
    }

    /// Nanoseconds since `start` without stopping. Zero when idle.
    #[inline(always)]
    pub fn elapsed_ns(&self) -> u64 {
        if !self.running {
            return 0;
        }
        let now = self.clock.raw();
        self.clock.delta(self.start, now).as_nanos() as u64
    }

    /// Nanoseconds since `start`; the timer goes idle.
    #[inline(always)]
    pub fn stop(&mut self) -> u64 {
        let now = self.clock.raw();
        if !self.running {
            return 0;
        }
        self.running = false;
        self.clock.delta(self.start, now).as_nanos() as u64
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_idle_timer_reads_zero() {
        let mut timer = Timer::new();
        assert_eq!(timer.elapsed_ns(), 0);
        assert_eq!(timer.stop(), 0);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_measures_sleep() {
        let mut timer = Timer::new();
        timer.start();
        std::thread::sleep(Duration::from_millis(5));
        let ns = timer.stop();
        assert!(ns >= 4_000_000, "measured only {ns} ns");
        assert!(!timer.is_running());
    }

    #[test]
    fn test_elapsed_does_not_stop() {
        let mut timer = Timer::new();
        timer.start();
        std::thread::sleep(Duration::from_millis(1));
        let first = timer.elapsed_ns();
        assert!(timer.is_running());
        let second = timer.stop();
        assert!(second >= first);
    }
}
