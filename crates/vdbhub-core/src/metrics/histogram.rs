//! Fixed-bucket latency histogram.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free histogram over microsecond observations.
///
/// Each observation lands in the first bucket whose upper bound is at least
/// the value; values above every bound land in the overflow slot.
#[derive(Debug)]
pub struct Histogram {
    /// Upper bounds in microseconds, ascending.
    bounds: Vec<u64>,
    /// One slot per bound plus the overflow slot.
    slots: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

impl Histogram {
    /// Create a histogram with the given upper bounds (microseconds).
    pub fn with_bounds(mut bounds: Vec<u64>) -> Self {
        bounds.sort_unstable();
        bounds.dedup();
        let slots = (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            slots,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Buckets sized for metadata finalization: 1ms up to 30s.
    pub fn finalize_latency() -> Self {
        Self::with_bounds(vec![
            1_000, 5_000, 25_000, 100_000, 250_000, 1_000_000, 5_000_000, 30_000_000,
        ])
    }

    /// Record an elapsed duration.
    pub fn observe_duration(&self, elapsed: Duration) {
        self.observe(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));
    }

    /// Record a value in microseconds.
    pub fn observe(&self, value_us: u64) {
        self.sum.fetch_add(value_us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(value_us, Ordering::Relaxed);

        let slot = self
            .bounds
            .iter()
            .position(|&bound| value_us <= bound)
            .unwrap_or(self.bounds.len());
        self.slots[slot].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    pub fn avg(&self) -> u64 {
        match self.count() {
            0 => 0,
            n => self.sum() / n,
        }
    }

    /// Upper bound of the bucket holding quantile `q` (0.0 to 1.0).
    ///
    /// Observations in the overflow slot report the observed maximum.
    pub fn quantile(&self, q: f64) -> u64 {
        let total = self.count();
        if total == 0 {
            return 0;
        }
        let target = ((total as f64) * q).ceil().max(1.0) as u64;
        let mut seen = 0u64;
        for (i, slot) in self.slots.iter().enumerate() {
            seen += slot.load(Ordering::Relaxed);
            if seen >= target {
                return self.bounds.get(i).copied().unwrap_or_else(|| self.max());
            }
        }
        self.max()
    }

    /// Cumulative `(bound, count)` pairs in Prometheus `le` form.
    ///
    /// The overflow slot is reported with bound `u64::MAX` (`+Inf`).
    pub fn cumulative(&self) -> Vec<(u64, u64)> {
        let mut running = 0u64;
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                running += slot.load(Ordering::Relaxed);
                (self.bounds.get(i).copied().unwrap_or(u64::MAX), running)
            })
            .collect()
    }

    pub fn reset(&self) {
        for slot in &self.slots {
            slot.store(0, Ordering::Relaxed);
        }
        self.sum.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
        self.max.store(0, Ordering::Relaxed);
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::finalize_latency()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_and_quantile() {
        let hist = Histogram::with_bounds(vec![10, 100, 1000]);
        for _ in 0..8 {
            hist.observe(5);
        }
        hist.observe(50);
        hist.observe(700);

        assert_eq!(hist.count(), 10);
        assert_eq!(hist.max(), 700);
        assert_eq!(hist.quantile(0.5), 10);
        assert_eq!(hist.quantile(0.9), 100);
        assert_eq!(hist.quantile(1.0), 1000);
    }

    #[test]
    fn test_overflow_reports_max() {
        let hist = Histogram::with_bounds(vec![10]);
        hist.observe(25_000);
        assert_eq!(hist.quantile(0.99), 25_000);
        assert_eq!(hist.cumulative(), vec![(10, 0), (u64::MAX, 1)]);
    }

    #[test]
    fn test_empty_and_reset() {
        let hist = Histogram::finalize_latency();
        assert_eq!(hist.avg(), 0);
        assert_eq!(hist.quantile(0.5), 0);

        hist.observe_duration(Duration::from_millis(3));
        assert_eq!(hist.avg(), 3_000);
        hist.reset();
        assert_eq!(hist.count(), 0);
        assert!(hist.cumulative().iter().all(|&(_, n)| n == 0));
    }
}
