//! Deferral policies consulted by the session driver between steps.

use std::time::{Duration, Instant};

/// Decides when the driver should hand control back to the host.
pub trait DeferPolicy: Send {
    /// Called when the host hands control to the driver.
    fn reset(&mut self);

    /// Called after each step. `true` means yield now.
    fn should_defer(&mut self) -> bool;
}

/// Never yields; the driver runs until it blocks on outstanding work.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverDefer;

impl DeferPolicy for NeverDefer {
    fn reset(&mut self) {}

    fn should_defer(&mut self) -> bool {
        false
    }
}

/// Yields once more than `budget` of wall-clock time has passed since the
/// last reset or yield.
#[derive(Debug, Clone)]
pub struct TimeBudget {
    budget: Duration,
    last: Instant,
}

impl TimeBudget {
    pub const DEFAULT_BUDGET: Duration = Duration::from_millis(8);

    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            last: Instant::now(),
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

impl Default for TimeBudget {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BUDGET)
    }
}

impl DeferPolicy for TimeBudget {
    fn reset(&mut self) {
        self.last = Instant::now();
    }

    fn should_defer(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last) > self.budget {
            self.last = now;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_defer() {
        let mut policy = NeverDefer;
        policy.reset();
        assert!(!policy.should_defer());
    }

    #[test]
    fn test_zero_budget_yields_after_reset() {
        let mut policy = TimeBudget::new(Duration::ZERO);
        policy.reset();
        std::thread::sleep(Duration::from_millis(1));
        assert!(policy.should_defer());
    }

    #[test]
    fn test_large_budget_does_not_yield() {
        let mut policy = TimeBudget::new(Duration::from_secs(3600));
        policy.reset();
        assert!(!policy.should_defer());
        assert_eq!(TimeBudget::default().budget(), Duration::from_millis(8));
    }
}
