/// Tracks the bootstrap day and the cool-down between two rebalances.
///
/// The first evaluated day always rebalances. After that every evaluation
/// counts one day, and a rebalance is only considered once
/// `min_interval` days have passed since the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalanceClock {
    min_interval: u32,
    days_since_rebalance: u32,
    bootstrapped: bool,
}

impl RebalanceClock {
    pub fn new(min_interval: u32) -> Self {
        Self {
            min_interval,
            days_since_rebalance: 0,
            bootstrapped: false,
        }
    }

    pub fn is_first_day(&self) -> bool {
        !self.bootstrapped
    }

    pub fn days_since_rebalance(&self) -> u32 {
        self.days_since_rebalance
    }

    /// Counts one more day. Has no effect before the first rebalance.
    pub fn tick(&mut self) {
        if self.bootstrapped {
            self.days_since_rebalance = self.days_since_rebalance.saturating_add(1);
        }
    }

    pub fn cooling_down(&self) -> bool {
        self.min_interval > 0 && self.days_since_rebalance < self.min_interval
    }

    /// Marks a rebalance: ends the bootstrap phase and restarts the count.
    pub fn reset(&mut self) {
        self.bootstrapped = true;
        self.days_since_rebalance = 0;
    }
}
