//! Linear epsilon schedule.

/// Linearly increasing greedy probability.
///
/// `ε` is the probability of acting greedily, so the schedule starts at
/// `min` (mostly random) and climbs towards `max` by a fixed increment per
/// environment step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpsilonSchedule {
    value: f64,
    min: f64,
    max: f64,
    increment: f64,
}

impl EpsilonSchedule {
    /// Creates a schedule that reaches `max` after `steps` advances.
    ///
    /// `steps == 0` saturates on the first advance.
    pub fn new(min: f64, max: f64, steps: u64) -> Self {
        let increment = if steps == 0 {
            max - min
        } else {
            (max - min) / steps as f64
        };
        Self {
            value: min,
            min,
            max,
            increment,
        }
    }

    /// Advances one step and returns the new value.
    pub fn advance(&mut self) -> f64 {
        self.value = (self.value + self.increment).clamp(self.min, self.max);
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Closed-form value after `k` advances from `min`.
    pub fn value_after(&self, k: u64) -> f64 {
        (self.min + k as f64 * self.increment).clamp(self.min, self.max)
    }
}
