// src/proctor/counter.rs

/// Result of recording one violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub count: u32,
    pub max: u32,
    /// True only for the violation that brings the count to exactly `max`.
    pub limit_reached: bool,
}

/// Monotonic violation counter with a fixed limit. Violations are never
/// forgiven; counting past the limit is allowed but reports no new crossing.
#[derive(Debug, Clone)]
pub struct ViolationCounter {
    count: u32,
    max: u32,
}

impl ViolationCounter {
    /// `max` is clamped to at least 1.
    pub fn new(max: u32) -> Self {
        Self {
            count: 0,
            max: max.max(1),
        }
    }

    pub fn record(&mut self) -> Tally {
        self.count = self.count.saturating_add(1);
        Tally {
            count: self.count,
            max: self.max,
            limit_reached: self.count == self.max,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max(&self) -> u32 {
        self.max
    }
}
