// src/proctor/latch.rs

use std::sync::atomic::{AtomicU8, Ordering};

const OPEN: u8 = 0;
const IN_FLIGHT: u8 = 1;
const DONE: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    /// No submission sent, or the last one failed.
    Open,
    /// A submission request is outstanding.
    InFlight,
    /// The attempt is concluded; the latch never reopens.
    Done,
}

/// One-time gate in front of the submission call.
///
/// Whichever trigger acquires it first sends the only request. It reopens
/// only through `release` after a failed request and closes for good on
/// `complete`.
#[derive(Debug)]
pub struct SubmissionLatch {
    state: AtomicU8,
}

impl Default for SubmissionLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionLatch {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(OPEN),
        }
    }

    /// Moves `Open -> InFlight`. Returns false if a submission is already
    /// outstanding or done.
    pub fn try_acquire(&self) -> bool {
        self.state
            .compare_exchange(OPEN, IN_FLIGHT, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Moves `InFlight -> Open` so a later manual submit can retry.
    pub fn release(&self) -> bool {
        self.state
            .compare_exchange(IN_FLIGHT, OPEN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Moves `InFlight -> Done`.
    pub fn complete(&self) -> bool {
        self.state
            .compare_exchange(IN_FLIGHT, DONE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn state(&self) -> LatchState {
        match self.state.load(Ordering::Acquire) {
            OPEN => LatchState::Open,
            IN_FLIGHT => LatchState::InFlight,
            _ => LatchState::Done,
        }
    }
}
