// src/proctor/monitor.rs

use crate::{
    config::DEFAULT_MAX_VIOLATIONS,
    models::{attempt::SubmissionTrigger, exam::ExamSheet, result::ExamResult},
};

use super::{
    client::{SubmissionTicket, SubmitError},
    counter::ViolationCounter,
    latch::{LatchState, SubmissionLatch},
    surface::{SurfaceSignal, SurfaceState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Exam not loaded yet; signals are ignored.
    Idle,
    /// Student is on the proctored surface.
    Active,
    /// Student left; the blocking prompt is up until full screen is restored.
    Warned,
    /// A submission has begun. Permanent for the session.
    Terminated,
}

/// What the monitor asks its environment to do.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEffect {
    /// Ask the surface for full screen.
    RequestActivation,
    /// Show the blocking prompt with the running count.
    ShowWarning { count: u32, max: u32 },
    DismissWarning,
    /// Send exactly this submission.
    Submit(SubmissionTicket),
    /// The attempt is over. `result` is `None` when the server already had one.
    Concluded {
        trigger: SubmissionTrigger,
        result: Option<ExamResult>,
    },
    /// The submission failed and the student must be told. The latch is open
    /// again, so a manual submit may retry.
    SubmissionFailed {
        trigger: SubmissionTrigger,
        error: SubmitError,
        retryable: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub max_violations: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_violations: DEFAULT_MAX_VIOLATIONS,
        }
    }
}

/// Proctoring state machine for one attempt, driven only by discrete events.
///
/// Every departure edge (hidden, left full screen) while `Active` or
/// `Warned` is one violation and leaves the monitor in `Warned`. Returning
/// needs the surface visible and in full screen.
/// The violation that reaches the limit terminates the session and emits the
/// auto-submission in the same call. Manual and auto submission share one
/// latch, so at most one request is outstanding and none follows success.
#[derive(Debug)]
pub struct ProctorMonitor {
    exam_id: i64,
    state: MonitorState,
    counter: ViolationCounter,
    latch: SubmissionLatch,
    draft: Vec<String>,
    visible: bool,
    fullscreen: bool,
    /// Set once the violation limit ended the session.
    auto_terminated: bool,
    in_flight: Option<SubmissionTrigger>,
    concluded: bool,
}

impl ProctorMonitor {
    pub fn new(exam_id: i64, question_count: usize, config: MonitorConfig) -> Self {
        Self {
            exam_id,
            state: MonitorState::Idle,
            counter: ViolationCounter::new(config.max_violations),
            latch: SubmissionLatch::new(),
            draft: vec![String::new(); question_count],
            visible: true,
            fullscreen: false,
            auto_terminated: false,
            in_flight: None,
            concluded: false,
        }
    }

    pub fn from_sheet(sheet: &ExamSheet) -> Self {
        Self::new(
            sheet.exam.id,
            sheet.exam.questions.len(),
            MonitorConfig {
                max_violations: sheet.max_violations,
            },
        )
    }

    pub fn exam_id(&self) -> i64 {
        self.exam_id
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn violation_count(&self) -> u32 {
        self.counter.count()
    }

    pub fn max_violations(&self) -> u32 {
        self.counter.max()
    }

    pub fn answers(&self) -> &[String] {
        &self.draft
    }

    pub fn latch_state(&self) -> LatchState {
        self.latch.state()
    }

    pub fn is_concluded(&self) -> bool {
        self.concluded
    }

    /// Exam loaded: take the surface as it is right now, start observing
    /// and ask for full screen. Call after subscribing to the surface so no
    /// change falls between the snapshot and the first signal.
    pub fn start(&mut self, surface: SurfaceState) -> Vec<MonitorEffect> {
        if self.state != MonitorState::Idle {
            return Vec::new();
        }
        self.visible = surface.visible;
        self.fullscreen = surface.fullscreen;
        self.state = MonitorState::Active;
        vec![MonitorEffect::RequestActivation]
    }

    /// Records the student's choice for one question. Answers freeze once
    /// the session is terminated.
    pub fn select_answer(&mut self, index: usize, option: impl Into<String>) -> bool {
        if self.state == MonitorState::Terminated {
            return false;
        }
        match self.draft.get_mut(index) {
            Some(slot) => {
                *slot = option.into();
                true
            }
            None => false,
        }
    }

    pub fn observe(&mut self, signal: SurfaceSignal) -> Vec<MonitorEffect> {
        if !self.apply(signal) || self.state == MonitorState::Idle {
            return Vec::new();
        }

        if signal.is_departure() {
            return match self.state {
                MonitorState::Active | MonitorState::Warned => self.record_violation(),
                MonitorState::Terminated => {
                    // display only
                    self.counter.record();
                    Vec::new()
                }
                MonitorState::Idle => Vec::new(),
            };
        }

        if self.state == MonitorState::Warned && self.is_present() {
            self.state = MonitorState::Active;
            return vec![MonitorEffect::DismissWarning];
        }
        Vec::new()
    }

    /// The student pressed "Submit Exam".
    pub fn request_submit(&mut self) -> Vec<MonitorEffect> {
        if self.state == MonitorState::Idle || self.concluded {
            return Vec::new();
        }
        // A retry after the limit ended the session stays an auto submission.
        let trigger = if self.auto_terminated {
            SubmissionTrigger::Auto
        } else {
            SubmissionTrigger::Manual
        };
        match self.acquire(trigger) {
            Some(ticket) => {
                self.state = MonitorState::Terminated;
                vec![MonitorEffect::Submit(ticket)]
            }
            None => Vec::new(),
        }
    }

    /// Feeds back the outcome of the outstanding submission.
    pub fn settle(&mut self, outcome: Result<ExamResult, SubmitError>) -> Vec<MonitorEffect> {
        let Some(trigger) = self.in_flight.take() else {
            tracing::warn!("Submission outcome without an outstanding request; ignored");
            return Vec::new();
        };

        match outcome {
            Ok(result) => {
                self.conclude();
                vec![MonitorEffect::Concluded {
                    trigger,
                    result: Some(result),
                }]
            }
            Err(error) if error.is_benign() => {
                self.conclude();
                vec![MonitorEffect::Concluded {
                    trigger,
                    result: None,
                }]
            }
            Err(error) => {
                self.latch.release();
                let retryable = error.is_retryable();
                vec![MonitorEffect::SubmissionFailed {
                    trigger,
                    error,
                    retryable,
                }]
            }
        }
    }

    fn is_present(&self) -> bool {
        self.visible && self.fullscreen
    }

    /// Updates the observed surface flags; false when nothing changed.
    fn apply(&mut self, signal: SurfaceSignal) -> bool {
        let (flag, value) = match signal {
            SurfaceSignal::Hidden => (&mut self.visible, false),
            SurfaceSignal::Visible => (&mut self.visible, true),
            SurfaceSignal::FullscreenExited => (&mut self.fullscreen, false),
            SurfaceSignal::FullscreenEntered => (&mut self.fullscreen, true),
        };
        std::mem::replace(flag, value) != value
    }

    fn record_violation(&mut self) -> Vec<MonitorEffect> {
        let tally = self.counter.record();
        tracing::warn!(
            "Proctoring violation {}/{} on exam {}",
            tally.count,
            tally.max,
            self.exam_id
        );

        if !tally.limit_reached {
            self.state = MonitorState::Warned;
            return vec![MonitorEffect::ShowWarning {
                count: tally.count,
                max: tally.max,
            }];
        }

        self.state = MonitorState::Terminated;
        self.auto_terminated = true;
        match self.acquire(SubmissionTrigger::Auto) {
            Some(ticket) => vec![MonitorEffect::Submit(ticket)],
            None => Vec::new(),
        }
    }

    fn acquire(&mut self, trigger: SubmissionTrigger) -> Option<SubmissionTicket> {
        if !self.latch.try_acquire() {
            return None;
        }
        self.in_flight = Some(trigger);
        Some(SubmissionTicket {
            exam_id: self.exam_id,
            answers: self.draft.clone(),
            trigger,
            violation_count: self.counter.count(),
        })
    }

    fn conclude(&mut self) {
        self.latch.complete();
        self.concluded = true;
        self.state = MonitorState::Terminated;
    }
}
