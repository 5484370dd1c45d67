// src/proctor/session.rs

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinSet,
};

use crate::models::{attempt::SubmissionTrigger, result::ExamResult};

use super::{
    client::{DEFAULT_SUBMIT_TIMEOUT, SubmissionTransport, SubmitError},
    monitor::{MonitorEffect, MonitorState, ProctorMonitor},
    surface::ProctorSurface,
};

/// Input from the student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    SelectAnswer { index: usize, option: String },
    Submit,
    /// The "re-enter full screen" action on the warning prompt.
    ReenterFullscreen,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Concluded {
        trigger: SubmissionTrigger,
        result: Option<ExamResult>,
    },
    /// The command channel closed before the attempt concluded.
    Abandoned,
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub state: MonitorState,
    pub violation_count: u32,
    pub answers: Vec<String>,
}

type SubmitTask = Result<ExamResult, SubmitError>;

/// Runs one proctored attempt: feeds surface signals and student commands
/// into the monitor, and carries out its effects.
pub struct ExamSession {
    monitor: ProctorMonitor,
    surface: Arc<dyn ProctorSurface>,
    transport: Arc<dyn SubmissionTransport>,
    feedback: Option<mpsc::UnboundedSender<MonitorEffect>>,
    submit_timeout: Duration,
}

impl ExamSession {
    pub fn new(
        monitor: ProctorMonitor,
        surface: Arc<dyn ProctorSurface>,
        transport: Arc<dyn SubmissionTransport>,
    ) -> Self {
        Self {
            monitor,
            surface,
            transport,
            feedback: None,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }

    /// Every effect is forwarded here after it has been carried out.
    pub fn with_feedback(mut self, feedback: mpsc::UnboundedSender<MonitorEffect>) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) -> SessionReport {
        let exam_id = self.monitor.exam_id();
        let mut signals = self.surface.subscribe();
        let mut signals_open = true;
        let mut submissions: JoinSet<SubmitTask> = JoinSet::new();

        tracing::info!("Proctored session started for exam {}", exam_id);
        let effects = self.monitor.start(self.surface.state());
        let mut outcome = self.dispatch(effects, &mut submissions);

        while outcome.is_none() {
            tokio::select! {
                // Student input already queued is applied before later surface
                // changes.
                biased;

                Some(joined) = submissions.join_next() => {
                    let result = joined.unwrap_or_else(|e| {
                        Err(SubmitError::Transport(format!("submission task failed: {}", e)))
                    });
                    let effects = self.monitor.settle(result);
                    outcome = self.dispatch(effects, &mut submissions);
                }

                command = commands.recv() => match command {
                    Some(SessionCommand::SelectAnswer { index, option }) => {
                        if !self.monitor.select_answer(index, option) {
                            tracing::debug!("Ignored answer for question {}", index);
                        }
                    }
                    Some(SessionCommand::Submit) => {
                        let effects = self.monitor.request_submit();
                        outcome = self.dispatch(effects, &mut submissions);
                    }
                    Some(SessionCommand::ReenterFullscreen) => self.activate(),
                    None => {
                        if submissions.is_empty() {
                            outcome = Some(SessionOutcome::Abandoned);
                        } else {
                            // let the outstanding submission settle first
                            let result = match submissions.join_next().await {
                                Some(Ok(result)) => result,
                                Some(Err(e)) => Err(SubmitError::Transport(e.to_string())),
                                None => Err(SubmitError::Transport("submission task lost".into())),
                            };
                            let effects = self.monitor.settle(result);
                            outcome = self
                                .dispatch(effects, &mut submissions)
                                .or(Some(SessionOutcome::Abandoned));
                        }
                    }
                },

                signal = signals.recv(), if signals_open => match signal {
                    Ok(signal) => {
                        tracing::debug!("Surface signal {:?}", signal);
                        let effects = self.monitor.observe(signal);
                        outcome = self.dispatch(effects, &mut submissions);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Dropped {} surface signals", skipped);
                    }
                    Err(RecvError::Closed) => {
                        tracing::warn!("Surface closed; no further signals for exam {}", exam_id);
                        signals_open = false;
                    }
                },
            }
        }

        let outcome = outcome.unwrap_or(SessionOutcome::Abandoned);
        tracing::info!(
            "Proctored session for exam {} ended ({}) after {} violation(s)",
            exam_id,
            outcome_label(&outcome),
            self.monitor.violation_count()
        );

        SessionReport {
            outcome,
            state: self.monitor.state(),
            violation_count: self.monitor.violation_count(),
            answers: self.monitor.answers().to_vec(),
        }
    }

    /// Carries out effects; returns the outcome once the attempt concluded.
    fn dispatch(
        &self,
        effects: Vec<MonitorEffect>,
        submissions: &mut JoinSet<SubmitTask>,
    ) -> Option<SessionOutcome> {
        let mut outcome = None;
        for effect in effects {
            match &effect {
                MonitorEffect::RequestActivation => self.activate(),
                MonitorEffect::Submit(ticket) => {
                    tracing::info!(
                        "Submitting exam {} ({:?}, {} violation(s))",
                        ticket.exam_id,
                        ticket.trigger,
                        ticket.violation_count
                    );
                    let transport = Arc::clone(&self.transport);
                    let ticket = ticket.clone();
                    let timeout = self.submit_timeout;
                    submissions.spawn(async move {
                        match tokio::time::timeout(timeout, transport.submit(&ticket)).await {
                            Ok(result) => result,
                            Err(_) => Err(SubmitError::Transport(format!(
                                "timed out after {:?}",
                                timeout
                            ))),
                        }
                    });
                }
                MonitorEffect::SubmissionFailed { error, .. } => {
                    tracing::error!("Submission failed: {}", error);
                }
                MonitorEffect::Concluded { trigger, result } => {
                    outcome = Some(SessionOutcome::Concluded {
                        trigger: *trigger,
                        result: result.clone(),
                    });
                }
                MonitorEffect::ShowWarning { .. } | MonitorEffect::DismissWarning => {}
            }
            if let Some(feedback) = &self.feedback {
                let _ = feedback.send(effect);
            }
        }
        outcome
    }

    fn activate(&self) {
        let surface = Arc::clone(&self.surface);
        tokio::spawn(async move {
            if surface.is_active() {
                return;
            }
            if let Err(e) = surface.request_activation().await {
                tracing::warn!("Could not enter full screen: {}", e);
            }
        });
    }
}

fn outcome_label(outcome: &SessionOutcome) -> &'static str {
    match outcome {
        SessionOutcome::Concluded { result: Some(_), .. } => "submitted",
        SessionOutcome::Concluded { result: None, .. } => "already submitted",
        SessionOutcome::Abandoned => "abandoned",
    }
}
