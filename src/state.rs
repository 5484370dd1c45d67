// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    arbiter::SubmissionArbiter,
    config::Config,
    store::{AttemptStore, ExamStore},
};

#[derive(Clone)]
pub struct AppState {
    pub exams: Arc<dyn ExamStore>,
    pub attempts: Arc<dyn AttemptStore>,
    pub arbiter: Arc<SubmissionArbiter>,
    pub config: Config,
}

impl AppState {
    /// Wires every collaborator to one store backend.
    pub fn new<S>(store: Arc<S>, config: Config) -> Self
    where
        S: ExamStore + AttemptStore + 'static,
    {
        let exams: Arc<dyn ExamStore> = store.clone();
        let attempts: Arc<dyn AttemptStore> = store;
        let arbiter =
            SubmissionArbiter::new(exams.clone(), attempts.clone(), config.passing_threshold);
        Self {
            exams,
            attempts,
            arbiter: Arc::new(arbiter),
            config,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<SubmissionArbiter> {
    fn from_ref(state: &AppState) -> Self {
        state.arbiter.clone()
    }
}
