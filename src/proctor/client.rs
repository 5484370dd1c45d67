// src/proctor/client.rs

//! Submission Client: the single `submit` entry point shared by the manual
//! button and the auto-trigger, plus the HTTP binding to the arbiter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

use crate::{
    error::{ErrorBody, ErrorCode},
    models::{
        attempt::{SubmissionTrigger, SubmitExamRequest},
        exam::ExamSheet,
        result::ExamResult,
    },
};

/// How long a submission may take before it counts as a transport failure.
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Snapshot handed to the transport once the latch is held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTicket {
    pub exam_id: i64,
    pub answers: Vec<String>,
    pub trigger: SubmissionTrigger,
    pub violation_count: u32,
}

impl From<&SubmissionTicket> for SubmitExamRequest {
    fn from(ticket: &SubmissionTicket) -> Self {
        SubmitExamRequest {
            exam_id: ticket.exam_id,
            answers: ticket.answers.clone(),
            trigger: ticket.trigger,
            violation_count: ticket.violation_count,
        }
    }
}

/// Why a submission did not produce a new result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The arbiter already holds a result for this attempt. The session is
    /// over either way.
    #[error("exam already submitted")]
    AlreadySubmitted,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid submission: {0}")]
    Validation(String),

    /// Timeout or network failure. Safe to retry.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("submission rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
}

impl SubmitError {
    /// The session counts as concluded despite the error.
    pub fn is_benign(&self) -> bool {
        matches!(self, SubmitError::AlreadySubmitted)
    }

    /// Retrying the same answers may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SubmitError::Transport(_) => true,
            SubmitError::Rejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// The network side of `submit`. At most one call per attempt is in flight;
/// the monitor's latch guarantees that, not the transport.
#[async_trait]
pub trait SubmissionTransport: Send + Sync {
    async fn submit(&self, ticket: &SubmissionTicket) -> Result<ExamResult, SubmitError>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `http://localhost:5000`.
    pub base_url: String,
    /// Bearer token issued by the identity service.
    pub token: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client for the student-facing exam endpoints.
#[derive(Clone)]
pub struct HttpExamClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpExamClient {
    pub fn new(config: ClientConfig) -> Result<Self, SubmitError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SubmitError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Opens the exam: starts (or resumes) the attempt and returns the sheet.
    pub async fn load_exam(&self, exam_id: i64) -> Result<ExamSheet, SubmitError> {
        let response = self
            .http
            .get(self.url(&format!("/api/exams/{}", exam_id)))
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(|e| transport_error(e, self.config.timeout))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response
            .json::<ExamSheet>()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))
    }
}

#[async_trait]
impl SubmissionTransport for HttpExamClient {
    async fn submit(&self, ticket: &SubmissionTicket) -> Result<ExamResult, SubmitError> {
        let response = self
            .http
            .post(self.url("/api/exams/submit"))
            .bearer_auth(&self.config.token)
            .json(&SubmitExamRequest::from(ticket))
            .send()
            .await
            .map_err(|e| transport_error(e, self.config.timeout))?;

        if response.status() != StatusCode::OK {
            return Err(error_from_response(response).await);
        }
        response
            .json::<ExamResult>()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))
    }
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> SubmitError {
    if err.is_timeout() {
        SubmitError::Transport(format!("timed out after {:?}", timeout))
    } else {
        SubmitError::Transport(err.to_string())
    }
}

/// Maps an error response by its `code` field.
async fn error_from_response(response: reqwest::Response) -> SubmitError {
    let status = response.status().as_u16();
    match response.json::<ErrorBody>().await {
        Ok(body) => classify(status, body),
        Err(_) => SubmitError::Rejected {
            status,
            message: "unreadable error response".to_string(),
        },
    }
}

fn classify(status: u16, body: ErrorBody) -> SubmitError {
    match body.code {
        ErrorCode::AlreadySubmitted => SubmitError::AlreadySubmitted,
        ErrorCode::NotFound => SubmitError::NotFound(body.error),
        ErrorCode::BadRequest => SubmitError::Validation(body.error),
        _ => SubmitError::Rejected {
            status,
            message: body.error,
        },
    }
}
