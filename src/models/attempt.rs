// src/models/attempt.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

/// Lifecycle of one student's engagement with one exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    AutoSubmitted,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::AutoSubmitted => "auto_submitted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(AttemptStatus::InProgress),
            "submitted" => Ok(AttemptStatus::Submitted),
            "auto_submitted" => Ok(AttemptStatus::AutoSubmitted),
            other => Err(format!("unknown attempt status '{}'", other)),
        }
    }
}

/// Which path asked for the submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionTrigger {
    /// The student pressed "Submit Exam".
    #[default]
    Manual,
    /// The proctoring monitor hit its violation limit.
    Auto,
}

impl SubmissionTrigger {
    /// Terminal status recorded for a submission from this trigger.
    pub fn terminal_status(&self) -> AttemptStatus {
        match self {
            SubmissionTrigger::Manual => AttemptStatus::Submitted,
            SubmissionTrigger::Auto => AttemptStatus::AutoSubmitted,
        }
    }
}

/// One student's attempt at one exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    pub answers: Vec<String>,
    pub violation_count: i32,
    pub status: AttemptStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'attempts' table in the database.
#[derive(Debug, FromRow)]
pub struct AttemptRow {
    pub id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    pub answers: Json<Vec<String>>,
    pub violation_count: i32,
    pub status: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = String;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(Attempt {
            id: row.id,
            exam_id: row.exam_id,
            student_id: row.student_id,
            answers: row.answers.0,
            violation_count: row.violation_count,
            status: row.status.parse()?,
            started_at: row.started_at,
            submitted_at: row.submitted_at,
        })
    }
}

/// DTO for submitting an exam attempt.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitExamRequest {
    pub exam_id: i64,

    /// Selected options, index-aligned with the exam's questions.
    /// Unanswered questions hold an empty string.
    #[validate(custom(function = validate_answers))]
    pub answers: Vec<String>,

    #[serde(default)]
    pub trigger: SubmissionTrigger,

    /// Violations the monitor had counted when the submission was sent.
    #[serde(default)]
    pub violation_count: u32,
}

fn validate_answers(answers: &[String]) -> Result<(), validator::ValidationError> {
    if answers.len() > 500 {
        return Err(validator::ValidationError::new("too_many_answers"));
    }
    if answers.iter().any(|a| a.len() > 500) {
        return Err(validator::ValidationError::new("answer_too_long"));
    }
    Ok(())
}

/// Everything the store needs to conclude an attempt.
#[derive(Debug, Clone)]
pub struct TerminalSubmission {
    pub exam_id: i64,
    pub student_id: i64,
    pub status: AttemptStatus,
    pub answers: Vec<String>,
    pub violation_count: u32,
}
