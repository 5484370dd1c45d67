// src/models/result.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'results' table in the database.
/// Written once when an attempt concludes and never updated.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ExamResult {
    pub id: i64,
    pub attempt_id: i64,
    pub exam_id: i64,
    pub student_id: i64,
    pub score: i32,
    pub total: i32,
    pub passed: bool,
    /// Exam version the answers were graded against.
    pub exam_version: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Result row joined with its exam title, for the student's result list.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ResultSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub result: ExamResult,
    pub exam_title: String,
}

/// Data printed on a certificate. Layout is the renderer's business.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub certificate_id: i64,
    pub student_id: i64,
    pub exam_id: i64,
    pub exam_title: String,
    pub examiner_id: i64,
    pub score: i32,
    pub total: i32,
    pub issued_at: chrono::DateTime<chrono::Utc>,
}
