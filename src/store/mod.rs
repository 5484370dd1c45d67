// src/store/mod.rs

//! Persistence collaborators of the submission core.
//!
//! `ExamStore` is the read/write home of exam definitions; `AttemptStore`
//! owns attempts and results and provides the atomic check-and-set the
//! arbiter relies on. Both are implemented for Postgres and in memory.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    error::AppError,
    grading::Grade,
    models::{
        attempt::{Attempt, TerminalSubmission},
        exam::{Exam, ExamDraft},
        result::{ExamResult, ResultSummary},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Grades a submission against the exam snapshot the store holds at commit
/// time. Returning an error aborts the commit before the attempt is touched.
pub type Grader<'a> = &'a (dyn Fn(&Exam) -> Result<Grade, AppError> + Send + Sync);

#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn create_exam(&self, examiner_id: i64, draft: ExamDraft) -> Result<Exam, AppError>;

    /// Replaces title and questions and bumps the version.
    /// `NotFound` unless the exam exists and belongs to `examiner_id`.
    async fn update_exam(
        &self,
        exam_id: i64,
        examiner_id: i64,
        draft: ExamDraft,
    ) -> Result<Exam, AppError>;

    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError>;

    async fn list_exams_by_examiner(&self, examiner_id: i64) -> Result<Vec<Exam>, AppError>;

    /// Exams the student has not concluded yet, newest first.
    async fn list_open_exams(&self, student_id: i64) -> Result<Vec<Exam>, AppError>;

    /// Deletes the exam together with its attempts and results.
    async fn delete_exam(&self, exam_id: i64, examiner_id: i64) -> Result<(), AppError>;
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Opens the in-progress attempt for (student, exam), or returns the
    /// existing one. Fails with `AlreadySubmitted` once the attempt is
    /// terminal and with `NotFound` if the exam does not exist.
    async fn begin_attempt(&self, student_id: i64, exam_id: i64) -> Result<Attempt, AppError>;

    async fn find_attempt(&self, student_id: i64, exam_id: i64)
    -> Result<Option<Attempt>, AppError>;

    /// Atomically concludes the attempt and persists its result.
    ///
    /// Within one indivisible step per (student, exam): reads the exam,
    /// grades via `grader`, flips the attempt from `in_progress` to
    /// `submission.status` and inserts the result. Exactly one of any number
    /// of concurrent calls for the same key succeeds; the others fail with
    /// `AlreadySubmitted`. `NotFound` if the exam or the attempt is missing.
    async fn commit_submission(
        &self,
        submission: TerminalSubmission,
        grader: Grader<'_>,
    ) -> Result<ExamResult, AppError>;

    async fn list_results(&self, student_id: i64) -> Result<Vec<ResultSummary>, AppError>;

    async fn find_result(&self, result_id: i64) -> Result<Option<ExamResult>, AppError>;
}
