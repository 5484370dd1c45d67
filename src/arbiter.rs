// src/arbiter.rs

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::AppError,
    grading::{Grade, PassThreshold, grade},
    models::{
        attempt::{SubmitExamRequest, TerminalSubmission},
        exam::Exam,
        result::ExamResult,
    },
    store::{AttemptStore, ExamStore},
};

/// Server-side authority over submissions.
///
/// Guarantees that each (student, exam) attempt is graded and recorded at
/// most once, however many times, and by however many triggers, it is
/// submitted. Grading uses the exam as stored at submission time.
pub struct SubmissionArbiter {
    exams: Arc<dyn ExamStore>,
    attempts: Arc<dyn AttemptStore>,
    threshold: PassThreshold,
}

impl SubmissionArbiter {
    pub fn new(
        exams: Arc<dyn ExamStore>,
        attempts: Arc<dyn AttemptStore>,
        threshold: PassThreshold,
    ) -> Self {
        Self {
            exams,
            attempts,
            threshold,
        }
    }

    /// Records a submission and returns its result.
    ///
    /// * `BadRequest` when the answers are malformed or not aligned with the
    ///   exam's questions. Nothing is written.
    /// * `AlreadySubmitted` when a terminal attempt already exists.
    /// * `NotFound` when the exam is gone or the student never opened it.
    pub async fn record_submission(
        &self,
        student_id: i64,
        req: SubmitExamRequest,
    ) -> Result<ExamResult, AppError> {
        req.validate()?;

        // Reject misaligned answers before opening the commit transaction.
        let current = self
            .exams
            .find_exam(req.exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;
        check_alignment(&current, &req.answers)?;

        // The exam may be edited before the commit locks it; check again there.
        let threshold = self.threshold;
        let answers = req.answers.clone();
        let grader = move |exam: &Exam| -> Result<Grade, AppError> {
            check_alignment(exam, &answers)?;
            Ok(grade(&exam.questions, &answers, threshold))
        };

        let submission = TerminalSubmission {
            exam_id: req.exam_id,
            student_id,
            status: req.trigger.terminal_status(),
            answers: req.answers,
            violation_count: req.violation_count,
        };

        match self.attempts.commit_submission(submission, &grader).await {
            Ok(result) => {
                tracing::info!(
                    "Recorded {:?} submission: student={}, exam={}, score={}/{}, passed={}",
                    req.trigger,
                    student_id,
                    req.exam_id,
                    result.score,
                    result.total,
                    result.passed
                );
                Ok(result)
            }
            Err(AppError::AlreadySubmitted(msg)) => {
                tracing::warn!(
                    "Duplicate {:?} submission ignored: student={}, exam={}",
                    req.trigger,
                    student_id,
                    req.exam_id
                );
                Err(AppError::AlreadySubmitted(msg))
            }
            Err(e) => Err(e),
        }
    }
}

fn check_alignment(exam: &Exam, answers: &[String]) -> Result<(), AppError> {
    if answers.len() != exam.questions.len() {
        return Err(AppError::BadRequest(format!(
            "Expected {} answers, got {}",
            exam.questions.len(),
            answers.len()
        )));
    }
    Ok(())
}
