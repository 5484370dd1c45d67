// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, types::Json};

use super::{AttemptStore, ExamStore, Grader};
use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, AttemptRow, TerminalSubmission},
        exam::{Exam, ExamDraft, ExamRow},
        result::{ExamResult, ResultSummary},
    },
};

const EXAM_COLUMNS: &str =
    "id, examiner_id, title, questions, version, created_at, updated_at";

const ATTEMPT_COLUMNS: &str =
    "id, exam_id, student_id, answers, violation_count, status, started_at, submitted_at";

const RESULT_COLUMNS: &str =
    "id, attempt_id, exam_id, student_id, score, total, passed, exam_version, created_at";

/// Postgres-backed store. The (exam_id, student_id) unique constraint and a
/// compare-and-swap on `attempts.status` make submission exactly-once.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
}

fn into_attempt(row: AttemptRow) -> Result<Attempt, AppError> {
    Attempt::try_from(row).map_err(AppError::InternalServerError)
}

#[async_trait]
impl ExamStore for PgStore {
    async fn create_exam(&self, examiner_id: i64, draft: ExamDraft) -> Result<Exam, AppError> {
        let row = sqlx::query_as::<_, ExamRow>(&format!(
            "INSERT INTO exams (examiner_id, title, questions) VALUES ($1, $2, $3) RETURNING {}",
            EXAM_COLUMNS
        ))
        .bind(examiner_id)
        .bind(&draft.title)
        .bind(Json(&draft.questions))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create exam: {:?}", e);
            AppError::from(e)
        })?;

        Ok(row.into())
    }

    async fn update_exam(
        &self,
        exam_id: i64,
        examiner_id: i64,
        draft: ExamDraft,
    ) -> Result<Exam, AppError> {
        let row = sqlx::query_as::<_, ExamRow>(&format!(
            r#"
            UPDATE exams
            SET title = $3, questions = $4, version = version + 1, updated_at = NOW()
            WHERE id = $1 AND examiner_id = $2
            RETURNING {}
            "#,
            EXAM_COLUMNS
        ))
        .bind(exam_id)
        .bind(examiner_id)
        .bind(&draft.title)
        .bind(Json(&draft.questions))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Exam::from)
            .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", exam_id)))
    }

    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        let row = sqlx::query_as::<_, ExamRow>(&format!(
            "SELECT {} FROM exams WHERE id = $1",
            EXAM_COLUMNS
        ))
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Exam::from))
    }

    async fn list_exams_by_examiner(&self, examiner_id: i64) -> Result<Vec<Exam>, AppError> {
        let rows = sqlx::query_as::<_, ExamRow>(&format!(
            "SELECT {} FROM exams WHERE examiner_id = $1 ORDER BY id DESC",
            EXAM_COLUMNS
        ))
        .bind(examiner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Exam::from).collect())
    }

    async fn list_open_exams(&self, student_id: i64) -> Result<Vec<Exam>, AppError> {
        let rows = sqlx::query_as::<_, ExamRow>(&format!(
            r#"
            SELECT {} FROM exams e
            WHERE NOT EXISTS (
                SELECT 1 FROM attempts a
                WHERE a.exam_id = e.id AND a.student_id = $1 AND a.status <> 'in_progress'
            )
            ORDER BY e.id DESC
            "#,
            EXAM_COLUMNS
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Exam::from).collect())
    }

    async fn delete_exam(&self, exam_id: i64, examiner_id: i64) -> Result<(), AppError> {
        // attempts and results go with it (ON DELETE CASCADE)
        let deleted = sqlx::query("DELETE FROM exams WHERE id = $1 AND examiner_id = $2")
            .bind(exam_id)
            .bind(examiner_id)
            .execute(&self.pool)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Exam {} not found", exam_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn begin_attempt(&self, student_id: i64, exam_id: i64) -> Result<Attempt, AppError> {
        sqlx::query(
            r#"
            INSERT INTO attempts (exam_id, student_id)
            VALUES ($1, $2)
            ON CONFLICT (exam_id, student_id) DO NOTHING
            "#,
        )
        .bind(exam_id)
        .bind(student_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::NotFound(format!("Exam {} not found", exam_id))
            } else {
                AppError::from(e)
            }
        })?;

        let attempt = self
            .find_attempt(student_id, exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", exam_id)))?;

        if attempt.status.is_terminal() {
            return Err(AppError::AlreadySubmitted(
                "You have already submitted this exam".to_string(),
            ));
        }
        Ok(attempt)
    }

    async fn find_attempt(
        &self,
        student_id: i64,
        exam_id: i64,
    ) -> Result<Option<Attempt>, AppError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {} FROM attempts WHERE exam_id = $1 AND student_id = $2",
            ATTEMPT_COLUMNS
        ))
        .bind(exam_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_attempt).transpose()
    }

    async fn commit_submission(
        &self,
        submission: TerminalSubmission,
        grader: Grader<'_>,
    ) -> Result<ExamResult, AppError> {
        let mut tx = self.pool.begin().await?;

        // FOR SHARE pins the graded snapshot: edits wait until we commit.
        let exam: Exam = sqlx::query_as::<_, ExamRow>(&format!(
            "SELECT {} FROM exams WHERE id = $1 FOR SHARE",
            EXAM_COLUMNS
        ))
        .bind(submission.exam_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(Exam::from)
        .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", submission.exam_id)))?;

        let grade = grader(&exam)?;
        let violation_count = i32::try_from(submission.violation_count).unwrap_or(i32::MAX);

        // Compare-and-swap: only an in-progress attempt can be concluded.
        // A concurrent winner holds the row lock; we re-check after it commits and see 0 rows.
        let attempt_id: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE attempts
            SET status = $3,
                answers = $4,
                violation_count = GREATEST(violation_count, $5),
                submitted_at = NOW()
            WHERE exam_id = $1 AND student_id = $2 AND status = 'in_progress'
            RETURNING id
            "#,
        )
        .bind(submission.exam_id)
        .bind(submission.student_id)
        .bind(submission.status.as_str())
        .bind(Json(&submission.answers))
        .bind(violation_count)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(attempt_id) = attempt_id else {
            let existing: Option<String> = sqlx::query_scalar(
                "SELECT status FROM attempts WHERE exam_id = $1 AND student_id = $2",
            )
            .bind(submission.exam_id)
            .bind(submission.student_id)
            .fetch_optional(&mut *tx)
            .await?;

            return Err(match existing {
                Some(_) => AppError::AlreadySubmitted("Exam already submitted".to_string()),
                None => AppError::NotFound("No attempt in progress for this exam".to_string()),
            });
        };

        let result = sqlx::query_as::<_, ExamResult>(&format!(
            r#"
            INSERT INTO results (attempt_id, exam_id, student_id, score, total, passed, exam_version)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            RESULT_COLUMNS
        ))
        .bind(attempt_id)
        .bind(submission.exam_id)
        .bind(submission.student_id)
        .bind(grade.score as i32)
        .bind(grade.total as i32)
        .bind(grade.passed)
        .bind(exam.version)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::AlreadySubmitted("Exam already submitted".to_string())
            } else {
                tracing::error!("Failed to insert result: {:?}", e);
                AppError::from(e)
            }
        })?;

        tx.commit().await?;

        Ok(result)
    }

    async fn list_results(&self, student_id: i64) -> Result<Vec<ResultSummary>, AppError> {
        let rows = sqlx::query_as::<_, ResultSummary>(
            r#"
            SELECT
                r.id, r.attempt_id, r.exam_id, r.student_id, r.score, r.total,
                r.passed, r.exam_version, r.created_at,
                e.title AS exam_title
            FROM results r
            JOIN exams e ON e.id = r.exam_id
            WHERE r.student_id = $1
            ORDER BY r.id DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list results: {:?}", e);
            AppError::from(e)
        })?;

        Ok(rows)
    }

    async fn find_result(&self, result_id: i64) -> Result<Option<ExamResult>, AppError> {
        let row = sqlx::query_as::<_, ExamResult>(&format!(
            "SELECT {} FROM results WHERE id = $1",
            RESULT_COLUMNS
        ))
        .bind(result_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
