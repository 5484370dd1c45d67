// src/store/memory.rs

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;

use super::{AttemptStore, ExamStore, Grader};
use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, AttemptStatus, TerminalSubmission},
        exam::{Exam, ExamDraft},
        result::{ExamResult, ResultSummary},
    },
};

/// In-process store. One mutex guards all tables, so every operation is
/// linearizable and a commit sees the exam, attempt and results together.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    next_exam_id: i64,
    next_attempt_id: i64,
    next_result_id: i64,
    exams: BTreeMap<i64, Exam>,
    /// Keyed by (exam_id, student_id).
    attempts: HashMap<(i64, i64), Attempt>,
    results: BTreeMap<i64, ExamResult>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::InternalServerError("memory store poisoned".to_string()))
    }
}

impl Tables {
    fn allocate(counter: &mut i64) -> i64 {
        *counter += 1;
        *counter
    }
}

#[async_trait]
impl ExamStore for MemoryStore {
    async fn create_exam(&self, examiner_id: i64, draft: ExamDraft) -> Result<Exam, AppError> {
        let mut t = self.tables()?;
        let now = Utc::now();
        let exam = Exam {
            id: Tables::allocate(&mut t.next_exam_id),
            examiner_id,
            title: draft.title,
            questions: draft.questions,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        t.exams.insert(exam.id, exam.clone());
        Ok(exam)
    }

    async fn update_exam(
        &self,
        exam_id: i64,
        examiner_id: i64,
        draft: ExamDraft,
    ) -> Result<Exam, AppError> {
        let mut t = self.tables()?;
        let exam = t
            .exams
            .get_mut(&exam_id)
            .filter(|e| e.examiner_id == examiner_id)
            .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", exam_id)))?;
        exam.title = draft.title;
        exam.questions = draft.questions;
        exam.version += 1;
        exam.updated_at = Utc::now();
        Ok(exam.clone())
    }

    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        Ok(self.tables()?.exams.get(&exam_id).cloned())
    }

    async fn list_exams_by_examiner(&self, examiner_id: i64) -> Result<Vec<Exam>, AppError> {
        let t = self.tables()?;
        Ok(t.exams
            .values()
            .rev()
            .filter(|e| e.examiner_id == examiner_id)
            .cloned()
            .collect())
    }

    async fn list_open_exams(&self, student_id: i64) -> Result<Vec<Exam>, AppError> {
        let t = self.tables()?;
        Ok(t.exams
            .values()
            .rev()
            .filter(|e| {
                t.attempts
                    .get(&(e.id, student_id))
                    .is_none_or(|a| !a.status.is_terminal())
            })
            .cloned()
            .collect())
    }

    async fn delete_exam(&self, exam_id: i64, examiner_id: i64) -> Result<(), AppError> {
        let mut t = self.tables()?;
        match t.exams.get(&exam_id) {
            Some(exam) if exam.examiner_id == examiner_id => {}
            _ => return Err(AppError::NotFound(format!("Exam {} not found", exam_id))),
        }
        t.exams.remove(&exam_id);
        t.attempts.retain(|(e, _), _| *e != exam_id);
        t.results.retain(|_, r| r.exam_id != exam_id);
        Ok(())
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn begin_attempt(&self, student_id: i64, exam_id: i64) -> Result<Attempt, AppError> {
        let mut t = self.tables()?;
        if !t.exams.contains_key(&exam_id) {
            return Err(AppError::NotFound(format!("Exam {} not found", exam_id)));
        }
        if let Some(existing) = t.attempts.get(&(exam_id, student_id)) {
            if existing.status.is_terminal() {
                return Err(AppError::AlreadySubmitted(
                    "You have already submitted this exam".to_string(),
                ));
            }
            return Ok(existing.clone());
        }
        let attempt = Attempt {
            id: Tables::allocate(&mut t.next_attempt_id),
            exam_id,
            student_id,
            answers: Vec::new(),
            violation_count: 0,
            status: AttemptStatus::InProgress,
            started_at: Utc::now(),
            submitted_at: None,
        };
        t.attempts.insert((exam_id, student_id), attempt.clone());
        Ok(attempt)
    }

    async fn find_attempt(
        &self,
        student_id: i64,
        exam_id: i64,
    ) -> Result<Option<Attempt>, AppError> {
        Ok(self.tables()?.attempts.get(&(exam_id, student_id)).cloned())
    }

    async fn commit_submission(
        &self,
        submission: TerminalSubmission,
        grader: Grader<'_>,
    ) -> Result<ExamResult, AppError> {
        let mut t = self.tables()?;
        let key = (submission.exam_id, submission.student_id);

        let exam = t
            .exams
            .get(&submission.exam_id)
            .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", submission.exam_id)))?;
        let exam_version = exam.version;

        match t.attempts.get(&key) {
            None => {
                return Err(AppError::NotFound(
                    "No attempt in progress for this exam".to_string(),
                ));
            }
            Some(a) if a.status.is_terminal() => {
                return Err(AppError::AlreadySubmitted(
                    "Exam already submitted".to_string(),
                ));
            }
            Some(_) => {}
        }

        let grade = grader(exam)?;

        let result_id = Tables::allocate(&mut t.next_result_id);
        let now = Utc::now();
        let attempt = t
            .attempts
            .get_mut(&key)
            .ok_or_else(|| AppError::InternalServerError("attempt vanished".to_string()))?;
        attempt.status = submission.status;
        attempt.answers = submission.answers;
        attempt.violation_count = attempt
            .violation_count
            .max(i32::try_from(submission.violation_count).unwrap_or(i32::MAX));
        attempt.submitted_at = Some(now);

        let result = ExamResult {
            id: result_id,
            attempt_id: attempt.id,
            exam_id: submission.exam_id,
            student_id: submission.student_id,
            score: grade.score as i32,
            total: grade.total as i32,
            passed: grade.passed,
            exam_version,
            created_at: now,
        };
        t.results.insert(result.id, result.clone());
        Ok(result)
    }

    async fn list_results(&self, student_id: i64) -> Result<Vec<ResultSummary>, AppError> {
        let t = self.tables()?;
        Ok(t.results
            .values()
            .rev()
            .filter(|r| r.student_id == student_id)
            .map(|r| ResultSummary {
                result: r.clone(),
                exam_title: t
                    .exams
                    .get(&r.exam_id)
                    .map(|e| e.title.clone())
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn find_result(&self, result_id: i64) -> Result<Option<ExamResult>, AppError> {
        Ok(self.tables()?.results.get(&result_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        grading::{Grade, PassThreshold, grade},
        models::exam::Question,
    };

    fn draft() -> ExamDraft {
        ExamDraft {
            title: "Rust basics".into(),
            questions: vec![
                Question {
                    text: "Borrow checker?".into(),
                    options: vec!["yes".into(), "no".into()],
                    answer: "yes".into(),
                },
                Question {
                    text: "GC?".into(),
                    options: vec!["yes".into(), "no".into()],
                    answer: "no".into(),
                },
            ],
        }
    }

    fn submission(exam_id: i64, student_id: i64) -> TerminalSubmission {
        TerminalSubmission {
            exam_id,
            student_id,
            status: AttemptStatus::Submitted,
            answers: vec!["yes".into(), "no".into()],
            violation_count: 1,
        }
    }

    fn full_marks(exam: &Exam) -> Result<Grade, AppError> {
        let answers = vec!["yes".to_string(), "no".to_string()];
        Ok(grade(
            &exam.questions,
            &answers,
            PassThreshold::new(0.5).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_commit_requires_an_open_attempt() {
        let store = MemoryStore::new();
        let exam = store.create_exam(1, draft()).await.unwrap();

        let err = store
            .commit_submission(submission(exam.id, 10), &full_marks)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_second_commit_is_already_submitted() {
        let store = MemoryStore::new();
        let exam = store.create_exam(1, draft()).await.unwrap();
        store.begin_attempt(10, exam.id).await.unwrap();

        let result = store
            .commit_submission(submission(exam.id, 10), &full_marks)
            .await
            .unwrap();
        assert_eq!(result.score, 2);
        assert_eq!(result.exam_version, 1);

        let err = store
            .commit_submission(submission(exam.id, 10), &full_marks)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadySubmitted(_)));

        let attempt = store.find_attempt(10, exam.id).await.unwrap().unwrap();
        assert_eq!(attempt.status, AttemptStatus::Submitted);
        assert_eq!(attempt.violation_count, 1);
        assert_eq!(store.list_results(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_begin_attempt_after_submission_is_rejected() {
        let store = MemoryStore::new();
        let exam = store.create_exam(1, draft()).await.unwrap();
        let first = store.begin_attempt(10, exam.id).await.unwrap();
        let again = store.begin_attempt(10, exam.id).await.unwrap();
        assert_eq!(first.id, again.id);

        store
            .commit_submission(submission(exam.id, 10), &full_marks)
            .await
            .unwrap();
        assert!(matches!(
            store.begin_attempt(10, exam.id).await,
            Err(AppError::AlreadySubmitted(_))
        ));
        assert!(store.list_open_exams(10).await.unwrap().is_empty());
        assert_eq!(store.list_open_exams(11).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_grading_leaves_attempt_open() {
        let store = MemoryStore::new();
        let exam = store.create_exam(1, draft()).await.unwrap();
        store.begin_attempt(10, exam.id).await.unwrap();

        let reject = |_: &Exam| -> Result<Grade, AppError> {
            Err(AppError::BadRequest("wrong length".into()))
        };
        let err = store
            .commit_submission(submission(exam.id, 10), &reject)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let attempt = store.find_attempt(10, exam.id).await.unwrap().unwrap();
        assert_eq!(attempt.status, AttemptStatus::InProgress);
        assert!(store.list_results(10).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_commits_produce_one_result() {
        let store = Arc::new(MemoryStore::new());
        let exam = store.create_exam(1, draft()).await.unwrap();
        store.begin_attempt(10, exam.id).await.unwrap();
        let exam_id = exam.id;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .commit_submission(submission(exam_id, 10), &full_marks)
                    .await
            }));
        }

        let mut accepted = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(AppError::AlreadySubmitted(_)) => duplicates += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(duplicates, 15);
        assert_eq!(store.list_results(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_bumps_version_and_delete_cascades() {
        let store = MemoryStore::new();
        let exam = store.create_exam(1, draft()).await.unwrap();
        store.begin_attempt(10, exam.id).await.unwrap();
        store
            .commit_submission(submission(exam.id, 10), &full_marks)
            .await
            .unwrap();

        assert!(matches!(
            store.update_exam(exam.id, 2, draft()).await,
            Err(AppError::NotFound(_))
        ));
        let updated = store.update_exam(exam.id, 1, draft()).await.unwrap();
        assert_eq!(updated.version, 2);

        store.delete_exam(exam.id, 1).await.unwrap();
        assert!(store.find_exam(exam.id).await.unwrap().is_none());
        assert!(store.list_results(10).await.unwrap().is_empty());
        assert!(store.find_attempt(10, exam.id).await.unwrap().is_none());
    }
}
