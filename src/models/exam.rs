// src/models/exam.rs

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

use crate::utils::html::clean_html;

/// One multiple-choice question. `answer` is the correct option and is
/// only ever sent to the exam's examiner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// The text content of the question.
    pub text: String,

    /// List of options (e.g., ["Option A", "Option B"]).
    pub options: Vec<String>,

    /// The correct option, verbatim.
    pub answer: String,
}

/// An exam as stored. `version` increases on every edit; results record the
/// version they were graded against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub examiner_id: i64,
    pub title: String,
    pub questions: Vec<Question>,
    pub version: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'exams' table in the database.
#[derive(Debug, FromRow)]
pub struct ExamRow {
    pub id: i64,
    pub examiner_id: i64,
    pub title: String,
    pub questions: Json<Vec<Question>>,
    pub version: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ExamRow> for Exam {
    fn from(row: ExamRow) -> Self {
        Exam {
            id: row.id,
            examiner_id: row.examiner_id,
            title: row.title,
            questions: row.questions.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl Exam {
    /// Strips the correct answers for the student-facing read.
    pub fn to_public(&self) -> PublicExam {
        PublicExam {
            id: self.id,
            title: self.title.clone(),
            version: self.version,
            questions: self
                .questions
                .iter()
                .map(|q| PublicQuestion {
                    text: q.text.clone(),
                    options: q.options.clone(),
                })
                .collect(),
        }
    }

    /// Short listing entry without questions.
    pub fn summary(&self) -> ExamSummary {
        ExamSummary {
            id: self.id,
            title: self.title.clone(),
            question_count: self.questions.len(),
            version: self.version,
            created_at: self.created_at,
        }
    }
}

/// DTO for sending a question to a student (excludes the answer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub text: String,
    pub options: Vec<String>,
}

/// DTO for sending an exam to a student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicExam {
    pub id: i64,
    pub title: String,
    pub version: i32,
    pub questions: Vec<PublicQuestion>,
}

/// Listing entry for dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSummary {
    pub id: i64,
    pub title: String,
    pub question_count: usize,
    pub version: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// What a student receives when opening an exam: the questions, their
/// attempt, and the proctoring limit the monitor must enforce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSheet {
    pub exam: PublicExam,
    pub attempt_id: i64,
    pub max_violations: u32,
}

/// DTO for creating or replacing an exam.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateExamRequest {
    pub title: String,
    pub questions: Vec<Question>,
}

impl CreateExamRequest {
    /// Sanitizes the examiner-authored text, then validates what is left.
    ///
    /// Validation runs on the sanitized text because that is what gets
    /// stored and graded: markup that strips to nothing must not leave an
    /// empty option or an answer key no option can match.
    pub fn into_draft(self) -> Result<ExamDraft, validator::ValidationErrors> {
        let draft = self.sanitized();
        draft.validate()?;
        Ok(draft)
    }

    fn sanitized(self) -> ExamDraft {
        ExamDraft {
            title: clean_html(&self.title),
            questions: self
                .questions
                .into_iter()
                .map(|q| Question {
                    text: clean_html(&q.text),
                    options: q.options.iter().map(|o| clean_html(o)).collect(),
                    answer: clean_html(&q.answer),
                })
                .collect(),
        }
    }
}

/// Sanitized exam content ready to be stored.
#[derive(Debug, Clone, Validate)]
pub struct ExamDraft {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 500), custom(function = validate_questions))]
    pub questions: Vec<Question>,
}

fn validate_questions(questions: &[Question]) -> Result<(), validator::ValidationError> {
    for q in questions {
        if q.text.trim().is_empty() {
            return Err(validator::ValidationError::new("question_text_empty"));
        }
        if q.text.len() > 1000 {
            return Err(validator::ValidationError::new("question_text_too_long"));
        }
        if q.options.len() < 2 {
            return Err(validator::ValidationError::new("too_few_options"));
        }
        let mut seen = HashSet::new();
        for opt in &q.options {
            if opt.is_empty() {
                return Err(validator::ValidationError::new("option_empty"));
            }
            if opt.len() > 500 {
                return Err(validator::ValidationError::new("option_too_long"));
            }
            if !seen.insert(opt.as_str()) {
                return Err(validator::ValidationError::new("duplicate_option"));
            }
        }
        if !q.options.contains(&q.answer) {
            return Err(validator::ValidationError::new("answer_not_an_option"));
        }
    }
    Ok(())
}
