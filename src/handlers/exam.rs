// src/handlers/exam.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use crate::{
    error::AppError,
    models::{
        exam::{CreateExamRequest, ExamSheet, ExamSummary},
        user::Role,
    },
    state::AppState,
    utils::jwt::Claims,
};

/// Creates an exam owned by the calling examiner.
pub async fn create_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let examiner = claims.require(Role::Examiner)?;
    let draft = payload.into_draft()?;

    let exam = state
        .exams
        .create_exam(examiner.id, draft)
        .await?;

    tracing::info!("Examiner {} created exam {}", examiner.id, exam.id);
    Ok((StatusCode::CREATED, Json(exam)))
}

/// Examiners see their own exams; students see the exams still open to them.
pub async fn list_exams(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = claims.current_user()?;

    let exams = match user.role {
        Role::Examiner => state.exams.list_exams_by_examiner(user.id).await?,
        Role::Student => state.exams.list_open_exams(user.id).await?,
    };

    let summaries: Vec<ExamSummary> = exams.iter().map(|e| e.summary()).collect();
    Ok(Json(summaries))
}

/// Opens an exam.
///
/// For a student this starts (or resumes) the attempt and returns the sheet
/// without answer keys; 409 once the attempt is concluded. The owning
/// examiner gets the full exam.
pub async fn get_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let user = claims.current_user()?;

    let exam = state
        .exams
        .find_exam(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

    match user.role {
        Role::Examiner => {
            if exam.examiner_id != user.id {
                return Err(AppError::NotFound("Exam not found".to_string()));
            }
            Ok(Json(exam).into_response())
        }
        Role::Student => {
            let attempt = state.attempts.begin_attempt(user.id, exam.id).await?;
            let sheet = ExamSheet {
                exam: exam.to_public(),
                attempt_id: attempt.id,
                max_violations: state.config.max_violations,
            };
            Ok(Json(sheet).into_response())
        }
    }
}

/// Replaces title and questions. Submissions made afterwards are graded
/// against the new version.
pub async fn update_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let examiner = claims.require(Role::Examiner)?;
    let draft = payload.into_draft()?;

    let exam = state
        .exams
        .update_exam(id, examiner.id, draft)
        .await?;

    tracing::info!("Exam {} updated to version {}", exam.id, exam.version);
    Ok(Json(exam))
}

/// Deletes an exam with its attempts and results.
pub async fn delete_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let examiner = claims.require(Role::Examiner)?;
    state.exams.delete_exam(id, examiner.id).await?;

    tracing::info!("Examiner {} deleted exam {}", examiner.id, id);
    Ok(StatusCode::NO_CONTENT)
}
