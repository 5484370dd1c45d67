// src/handlers/result.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{
        result::{Certificate, ExamResult},
        user::{CurrentUser, Role},
    },
    state::AppState,
    utils::jwt::Claims,
};

/// Lists the calling student's results, newest first.
pub async fn list_results(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student = claims.require(Role::Student)?;
    let results = state.attempts.list_results(student.id).await?;
    Ok(Json(results))
}

/// Fetches one result. Visible to the student who earned it and to the
/// examiner who owns the exam.
pub async fn get_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = claims.current_user()?;
    let result = visible_result(&state, &user, id).await?;
    Ok(Json(result))
}

/// Certificate data for a passed result. Only the student who passed may
/// request it.
pub async fn get_certificate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student = claims.require(Role::Student)?;
    let result = visible_result(&state, &student, id).await?;

    if !result.passed {
        return Err(AppError::Forbidden(
            "Certificates are only issued for passed exams".to_string(),
        ));
    }

    let exam = state
        .exams
        .find_exam(result.exam_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

    Ok(Json(Certificate {
        certificate_id: result.id,
        student_id: result.student_id,
        exam_id: exam.id,
        exam_title: exam.title,
        examiner_id: exam.examiner_id,
        score: result.score,
        total: result.total,
        issued_at: result.created_at,
    }))
}

/// Loads a result and hides it (404) from anyone not entitled to it.
async fn visible_result(
    state: &AppState,
    user: &CurrentUser,
    result_id: i64,
) -> Result<ExamResult, AppError> {
    let not_found = || AppError::NotFound("Result not found".to_string());

    let result = state
        .attempts
        .find_result(result_id)
        .await?
        .ok_or_else(not_found)?;

    let allowed = match user.role {
        Role::Student => result.student_id == user.id,
        Role::Examiner => state
            .exams
            .find_exam(result.exam_id)
            .await?
            .is_some_and(|exam| exam.examiner_id == user.id),
    };

    if allowed { Ok(result) } else { Err(not_found()) }
}
