// src/handlers/submission.rs

use axum::{
    Json,
    extract::{Extension, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{attempt::SubmitExamRequest, user::Role},
    state::AppState,
    utils::jwt::Claims,
};

/// Submits an attempt, manually or by the proctor's auto-trigger.
///
/// Returns the graded result the first time; every later call for the same
/// attempt gets 409 with code `already_submitted`.
pub async fn submit_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SubmitExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student = claims.require(Role::Student)?;
    let result = state.arbiter.record_submission(student.id, payload).await?;
    Ok(Json(result))
}
