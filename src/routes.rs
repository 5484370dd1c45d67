// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{exam, result, submission},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Everything under `/api` requires a bearer token; role checks happen
///   in the handlers.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let exam_routes = Router::new()
        .route("/", get(exam::list_exams).post(exam::create_exam))
        .route("/submit", post(submission::submit_exam))
        .route(
            "/{id}",
            get(exam::get_exam)
                .put(exam::update_exam)
                .delete(exam::delete_exam),
        );

    let result_routes = Router::new()
        .route("/", get(result::list_results))
        .route("/{id}", get(result::get_result))
        .route("/{id}/certificate", get(result::get_certificate));

    let api_routes = Router::new()
        .nest("/exams", exam_routes)
        .nest("/results", result_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/ping", get(|| async { "pong" }))
        .nest("/api", api_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
