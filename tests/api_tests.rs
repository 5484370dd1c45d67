// tests/api_tests.rs

use std::sync::Arc;

use exam_proctor::{
    config::Config,
    grading::PassThreshold,
    models::user::Role,
    routes,
    state::AppState,
    store::MemoryStore,
    utils::jwt::sign_jwt,
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

const SECRET: &str = "test_secret_for_integration_tests";

struct TestApp {
    address: String,
    client: Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    fn token(&self, id: i64, role: Role) -> String {
        sign_jwt(id, role, SECRET, 600).unwrap()
    }
}

/// Spawns the app on a random port, backed by the in-memory store.
async fn spawn_app() -> TestApp {
    let config = Config {
        database_url: String::new(),
        jwt_secret: SECRET.to_string(),
        rust_log: "error".to_string(),
        port: 0,
        allowed_origins: vec!["http://localhost:5173".to_string()],
        passing_threshold: PassThreshold::new(0.7).unwrap(),
        max_violations: 5,
    };

    let state = AppState::new(Arc::new(MemoryStore::new()), config);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: Client::new(),
    }
}

fn four_questions() -> Value {
    json!([
        { "text": "Q1", "options": ["A", "B", "C", "D"], "answer": "A" },
        { "text": "Q2", "options": ["A", "B", "C", "D"], "answer": "B" },
        { "text": "Q3", "options": ["A", "B", "C", "D"], "answer": "C" },
        { "text": "Q4", "options": ["A", "B", "C", "D"], "answer": "D" }
    ])
}

async fn create_exam(app: &TestApp, examiner: &str, questions: Value) -> i64 {
    let title = format!("Exam {}", &uuid::Uuid::new_v4().to_string()[..8]);
    let response = app
        .client
        .post(app.url("/api/exams"))
        .bearer_auth(examiner)
        .json(&json!({ "title": title, "questions": questions }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    body["id"].as_i64().unwrap()
}

async fn open_exam(app: &TestApp, student: &str, exam_id: i64) -> reqwest::Response {
    app.client
        .get(app.url(&format!("/api/exams/{}", exam_id)))
        .bearer_auth(student)
        .send()
        .await
        .expect("Failed to execute request")
}

async fn submit(
    app: &TestApp,
    student: &str,
    exam_id: i64,
    answers: &[&str],
    trigger: &str,
) -> reqwest::Response {
    let violation_count = if trigger == "auto" { 5 } else { 0 };
    app.client
        .post(app.url("/api/exams/submit"))
        .bearer_auth(student)
        .json(&json!({
            "exam_id": exam_id,
            "answers": answers,
            "trigger": trigger,
            "violation_count": violation_count
        }))
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn ping_works_without_token() {
    let app = spawn_app().await;

    let response = app.client.get(app.url("/ping")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "pong");
}

#[tokio::test]
async fn api_requires_token() {
    let app = spawn_app().await;

    let missing = app.client.get(app.url("/api/exams")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let forged = sign_jwt(1, Role::Student, "another_secret", 600).unwrap();
    let response = app
        .client
        .get(app.url("/api/exams"))
        .bearer_auth(forged)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn student_sheet_hides_answers() {
    let app = spawn_app().await;
    let examiner = app.token(100, Role::Examiner);
    let student = app.token(1, Role::Student);
    let exam_id = create_exam(&app, &examiner, four_questions()).await;

    let response = open_exam(&app, &student, exam_id).await;
    assert_eq!(response.status(), StatusCode::OK);

    let sheet: Value = response.json().await.unwrap();
    assert_eq!(sheet["max_violations"], 5);
    assert!(sheet["attempt_id"].as_i64().is_some());
    let questions = sheet["exam"]["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 4);
    assert!(questions.iter().all(|q| q.get("answer").is_none()));

    // reopening resumes the same attempt
    let again: Value = open_exam(&app, &student, exam_id).await.json().await.unwrap();
    assert_eq!(again["attempt_id"], sheet["attempt_id"]);
}

#[tokio::test]
async fn submission_is_graded_and_recorded_once() {
    let app = spawn_app().await;
    let examiner = app.token(100, Role::Examiner);
    let student = app.token(1, Role::Student);
    let exam_id = create_exam(&app, &examiner, four_questions()).await;
    open_exam(&app, &student, exam_id).await;

    let response = submit(&app, &student, exam_id, &["A", "B", "X", "D"], "manual").await;
    assert_eq!(response.status(), StatusCode::OK);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["score"], 3);
    assert_eq!(result["total"], 4);
    assert_eq!(result["passed"], true);
    assert_eq!(result["exam_version"], 1);

    // the duplicate is refused with a recognizable code
    let response = submit(&app, &student, exam_id, &["A", "B", "C", "D"], "auto").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "already_submitted");

    // and the exam can no longer be opened
    let response = open_exam(&app, &student, exam_id).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let results: Value = app
        .client
        .get(app.url("/api/results"))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["score"], 3);
    assert!(results[0]["exam_title"].as_str().unwrap().starts_with("Exam "));
}

#[tokio::test]
async fn racing_manual_and_auto_submissions_yield_one_result() {
    let app = spawn_app().await;
    let examiner = app.token(100, Role::Examiner);
    let student = app.token(1, Role::Student);
    let exam_id = create_exam(&app, &examiner, four_questions()).await;
    open_exam(&app, &student, exam_id).await;

    let answers = ["A", "B", "C", "D"];
    let (manual, auto) = tokio::join!(
        submit(&app, &student, exam_id, &answers, "manual"),
        submit(&app, &student, exam_id, &answers, "auto"),
    );

    let mut statuses = vec![manual.status(), auto.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    let results: Value = app
        .client
        .get(app.url("/api/results"))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(results.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn auto_submission_is_recorded() {
    let app = spawn_app().await;
    let examiner = app.token(100, Role::Examiner);
    let student = app.token(2, Role::Student);
    let exam_id = create_exam(&app, &examiner, four_questions()).await;
    open_exam(&app, &student, exam_id).await;

    let response = submit(&app, &student, exam_id, &["A", "", "", ""], "auto").await;
    assert_eq!(response.status(), StatusCode::OK);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["score"], 1);
    assert_eq!(result["passed"], false);
}

#[tokio::test]
async fn submit_without_attempt_is_not_found() {
    let app = spawn_app().await;
    let examiner = app.token(100, Role::Examiner);
    let student = app.token(1, Role::Student);
    let exam_id = create_exam(&app, &examiner, four_questions()).await;

    let response = submit(&app, &student, exam_id, &["A", "B", "C", "D"], "manual").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = submit(&app, &student, 9999, &["A"], "manual").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_answer_count_is_rejected_without_side_effects() {
    let app = spawn_app().await;
    let examiner = app.token(100, Role::Examiner);
    let student = app.token(1, Role::Student);
    let exam_id = create_exam(&app, &examiner, four_questions()).await;
    open_exam(&app, &student, exam_id).await;

    let response = submit(&app, &student, exam_id, &["A", "B"], "manual").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "bad_request");

    // the attempt is still open
    let response = submit(&app, &student, exam_id, &["A", "B", "C", "D"], "manual").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn roles_are_enforced() {
    let app = spawn_app().await;
    let examiner = app.token(100, Role::Examiner);
    let student = app.token(1, Role::Student);

    let response = app
        .client
        .post(app.url("/api/exams"))
        .bearer_auth(&student)
        .json(&json!({ "title": "Mine", "questions": four_questions() }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let exam_id = create_exam(&app, &examiner, four_questions()).await;
    let response = submit(&app, &examiner, exam_id, &["A", "B", "C", "D"], "manual").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // another examiner cannot see or delete it
    let other = app.token(101, Role::Examiner);
    let response = open_exam(&app, &other, exam_id).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app
        .client
        .delete(app.url(&format!("/api/exams/{}", exam_id)))
        .bearer_auth(&other)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_exam_is_rejected() {
    let app = spawn_app().await;
    let examiner = app.token(100, Role::Examiner);

    let response = app
        .client
        .post(app.url("/api/exams"))
        .bearer_auth(&examiner)
        .json(&json!({
            "title": "Broken",
            "questions": [{ "text": "Q1", "options": ["A", "B"], "answer": "Z" }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn exam_whose_answer_sanitizes_away_is_rejected() {
    let app = spawn_app().await;
    let examiner = app.token(100, Role::Examiner);

    let response = app
        .client
        .post(app.url("/api/exams"))
        .bearer_auth(&examiner)
        .json(&json!({
            "title": "Markup",
            "questions": [{
                "text": "Q1",
                "options": ["<script>x</script>", "<b></b>", "B"],
                "answer": "<script>x</script>"
            }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let listed: Value = app
        .client
        .get(app.url("/api/exams"))
        .bearer_auth(&examiner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn examiner_lists_own_exams_and_student_sees_open_ones() {
    let app = spawn_app().await;
    let examiner = app.token(100, Role::Examiner);
    let student = app.token(1, Role::Student);
    let first = create_exam(&app, &examiner, four_questions()).await;
    create_exam(&app, &examiner, four_questions()).await;

    let own: Value = app
        .client
        .get(app.url("/api/exams"))
        .bearer_auth(&examiner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(own.as_array().unwrap().len(), 2);

    open_exam(&app, &student, first).await;
    submit(&app, &student, first, &["A", "B", "C", "D"], "manual").await;

    let open: Value = app
        .client
        .get(app.url("/api/exams"))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let open = open.as_array().unwrap();
    assert_eq!(open.len(), 1);
    assert_ne!(open[0]["id"], first);
    assert_eq!(open[0]["question_count"], 4);
}

#[tokio::test]
async fn submissions_after_update_use_new_version() {
    let app = spawn_app().await;
    let examiner = app.token(100, Role::Examiner);
    let student = app.token(1, Role::Student);
    let exam_id = create_exam(&app, &examiner, four_questions()).await;
    open_exam(&app, &student, exam_id).await;

    let response = app
        .client
        .put(app.url(&format!("/api/exams/{}", exam_id)))
        .bearer_auth(&examiner)
        .json(&json!({
            "title": "Revised",
            "questions": [
                { "text": "Q1", "options": ["A", "B"], "answer": "B" },
                { "text": "Q2", "options": ["A", "B"], "answer": "B" }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let exam: Value = response.json().await.unwrap();
    assert_eq!(exam["version"], 2);

    let response = submit(&app, &student, exam_id, &["B", "B"], "manual").await;
    assert_eq!(response.status(), StatusCode::OK);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["score"], 2);
    assert_eq!(result["total"], 2);
    assert_eq!(result["exam_version"], 2);
}

#[tokio::test]
async fn deleted_exam_cannot_be_submitted() {
    let app = spawn_app().await;
    let examiner = app.token(100, Role::Examiner);
    let student = app.token(1, Role::Student);
    let exam_id = create_exam(&app, &examiner, four_questions()).await;
    open_exam(&app, &student, exam_id).await;

    let response = app
        .client
        .delete(app.url(&format!("/api/exams/{}", exam_id)))
        .bearer_auth(&examiner)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = submit(&app, &student, exam_id, &["A", "B", "C", "D"], "manual").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn certificate_only_for_passed_results() {
    let app = spawn_app().await;
    let examiner = app.token(100, Role::Examiner);
    let passing = app.token(1, Role::Student);
    let failing = app.token(2, Role::Student);
    let exam_id = create_exam(&app, &examiner, four_questions()).await;

    open_exam(&app, &passing, exam_id).await;
    let passed: Value = submit(&app, &passing, exam_id, &["A", "B", "C", "D"], "manual")
        .await
        .json()
        .await
        .unwrap();

    open_exam(&app, &failing, exam_id).await;
    let failed: Value = submit(&app, &failing, exam_id, &["D", "C", "B", "A"], "manual")
        .await
        .json()
        .await
        .unwrap();

    let response = app
        .client
        .get(app.url(&format!("/api/results/{}/certificate", passed["id"])))
        .bearer_auth(&passing)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let certificate: Value = response.json().await.unwrap();
    assert_eq!(certificate["examiner_id"], 100);
    assert_eq!(certificate["score"], 4);
    assert!(certificate["exam_title"].as_str().unwrap().starts_with("Exam "));

    let response = app
        .client
        .get(app.url(&format!("/api/results/{}/certificate", failed["id"])))
        .bearer_auth(&failing)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // someone else's result stays hidden; the exam owner may read it
    let response = app
        .client
        .get(app.url(&format!("/api/results/{}", passed["id"])))
        .bearer_auth(&failing)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .client
        .get(app.url(&format!("/api/results/{}", passed["id"])))
        .bearer_auth(&examiner)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
