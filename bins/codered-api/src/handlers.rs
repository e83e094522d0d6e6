// HTTP route handlers for the CodeRed API

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use codered_common::types::{Language, Submission};
use codered_judge::RunPreview;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::{metrics, AppState};

/// Shortest source accepted for evaluation
const MIN_SOURCE_LEN: usize = 10;

/// Header carrying the caller identity, set by the upstream auth layer
const USER_ID_HEADER: &str = "x-user-id";

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub problem_id: i64,
    pub language_id: i64,
    pub source_code: String,
}

impl CodeRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.source_code.chars().count() < MIN_SOURCE_LEN {
            return Err(ApiError::Validation(format!(
                "source_code must be at least {} characters",
                MIN_SOURCE_LEN
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// Unwrap a JSON body and run field validation
fn validated(payload: Result<Json<CodeRequest>, JsonRejection>) -> Result<CodeRequest, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        metrics::record_rejected("malformed_body");
        ApiError::Validation(rejection.body_text())
    })?;

    if let Err(e) = request.validate() {
        metrics::record_rejected("source_too_short");
        return Err(e);
    }
    Ok(request)
}

fn caller_id(headers: &HeaderMap) -> Result<i64, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or(ApiError::Unauthorized)
}

/// POST /run - Run code against the public test cases
pub async fn run_code(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CodeRequest>, JsonRejection>,
) -> Result<Json<RunPreview>, ApiError> {
    let request = validated(payload)?;
    let language = Language::from_id(request.language_id);
    let started = Instant::now();

    let preview = state
        .judge
        .run_preview(request.problem_id, request.language_id, &request.source_code)
        .await?;

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    metrics::record_run(&language.to_string(), preview.verdict.as_str(), elapsed_ms);
    for case in &preview.results {
        metrics::record_case_outcome(case.status.as_str());
    }

    info!(
        problem_id = request.problem_id,
        language = %language,
        verdict = %preview.verdict,
        "Run served"
    );

    Ok(Json(preview))
}

/// POST /submit - Judge code against every test case and record it
pub async fn submit_code(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CodeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Submission>), ApiError> {
    let user_id = caller_id(&headers).map_err(|e| {
        metrics::record_rejected("unauthenticated");
        e
    })?;
    let request = validated(payload)?;
    let started = Instant::now();

    let submission = state
        .judge
        .submit(
            request.problem_id,
            request.language_id,
            &request.source_code,
            user_id,
        )
        .await?;

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    metrics::record_submission(
        &submission.language.to_string(),
        submission.verdict.as_str(),
        elapsed_ms,
    );

    Ok((StatusCode::CREATED, Json(submission)))
}

/// GET /submissions/{id} - Fetch one submission
pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Submission>, ApiError> {
    let submission_id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::Validation("Invalid submission ID format".to_string()))?;

    match state.submissions.get(submission_id).await? {
        Some(submission) => Ok(Json(submission)),
        None => {
            warn!(submission_id = %submission_id, "Submission not found");
            Err(ApiError::NotFound(format!("Submission {} not found", submission_id)))
        }
    }
}

/// GET /users/{user_id}/submissions - Most recent submissions of a user
pub async fn list_user_submissions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Submission>>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);

    let submissions = state.submissions.list_for_user(user_id, limit).await?;
    Ok(Json(submissions))
}

/// GET /health - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus text exposition
pub async fn prometheus_metrics() -> Result<impl IntoResponse, ApiError> {
    let body = metrics::render_metrics().map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use codered_common::types::{CaseStatus, TestCase, Verdict};
    use codered_judge::engine::{EngineError, ExecutionEngine, ExecutorResponse, StageOutput};
    use codered_judge::{Judge, JudgeSettings, MemoryStore};
    use axum::http::HeaderValue;

    const SOURCE: &str = "a, b = map(int, input().split()); print(a + b)";

    /// Sums whitespace-separated integers from stdin
    struct AdderEngine;

    #[async_trait]
    impl ExecutionEngine for AdderEngine {
        fn name(&self) -> &'static str {
            "adder"
        }

        async fn run(
            &self,
            _language: Language,
            _source_code: &str,
            stdin: &str,
        ) -> Result<ExecutorResponse, EngineError> {
            let sum: i64 = stdin
                .split_whitespace()
                .filter_map(|n| n.parse::<i64>().ok())
                .sum();
            Ok(ExecutorResponse::Flat(StageOutput {
                stdout: sum.to_string(),
                ..Default::default()
            }))
        }
    }

    async fn state_with(cases: Option<Vec<TestCase>>) -> Arc<AppState> {
        let mut store = MemoryStore::new();
        if let Some(cases) = cases {
            store = store.with_test_cases(1, cases).await;
        }
        let store = Arc::new(store);
        let judge = Judge::new(
            Arc::new(AdderEngine),
            store.clone(),
            store.clone(),
            JudgeSettings::default(),
        );
        Arc::new(AppState {
            judge,
            submissions: store,
        })
    }

    fn request(problem_id: i64, source_code: &str) -> Result<Json<CodeRequest>, JsonRejection> {
        Ok(Json(CodeRequest {
            problem_id,
            language_id: 71,
            source_code: source_code.to_string(),
        }))
    }

    fn user_headers(user_id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(user_id).unwrap());
        headers
    }

    fn status_of<T>(result: Result<T, ApiError>) -> StatusCode {
        match result {
            Ok(_) => StatusCode::OK,
            Err(e) => e.into_response().status(),
        }
    }

    #[tokio::test]
    async fn test_run_returns_public_results() {
        let state = state_with(Some(vec![
            TestCase::public("2 3", "5"),
            TestCase::hidden("4 4", "8"),
        ]))
        .await;

        let Json(preview) = run_code(State(state), request(1, SOURCE)).await.unwrap();

        assert_eq!(preview.verdict, CaseStatus::Accepted);
        assert_eq!(preview.total_public_cases, 1);
        assert_eq!(preview.results.len(), 1);
        assert_eq!(preview.results[0].expected_output, "5");
    }

    #[tokio::test]
    async fn test_run_unknown_problem_is_not_found() {
        let state = state_with(None).await;

        let result = run_code(State(state), request(1, SOURCE)).await;

        assert_eq!(status_of(result), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_run_hidden_only_problem_is_unprocessable() {
        let state = state_with(Some(vec![TestCase::hidden("4 4", "8")])).await;

        let result = run_code(State(state), request(1, SOURCE)).await;

        assert_eq!(status_of(result), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_short_source_is_rejected() {
        let state = state_with(Some(vec![TestCase::public("1 1", "2")])).await;

        let result = run_code(State(state), request(1, "print()")).await;

        assert_eq!(status_of(result), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_submit_requires_user_header() {
        let state = state_with(Some(vec![TestCase::public("1 1", "2")])).await;

        let missing = submit_code(State(state.clone()), HeaderMap::new(), request(1, SOURCE)).await;
        assert_eq!(status_of(missing), StatusCode::UNAUTHORIZED);

        let garbage = submit_code(State(state.clone()), user_headers("alice"), request(1, SOURCE)).await;
        assert_eq!(status_of(garbage), StatusCode::UNAUTHORIZED);

        assert!(state.submissions.list_for_user(7, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_records_and_returns_submission() {
        let state = state_with(Some(vec![
            TestCase::public("2 3", "5"),
            TestCase::hidden("4 4", "8"),
        ]))
        .await;

        let (status, Json(submission)) =
            submit_code(State(state.clone()), user_headers("7"), request(1, SOURCE))
                .await
                .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(submission.verdict, Verdict::Accepted);
        assert_eq!(submission.user_id, 7);
        assert_eq!(submission.test_cases_passed, 2);

        let Json(fetched) = get_submission(State(state.clone()), Path(submission.id.to_string()))
            .await
            .unwrap();
        assert_eq!(fetched.id, submission.id);

        let Json(listed) = list_user_submissions(
            State(state),
            Path(7),
            Query(ListParams { limit: None }),
        )
        .await
        .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_unknown_problem_is_not_found() {
        let state = state_with(None).await;

        let result = submit_code(State(state), user_headers("7"), request(9, SOURCE)).await;

        assert_eq!(status_of(result), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_submission_bad_and_unknown_ids() {
        let state = state_with(None).await;

        let bad = get_submission(State(state.clone()), Path("not-a-uuid".to_string())).await;
        assert_eq!(status_of(bad), StatusCode::BAD_REQUEST);

        let unknown = get_submission(State(state), Path(Uuid::new_v4().to_string())).await;
        assert_eq!(status_of(unknown), StatusCode::NOT_FOUND);
    }

    /// Drive one request through the full router
    async fn call(
        state: Arc<AppState>,
        request: axum::http::Request<axum::body::Body>,
    ) -> (StatusCode, serde_json::Value) {
        use tower::ServiceExt;

        let app = crate::routes::routes().with_state(state);
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }

    fn json_post(uri: &str, user_id: Option<&str>, body: serde_json::Value) -> axum::http::Request<axum::body::Body> {
        let mut builder = axum::http::Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(user_id) = user_id {
            builder = builder.header(USER_ID_HEADER, user_id);
        }
        builder
            .body(axum::body::Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .uri(uri)
            .body(axum::body::Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_router_serves_run_and_submit() {
        let state = state_with(Some(vec![
            TestCase::public("2 3", "5"),
            TestCase::hidden("4 4", "8"),
        ]))
        .await;
        let payload = serde_json::json!({"problem_id": 1, "language_id": 71, "source_code": SOURCE});

        let (status, body) = call(state.clone(), json_post("/run", None, payload.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verdict"], "Accepted");
        assert_eq!(body["total_public_cases"], 1);

        let (status, body) = call(state.clone(), json_post("/submit", Some("7"), payload)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["verdict"], "Accepted");
        assert_eq!(body["test_cases_passed"], 2);

        let id = body["id"].as_str().unwrap().to_string();
        let (status, body) = call(state.clone(), get_request(&format!("/submissions/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id.as_str());

        let (status, body) = call(state, get_request("/users/7/submissions?limit=5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(|a| a.len()), Some(1));
    }

    #[tokio::test]
    async fn test_router_error_bodies() {
        let state = state_with(Some(vec![TestCase::public("1 1", "2")])).await;
        let payload = serde_json::json!({"problem_id": 1, "language_id": 71, "source_code": SOURCE});

        let (status, body) = call(state.clone(), json_post("/submit", None, payload)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");

        let (status, body) =
            call(state.clone(), json_post("/run", None, serde_json::json!({"problem_id": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let missing = serde_json::json!({"problem_id": 99, "language_id": 71, "source_code": SOURCE});
        let (status, body) = call(state.clone(), json_post("/run", None, missing)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (status, _) = call(state, get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
    }
}
