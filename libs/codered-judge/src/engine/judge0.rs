// Judge0 backend: create a job, then poll it by token until it leaves the queue

use super::{http_client, EngineError, ExecutionEngine, ExecutorResponse, StageOutput};
use async_trait::async_trait;
use codered_common::config::Config;
use codered_common::types::Language;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::debug;

const STATUS_IN_QUEUE: i64 = 1;
const STATUS_PROCESSING: i64 = 2;
const STATUS_TIME_LIMIT: i64 = 5;
const STATUS_COMPILATION_ERROR: i64 = 6;
const STATUS_INTERNAL_ERROR: i64 = 13;
const STATUS_EXEC_FORMAT_ERROR: i64 = 14;

#[derive(Debug, Serialize)]
struct CreateSubmission<'a> {
    source_code: &'a str,
    language_id: i64,
    stdin: &'a str,
    /// Seconds
    wall_time_limit: f64,
}

#[derive(Debug, Deserialize)]
struct CreatedSubmission {
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Judge0Status {
    #[serde(default)]
    id: i64,
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Judge0Result {
    status: Option<Judge0Status>,
    stdout: Option<String>,
    stderr: Option<String>,
    compile_output: Option<String>,
    message: Option<String>,
    /// Seconds, sent as a string ("0.002")
    #[serde(default, deserialize_with = "seconds")]
    time: f64,
    memory: Option<f64>,
    exit_code: Option<i64>,
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

impl Judge0Result {
    fn status_id(&self) -> i64 {
        self.status.as_ref().map(|s| s.id).unwrap_or(0)
    }

    fn is_pending(&self) -> bool {
        matches!(self.status_id(), STATUS_IN_QUEUE | STATUS_PROCESSING)
    }
}

/// Map a finished Judge0 result onto the shared response shape.
///
/// - 6 (Compilation Error) → failing compile stage
/// - 5 and 7..=12 (TLE, signals, NZEC) → run stage with a non-zero exit
/// - 13, 14 (Internal / Exec Format Error) → executor failure
/// - anything else → run stage with the reported exit code
fn normalize(result: Judge0Result) -> Result<ExecutorResponse, EngineError> {
    let status_id = result.status_id();

    if matches!(status_id, STATUS_INTERNAL_ERROR | STATUS_EXEC_FORMAT_ERROR) {
        let detail = result
            .message
            .or(result.status.and_then(|s| s.description))
            .unwrap_or_else(|| format!("status {}", status_id));
        return Err(EngineError::Internal(detail));
    }

    let memory = result.memory.unwrap_or(0.0).max(0.0) as u64;

    if status_id == STATUS_COMPILATION_ERROR {
        let compile = StageOutput {
            stdout: String::new(),
            stderr: result.compile_output.unwrap_or_default(),
            exit_code: result.exit_code.filter(|code| *code != 0).unwrap_or(1),
            time: result.time,
            memory,
        };
        return Ok(ExecutorResponse::Staged {
            compile,
            run: StageOutput::default(),
        });
    }

    let failed_run = status_id == STATUS_TIME_LIMIT || (7..=12).contains(&status_id);
    let exit_code = match result.exit_code {
        Some(code) if code != 0 => code,
        _ if failed_run => 1,
        other => other.unwrap_or(0),
    };

    let mut stderr = result.stderr.unwrap_or_default();
    if stderr.is_empty() && failed_run {
        stderr = result
            .message
            .or(result.status.and_then(|s| s.description))
            .unwrap_or_default();
    }

    Ok(ExecutorResponse::Flat(StageOutput {
        stdout: result.stdout.unwrap_or_default(),
        stderr,
        exit_code,
        time: result.time,
        memory,
    }))
}

/// Judge0-backed execution engine.
///
/// Each test case is its own job and polls independently.
pub struct Judge0Engine {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    api_host: Option<String>,
    run_timeout_ms: u64,
    poll_interval: Duration,
    max_polls: u32,
}

impl Judge0Engine {
    pub fn new(
        base_url: &str,
        run_timeout_ms: u64,
        http_timeout_secs: u64,
        poll_interval: Duration,
        max_polls: u32,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            client: http_client(http_timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            api_host: None,
            run_timeout_ms,
            poll_interval,
            max_polls: max_polls.max(1),
        })
    }

    /// Authenticate through RapidAPI-style headers
    pub fn with_api_key(mut self, key: Option<String>, host: Option<String>) -> Self {
        self.api_key = key;
        self.api_host = host;
        self
    }

    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        Ok(Self::new(
            &config.judge0_url,
            config.run_timeout_ms,
            config.executor_http_timeout_secs,
            Duration::from_millis(config.judge0_poll_interval_ms),
            config.judge0_max_polls,
        )?
        .with_api_key(config.judge0_api_key.clone(), config.judge0_api_host.clone()))
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut builder = builder;
        if let Some(key) = &self.api_key {
            builder = builder.header("X-RapidAPI-Key", key);
        }
        if let Some(host) = &self.api_host {
            builder = builder.header("X-RapidAPI-Host", host);
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<String, EngineError> {
        let response = self.request(builder).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(EngineError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn create(&self, language: Language, source_code: &str, stdin: &str) -> Result<String, EngineError> {
        let url = format!("{}/submissions?base64_encoded=false&wait=false", self.base_url);
        let payload = CreateSubmission {
            source_code,
            language_id: language.judge0_id(),
            stdin,
            wall_time_limit: self.run_timeout_ms as f64 / 1000.0,
        };

        let body = self.send(self.client.post(url).json(&payload)).await?;
        let created: CreatedSubmission =
            serde_json::from_str(&body).map_err(|e| EngineError::Decode(e.to_string()))?;

        created
            .token
            .filter(|token| !token.is_empty())
            .ok_or(EngineError::MissingToken)
    }

    async fn poll(&self, token: &str) -> Result<Judge0Result, EngineError> {
        let url = format!("{}/submissions/{}?base64_encoded=false", self.base_url, token);

        for attempt in 1..=self.max_polls {
            let body = self.send(self.client.get(&url)).await?;
            let result: Judge0Result =
                serde_json::from_str(&body).map_err(|e| EngineError::Decode(e.to_string()))?;

            if !result.is_pending() {
                return Ok(result);
            }

            debug!(token, attempt, "Judge0 job still pending");
            if attempt < self.max_polls {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(EngineError::PollLimit {
            token: token.to_string(),
            polls: self.max_polls,
        })
    }
}

#[async_trait]
impl ExecutionEngine for Judge0Engine {
    fn name(&self) -> &'static str {
        "judge0"
    }

    async fn run(
        &self,
        language: Language,
        source_code: &str,
        stdin: &str,
    ) -> Result<ExecutorResponse, EngineError> {
        let token = self.create(language, source_code, stdin).await?;
        let result = self.poll(&token).await?;
        normalize(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, State},
        http::HeaderMap,
        routing::{get, post},
        Json, Router,
    };
    use codered_common::types::{CaseStatus, TestCase};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    fn parse(body: Value) -> Judge0Result {
        serde_json::from_value(body).unwrap()
    }

    async fn spawn_executor(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn engine(url: &str, max_polls: u32) -> Judge0Engine {
        Judge0Engine::new(url, 3000, 5, Duration::from_millis(10), max_polls).unwrap()
    }

    #[test]
    fn test_normalize_accepted_string_time() {
        let result = parse(json!({
            "status": {"id": 3, "description": "Accepted"},
            "stdout": "8\n", "stderr": null, "time": "0.002", "memory": 3300, "exit_code": 0
        }));

        match normalize(result).unwrap() {
            ExecutorResponse::Flat(run) => {
                assert_eq!(run.stdout, "8\n");
                assert_eq!(run.exit_code, 0);
                assert!((run.time - 0.002).abs() < 1e-9);
                assert_eq!(run.memory, 3300);
            }
            other => panic!("expected flat response, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_compilation_error() {
        let result = parse(json!({
            "status": {"id": 6, "description": "Compilation Error"},
            "compile_output": "main.c:3: error: missing ';'",
            "time": null, "memory": null, "exit_code": null
        }));

        match normalize(result).unwrap() {
            ExecutorResponse::Staged { compile, .. } => {
                assert_ne!(compile.exit_code, 0);
                assert_eq!(compile.stderr, "main.c:3: error: missing ';'");
                assert_eq!(compile.time, 0.0);
            }
            other => panic!("expected staged response, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_time_limit_is_failed_run() {
        let result = parse(json!({
            "status": {"id": 5, "description": "Time Limit Exceeded"},
            "stdout": null, "time": 3.1, "exit_code": null
        }));

        match normalize(result).unwrap() {
            ExecutorResponse::Flat(run) => {
                assert_ne!(run.exit_code, 0);
                assert_eq!(run.stderr, "Time Limit Exceeded");
            }
            other => panic!("expected flat response, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_internal_error_is_engine_error() {
        let result = parse(json!({
            "status": {"id": 13, "description": "Internal Error"},
            "message": "sandbox crashed"
        }));

        match normalize(result) {
            Err(EngineError::Internal(msg)) => assert_eq!(msg, "sandbox crashed"),
            other => panic!("expected internal error, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_wrong_answer_status_is_left_to_classify() {
        // Judge0 only judges when given expected_output; the run itself exited cleanly
        let result = parse(json!({"status": {"id": 4}, "stdout": "7", "exit_code": 0}));

        match normalize(result).unwrap() {
            ExecutorResponse::Flat(run) => assert_eq!(run.exit_code, 0),
            other => panic!("expected flat response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_polls_until_finished() {
        let polls = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/submissions",
                post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                    assert_eq!(body["language_id"], 71);
                    assert_eq!(body["stdin"], "4 4");
                    assert_eq!(
                        headers.get("X-RapidAPI-Key").and_then(|v| v.to_str().ok()),
                        Some("key")
                    );
                    Json(json!({"token": "tok-1"}))
                }),
            )
            .route(
                "/submissions/:token",
                get(
                    |State(polls): State<Arc<AtomicUsize>>, Path(token): Path<String>| async move {
                        assert_eq!(token, "tok-1");
                        let seen = polls.fetch_add(1, Ordering::SeqCst);
                        if seen < 2 {
                            Json(json!({"status": {"id": 1 + seen as i64}}))
                        } else {
                            Json(json!({
                                "status": {"id": 3, "description": "Accepted"},
                                "stdout": "8\n", "time": "0.010", "memory": 2048, "exit_code": 0
                            }))
                        }
                    },
                ),
            )
            .with_state(polls.clone());
        let url = spawn_executor(app).await;
        let engine = engine(&url, 10).with_api_key(Some("key".to_string()), None);

        let result = engine
            .execute(Language::Python, "print(8)", &TestCase::hidden("4 4", "8"), 2)
            .await;

        assert_eq!(result.status, CaseStatus::Accepted);
        assert_eq!(result.index, 2);
        assert_eq!(result.memory, 2048);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_limit_becomes_system_error() {
        let app = Router::new()
            .route("/submissions", post(|| async { Json(json!({"token": "slow"})) }))
            .route(
                "/submissions/:token",
                get(|| async { Json(json!({"status": {"id": 2, "description": "Processing"}})) }),
            );
        let url = spawn_executor(app).await;

        let result = engine(&url, 3)
            .execute(Language::Java, "class Main {}", &TestCase::public("", "x"), 1)
            .await;

        assert_eq!(result.status, CaseStatus::SystemError);
        assert!(result.stderr.contains("3 polls"));
    }

    #[tokio::test]
    async fn test_poll_limit_returns_without_trailing_sleep() {
        let app = Router::new()
            .route("/submissions", post(|| async { Json(json!({"token": "slow"})) }))
            .route(
                "/submissions/:token",
                get(|| async { Json(json!({"status": {"id": 1, "description": "In Queue"}})) }),
            );
        let url = spawn_executor(app).await;
        let engine = Judge0Engine::new(&url, 3000, 5, Duration::from_secs(2), 1).unwrap();

        let started = std::time::Instant::now();
        let outcome = engine.run(Language::Python, "print(1)", "").await;

        assert!(matches!(outcome, Err(EngineError::PollLimit { polls: 1, .. })));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_missing_token_becomes_system_error() {
        let app = Router::new().route(
            "/submissions",
            post(|| async { Json(json!({"error": "quota exceeded"})) }),
        );
        let url = spawn_executor(app).await;

        let result = engine(&url, 3)
            .execute(Language::C, "int main(){}", &TestCase::public("", ""), 1)
            .await;

        assert_eq!(result.status, CaseStatus::SystemError);
        assert!(result.stderr.contains("token"));
    }
}
