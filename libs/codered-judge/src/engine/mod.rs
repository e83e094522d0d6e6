/// Execution Engine - Executor Client
///
/// **Core Responsibility:**
/// Send one test case to the external executor and turn whatever comes back
/// into a canonical `CaseResult`.
///
/// **Architectural Boundary:**
/// - Backends know HOW to talk to an executor (Piston, Judge0)
/// - Backends only produce an `ExecutorResponse`
/// - `classify` owns the comparison rules, identically for every backend
/// - Transport failures never escape: they become `SystemError` results
///
/// No retries: one attempt per case.

mod judge0;
mod piston;

pub use judge0::Judge0Engine;
pub use piston::PistonEngine;

use async_trait::async_trait;
use codered_common::config::{Config, ExecutorBackend};
use codered_common::types::{CaseResult, CaseStatus, Language, TestCase};
use std::sync::Arc;
use tracing::{debug, warn};

/// Output of one executor stage, with every field defaulted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
    /// Seconds
    pub time: f64,
    pub memory: u64,
}

/// Normalized executor response.
///
/// Piston reports a separate compile stage for compiled languages; Judge0 and
/// interpreted runs produce a single flat result.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorResponse {
    Flat(StageOutput),
    Staged {
        compile: StageOutput,
        run: StageOutput,
    },
}

/// Transport-level failures talking to an executor
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("executor request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("executor returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("executor response could not be decoded: {0}")]
    Decode(String),
    #[error("executor did not return a submission token")]
    MissingToken,
    #[error("executor job {token} still pending after {polls} polls")]
    PollLimit { token: String, polls: u32 },
    #[error("executor internal error: {0}")]
    Internal(String),
}

/// Execution engine trait
///
/// Implementations must:
/// 1. Issue the request(s) for a single test case
/// 2. Pass the configured wall-clock run timeout to the executor
/// 3. Return the executor's response normalized to `ExecutorResponse`
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Backend name, for logs
    fn name(&self) -> &'static str;

    /// Run source code against one stdin
    async fn run(
        &self,
        language: Language,
        source_code: &str,
        stdin: &str,
    ) -> Result<ExecutorResponse, EngineError>;

    /// Execute one test case and classify the outcome.
    /// Never fails; executor errors come back as `SystemError`.
    async fn execute(
        &self,
        language: Language,
        source_code: &str,
        test_case: &TestCase,
        index: usize,
    ) -> CaseResult {
        match self.run(language, source_code, &test_case.input).await {
            Ok(response) => {
                let result = classify(response, test_case, index);
                debug!(
                    engine = self.name(),
                    index,
                    status = ?result.status,
                    time = result.time,
                    "Test case executed"
                );
                result
            }
            Err(e) => {
                warn!(engine = self.name(), index, error = %e, "Executor call failed");
                system_error(test_case, index, e.to_string())
            }
        }
    }
}

/// Build the engine selected by configuration
pub fn from_config(config: &Config) -> Result<Arc<dyn ExecutionEngine>, EngineError> {
    let engine: Arc<dyn ExecutionEngine> = match config.executor_backend {
        ExecutorBackend::Piston => Arc::new(PistonEngine::from_config(config)?),
        ExecutorBackend::Judge0 => Arc::new(Judge0Engine::from_config(config)?),
    };
    Ok(engine)
}

/// Shared HTTP client for an engine
fn http_client(timeout_secs: u64) -> Result<reqwest::Client, EngineError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(EngineError::Transport)
}

/// Turn an executor response into a canonical case result.
///
/// Resolution order:
/// 1. Compile stage with non-zero exit → CompilationError
/// 2. Run stage non-zero exit → RuntimeError
/// 3. Trimmed stdout differs from trimmed expected → WrongAnswer
/// 4. Otherwise → Accepted
pub fn classify(response: ExecutorResponse, test_case: &TestCase, index: usize) -> CaseResult {
    let expected = test_case.expected_output.trim().to_string();

    let run = match response {
        ExecutorResponse::Staged { compile, .. } if compile.exit_code != 0 => {
            return CaseResult {
                index,
                status: CaseStatus::CompilationError,
                passed: false,
                input: test_case.input.clone(),
                expected,
                actual: String::new(),
                stderr: compile.stderr,
                time: compile.time,
                memory: compile.memory,
                hidden: test_case.hidden,
            };
        }
        ExecutorResponse::Staged { run, .. } => run,
        ExecutorResponse::Flat(run) => run,
    };

    let actual = run.stdout.trim().to_string();
    let status = if run.exit_code != 0 {
        CaseStatus::RuntimeError
    } else if actual != expected {
        CaseStatus::WrongAnswer
    } else {
        CaseStatus::Accepted
    };

    CaseResult {
        index,
        status,
        passed: status == CaseStatus::Accepted,
        input: test_case.input.clone(),
        expected,
        actual,
        stderr: run.stderr,
        time: run.time,
        memory: run.memory,
        hidden: test_case.hidden,
    }
}

/// Result recorded when the executor could not be reached or understood
pub fn system_error(test_case: &TestCase, index: usize, message: String) -> CaseResult {
    CaseResult {
        index,
        status: CaseStatus::SystemError,
        passed: false,
        input: test_case.input.clone(),
        expected: test_case.expected_output.trim().to_string(),
        actual: String::new(),
        stderr: message,
        time: 0.0,
        memory: 0,
        hidden: test_case.hidden,
    }
}
