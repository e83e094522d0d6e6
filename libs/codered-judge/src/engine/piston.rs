// Piston backend: one synchronous compile+run request per test case

use super::{http_client, EngineError, ExecutionEngine, ExecutorResponse, StageOutput};
use async_trait::async_trait;
use codered_common::config::Config;
use codered_common::types::Language;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct PistonFile<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct PistonRequest<'a> {
    language: &'a str,
    version: &'a str,
    files: Vec<PistonFile<'a>>,
    stdin: &'a str,
    /// Milliseconds
    run_timeout: u64,
}

/// One stage as Piston reports it; any field may be missing or null
#[derive(Debug, Default, Deserialize)]
struct PistonStage {
    stdout: Option<String>,
    stderr: Option<String>,
    output: Option<String>,
    code: Option<i64>,
    signal: Option<String>,
    /// Milliseconds
    cpu_time: Option<f64>,
    memory: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct PistonResponse {
    compile: Option<PistonStage>,
    run: Option<PistonStage>,
}

impl PistonStage {
    fn into_stage(self) -> StageOutput {
        // A run killed by a signal has no exit code but did not succeed
        let exit_code = match (self.code, &self.signal) {
            (Some(code), _) => code,
            (None, Some(_)) => 1,
            (None, None) => 0,
        };

        let stderr = match self.stderr {
            Some(stderr) if !stderr.is_empty() => stderr,
            _ => self.output.unwrap_or_default(),
        };

        StageOutput {
            stdout: self.stdout.unwrap_or_default(),
            stderr,
            exit_code,
            time: self.cpu_time.unwrap_or(0.0).max(0.0) / 1000.0,
            memory: self.memory.unwrap_or(0.0).max(0.0) as u64,
        }
    }
}

/// Parse a Piston execute response body
fn parse_response(body: &str) -> Result<ExecutorResponse, EngineError> {
    let parsed: PistonResponse =
        serde_json::from_str(body).map_err(|e| EngineError::Decode(e.to_string()))?;

    let run = parsed.run.unwrap_or_default().into_stage();
    Ok(match parsed.compile {
        Some(compile) => ExecutorResponse::Staged {
            compile: compile.into_stage(),
            run,
        },
        None => ExecutorResponse::Flat(run),
    })
}

/// Piston-backed execution engine
pub struct PistonEngine {
    client: reqwest::Client,
    url: String,
    run_timeout_ms: u64,
}

impl PistonEngine {
    pub fn new(url: &str, run_timeout_ms: u64, http_timeout_secs: u64) -> Result<Self, EngineError> {
        Ok(Self {
            client: http_client(http_timeout_secs)?,
            url: url.to_string(),
            run_timeout_ms,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        Self::new(
            &config.piston_url,
            config.run_timeout_ms,
            config.executor_http_timeout_secs,
        )
    }
}

#[async_trait]
impl ExecutionEngine for PistonEngine {
    fn name(&self) -> &'static str {
        "piston"
    }

    async fn run(
        &self,
        language: Language,
        source_code: &str,
        stdin: &str,
    ) -> Result<ExecutorResponse, EngineError> {
        let request = PistonRequest {
            language: language.piston_name(),
            version: "*",
            files: vec![PistonFile {
                content: source_code,
            }],
            stdin,
            run_timeout: self.run_timeout_ms,
        };

        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(EngineError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_response(&body)
    }
}
