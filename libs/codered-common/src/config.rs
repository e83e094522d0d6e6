use std::env;
use std::str::FromStr;

/// Which external executor runs submitted code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorBackend {
    /// Synchronous compile+run, full result in one response
    Piston,
    /// Create a job, then poll it by token
    Judge0,
}

impl ExecutorBackend {
    pub fn from_str(s: &str) -> Option<ExecutorBackend> {
        match s.trim().to_lowercase().as_str() {
            "piston" => Some(ExecutorBackend::Piston),
            "judge0" => Some(ExecutorBackend::Judge0),
            _ => None,
        }
    }
}

/// Application configuration
/// Provides defaults with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub port: u16,
    pub executor_backend: ExecutorBackend,
    pub piston_url: String,
    pub judge0_url: String,
    pub judge0_api_key: Option<String>,
    pub judge0_api_host: Option<String>,
    /// Wall-clock limit handed to the executor per test case
    pub run_timeout_ms: u64,
    pub executor_http_timeout_secs: u64,
    pub judge0_poll_interval_ms: u64,
    pub judge0_max_polls: u32,
    pub max_concurrent_executions: usize,
    /// Upper bound on judging one submission end to end
    pub submission_deadline_secs: u64,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or unparsable values use defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            redis_url: lookup("REDIS_URL")
                .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            port: parse_var(&lookup, "PORT").unwrap_or(3000),
            executor_backend: lookup("EXECUTOR_BACKEND")
                .and_then(|v| ExecutorBackend::from_str(&v))
                .unwrap_or(ExecutorBackend::Piston),
            piston_url: lookup("PISTON_URL")
                .unwrap_or_else(|| "http://127.0.0.1:2000/api/v2/execute".to_string()),
            judge0_url: lookup("JUDGE0_URL")
                .unwrap_or_else(|| "http://127.0.0.1:2358".to_string()),
            judge0_api_key: lookup("JUDGE0_API_KEY").filter(|v| !v.is_empty()),
            judge0_api_host: lookup("JUDGE0_API_HOST").filter(|v| !v.is_empty()),
            run_timeout_ms: parse_var(&lookup, "RUN_TIMEOUT_MS").unwrap_or(3000),
            executor_http_timeout_secs: parse_var(&lookup, "EXECUTOR_HTTP_TIMEOUT_SECS").unwrap_or(30),
            judge0_poll_interval_ms: parse_var(&lookup, "JUDGE0_POLL_INTERVAL_MS").unwrap_or(1000),
            judge0_max_polls: parse_var(&lookup, "JUDGE0_MAX_POLLS").unwrap_or(60),
            max_concurrent_executions: parse_var::<usize, _>(&lookup, "MAX_CONCURRENT_EXECUTIONS")
                .unwrap_or(8)
                .max(1),
            submission_deadline_secs: parse_var(&lookup, "SUBMISSION_DEADLINE_SECS").unwrap_or(120),
            log_json: lookup("LOG_FORMAT")
                .map(|v| v.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }

    pub fn new() -> Self {
        Self::from_env()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}
