/// Evaluation Orchestrator
///
/// **Responsibility:**
/// Load test cases, fan them out to the execution engine with bounded
/// concurrency, resolve the verdict and record it.
///
/// **Entry points:**
/// - `run_preview`: public cases only, nothing persisted
/// - `submit`: every case; the submission is written as `Judging` before the
///   first executor call and finalized exactly once afterwards
///
/// This module is the glue layer - it knows nothing about:
/// - How an executor is reached (engine's job)
/// - How a verdict is chosen (evaluator's job)

use crate::engine::ExecutionEngine;
use crate::evaluator::{self, Resolution};
use crate::store::{StoreError, SubmissionStore, TestCaseStore};
use codered_common::config::Config;
use codered_common::types::{CaseResult, CaseStatus, Language, Submission, TestCase};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("no test cases found for problem {0}")]
    NotFound(i64),
    #[error("problem {0} has no public test cases")]
    NoPublicCases(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Concurrency and latency bounds for one evaluation
#[derive(Debug, Clone)]
pub struct JudgeSettings {
    /// Maximum executor calls in flight per request
    pub max_concurrency: usize,
    /// Upper bound on judging one submission
    pub submission_deadline: Duration,
}

impl JudgeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrency: config.max_concurrent_executions.max(1),
            submission_deadline: Duration::from_secs(config.submission_deadline_secs),
        }
    }
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// One public case as shown to the user after a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewCase {
    pub test_case_index: usize,
    pub status: CaseStatus,
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub stderr: String,
}

impl From<CaseResult> for PreviewCase {
    fn from(result: CaseResult) -> Self {
        Self {
            test_case_index: result.index,
            status: result.status,
            input: result.input,
            expected_output: result.expected,
            actual_output: result.actual,
            stderr: result.stderr,
        }
    }
}

/// Result of a run against the public cases
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunPreview {
    pub verdict: CaseStatus,
    pub total_public_cases: usize,
    pub results: Vec<PreviewCase>,
}

/// The evaluation orchestrator
#[derive(Clone)]
pub struct Judge {
    engine: Arc<dyn ExecutionEngine>,
    test_cases: Arc<dyn TestCaseStore>,
    submissions: Arc<dyn SubmissionStore>,
    settings: JudgeSettings,
}

impl Judge {
    pub fn new(
        engine: Arc<dyn ExecutionEngine>,
        test_cases: Arc<dyn TestCaseStore>,
        submissions: Arc<dyn SubmissionStore>,
        settings: JudgeSettings,
    ) -> Self {
        Self {
            engine,
            test_cases,
            submissions,
            settings,
        }
    }

    pub fn settings(&self) -> &JudgeSettings {
        &self.settings
    }

    /// Run source code against the public cases of a problem
    #[instrument(skip(self, source_code), fields(engine = self.engine.name()))]
    pub async fn run_preview(
        &self,
        problem_id: i64,
        language_id: i64,
        source_code: &str,
    ) -> Result<RunPreview, JudgeError> {
        let cases = self.load_cases(problem_id).await?;

        let public_cases: Vec<TestCase> = cases.into_iter().filter(|tc| !tc.hidden).collect();
        if public_cases.is_empty() {
            return Err(JudgeError::NoPublicCases(problem_id));
        }

        let language = Language::from_id(language_id);
        info!(
            problem_id,
            language = %language,
            public_cases = public_cases.len(),
            "Starting run"
        );

        let results = self.execute_all(language, source_code, &public_cases).await;
        let resolution = evaluator::resolve(&results);

        info!(
            problem_id,
            verdict = %resolution.verdict,
            passed = resolution.passed_count,
            "Run complete"
        );

        Ok(RunPreview {
            verdict: resolution.verdict,
            total_public_cases: public_cases.len(),
            results: results.into_iter().map(PreviewCase::from).collect(),
        })
    }

    /// Judge source code against every case of a problem and record the outcome
    #[instrument(skip(self, source_code), fields(engine = self.engine.name()))]
    pub async fn submit(
        &self,
        problem_id: i64,
        language_id: i64,
        source_code: &str,
        user_id: i64,
    ) -> Result<Submission, JudgeError> {
        let cases = self.load_cases(problem_id).await?;

        let mut submission =
            Submission::judging(user_id, problem_id, language_id, source_code, cases.len());
        self.submissions.insert(&submission).await?;

        info!(
            submission_id = %submission.id,
            problem_id,
            language = %submission.language,
            test_cases = cases.len(),
            "Submission recorded, judging"
        );

        // From here on the record must not be left in Judging
        let mut guard = JudgingGuard::new(self.submissions.clone(), submission.clone());

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.settings.submission_deadline,
            self.execute_all(submission.language, source_code, &cases),
        )
        .await;

        match outcome {
            Ok(results) => {
                let resolution = evaluator::resolve(&results);
                apply_resolution(&mut submission, &resolution);
            }
            Err(_) => {
                warn!(
                    submission_id = %submission.id,
                    deadline_secs = self.settings.submission_deadline.as_secs(),
                    "Judging exceeded deadline"
                );
                submission.finalize(
                    CaseStatus::SystemError,
                    Some(format!(
                        "Judging exceeded the {}s deadline",
                        self.settings.submission_deadline.as_secs()
                    )),
                    0,
                    0.0,
                    0,
                );
            }
        }

        // An interrupted or failed write is retried with this same record
        guard.set(submission.clone());
        if let Err(e) = self.submissions.update(&submission).await {
            error!(submission_id = %submission.id, error = %e, "Failed to record verdict");
            return Err(e.into());
        }
        guard.disarm();

        info!(
            submission_id = %submission.id,
            verdict = %submission.verdict,
            passed = submission.test_cases_passed,
            total = submission.total_test_cases,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Submission judged"
        );

        Ok(submission)
    }

    async fn load_cases(&self, problem_id: i64) -> Result<Vec<TestCase>, JudgeError> {
        match self.test_cases.get_test_cases(problem_id).await? {
            Some(cases) if !cases.is_empty() => Ok(cases),
            _ => Err(JudgeError::NotFound(problem_id)),
        }
    }

    /// Execute every case, at most `max_concurrency` at a time.
    /// Results come back ordered by index regardless of completion order.
    async fn execute_all(
        &self,
        language: Language,
        source_code: &str,
        cases: &[TestCase],
    ) -> Vec<CaseResult> {
        let engine = self.engine.as_ref();

        // Collected before streaming so the returned future stays Send
        let calls: Vec<_> = cases
            .iter()
            .enumerate()
            .map(|(i, case)| engine.execute(language, source_code, case, i + 1))
            .collect();

        let mut results: Vec<CaseResult> = stream::iter(calls)
            .buffer_unordered(self.settings.max_concurrency.max(1))
            .collect()
            .await;

        results.sort_by_key(|r| r.index);
        results
    }
}

fn apply_resolution(submission: &mut Submission, resolution: &Resolution) {
    submission.finalize(
        resolution.verdict,
        resolution.error_message(true),
        resolution.passed_count,
        resolution.max_time,
        resolution.max_memory,
    );
}

/// Finalizes a submission if the judging future never confirmed its write.
///
/// Covers the evaluating future being dropped (client went away) or panicking.
/// A record still in Judging is written as SystemError; a record that already
/// carries a verdict is written again unchanged, so a verdict whose write
/// landed is never replaced. Drop cannot await, so the write happens on a
/// spawned task.
struct JudgingGuard {
    store: Arc<dyn SubmissionStore>,
    submission: Option<Submission>,
}

impl JudgingGuard {
    fn new(store: Arc<dyn SubmissionStore>, submission: Submission) -> Self {
        Self {
            store,
            submission: Some(submission),
        }
    }

    /// Replace the record written on drop
    fn set(&mut self, submission: Submission) {
        self.submission = Some(submission);
    }

    fn disarm(mut self) {
        self.submission = None;
    }
}

impl Drop for JudgingGuard {
    fn drop(&mut self) {
        let Some(mut submission) = self.submission.take() else {
            return;
        };

        if !submission.verdict.is_terminal() {
            submission.finalize(
                CaseStatus::SystemError,
                Some("Judging was interrupted before a verdict was recorded".to_string()),
                0,
                0.0,
                0,
            );
        }

        let store = self.store.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match store.update(&submission).await {
                        Ok(()) => warn!(
                            submission_id = %submission.id,
                            verdict = %submission.verdict,
                            "Interrupted submission finalized"
                        ),
                        Err(e) => error!(
                            submission_id = %submission.id,
                            error = %e,
                            "Failed to finalize interrupted submission"
                        ),
                    }
                });
            }
            Err(_) => {
                error!(
                    submission_id = %submission.id,
                    "No runtime to finalize interrupted submission"
                );
            }
        }
    }
}
