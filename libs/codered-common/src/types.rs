use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Languages the judge can dispatch to an executor.
///
/// Callers identify languages by the numeric ids the frontend was built
/// against (Judge0 numbering). Unknown ids fall back to Python; this is a
/// lookup-table simplification, not a guarantee the code is Python.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    C,
    Cpp,
    Java,
    JavaScript,
}

impl Language {
    /// Language used when a caller sends an id we have no mapping for
    pub const FALLBACK: Language = Language::Python;

    /// Returns all language variants
    pub fn all_variants() -> &'static [Language] {
        &[
            Language::Python,
            Language::C,
            Language::Cpp,
            Language::Java,
            Language::JavaScript,
        ]
    }

    /// Map a frontend language id to a language, failing closed to Python
    pub fn from_id(id: i64) -> Language {
        Language::all_variants()
            .iter()
            .copied()
            .find(|lang| lang.judge0_id() == id)
            .unwrap_or(Language::FALLBACK)
    }

    /// Parse a language from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Language> {
        match s.to_lowercase().as_str() {
            "python" | "python3" => Some(Language::Python),
            "c" => Some(Language::C),
            "c++" | "cpp" => Some(Language::Cpp),
            "java" => Some(Language::Java),
            "javascript" | "js" | "node" => Some(Language::JavaScript),
            _ => None,
        }
    }

    /// Judge0 language id
    pub fn judge0_id(&self) -> i64 {
        match self {
            Language::Python => 71,
            Language::C => 50,
            Language::Cpp => 54,
            Language::Java => 62,
            Language::JavaScript => 63,
        }
    }

    /// Piston runtime name
    pub fn piston_name(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::C => "c",
            Language::Cpp => "c++",
            Language::Java => "java",
            Language::JavaScript => "javascript",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::C => write!(f, "c"),
            Language::Cpp => write!(f, "cpp"),
            Language::Java => write!(f, "java"),
            Language::JavaScript => write!(f, "javascript"),
        }
    }
}

/// One judged input/output pair.
///
/// Hidden cases are judge-only; their content must never reach the submitter.
/// Stored test sets use `output` for the expected text, so both spellings load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub input: String,
    #[serde(alias = "output")]
    pub expected_output: String,
    #[serde(default)]
    pub hidden: bool,
}

impl TestCase {
    pub fn public(input: &str, expected_output: &str) -> Self {
        Self {
            input: input.to_string(),
            expected_output: expected_output.to_string(),
            hidden: false,
        }
    }

    pub fn hidden(input: &str, expected_output: &str) -> Self {
        Self {
            hidden: true,
            ..Self::public(input, expected_output)
        }
    }
}

/// Outcome of a single test case.
///
/// Serialized with the display strings clients already consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseStatus {
    #[serde(rename = "Accepted")]
    Accepted,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Compilation Error")]
    CompilationError,
    #[serde(rename = "System Error")]
    SystemError,
}

impl CaseStatus {
    /// Verdict priority; the highest failing priority decides a batch
    pub fn priority(&self) -> u8 {
        match self {
            CaseStatus::CompilationError => 4,
            CaseStatus::RuntimeError => 3,
            CaseStatus::WrongAnswer => 2,
            CaseStatus::SystemError => 1,
            CaseStatus::Accepted => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Accepted => "Accepted",
            CaseStatus::WrongAnswer => "Wrong Answer",
            CaseStatus::RuntimeError => "Runtime Error",
            CaseStatus::CompilationError => "Compilation Error",
            CaseStatus::SystemError => "System Error",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical per-case result, identical for every executor backend.
/// Produced per evaluation and only ever persisted in aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    /// 1-based position within the executed subset
    pub index: usize,
    pub status: CaseStatus,
    pub passed: bool,
    pub input: String,
    pub expected: String,
    pub actual: String,
    pub stderr: String,
    /// Seconds
    pub time: f64,
    /// Executor-defined unit
    pub memory: u64,
    pub hidden: bool,
}

/// Submission-level verdict: in flight, or one of the case statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "Judging")]
    Judging,
    #[serde(rename = "Accepted")]
    Accepted,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Compilation Error")]
    CompilationError,
    #[serde(rename = "System Error")]
    SystemError,
}

impl Verdict {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Verdict::Judging)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Judging => "Judging",
            Verdict::Accepted => CaseStatus::Accepted.as_str(),
            Verdict::WrongAnswer => CaseStatus::WrongAnswer.as_str(),
            Verdict::RuntimeError => CaseStatus::RuntimeError.as_str(),
            Verdict::CompilationError => CaseStatus::CompilationError.as_str(),
            Verdict::SystemError => CaseStatus::SystemError.as_str(),
        }
    }
}

impl From<CaseStatus> for Verdict {
    fn from(status: CaseStatus) -> Self {
        match status {
            CaseStatus::Accepted => Verdict::Accepted,
            CaseStatus::WrongAnswer => Verdict::WrongAnswer,
            CaseStatus::RuntimeError => Verdict::RuntimeError,
            CaseStatus::CompilationError => Verdict::CompilationError,
            CaseStatus::SystemError => Verdict::SystemError,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted record of one submit attempt.
///
/// ## Lifecycle
/// - Created as `Judging` and written before any executor call
/// - Finalized exactly once to a terminal verdict
/// - Never deleted by the judge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub user_id: i64,
    pub problem_id: i64,
    pub language: Language,
    /// Language id exactly as the caller sent it
    pub language_id: i64,
    pub source_code: String,
    pub verdict: Verdict,
    pub test_cases_passed: u32,
    pub total_test_cases: u32,
    pub execution_time: f64,
    pub memory_used: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_message: Option<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub judged_at: Option<DateTime<Utc>>,
}

impl Submission {
    /// Provisional record written before judging starts
    pub fn judging(
        user_id: i64,
        problem_id: i64,
        language_id: i64,
        source_code: &str,
        total_test_cases: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            problem_id,
            language: Language::from_id(language_id),
            language_id,
            source_code: source_code.to_string(),
            verdict: Verdict::Judging,
            test_cases_passed: 0,
            total_test_cases: total_test_cases as u32,
            execution_time: 0.0,
            memory_used: 0,
            error_message: None,
            submitted_at: Utc::now(),
            judged_at: None,
        }
    }

    /// Move to a terminal verdict and stamp the judging time
    pub fn finalize(
        &mut self,
        status: CaseStatus,
        error_message: Option<String>,
        test_cases_passed: u32,
        execution_time: f64,
        memory_used: u64,
    ) {
        self.verdict = status.into();
        self.error_message = error_message;
        self.test_cases_passed = test_cases_passed;
        self.execution_time = execution_time;
        self.memory_used = memory_used;
        self.judged_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_id_known() {
        assert_eq!(Language::from_id(71), Language::Python);
        assert_eq!(Language::from_id(50), Language::C);
        assert_eq!(Language::from_id(54), Language::Cpp);
        assert_eq!(Language::from_id(62), Language::Java);
        assert_eq!(Language::from_id(63), Language::JavaScript);
    }

    #[test]
    fn test_language_from_id_fails_closed() {
        assert_eq!(Language::from_id(9999), Language::Python);
        assert_eq!(Language::from_id(-1), Language::Python);
    }

    #[test]
    fn test_language_names() {
        assert_eq!(Language::Cpp.piston_name(), "c++");
        assert_eq!(Language::JavaScript.piston_name(), "javascript");
        assert_eq!(Language::from_str("C++"), Some(Language::Cpp));
        assert_eq!(Language::from_str("ruby"), None);
    }

    #[test]
    fn test_case_status_priority_is_total() {
        let mut statuses = vec![
            CaseStatus::Accepted,
            CaseStatus::SystemError,
            CaseStatus::WrongAnswer,
            CaseStatus::RuntimeError,
            CaseStatus::CompilationError,
        ];
        statuses.sort_by_key(|s| s.priority());
        let priorities: Vec<u8> = statuses.iter().map(|s| s.priority()).collect();
        assert_eq!(priorities, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_case_status_serialization() {
        let json = serde_json::to_string(&CaseStatus::WrongAnswer).unwrap();
        assert_eq!(json, "\"Wrong Answer\"");

        let status: CaseStatus = serde_json::from_str("\"Compilation Error\"").unwrap();
        assert_eq!(status, CaseStatus::CompilationError);
    }

    #[test]
    fn test_test_case_accepts_output_alias() {
        let case: TestCase =
            serde_json::from_str(r#"{"input": "2 3", "output": "5", "hidden": true}"#).unwrap();
        assert_eq!(case.expected_output, "5");
        assert!(case.hidden);

        let case: TestCase = serde_json::from_str(r#"{"expected_output": "ok"}"#).unwrap();
        assert_eq!(case.input, "");
        assert!(!case.hidden);
    }

    #[test]
    fn test_submission_starts_judging() {
        let submission = Submission::judging(7, 42, 54, "int main() {}", 3);

        assert_eq!(submission.verdict, Verdict::Judging);
        assert!(!submission.verdict.is_terminal());
        assert_eq!(submission.language, Language::Cpp);
        assert_eq!(submission.total_test_cases, 3);
        assert_eq!(submission.test_cases_passed, 0);
        assert!(submission.judged_at.is_none());
    }

    #[test]
    fn test_submission_finalize() {
        let mut submission = Submission::judging(1, 1, 71, "print(1)", 2);
        submission.finalize(
            CaseStatus::WrongAnswer,
            Some("Wrong Answer on Hidden Test Case".to_string()),
            1,
            0.25,
            2048,
        );

        assert_eq!(submission.verdict, Verdict::WrongAnswer);
        assert!(submission.verdict.is_terminal());
        assert_eq!(submission.test_cases_passed, 1);
        assert_eq!(submission.memory_used, 2048);
        assert!(submission.judged_at.is_some());

        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(json["verdict"], "Wrong Answer");
    }
}
