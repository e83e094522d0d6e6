/// Verdict Resolver - Language-Agnostic Aggregation
///
/// **Core Responsibility:**
/// Fold per-case results into one verdict and pick the case that explains it.
///
/// **Critical Properties:**
/// - Knows nothing about executors or HTTP
/// - Knows nothing about persistence
/// - Pure function of the results
///
/// **Priority (highest wins):**
/// CompilationError > RuntimeError > WrongAnswer > SystemError > Accepted
///
/// Among failing cases of equal priority the first one seen is kept, so the
/// representative case (not the verdict) depends on input order.

use codered_common::types::{CaseResult, CaseStatus};

/// Aggregate outcome of a batch of test cases
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub verdict: CaseStatus,
    /// Highest-priority failing case, first seen on ties
    pub worst_case: Option<CaseResult>,
    pub passed_count: u32,
    /// Max over every case, passing or not
    pub max_time: f64,
    pub max_memory: u64,
}

/// Resolve a batch of case results in a single pass
pub fn resolve(results: &[CaseResult]) -> Resolution {
    let mut passed_count = 0u32;
    let mut max_time = 0.0f64;
    let mut max_memory = 0u64;
    let mut worst: Option<&CaseResult> = None;

    for result in results {
        max_time = max_time.max(result.time);
        max_memory = max_memory.max(result.memory);

        if result.passed {
            passed_count += 1;
            continue;
        }

        let replaces = match worst {
            None => true,
            Some(current) => result.status.priority() > current.status.priority(),
        };
        if replaces {
            worst = Some(result);
        }
    }

    let verdict = match worst {
        None => CaseStatus::Accepted,
        // A failed case must never resolve to Accepted
        Some(case) if case.status == CaseStatus::Accepted => CaseStatus::WrongAnswer,
        Some(case) => case.status,
    };

    Resolution {
        verdict,
        worst_case: worst.cloned(),
        passed_count,
        max_time,
        max_memory,
    }
}

impl Resolution {
    pub fn is_accepted(&self) -> bool {
        self.worst_case.is_none()
    }

    /// Message explaining a failed verdict.
    ///
    /// With `mask_hidden`, a hidden worst case only yields a generic message so
    /// judge-only inputs and outputs never reach the submitter.
    pub fn error_message(&self, mask_hidden: bool) -> Option<String> {
        let case = self.worst_case.as_ref()?;
        let status = self.verdict;

        if mask_hidden && case.hidden {
            return Some(format!("{} on Hidden Test Case", status));
        }

        let message = match status {
            CaseStatus::WrongAnswer => format!(
                "Test Case {} Failed. Expected '{}', but got '{}'.",
                case.index,
                case.expected.trim(),
                case.actual.trim()
            ),
            CaseStatus::CompilationError | CaseStatus::RuntimeError | CaseStatus::SystemError => {
                if case.stderr.is_empty() {
                    status.to_string()
                } else {
                    case.stderr.clone()
                }
            }
            CaseStatus::Accepted => return None,
        };

        Some(message)
    }
}
