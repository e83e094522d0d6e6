pub mod types;
pub mod redis;
pub mod config;

// Re-export commonly used types for convenience
pub use types::{CaseResult, CaseStatus, Language, Submission, TestCase, Verdict};
pub use config::{Config, ExecutorBackend};
