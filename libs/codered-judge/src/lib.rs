pub mod engine;
pub mod evaluator;
pub mod judge;
pub mod store;

pub use engine::{ExecutionEngine, Judge0Engine, PistonEngine};
pub use judge::{Judge, JudgeError, JudgeSettings, PreviewCase, RunPreview};
pub use store::{MemoryStore, RedisStore, StoreError, SubmissionStore, TestCaseStore};
