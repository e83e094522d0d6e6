// Test-case and submission stores used by the judge.
//
// Redis is the production backing; the in-memory store serves the CLI's
// local runs and the tests.

use async_trait::async_trait;
use codered_common::redis as keys;
use codered_common::types::{Submission, TestCase};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("submission {0} does not exist")]
    MissingSubmission(Uuid),
}

/// Read side of the problem catalogue
#[async_trait]
pub trait TestCaseStore: Send + Sync {
    async fn get_test_cases(&self, problem_id: i64) -> Result<Option<Vec<TestCase>>, StoreError>;

    async fn put_test_cases(&self, problem_id: i64, cases: &[TestCase]) -> Result<(), StoreError>;
}

/// Durable submission records
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Write a new record; must be durable when this returns
    async fn insert(&self, submission: &Submission) -> Result<(), StoreError>;

    /// Overwrite an existing record
    async fn update(&self, submission: &Submission) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Submission>, StoreError>;

    /// Newest first
    async fn list_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<Submission>, StoreError>;
}

/// Redis-backed store for both test cases and submissions
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl TestCaseStore for RedisStore {
    async fn get_test_cases(&self, problem_id: i64) -> Result<Option<Vec<TestCase>>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(keys::get_test_cases(&mut conn, problem_id).await?)
    }

    async fn put_test_cases(&self, problem_id: i64, cases: &[TestCase]) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        Ok(keys::store_test_cases(&mut conn, problem_id, cases).await?)
    }
}

#[async_trait]
impl SubmissionStore for RedisStore {
    async fn insert(&self, submission: &Submission) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        Ok(keys::insert_submission(&mut conn, submission).await?)
    }

    async fn update(&self, submission: &Submission) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        if keys::update_submission(&mut conn, submission).await? {
            Ok(())
        } else {
            Err(StoreError::MissingSubmission(submission.id))
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(keys::get_submission(&mut conn, &id).await?)
    }

    async fn list_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<Submission>, StoreError> {
        let mut conn = self.conn.clone();
        let ids = keys::recent_submission_ids(&mut conn, user_id, limit).await?;

        let mut submissions = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(submission) = keys::get_submission(&mut conn, &id).await? {
                submissions.push(submission);
            }
        }
        Ok(submissions)
    }
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    test_cases: RwLock<HashMap<i64, Vec<TestCase>>>,
    /// Insertion order
    submissions: RwLock<Vec<Submission>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_test_cases(self, problem_id: i64, cases: Vec<TestCase>) -> Self {
        self.test_cases.write().await.insert(problem_id, cases);
        self
    }
}

#[async_trait]
impl TestCaseStore for MemoryStore {
    async fn get_test_cases(&self, problem_id: i64) -> Result<Option<Vec<TestCase>>, StoreError> {
        Ok(self.test_cases.read().await.get(&problem_id).cloned())
    }

    async fn put_test_cases(&self, problem_id: i64, cases: &[TestCase]) -> Result<(), StoreError> {
        self.test_cases.write().await.insert(problem_id, cases.to_vec());
        Ok(())
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn insert(&self, submission: &Submission) -> Result<(), StoreError> {
        self.submissions.write().await.push(submission.clone());
        Ok(())
    }

    async fn update(&self, submission: &Submission) -> Result<(), StoreError> {
        let mut submissions = self.submissions.write().await;
        match submissions.iter_mut().find(|s| s.id == submission.id) {
            Some(existing) => {
                *existing = submission.clone();
                Ok(())
            }
            None => Err(StoreError::MissingSubmission(submission.id)),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        Ok(self.submissions.read().await.iter().find(|s| s.id == id).cloned())
    }

    async fn list_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<Submission>, StoreError> {
        Ok(self
            .submissions
            .read()
            .await
            .iter()
            .rev()
            .filter(|s| s.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
