use crate::types::{Submission, TestCase};
use redis::{AsyncCommands, RedisResult};
use uuid::Uuid;

/// Redis key semantics - the API, the CLI and the judge all derive keys here
/// so records written by one are readable by the others.

pub const SUBMISSION_PREFIX: &str = "codered:submission";
pub const USER_PREFIX: &str = "codered:user";
pub const TEST_CASES_PREFIX: &str = "codered:testcases";

/// Key holding one submission record
pub fn submission_key(id: &Uuid) -> String {
    format!("{}:{}", SUBMISSION_PREFIX, id)
}

/// List of a user's submission ids, newest first
pub fn user_submissions_key(user_id: i64) -> String {
    format!("{}:{}:submissions", USER_PREFIX, user_id)
}

/// Key holding the test-case set of a problem
pub fn test_cases_key(problem_id: i64) -> String {
    format!("{}:{}", TEST_CASES_PREFIX, problem_id)
}

fn encode<T: serde::Serialize>(value: &T) -> RedisResult<String> {
    serde_json::to_string(value).map_err(|e| {
        redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "serialization error",
            e.to_string(),
        ))
    })
}

fn decode<T: serde::de::DeserializeOwned>(payload: &str) -> RedisResult<T> {
    serde_json::from_str(payload).map_err(|e| {
        redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "deserialization error",
            e.to_string(),
        ))
    })
}

/// Write a new submission and index it under its owner.
/// Submissions carry no TTL: they are the durable judging record.
pub async fn insert_submission(
    conn: &mut redis::aio::ConnectionManager,
    submission: &Submission,
) -> RedisResult<()> {
    let payload = encode(submission)?;

    redis::pipe()
        .atomic()
        .set(submission_key(&submission.id), payload)
        .ignore()
        .lpush(user_submissions_key(submission.user_id), submission.id.to_string())
        .ignore()
        .query_async(conn)
        .await
}

/// Overwrite an existing submission.
/// Returns false when there was no record to overwrite (SET ... XX).
pub async fn update_submission(
    conn: &mut redis::aio::ConnectionManager,
    submission: &Submission,
) -> RedisResult<bool> {
    let payload = encode(submission)?;

    let reply: Option<String> = redis::cmd("SET")
        .arg(submission_key(&submission.id))
        .arg(payload)
        .arg("XX")
        .query_async(conn)
        .await?;

    Ok(reply.is_some())
}

/// Retrieve a submission
pub async fn get_submission(
    conn: &mut redis::aio::ConnectionManager,
    id: &Uuid,
) -> RedisResult<Option<Submission>> {
    let payload: Option<String> = conn.get(submission_key(id)).await?;

    match payload {
        Some(data) => Ok(Some(decode(&data)?)),
        None => Ok(None),
    }
}

/// Most recent submission ids of a user
pub async fn recent_submission_ids(
    conn: &mut redis::aio::ConnectionManager,
    user_id: i64,
    limit: usize,
) -> RedisResult<Vec<Uuid>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let raw: Vec<String> = conn
        .lrange(user_submissions_key(user_id), 0, limit as isize - 1)
        .await?;

    Ok(raw.iter().filter_map(|id| Uuid::parse_str(id).ok()).collect())
}

/// Replace the test-case set of a problem
pub async fn store_test_cases(
    conn: &mut redis::aio::ConnectionManager,
    problem_id: i64,
    cases: &[TestCase],
) -> RedisResult<()> {
    let payload = encode(&cases)?;
    conn.set(test_cases_key(problem_id), payload).await
}

/// Retrieve the test-case set of a problem
pub async fn get_test_cases(
    conn: &mut redis::aio::ConnectionManager,
    problem_id: i64,
) -> RedisResult<Option<Vec<TestCase>>> {
    let payload: Option<String> = conn.get(test_cases_key(problem_id)).await?;

    match payload {
        Some(data) => Ok(Some(decode(&data)?)),
        None => Ok(None),
    }
}
