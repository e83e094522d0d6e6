// CLI commands for managing CodeRed problems and submissions
use anyhow::{bail, Context, Result};
use codered_common::config::Config;
use codered_common::types::{CaseStatus, Language, TestCase};
use codered_judge::{
    engine, Judge, JudgeError, JudgeSettings, MemoryStore, RedisStore, SubmissionStore, TestCaseStore,
};
use serde::Deserialize;
use std::fs;
use std::sync::Arc;
use uuid::Uuid;

/// Accepted test-case file layouts
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CaseFile {
    Bare(Vec<TestCase>),
    Wrapped { test_cases: Vec<TestCase> },
}

/// Parse a test-case file; an empty set is rejected
fn parse_cases(content: &str) -> Result<Vec<TestCase>> {
    let parsed: CaseFile =
        serde_json::from_str(content).context("Test case file is not a valid case list")?;

    let cases = match parsed {
        CaseFile::Bare(cases) => cases,
        CaseFile::Wrapped { test_cases } => test_cases,
    };

    if cases.is_empty() {
        bail!("Test case file contains no test cases");
    }
    Ok(cases)
}

/// Show at most `max` characters of a value on one line
fn preview_text(value: &str, max: usize) -> String {
    let flat = value.replace('\n', "\\n");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

async fn connect(config: &Config) -> Result<RedisStore> {
    RedisStore::connect(&config.redis_url)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))
}

/// Load test cases for a problem from a JSON file
pub async fn load_cases(config: &Config, problem_id: i64, file: &str) -> Result<()> {
    println!("📥 Loading test cases for problem {} from {}", problem_id, file);

    let content = fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))?;
    let cases = parse_cases(&content)?;
    let hidden = cases.iter().filter(|tc| tc.hidden).count();

    let store = connect(config).await?;
    store
        .put_test_cases(problem_id, &cases)
        .await
        .context("Failed to store test cases")?;

    println!(
        "✅ Stored {} test case(s): {} public, {} hidden",
        cases.len(),
        cases.len() - hidden,
        hidden
    );
    if hidden == cases.len() {
        println!("\n⚠️  No public cases - runs against this problem will be rejected");
    }

    Ok(())
}

/// Show the stored test cases of a problem
pub async fn show_cases(config: &Config, problem_id: i64) -> Result<()> {
    let store = connect(config).await?;
    let cases = store
        .get_test_cases(problem_id)
        .await
        .context("Failed to read test cases")?
        .unwrap_or_default();

    if cases.is_empty() {
        println!("No test cases stored for problem {}.", problem_id);
        println!("\n💡 Load some with: codered-cli load-cases --problem-id {} --file cases.json", problem_id);
        return Ok(());
    }

    println!("📋 Test cases for problem {}:\n", problem_id);
    println!("{:<6} {:<8} {:<30} {:<30}", "#", "HIDDEN", "INPUT", "EXPECTED");
    println!("{}", "─".repeat(76));

    for (i, case) in cases.iter().enumerate() {
        println!(
            "{:<6} {:<8} {:<30} {:<30}",
            i + 1,
            if case.hidden { "yes" } else { "no" },
            preview_text(&case.input, 28),
            preview_text(&case.expected_output, 28)
        );
    }

    println!("\n✅ Total: {} test case(s)", cases.len());
    Ok(())
}

/// Run a source file against the public cases through the configured executor
pub async fn preview(config: &Config, problem_id: i64, language_id: i64, file: &str) -> Result<()> {
    let source_code =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))?;
    let language = Language::from_id(language_id);

    let cases: Arc<dyn TestCaseStore> = Arc::new(connect(config).await?);
    let engine = engine::from_config(config).context("Failed to build execution engine")?;
    println!(
        "🚀 Running {} ({}) against problem {} via {}",
        file,
        language,
        problem_id,
        engine.name()
    );

    // Runs are never recorded; submissions go nowhere
    let judge = Judge::new(
        engine,
        cases,
        Arc::new(MemoryStore::new()),
        JudgeSettings::from_config(config),
    );

    let preview = match judge.run_preview(problem_id, language_id, &source_code).await {
        Ok(preview) => preview,
        Err(JudgeError::NotFound(id)) => bail!("No test cases found for problem {}", id),
        Err(JudgeError::NoPublicCases(id)) => bail!("Problem {} has no public test cases", id),
        Err(e) => return Err(e).context("Run failed"),
    };

    println!();
    println!("{:<6} {:<20} {:<20} {:<20}", "#", "STATUS", "EXPECTED", "ACTUAL");
    println!("{}", "─".repeat(66));
    for case in &preview.results {
        println!(
            "{:<6} {:<20} {:<20} {:<20}",
            case.test_case_index,
            case.status.as_str(),
            preview_text(&case.expected_output, 18),
            preview_text(&case.actual_output, 18)
        );
        if !case.stderr.is_empty() {
            println!("       stderr: {}", preview_text(&case.stderr, 60));
        }
    }

    let passed = preview.results.iter().filter(|c| c.status == CaseStatus::Accepted).count();
    println!(
        "\n{} Verdict: {} ({}/{} public cases passed)",
        if passed == preview.total_public_cases { "✅" } else { "❌" },
        preview.verdict,
        passed,
        preview.total_public_cases
    );

    Ok(())
}

/// Show a recorded submission
pub async fn show_submission(config: &Config, id: &str) -> Result<()> {
    let submission_id = Uuid::parse_str(id).with_context(|| format!("Invalid submission ID: {}", id))?;

    let store = connect(config).await?;
    let Some(submission) = store
        .get(submission_id)
        .await
        .context("Failed to read submission")?
    else {
        bail!("Submission {} not found", submission_id);
    };

    println!("📄 Submission {}\n", submission.id);
    println!("  User:       {}", submission.user_id);
    println!("  Problem:    {}", submission.problem_id);
    println!("  Language:   {} (id {})", submission.language, submission.language_id);
    println!("  Verdict:    {}", submission.verdict);
    println!(
        "  Passed:     {}/{}",
        submission.test_cases_passed, submission.total_test_cases
    );
    println!("  Time:       {:.3}s", submission.execution_time);
    println!("  Memory:     {}", submission.memory_used);
    println!("  Submitted:  {}", submission.submitted_at.to_rfc3339());
    if let Some(judged_at) = submission.judged_at {
        println!("  Judged:     {}", judged_at.to_rfc3339());
    }
    if let Some(message) = &submission.error_message {
        println!("\n  {}", message);
    }
    if !submission.verdict.is_terminal() {
        println!("\n⏳ Still judging");
    }

    Ok(())
}
