//! Persisted run reports: the JSON results record and the markdown summary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::result::ExecutionResult;
use crate::summary::RunSummary;

/// Timestamp format shared by every artifact a run writes.
pub fn artifact_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d-%H%M%S").to_string()
}

/// SHA-256 hex digest over the ordered test names.
pub fn suite_digest<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Machine-readable record of one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultsRecord {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub suite_digest: String,
    pub summary: RunSummary,
    pub results: Vec<ExecutionResult>,
}

impl ResultsRecord {
    pub fn new(results: Vec<ExecutionResult>, generated_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at,
            suite_digest: suite_digest(results.iter().map(|r| r.name.as_str())),
            summary: RunSummary::from_results(&results),
            results,
        }
    }

    fn timestamp(&self) -> String {
        artifact_timestamp(self.generated_at)
    }
}

/// Write `test-results-<ts>.json` into `dir`, creating it if needed.
pub fn write_results_json(dir: &Path, record: &ResultsRecord) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {:?}", dir))?;
    let path = dir.join(format!("test-results-{}.json", record.timestamp()));
    let content = serde_json::to_string_pretty(record).context("serialize results record")?;
    std::fs::write(&path, content).with_context(|| format!("write {:?}", path))?;
    Ok(path)
}

/// Render the markdown summary.
pub fn render_summary_md(record: &ResultsRecord) -> String {
    let s = &record.summary;
    let mut out = String::new();
    out.push_str("# Browser Test Summary\n\n");
    out.push_str(&format!(
        "Run `{}` at {}\n\n",
        record.run_id,
        record.generated_at.to_rfc3339()
    ));
    out.push_str("| Total | Passed | Failed | Errors | Timeouts | Not finished | Pending | Success rate |\n");
    out.push_str("|---|---|---|---|---|---|---|---|\n");
    out.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} | {} | {} |\n\n",
        s.total, s.passed, s.failed, s.errors, s.timeouts, s.not_finished, s.pending, s.success_rate
    ));

    if !record.results.is_empty() {
        out.push_str("## Results\n");
        for r in &record.results {
            out.push_str(&format!(
                "- {} `{}` **{}** ({:.1}s)",
                r.status.icon(),
                r.name,
                r.status,
                r.duration_secs
            ));
            if let Some(err) = &r.error {
                out.push_str(&format!(": {}", err));
            }
            out.push('\n');
        }
    }
    out
}

/// Write `test-summary-<ts>.md` into `dir`, creating it if needed.
pub fn write_summary_md(dir: &Path, record: &ResultsRecord) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {:?}", dir))?;
    let path = dir.join(format!("test-summary-{}.md", record.timestamp()));
    std::fs::write(&path, render_summary_md(record)).with_context(|| format!("write {:?}", path))?;
    Ok(path)
}

/// Plain-text summary for the console.
pub fn render_console_summary(record: &ResultsRecord) -> String {
    let s = &record.summary;
    let mut out = format!(
        "{} tests: {} passed, {} failed, {} errors, {} timeouts, {} not finished, {} pending ({} success)\n",
        s.total, s.passed, s.failed, s.errors, s.timeouts, s.not_finished, s.pending, s.success_rate
    );
    for r in &record.results {
        out.push_str(&format!("  {} {} [{}] {:.1}s", r.status.icon(), r.name, r.status, r.duration_secs));
        if let Some(err) = &r.error {
            out.push_str(&format!(" - {}", err));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::TestStatus;
    use serde_json::json;

    fn sample(name: &str, status: TestStatus, error: Option<&str>) -> ExecutionResult {
        ExecutionResult {
            name: name.to_string(),
            source: format!("tests/{name}.md"),
            status,
            output: Some("Done.".to_string()),
            error: error.map(str::to_string),
            duration_secs: 12.34,
            task_id: Some("task-1".to_string()),
            session_id: Some("session-1".to_string()),
            output_file_ids: Vec::new(),
            output_files: Vec::new(),
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T08:30:00Z")
            .expect("parse RFC3339")
            .with_timezone(&Utc)
    }

    #[test]
    fn test_digest_depends_on_order() {
        let a = suite_digest(["login", "checkout"]);
        let b = suite_digest(["checkout", "login"]);
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_eq!(a, suite_digest(["login", "checkout"]));
    }

    #[test]
    fn test_results_record_schema() {
        let record = ResultsRecord::new(
            vec![
                sample("login", TestStatus::Passed, None),
                sample("checkout", TestStatus::NotFinished, Some("remote agent could not complete the task")),
            ],
            fixed_time(),
        );

        let raw = serde_json::to_value(&record).expect("serialize record");
        let obj = raw.as_object().expect("record object");
        for key in ["run_id", "generated_at", "suite_digest", "summary", "results"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(raw["summary"]["total"], json!(2));
        assert_eq!(raw["summary"]["not_finished"], json!(1));
        assert_eq!(raw["summary"]["success_rate"], json!("50.0%"));
        assert_eq!(raw["results"][1]["status"], json!("not-finished"));
        assert_eq!(raw["results"][0]["duration"], json!(12.34));
    }

    #[test]
    fn test_writes_timestamped_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/results");
        let record = ResultsRecord::new(vec![sample("login", TestStatus::Passed, None)], fixed_time());

        let json_path = write_results_json(&out, &record).unwrap();
        let md_path = write_summary_md(&out, &record).unwrap();

        assert!(json_path.ends_with("test-results-20260101-083000.json"));
        assert!(md_path.ends_with("test-summary-20260101-083000.md"));

        let back: ResultsRecord =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(back.run_id, record.run_id);
        assert_eq!(back.summary, record.summary);
        assert_eq!(back.results[0].name, "login");
    }

    #[test]
    fn test_summary_markdown_lists_every_result() {
        let record = ResultsRecord::new(
            vec![
                sample("login", TestStatus::Passed, None),
                sample("search", TestStatus::Failed, Some("remote agent reported failure")),
            ],
            fixed_time(),
        );
        let md = render_summary_md(&record);
        assert!(md.starts_with("# Browser Test Summary\n"));
        assert!(md.contains("| 2 | 1 | 1 | 0 | 0 | 0 | 0 | 50.0% |"));
        assert!(md.contains("- ✅ `login` **passed** (12.3s)\n"));
        assert!(md.contains("- ❌ `search` **failed** (12.3s): remote agent reported failure\n"));
    }

    #[test]
    fn test_console_summary_has_totals_line() {
        let record = ResultsRecord::new(vec![sample("login", TestStatus::Timeout, None)], fixed_time());
        let text = render_console_summary(&record);
        assert!(text.starts_with("1 tests: 0 passed, 0 failed, 0 errors, 1 timeouts"));
        assert!(text.contains("login [timeout]"));
    }
}
