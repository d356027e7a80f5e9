//! Retrying generation client.
//!
//! Diff → prompt → completion (with retries) → parsed cases → test files.
//! The raw diff and every raw completion are kept under the artifacts
//! directory whether or not generation succeeds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use webprobe_core::{artifact_timestamp, CompletionModel, TestSpecification};

use crate::config::GenerationConfig;
use crate::diff::PreparedDiff;
use crate::error::{GenerationError, Result};
use crate::git::{DiffSource, RevisionRange};
use crate::parse::{parse_test_cases, GeneratedCase};
use crate::prompt::{build_prompt, PromptContext};
use crate::writer::write_generated_specs;

/// What a successful generation produced.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub range: RevisionRange,
    /// Specifications in generation order, each pointing at its written file.
    pub specs: Vec<TestSpecification>,
    /// Attempt whose completion was used (1-based).
    pub attempts: u32,
    pub diff_artifact: PathBuf,
    pub completion_artifacts: Vec<PathBuf>,
}

pub struct GenerationClient {
    source: Arc<dyn DiffSource>,
    model: Arc<dyn CompletionModel>,
    config: GenerationConfig,
}

impl GenerationClient {
    pub fn new(
        source: Arc<dyn DiffSource>,
        model: Arc<dyn CompletionModel>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            source,
            model,
            config,
        }
    }

    /// Generate and write test specifications for `reference`.
    #[instrument(skip(self, context))]
    pub async fn generate(
        &self,
        reference: &str,
        context: Option<&str>,
    ) -> Result<GenerationOutcome> {
        let range = self.source.resolve(reference).await?;
        let raw_diff = self.source.diff_text(&range).await?;
        let numstat = self.source.numstat(&range).await?;
        let diff = PreparedDiff::prepare(&raw_diff, &numstat, self.config.max_diff_size);
        if diff.is_empty() {
            return Err(GenerationError::EmptyDiff {
                base: range.base.clone(),
                head: range.head.clone(),
            });
        }
        info!(
            files = diff.stats.len(),
            bytes = diff.original_bytes,
            truncated = diff.truncated,
            "prepared diff"
        );

        let stamp = artifact_timestamp(Utc::now());
        let diff_artifact = self.persist(&format!("diff-{stamp}.patch"), &raw_diff).await?;

        let head = self.source.commit_info(&range.head).await?;
        let prompt = build_prompt(
            &diff,
            &range,
            &head,
            &PromptContext {
                context,
                deployment_url: self.config.deployment_url.as_deref(),
                max_tests: self.config.max_tests,
            },
        );

        let mut completion_artifacts = Vec::new();
        let mut last_error = String::from("no attempts made");

        for attempt in 1..=self.config.max_attempts {
            let delay = self.config.backoff_before(attempt);
            if !delay.is_zero() {
                info!(attempt, delay_ms = delay.as_millis() as u64, "retrying generation");
                tokio::time::sleep(delay).await;
            }

            let text = match self.model.complete(&prompt, &self.config.model).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(attempt, error = %e, "completion request failed");
                    last_error = e.to_string();
                    continue;
                }
            };
            completion_artifacts.push(
                self.persist(&format!("completion-{stamp}-attempt{attempt}.txt"), &text)
                    .await?,
            );

            if text.trim().is_empty() {
                warn!(attempt, "empty completion");
                last_error = "empty completion".to_string();
                continue;
            }

            let cases = match parse_test_cases(&text) {
                Ok(cases) => cases,
                Err(e) => {
                    warn!(attempt, error = %e, "unparseable completion");
                    last_error = e.to_string();
                    continue;
                }
            };
            if cases.is_empty() {
                return Err(GenerationError::NoTestCasesGenerated);
            }

            let specs = self.to_specs(cases);
            let specs = write_generated_specs(specs, &self.config.generated_tests_dir, &stamp).await?;
            info!(attempt, tests = specs.len(), "generated test cases");
            return Ok(GenerationOutcome {
                range,
                specs,
                attempts: attempt,
                diff_artifact,
                completion_artifacts,
            });
        }

        Err(GenerationError::GenerationFailed {
            attempts: self.config.max_attempts,
            last_error,
        })
    }

    fn to_specs(&self, cases: Vec<GeneratedCase>) -> Vec<TestSpecification> {
        if cases.len() > self.config.max_tests {
            info!(
                generated = cases.len(),
                kept = self.config.max_tests,
                "dropping test cases beyond the limit"
            );
        }
        cases
            .into_iter()
            .take(self.config.max_tests)
            .map(|case| {
                let spec = TestSpecification::new(case.name, case.task, &self.config.spec_defaults)
                    .with_description(case.description);
                match case.expected_output {
                    Some(expected) => spec.with_expected_output(expected),
                    None => spec,
                }
            })
            .collect()
    }

    async fn persist(&self, file_name: &str, content: &str) -> Result<PathBuf> {
        persist_artifact(&self.config.artifacts_dir, file_name, content).await
    }
}

async fn persist_artifact(dir: &Path, file_name: &str, content: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, content).await?;
    Ok(path)
}
