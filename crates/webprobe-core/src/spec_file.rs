//! Markdown test files with YAML front matter.
//!
//! ```text
//! ---
//! name: Login works
//! description: Signs in with the demo account
//! timeout: 180
//! llm_model: browser-use-llm
//! expected_output: The dashboard greets the demo user
//! ---
//!
//! # Task
//!
//! Open the site, click "Sign in" ...
//! ```
//!
//! Every front matter field is optional. When the body has a `# Task` (or
//! `## Task`) heading, only that section is the instruction text; otherwise
//! the whole body is.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::domain::error::{ConfigError, FormatError};
use crate::domain::spec::{SpecDefaults, SpecOrigin, SuiteEntry, TestSpecification};

const FENCE: &str = "---";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct FrontMatter {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    llm_model: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    input_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_output: Option<String>,
}

/// Split `content` into (front matter yaml, body).
fn split_front_matter(content: &str) -> Result<(Option<&str>, &str), FormatError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let Some(rest) = content
        .strip_prefix("---\r\n")
        .or_else(|| content.strip_prefix("---\n"))
    else {
        return Ok((None, content));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Ok((Some(yaml), body));
        }
        offset += line.len();
    }
    Err(FormatError::UnterminatedFrontMatter)
}

/// Extract the `# Task` section from a markdown body, if present.
fn extract_task_section(body: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut in_section = false;

    for line in body.lines() {
        let trimmed = line.trim();
        let lowered = trimmed.to_lowercase();
        if lowered == "# task" || lowered == "## task" {
            in_section = true;
            continue;
        }
        if in_section {
            if trimmed.starts_with('#') {
                break;
            }
            lines.push(line);
        }
    }

    let task = lines.join("\n").trim().to_string();
    (!task.is_empty()).then_some(task)
}

/// Parse one test file's contents.
///
/// `fallback_name` is used when the front matter has no `name`.
pub fn parse_test_file(
    content: &str,
    fallback_name: &str,
    defaults: &SpecDefaults,
) -> Result<TestSpecification, FormatError> {
    let (yaml, body) = split_front_matter(content)?;
    let front: FrontMatter = match yaml {
        Some(yaml) if !yaml.trim().is_empty() => serde_yaml::from_str(yaml)?,
        _ => FrontMatter::default(),
    };

    let body = body.trim();
    let instructions = extract_task_section(body).unwrap_or_else(|| body.to_string());
    if instructions.is_empty() {
        return Err(FormatError::EmptyInstructions);
    }

    Ok(TestSpecification {
        name: front.name.unwrap_or_else(|| fallback_name.to_string()),
        description: front.description.unwrap_or_default(),
        instructions,
        timeout_secs: front.timeout.unwrap_or(defaults.timeout_secs),
        llm_model: front.llm_model.unwrap_or_else(|| defaults.llm_model.clone()),
        input_files: front.input_files,
        expected_output: front.expected_output,
        origin: SpecOrigin::Generated(None),
    })
}

/// Serialize a specification into the test-file format.
///
/// Metadata goes through a YAML serializer, so names or descriptions holding
/// colons, quotes, or newlines are quoted rather than corrupting the header.
pub fn serialize_test_spec(spec: &TestSpecification) -> Result<String, FormatError> {
    let front = FrontMatter {
        name: Some(spec.name.clone()),
        description: (!spec.description.is_empty()).then(|| spec.description.clone()),
        timeout: Some(spec.timeout_secs),
        llm_model: Some(spec.llm_model.clone()),
        input_files: spec.input_files.clone(),
        expected_output: spec.expected_output.clone(),
    };
    let yaml = serde_yaml::to_string(&front)?;
    let yaml = yaml.strip_prefix("---\n").unwrap_or(&yaml);

    let mut out = String::new();
    out.push_str(FENCE);
    out.push('\n');
    out.push_str(yaml);
    if !yaml.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(FENCE);
    out.push_str("\n\n");

    // A heading inside the instructions would end the task section early,
    // so such bodies are written without one.
    let instructions = spec.instructions.trim();
    let has_heading = instructions
        .lines()
        .any(|line| line.trim_start().starts_with('#'));
    if !has_heading {
        out.push_str("# Task\n\n");
    }
    out.push_str(instructions);
    out.push('\n');
    Ok(out)
}

/// Find all markdown test files under `dir`, sorted for stable ordering.
pub fn discover_test_files(dir: &Path) -> Vec<PathBuf> {
    let files: BTreeSet<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable path");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|ext| ext.to_str()),
                Some("md") | Some("markdown")
            )
        })
        .collect();

    files.into_iter().collect()
}

/// Load one test file from disk.
pub fn load_test_file(
    path: &Path,
    defaults: &SpecDefaults,
) -> Result<TestSpecification, FormatError> {
    let content = std::fs::read_to_string(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    let spec = parse_test_file(&content, &stem, defaults)?;
    Ok(spec.with_origin(SpecOrigin::File(path.to_path_buf())))
}

/// Load every test file under `dir` into an ordered run list.
///
/// Files that fail to parse keep their slot as [`SuiteEntry::Invalid`].
pub fn load_test_suite(
    dir: &Path,
    defaults: &SpecDefaults,
) -> Result<Vec<SuiteEntry>, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::TestDirectoryMissing(dir.to_path_buf()));
    }

    let files = discover_test_files(dir);
    info!(count = files.len(), dir = %dir.display(), "discovered test files");

    Ok(files
        .into_iter()
        .map(|path| match load_test_file(&path, defaults) {
            Ok(spec) => SuiteEntry::Ready(spec),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to parse test case");
                SuiteEntry::Invalid {
                    path,
                    reason: e.to_string(),
                }
            }
        })
        .collect())
}
