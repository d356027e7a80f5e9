//! Writes generated specifications as test files.

use std::path::{Path, PathBuf};

use tracing::info;
use webprobe_core::{serialize_test_spec, SpecOrigin, TestSpecification};

use crate::error::Result;

const MAX_SLUG_LEN: usize = 50;

/// Lowercase, dash-separated file stem for a test name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let mut slug: String = slug.chars().take(MAX_SLUG_LEN).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "test".to_string()
    } else {
        slug
    }
}

/// Write `specs` into `root/<timestamp>/NN-<slug>.md`.
///
/// Returns the specifications with their origin pointing at the written file.
pub async fn write_generated_specs(
    specs: Vec<TestSpecification>,
    root: &Path,
    timestamp: &str,
) -> Result<Vec<TestSpecification>> {
    let dir = root.join(timestamp);
    tokio::fs::create_dir_all(&dir).await?;

    let mut written = Vec::with_capacity(specs.len());
    for (i, spec) in specs.into_iter().enumerate() {
        let path: PathBuf = dir.join(format!("{:02}-{}.md", i + 1, slugify(&spec.name)));
        tokio::fs::write(&path, serialize_test_spec(&spec)?).await?;
        written.push(spec.with_origin(SpecOrigin::Generated(Some(path))));
    }
    info!(count = written.len(), dir = %dir.display(), "wrote generated tests");
    Ok(written)
}
