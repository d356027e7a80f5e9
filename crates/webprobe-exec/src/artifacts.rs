//! Output artifact download.
//!
//! Failures here are warnings only; they never change a test's status.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use webprobe_core::{OutputFile, TaskId, TaskService};

/// Make `raw` safe to use as a single path component.
///
/// Lowercases, turns whitespace into `_`, and drops anything outside
/// `[a-z0-9._-]`. Never returns an empty string or a dot-only name.
pub fn sanitize_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_whitespace() {
            out.push('_');
        } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c.to_ascii_lowercase());
        }
    }
    if out.chars().all(|c| c == '.') {
        "unnamed".to_string()
    } else {
        out
    }
}

/// Directory for the artifacts of the test at `slot` in the run list.
///
/// The 1-based slot prefix keeps tests whose names sanitize alike apart.
pub fn artifact_dir_name(slot: usize, test_name: &str) -> String {
    format!("{:02}_{}", slot + 1, sanitize_component(test_name))
}

/// Sanitized file names for `files`, with `_2`, `_3`, ... inserted before
/// the extension of names already taken.
fn unique_file_names(files: &[OutputFile]) -> Vec<String> {
    let mut taken = HashSet::new();
    files
        .iter()
        .map(|file| {
            let base = sanitize_component(&file.file_name);
            let (stem, ext) = match base.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{ext}")),
                _ => (base.clone(), String::new()),
            };
            let mut name = base;
            let mut n = 2;
            while !taken.insert(name.clone()) {
                name = format!("{stem}_{n}{ext}");
                n += 1;
            }
            name
        })
        .collect()
}

/// Download every artifact of `task` into
/// `output_dir/<`[`artifact_dir_name`]`>/`.
///
/// Returns the paths that were written.
pub async fn save_output_files(
    service: &dyn TaskService,
    task: &TaskId,
    slot: usize,
    test_name: &str,
    files: &[OutputFile],
    output_dir: &Path,
) -> Vec<PathBuf> {
    let dir = output_dir.join(artifact_dir_name(slot, test_name));
    let mut saved = Vec::new();

    for (file, name) in files.iter().zip(unique_file_names(files)) {
        match fetch_one(service, task, file, &dir.join(name)).await {
            Ok(path) => {
                debug!(file = %file.file_name, path = %path.display(), "saved output file");
                saved.push(path);
            }
            Err(e) => warn!(file = %file.file_name, error = %e, "failed to save output file"),
        }
    }
    saved
}

async fn fetch_one(
    service: &dyn TaskService,
    task: &TaskId,
    file: &OutputFile,
    path: &Path,
) -> anyhow::Result<PathBuf> {
    let url = service.output_file_url(task, &file.id).await?;
    let bytes = service.download(&url).await?;
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use webprobe_core::fakes::{FakeScript, FakeTaskService};
    use webprobe_core::{SessionId, TaskRequest};

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("Checkout Flow"), "checkout_flow");
        assert_eq!(sanitize_component("../../etc/passwd"), "....etcpasswd");
        assert_eq!(sanitize_component("Report (final).PDF"), "report_final.pdf");
        assert_eq!(sanitize_component(".."), "unnamed");
        assert_eq!(sanitize_component("///"), "unnamed");
    }

    #[tokio::test]
    async fn test_broken_download_is_skipped() {
        let fake = FakeTaskService::new(
            FakeScript::finished("ok")
                .with_output_file("Screenshot 1.png", b"png-bytes")
                .with_broken_output_file("trace.zip"),
        );
        let session: SessionId = fake.create_session().await.unwrap();
        let task = fake
            .submit_task(
                &session,
                &TaskRequest {
                    instructions: "go".to_string(),
                    llm_model: None,
                    input_files: Vec::new(),
                },
            )
            .await
            .unwrap();
        let files = vec![
            OutputFile {
                id: format!("{}-file-0", task.0),
                file_name: "Screenshot 1.png".to_string(),
            },
            OutputFile {
                id: format!("{}-file-1", task.0),
                file_name: "trace.zip".to_string(),
            },
        ];

        let dir = tempfile::tempdir().unwrap();
        let saved = save_output_files(&fake, &task, 0, "Login Works", &files, dir.path()).await;

        assert_eq!(saved, vec![dir.path().join("01_login_works/screenshot_1.png")]);
        assert_eq!(std::fs::read(&saved[0]).unwrap(), b"png-bytes");
    }

    #[test]
    fn test_dir_names_keep_similar_tests_apart() {
        assert_eq!(artifact_dir_name(0, "Login!"), "01_login");
        assert_eq!(artifact_dir_name(1, "Login?"), "02_login");
        assert_ne!(artifact_dir_name(0, "Login!"), artifact_dir_name(1, "Login?"));
    }

    #[tokio::test]
    async fn test_colliding_file_names_are_deduplicated() {
        let fake = FakeTaskService::new(
            FakeScript::finished("ok")
                .with_output_file("Report.txt", b"first")
                .with_output_file("report.txt", b"second")
                .with_output_file("report!.txt", b"third"),
        );
        let session: SessionId = fake.create_session().await.unwrap();
        let task = fake
            .submit_task(
                &session,
                &TaskRequest {
                    instructions: "go".to_string(),
                    llm_model: None,
                    input_files: Vec::new(),
                },
            )
            .await
            .unwrap();
        let files: Vec<OutputFile> = ["Report.txt", "report.txt", "report!.txt"]
            .iter()
            .enumerate()
            .map(|(i, name)| OutputFile {
                id: format!("{}-file-{i}", task.0),
                file_name: name.to_string(),
            })
            .collect();

        let dir = tempfile::tempdir().unwrap();
        let saved = save_output_files(&fake, &task, 2, "Export", &files, dir.path()).await;

        let base = dir.path().join("03_export");
        assert_eq!(
            saved,
            vec![
                base.join("report.txt"),
                base.join("report_2.txt"),
                base.join("report_3.txt"),
            ]
        );
        assert_eq!(std::fs::read(&saved[0]).unwrap(), b"first");
        assert_eq!(std::fs::read(&saved[2]).unwrap(), b"third");
    }
}
