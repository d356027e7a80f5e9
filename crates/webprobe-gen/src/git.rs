//! Git diff provider.
//!
//! Shells out to `git` in the repository directory; no libgit bindings.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{GenerationError, Result};

/// Two resolved revisions to diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionRange {
    /// Reference as the user wrote it.
    pub reference: String,
    pub base: String,
    pub head: String,
}

/// Per-file line counts from `git diff --numstat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffStat {
    pub path: String,
    pub additions: u64,
    pub deletions: u64,
}

/// Metadata of one commit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitInfo {
    pub sha: String,
    pub author: String,
    pub date: String,
    pub subject: String,
}

/// Version-control collaborator used by the generation client.
#[async_trait]
pub trait DiffSource: Send + Sync {
    /// Resolve `A..B` (or a single `R`, meaning `R..HEAD`) to commit ids.
    async fn resolve(&self, reference: &str) -> Result<RevisionRange>;

    /// Unified diff text between the two revisions.
    async fn diff_text(&self, range: &RevisionRange) -> Result<String>;

    /// Raw `--numstat` output between the two revisions.
    async fn numstat(&self, range: &RevisionRange) -> Result<String>;

    /// Metadata of `rev`.
    async fn commit_info(&self, rev: &str) -> Result<CommitInfo>;
}

/// Split a reference into its base and head parts.
pub fn split_reference(reference: &str) -> Result<(String, String)> {
    let reference = reference.trim();
    let invalid = |detail: &str| GenerationError::InvalidReference {
        reference: reference.to_string(),
        detail: detail.to_string(),
    };
    if reference.is_empty() {
        return Err(invalid("reference is empty"));
    }
    if reference.contains("...") {
        return Err(invalid("symmetric ranges (A...B) are not supported; use A..B"));
    }
    match reference.split_once("..") {
        Some((base, _)) if base.is_empty() => Err(invalid("range has no base revision")),
        Some((base, "")) => Ok((base.to_string(), "HEAD".to_string())),
        Some((base, head)) => Ok((base.to_string(), head.to_string())),
        None => Ok((reference.to_string(), "HEAD".to_string())),
    }
}

/// [`DiffSource`] backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct GitDiffProvider {
    repo_dir: PathBuf,
}

impl GitDiffProvider {
    /// Open `repo_dir`, failing with `NotARepository` if it is not inside a
    /// git work tree.
    pub async fn open(repo_dir: impl AsRef<Path>) -> Result<Self> {
        let repo_dir = repo_dir.as_ref().to_path_buf();
        let inside = Command::new("git")
            .args(["rev-parse", "--is-inside-work-tree"])
            .current_dir(&repo_dir)
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false);
        if !inside {
            return Err(GenerationError::NotARepository(repo_dir));
        }
        Ok(Self { repo_dir })
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    async fn git(&self, args: &[&str]) -> Result<std::process::Output> {
        debug!(?args, "running git");
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .await
            .map_err(|e| GenerationError::Git(format!("failed to run git: {e}")))
    }

    async fn git_stdout(&self, args: &[&str]) -> Result<String> {
        let output = self.git(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GenerationError::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn resolve_one(&self, reference: &str, rev: &str) -> Result<String> {
        let spec = format!("{rev}^{{commit}}");
        let output = self.git(&["rev-parse", "--verify", "--quiet", &spec]).await?;
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || sha.is_empty() {
            return Err(GenerationError::InvalidReference {
                reference: reference.to_string(),
                detail: format!("'{rev}' does not name a commit"),
            });
        }
        Ok(sha)
    }
}

#[async_trait]
impl DiffSource for GitDiffProvider {
    async fn resolve(&self, reference: &str) -> Result<RevisionRange> {
        let (base, head) = split_reference(reference)?;
        let base = self.resolve_one(reference, &base).await?;
        let head = self.resolve_one(reference, &head).await?;
        Ok(RevisionRange {
            reference: reference.trim().to_string(),
            base,
            head,
        })
    }

    async fn diff_text(&self, range: &RevisionRange) -> Result<String> {
        self.git_stdout(&["diff", "--no-color", "--no-ext-diff", &range.base, &range.head])
            .await
    }

    async fn numstat(&self, range: &RevisionRange) -> Result<String> {
        self.git_stdout(&["diff", "--numstat", &range.base, &range.head])
            .await
    }

    async fn commit_info(&self, rev: &str) -> Result<CommitInfo> {
        let raw = self
            .git_stdout(&["log", "-1", "--format=%H%x1f%an%x1f%aI%x1f%s", rev])
            .await?;
        let mut parts = raw.trim_end().splitn(4, '\u{1f}');
        let mut next = || parts.next().unwrap_or_default().to_string();
        Ok(CommitInfo {
            sha: next(),
            author: next(),
            date: next(),
            subject: next(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
        dir
    }

    #[test]
    fn test_split_reference() {
        assert_eq!(
            split_reference("main..feature").unwrap(),
            ("main".to_string(), "feature".to_string())
        );
        assert_eq!(
            split_reference("HEAD~1").unwrap(),
            ("HEAD~1".to_string(), "HEAD".to_string())
        );
        assert_eq!(
            split_reference("v1.0..").unwrap(),
            ("v1.0".to_string(), "HEAD".to_string())
        );
        assert!(split_reference("..feature").is_err());
        assert!(split_reference("a...b").is_err());
        assert!(split_reference("  ").is_err());
    }

    #[tokio::test]
    async fn test_open_outside_repo_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = GitDiffProvider::open(dir.path()).await.unwrap_err();
        assert!(matches!(err, GenerationError::NotARepository(_)));
    }

    #[tokio::test]
    async fn test_resolve_unknown_reference() {
        let repo = make_git_repo();
        let git = GitDiffProvider::open(repo.path()).await.unwrap();
        let err = git.resolve("does-not-exist").await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidReference { .. }));
    }

    #[tokio::test]
    async fn test_diff_and_commit_info() {
        let repo = make_git_repo();
        std::fs::write(repo.path().join("app.js"), "console.log('hi');\n").unwrap();
        run_git(repo.path(), &["add", "."]);
        run_git(repo.path(), &["commit", "-m", "Add greeting"]);

        let git = GitDiffProvider::open(repo.path()).await.unwrap();
        let range = git.resolve("HEAD~1").await.unwrap();
        assert_eq!(range.base.len(), 40);
        assert_ne!(range.base, range.head);

        let text = git.diff_text(&range).await.unwrap();
        assert!(text.contains("+console.log('hi');"));
        assert_eq!(git.numstat(&range).await.unwrap().trim(), "1\t0\tapp.js");

        let info = git.commit_info(&range.head).await.unwrap();
        assert_eq!(info.sha, range.head);
        assert_eq!(info.author, "test-user");
        assert_eq!(info.subject, "Add greeting");
    }
}
