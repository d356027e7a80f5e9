//! Diff filtering and truncation.

use crate::git::DiffStat;

/// Diff text ready to embed in a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedDiff {
    pub text: String,
    pub stats: Vec<DiffStat>,
    /// Size of the filtered diff before truncation.
    pub original_bytes: usize,
    pub truncated: bool,
}

impl PreparedDiff {
    /// Filter and truncate `raw_diff`, parsing `raw_numstat` for stats.
    pub fn prepare(raw_diff: &str, raw_numstat: &str, max_bytes: usize) -> Self {
        let filtered = drop_binary_sections(raw_diff);
        let original_bytes = filtered.len();
        let (text, truncated) = truncate_diff(&filtered, max_bytes);
        Self {
            text,
            stats: parse_numstat(raw_numstat),
            original_bytes,
            truncated,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.stats.iter().map(|s| s.path.as_str())
    }

    pub fn total_additions(&self) -> u64 {
        self.stats.iter().map(|s| s.additions).sum()
    }

    pub fn total_deletions(&self) -> u64 {
        self.stats.iter().map(|s| s.deletions).sum()
    }
}

/// Parse `git diff --numstat` output. Binary entries (`-\t-\t`) are skipped.
pub fn parse_numstat(raw: &str) -> Vec<DiffStat> {
    raw.lines()
        .filter_map(|line| {
            let mut cols = line.splitn(3, '\t');
            let additions = cols.next()?.parse().ok()?;
            let deletions = cols.next()?.parse().ok()?;
            let path = cols.next()?.trim();
            if path.is_empty() {
                return None;
            }
            Some(DiffStat {
                path: path.to_string(),
                additions,
                deletions,
            })
        })
        .collect()
}

/// Remove every per-file section whose content is binary.
pub fn drop_binary_sections(diff: &str) -> String {
    let mut out = String::with_capacity(diff.len());
    let mut section = String::new();

    for line in diff.split_inclusive('\n') {
        if line.starts_with("diff --git ") && !section.is_empty() {
            flush(&mut section, &mut out);
        }
        section.push_str(line);
    }
    flush(&mut section, &mut out);
    out
}

fn flush(section: &mut String, out: &mut String) {
    if !is_binary_section(section) {
        out.push_str(section);
    }
    section.clear();
}

fn is_binary_section(section: &str) -> bool {
    section
        .lines()
        .any(|l| l.starts_with("Binary files ") || l == "GIT binary patch")
}

/// Cap `diff` at `max_bytes`, appending an explicit truncation marker.
///
/// Cuts on a line boundary when one exists inside the limit, and always on a
/// UTF-8 character boundary.
pub fn truncate_diff(diff: &str, max_bytes: usize) -> (String, bool) {
    if diff.len() <= max_bytes {
        return (diff.to_string(), false);
    }
    let mut cut = max_bytes;
    while !diff.is_char_boundary(cut) {
        cut -= 1;
    }
    if let Some(newline) = diff[..cut].rfind('\n') {
        cut = newline + 1;
    }
    let mut text = diff[..cut].to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(&format!(
        "... [diff truncated: showing first {} of {} bytes] ...\n",
        cut,
        diff.len()
    ));
    (text, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &str = "diff --git a/app.js b/app.js\n\
index 1..2 100644\n\
--- a/app.js\n\
+++ b/app.js\n\
@@ -1 +1 @@\n\
-old\n\
+new\n\
diff --git a/logo.png b/logo.png\n\
index 3..4 100644\n\
Binary files a/logo.png and b/logo.png differ\n\
diff --git a/README.md b/README.md\n\
--- a/README.md\n\
+++ b/README.md\n\
@@ -0,0 +1 @@\n\
+docs\n";

    #[test]
    fn test_binary_sections_dropped() {
        let filtered = drop_binary_sections(MIXED);
        assert!(filtered.contains("+new"));
        assert!(filtered.contains("+docs"));
        assert!(!filtered.contains("logo.png"));
    }

    #[test]
    fn test_only_binary_changes_become_empty() {
        let diff = "diff --git a/a.bin b/a.bin\nBinary files a/a.bin and b/a.bin differ\n";
        let prepared = PreparedDiff::prepare(diff, "-\t-\ta.bin\n", 1000);
        assert!(prepared.is_empty());
        assert!(prepared.stats.is_empty());
    }

    #[test]
    fn test_numstat_skips_binary() {
        let stats = parse_numstat("3\t1\tapp.js\n-\t-\tlogo.png\n10\t0\tdocs/guide.md\n");
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[1].path, "docs/guide.md");
        assert_eq!(stats[1].additions, 10);
    }

    #[test]
    fn test_truncation_marker() {
        let diff = "line one\nline two\nline three\n";
        let (text, truncated) = truncate_diff(diff, 12);
        assert!(truncated);
        assert_eq!(
            text,
            "line one\n... [diff truncated: showing first 9 of 29 bytes] ...\n"
        );

        let (same, truncated) = truncate_diff(diff, 1000);
        assert!(!truncated);
        assert_eq!(same, diff);
    }

    #[test]
    fn test_truncation_respects_char_boundary() {
        let diff = "ééééé";
        let (text, truncated) = truncate_diff(diff, 3);
        assert!(truncated);
        assert!(text.starts_with("é\n"));
    }

    #[test]
    fn test_prepared_totals() {
        let prepared = PreparedDiff::prepare(MIXED, "1\t1\tapp.js\n1\t0\tREADME.md\n", 10_000);
        assert!(!prepared.truncated);
        assert_eq!(prepared.total_additions(), 2);
        assert_eq!(prepared.total_deletions(), 1);
        assert_eq!(prepared.files().collect::<Vec<_>>(), vec!["app.js", "README.md"]);
    }
}
