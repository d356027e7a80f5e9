//! Prompt construction for test generation.

use crate::diff::PreparedDiff;
use crate::git::{CommitInfo, RevisionRange};

/// Everything besides the diff that shapes the prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptContext<'a> {
    /// Free-text narrative from the user.
    pub context: Option<&'a str>,
    pub deployment_url: Option<&'a str>,
    pub max_tests: usize,
}

/// Build the generation prompt.
pub fn build_prompt(
    diff: &PreparedDiff,
    range: &RevisionRange,
    head: &CommitInfo,
    ctx: &PromptContext<'_>,
) -> String {
    let mut p = String::new();
    p.push_str(
        "You are a QA engineer writing end-to-end browser tests for a web application. \
         An AI agent will execute each test in a real browser by following your task \
         instructions literally.\n\n",
    );

    p.push_str("## Change under test\n");
    p.push_str(&format!("- Range: {} ({}..{})\n", range.reference, short(&range.base), short(&range.head)));
    if !head.sha.is_empty() {
        p.push_str(&format!(
            "- Head commit: {} by {} on {}: {}\n",
            short(&head.sha),
            head.author,
            head.date,
            head.subject
        ));
    }
    p.push_str(&format!(
        "- Files changed: {} (+{} / -{})\n",
        diff.stats.len(),
        diff.total_additions(),
        diff.total_deletions()
    ));
    for stat in &diff.stats {
        p.push_str(&format!("  - {} (+{} / -{})\n", stat.path, stat.additions, stat.deletions));
    }
    if diff.truncated {
        p.push_str(&format!(
            "- Note: the diff below was truncated from {} bytes.\n",
            diff.original_bytes
        ));
    }
    p.push('\n');

    if let Some(url) = ctx.deployment_url {
        p.push_str(&format!("## Deployment\nThe changed application is deployed at {url}.\n\n"));
    }
    if let Some(context) = ctx.context.map(str::trim).filter(|c| !c.is_empty()) {
        p.push_str(&format!("## Additional context\n{context}\n\n"));
    }

    p.push_str("## Diff\n```diff\n");
    p.push_str(&diff.text);
    if !diff.text.ends_with('\n') {
        p.push('\n');
    }
    p.push_str("```\n\n");

    p.push_str(&format!(
        "## Instructions\n\
         Write at most {max} browser test cases that verify the user-visible behaviour \
         affected by this change. Prefer a few high-value tests over many shallow ones. \
         Each task must be self-contained, written as numbered steps a browser agent can \
         follow, and must not rely on other tests.\n\n\
         Respond with JSON only, in exactly this shape:\n\
         {{\"test_cases\": [{{\"name\": \"short test name\", \
         \"description\": \"what the test covers\", \
         \"task\": \"step-by-step instructions\", \
         \"expected_output\": \"what a passing run shows\"}}]}}\n",
        max = ctx.max_tests.max(1)
    ));
    p
}

fn short(sha: &str) -> &str {
    sha.get(..12).unwrap_or(sha)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (PreparedDiff, RevisionRange, CommitInfo) {
        let diff = PreparedDiff::prepare(
            "diff --git a/login.tsx b/login.tsx\n+<button>Sign in</button>\n",
            "1\t0\tlogin.tsx\n",
            100_000,
        );
        let range = RevisionRange {
            reference: "main..feature".to_string(),
            base: "a".repeat(40),
            head: "b".repeat(40),
        };
        let head = CommitInfo {
            sha: "b".repeat(40),
            author: "Ada".to_string(),
            date: "2026-01-01T00:00:00Z".to_string(),
            subject: "Add sign-in button".to_string(),
        };
        (diff, range, head)
    }

    #[test]
    fn test_prompt_embeds_everything() {
        let (diff, range, head) = fixture();
        let prompt = build_prompt(
            &diff,
            &range,
            &head,
            &PromptContext {
                context: Some("  Focus on the login page.  "),
                deployment_url: Some("https://preview.example.com"),
                max_tests: 4,
            },
        );
        assert!(prompt.contains("- Range: main..feature (aaaaaaaaaaaa..bbbbbbbbbbbb)"));
        assert!(prompt.contains("Add sign-in button"));
        assert!(prompt.contains("  - login.tsx (+1 / -0)"));
        assert!(prompt.contains("deployed at https://preview.example.com"));
        assert!(prompt.contains("## Additional context\nFocus on the login page.\n"));
        assert!(prompt.contains("+<button>Sign in</button>"));
        assert!(prompt.contains("at most 4 browser test cases"));
        assert!(prompt.contains("\"test_cases\""));
        assert!(prompt.contains("\"expected_output\""));
    }

    #[test]
    fn test_optional_sections_omitted() {
        let (diff, range, head) = fixture();
        let prompt = build_prompt(&diff, &range, &head, &PromptContext::default());
        assert!(!prompt.contains("## Deployment"));
        assert!(!prompt.contains("## Additional context"));
        assert!(!prompt.contains("truncated"));
        assert!(prompt.contains("at most 1 browser test cases"));
    }
}
