//! Webprobe Generation
//!
//! Turns a git diff into browser test specifications by asking a generative
//! language service, with retries, and writes them in the same file format
//! the static test directory uses.

pub mod client;
pub mod config;
pub mod diff;
pub mod error;
pub mod git;
pub mod parse;
pub mod prompt;
pub mod provider;
pub mod writer;

pub use client::{GenerationClient, GenerationOutcome};
pub use config::GenerationConfig;
pub use diff::{drop_binary_sections, parse_numstat, truncate_diff, PreparedDiff};
pub use error::{GenerationError, Result};
pub use git::{split_reference, CommitInfo, DiffSource, DiffStat, GitDiffProvider, RevisionRange};
pub use parse::{parse_test_cases, GeneratedCase};
pub use prompt::{build_prompt, PromptContext};
pub use provider::OpenAiCompatibleModel;
pub use writer::{slugify, write_generated_specs};
