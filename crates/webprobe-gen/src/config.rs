//! Generation settings.

use std::path::PathBuf;
use std::time::Duration;

use webprobe_core::{ConfigError, SpecDefaults};

pub const DEFAULT_GENERATION_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_DIFF_SIZE: usize = 100_000;
pub const DEFAULT_MAX_TESTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Diff bytes embedded in the prompt before truncation kicks in.
    pub max_diff_size: usize,
    pub max_tests: usize,
    pub generated_tests_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub deployment_url: Option<String>,
    /// Defaults applied to every generated specification.
    pub spec_defaults: SpecDefaults,
    pub max_attempts: u32,
    /// First retry delay; doubled for each further attempt.
    pub backoff_base: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GENERATION_BASE_URL.to_string(),
            model: DEFAULT_GENERATION_MODEL.to_string(),
            max_diff_size: DEFAULT_MAX_DIFF_SIZE,
            max_tests: DEFAULT_MAX_TESTS,
            generated_tests_dir: PathBuf::from("generated-tests"),
            artifacts_dir: PathBuf::from("generation-artifacts"),
            deployment_url: None,
            spec_defaults: SpecDefaults::default(),
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(ConfigError::MissingCredential {
                name: "GENERATION_API_KEY".to_string(),
            });
        }
        if self.max_tests == 0 {
            return Err(invalid("MAX_TESTS", "0", "must be at least 1"));
        }
        if self.max_diff_size == 0 {
            return Err(invalid("MAX_DIFF_SIZE", "0", "must be at least 1 byte"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "0", "must be at least 1"));
        }
        Ok(())
    }

    /// Delay before `attempt` (1-based); zero for the first attempt.
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.backoff_base * 2u32.saturating_pow(attempt - 2)
    }
}

fn invalid(name: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
