//! Runner configuration.
//!
//! Built by the binary from flags and environment, then validated before any
//! remote call is made.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::error::ConfigError;
use crate::domain::spec::SpecDefaults;

pub const DEFAULT_BASE_URL: &str = "https://api.browser-use.com/api/v2";
pub const DEFAULT_LLM_MODEL: &str = "browser-use-llm";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Settings for the execution phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Credential for the remote task service; `None` when only generating.
    pub api_key: Option<String>,
    pub base_url: String,
    pub test_directory: PathBuf,
    pub llm_model: String,
    pub timeout_secs: u64,
    pub max_concurrency: usize,
    pub fail_on_error: bool,
    pub save_outputs: bool,
    pub output_dir: PathBuf,
    pub results_dir: PathBuf,
    pub deployment_url: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            test_directory: PathBuf::from("tests"),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            fail_on_error: true,
            save_outputs: true,
            output_dir: PathBuf::from("browser-use-outputs"),
            results_dir: PathBuf::from("test-results"),
            deployment_url: None,
        }
    }
}

impl RunnerConfig {
    /// Check settings needed to execute tests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => {}
            _ => {
                return Err(ConfigError::MissingCredential {
                    name: "BROWSER_USE_API_KEY".to_string(),
                })
            }
        }
        if self.max_concurrency == 0 {
            return Err(invalid("MAX_CONCURRENCY", "0", "must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("TIMEOUT", "0", "must be at least 1 second"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(invalid(
                "BROWSER_USE_BASE_URL",
                &self.base_url,
                "must be an http(s) URL",
            ));
        }
        if let Some(url) = &self.deployment_url {
            if url.trim().is_empty() {
                return Err(invalid("DEPLOYMENT_URL", url, "must not be blank"));
            }
        }
        Ok(())
    }

    /// Per-test defaults derived from these settings.
    pub fn spec_defaults(&self) -> SpecDefaults {
        SpecDefaults {
            timeout_secs: self.timeout_secs,
            llm_model: self.llm_model.clone(),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn invalid(name: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RunnerConfig {
        RunnerConfig {
            api_key: Some("bu_test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_validate_with_key() {
        assert!(valid().validate().is_ok());
        assert_eq!(valid().default_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_missing_or_blank_key() {
        let mut cfg = valid();
        cfg.api_key = None;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MissingCredential { ref name }) if name == "BROWSER_USE_API_KEY"
        ));
        cfg.api_key = Some("   ".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let cfg = RunnerConfig {
            max_concurrency: 0,
            ..valid()
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid setting MAX_CONCURRENCY=0: must be at least 1"
        );
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let cfg = RunnerConfig {
            base_url: "api.browser-use.com".to_string(),
            ..valid()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidSetting { ref name, .. }) if name == "BROWSER_USE_BASE_URL"
        ));
    }

    #[test]
    fn test_spec_defaults_follow_settings() {
        let cfg = RunnerConfig {
            timeout_secs: 90,
            llm_model: "gpt-4.1".to_string(),
            ..valid()
        };
        let defaults = cfg.spec_defaults();
        assert_eq!(defaults.timeout_secs, 90);
        assert_eq!(defaults.llm_model, "gpt-4.1");
    }
}
