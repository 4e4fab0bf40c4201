use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use vigil_ai::{GoogleConfig, DEFAULT_GOOGLE_API_BASE};
use vigil_browser::test_execution::DEFAULT_TEST_COMMAND;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const MODEL_ENV: &str = "VIGIL_MODEL";
pub const API_BASE_ENV: &str = "VIGIL_GEMINI_API_BASE";
pub const REQUEST_TIMEOUT_ENV: &str = "VIGIL_REQUEST_TIMEOUT_MS";
pub const MAX_RETRIES_ENV: &str = "VIGIL_MAX_RETRIES";
pub const RETRY_BUDGET_ENV: &str = "VIGIL_RETRY_BUDGET_MS";
pub const INSPECT_COMMAND_ENV: &str = "VIGIL_INSPECT_COMMAND";
pub const PAGE_LOAD_TIMEOUT_ENV: &str = "VIGIL_PAGE_LOAD_TIMEOUT_MS";
pub const TEST_COMMAND_ENV: &str = "VIGIL_TEST_COMMAND";
pub const PLAYWRIGHT_CONFIG_ENV: &str = "VIGIL_PLAYWRIGHT_CONFIG";
pub const TEST_TIMEOUT_ENV: &str = "VIGIL_TEST_TIMEOUT_MS";
pub const WORKSPACE_ENV: &str = "VIGIL_WORKSPACE";

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;
const DEFAULT_MAX_RETRIES: usize = 2;
const DEFAULT_RETRY_BUDGET_MS: u64 = 0;
const DEFAULT_INSPECT_COMMAND: &str = "node scripts/inspect-page.mjs";
const DEFAULT_PAGE_LOAD_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_PLAYWRIGHT_CONFIG: &str = "playwright.config.js";
const DEFAULT_TEST_TIMEOUT_MS: u64 = 600_000;

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VigilConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub request_timeout_ms: u64,
    pub max_retries: usize,
    pub retry_budget_ms: u64,
    pub inspect_command: String,
    pub page_load_timeout_ms: u64,
    pub test_command: String,
    pub playwright_config: String,
    pub test_timeout_ms: u64,
    pub workspace: PathBuf,
}

impl VigilConfig {
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to resolve current directory")?;
        Ok(Self::from_env_lookup(|name| std::env::var(name).ok(), &cwd))
    }

    /// Builds the config from an arbitrary lookup. Blank values count as
    /// unset; unparsable or zero numbers fall back to defaults.
    pub fn from_env_lookup<F>(lookup: F, default_workspace: &Path) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let positive_u64 = |name: &str, default: u64| {
            text(name)
                .and_then(|raw| raw.parse::<u64>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(default)
        };

        let workspace = text(WORKSPACE_ENV)
            .map(PathBuf::from)
            .map(|path| {
                if path.is_absolute() {
                    path
                } else {
                    default_workspace.join(path)
                }
            })
            .unwrap_or_else(|| default_workspace.to_path_buf());

        Self {
            api_key: text(API_KEY_ENV),
            model: text(MODEL_ENV).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base: text(API_BASE_ENV).unwrap_or_else(|| DEFAULT_GOOGLE_API_BASE.to_string()),
            request_timeout_ms: positive_u64(REQUEST_TIMEOUT_ENV, DEFAULT_REQUEST_TIMEOUT_MS),
            max_retries: text(MAX_RETRIES_ENV)
                .and_then(|raw| raw.parse::<usize>().ok())
                .unwrap_or(DEFAULT_MAX_RETRIES),
            retry_budget_ms: text(RETRY_BUDGET_ENV)
                .and_then(|raw| raw.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_BUDGET_MS),
            inspect_command: text(INSPECT_COMMAND_ENV)
                .unwrap_or_else(|| DEFAULT_INSPECT_COMMAND.to_string()),
            page_load_timeout_ms: positive_u64(PAGE_LOAD_TIMEOUT_ENV, DEFAULT_PAGE_LOAD_TIMEOUT_MS),
            test_command: text(TEST_COMMAND_ENV)
                .unwrap_or_else(|| DEFAULT_TEST_COMMAND.to_string()),
            playwright_config: text(PLAYWRIGHT_CONFIG_ENV)
                .unwrap_or_else(|| DEFAULT_PLAYWRIGHT_CONFIG.to_string()),
            test_timeout_ms: positive_u64(TEST_TIMEOUT_ENV, DEFAULT_TEST_TIMEOUT_MS),
            workspace,
        }
    }

    /// Gemini client settings; `None` when no API key is configured.
    pub fn google_config(&self) -> Option<GoogleConfig> {
        let api_key = self.api_key.clone()?;
        Some(GoogleConfig {
            api_base: self.api_base.clone(),
            api_key,
            request_timeout_ms: self.request_timeout_ms,
            max_retries: self.max_retries,
            retry_budget_ms: self.retry_budget_ms,
            retry_jitter: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use super::VigilConfig;

    fn config_from(pairs: &[(&str, &str)]) -> VigilConfig {
        let env = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        VigilConfig::from_env_lookup(|name| env.get(name).cloned(), Path::new("/work"))
    }

    #[test]
    fn unit_defaults_apply_when_environment_is_empty() {
        let config = config_from(&[]);
        assert_eq!(config.api_key, None);
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.inspect_command, "node scripts/inspect-page.mjs");
        assert_eq!(config.test_command, "npx playwright test");
        assert_eq!(config.playwright_config, "playwright.config.js");
        assert_eq!(config.workspace, PathBuf::from("/work"));
        assert!(config.google_config().is_none());
    }

    #[test]
    fn functional_overrides_are_trimmed_and_applied() {
        let config = config_from(&[
            ("GEMINI_API_KEY", " secret "),
            ("VIGIL_MODEL", "gemini-2.5-pro"),
            ("VIGIL_TEST_TIMEOUT_MS", "90000"),
            ("VIGIL_MAX_RETRIES", "0"),
            ("VIGIL_WORKSPACE", "projects/shop"),
        ]);
        assert_eq!(config.model, "gemini-2.5-pro");
        assert_eq!(config.test_timeout_ms, 90_000);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.workspace, PathBuf::from("/work/projects/shop"));
        let google = config.google_config().expect("google config");
        assert_eq!(google.api_key, "secret");
        assert_eq!(google.max_retries, 0);
    }

    #[test]
    fn regression_invalid_numbers_fall_back_to_defaults() {
        let config = config_from(&[
            ("VIGIL_PAGE_LOAD_TIMEOUT_MS", "soon"),
            ("VIGIL_REQUEST_TIMEOUT_MS", "0"),
            ("GEMINI_API_KEY", "   "),
        ]);
        assert_eq!(config.page_load_timeout_ms, 30_000);
        assert_eq!(config.request_timeout_ms, 120_000);
        assert_eq!(config.api_key, None);
    }
}
