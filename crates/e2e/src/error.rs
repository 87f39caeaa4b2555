//! Error types for the login probe

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Navigation mismatch: expected {expected}, got {actual}")]
    NavigationMismatch { expected: String, actual: String },

    #[error("Timeout after {timeout_ms} ms waiting for {selector}")]
    ElementTimeout { selector: String, timeout_ms: u64 },

    #[error("Redirect timeout: address did not start with {prefix} within {timeout_ms} ms (last: {actual})")]
    RedirectTimeout {
        prefix: String,
        timeout_ms: u64,
        actual: String,
    },

    #[error("No post-login marker found among [{}]", .selectors.join(", "))]
    MarkerNotFound { selectors: Vec<String> },

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Target {url} is not reachable: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Playwright not found. Install with: npm i playwright && npx playwright install chromium")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// True for the four failure kinds a scenario run can end in, as opposed
    /// to errors setting the run up.
    pub fn is_scenario_failure(&self) -> bool {
        matches!(
            self,
            E2eError::NavigationMismatch { .. }
                | E2eError::ElementTimeout { .. }
                | E2eError::RedirectTimeout { .. }
                | E2eError::MarkerNotFound { .. }
                | E2eError::StepFailed { .. }
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
