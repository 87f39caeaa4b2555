//! Probe configuration
//!
//! Two layers: [`ProbeConfig`] is what the probe logs in *to* and *as*
//! (environment driven), [`RunnerOptions`] is how the browser is run
//! (optionally loaded from a YAML file).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{E2eError, E2eResult};
use crate::playwright::Browser;

pub const APP_URL_ENV: &str = "APP_URL";
pub const USER_ENV: &str = "KEYCLOAK_USER";
pub const PASS_ENV: &str = "KEYCLOAK_PASS";

pub const DEFAULT_APP_URL: &str = "http://localhost:8080";
pub const DEFAULT_USER: &str = "user666";
pub const DEFAULT_PASS: &str = "secret";

/// Default bound for a single browser action, in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Username/password pair for the identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Strip surrounding whitespace the same way the login theme does on
    /// submit. Empty values stay empty; they are not rejected here.
    pub fn trimmed(&self) -> Self {
        Self {
            username: self.username.trim().to_string(),
            password: self.password.trim().to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Target application and the account used to log in to it.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Application origin, without a trailing slash
    pub base_url: String,
    pub credentials: Credentials,
}

impl ProbeConfig {
    pub fn new(base_url: &str, credentials: Credentials) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            credentials,
        }
    }

    /// Read `APP_URL`, `KEYCLOAK_USER` and `KEYCLOAK_PASS`, falling back to
    /// the local development defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ProbeConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self::new(
            &get(APP_URL_ENV, DEFAULT_APP_URL),
            Credentials::new(get(USER_ENV, DEFAULT_USER), get(PASS_ENV, DEFAULT_PASS)),
        )
    }

    /// `<base_url>/`
    pub fn root_url(&self) -> String {
        format!("{}/", self.base_url)
    }

    /// Resolve a path relative to the base URL. Absolute URLs pass through.
    pub fn resolve(&self, url: &str) -> String {
        resolve_url(&self.base_url, url)
    }
}

/// Join `url` onto `base_url` unless it is already absolute
pub fn resolve_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if url.starts_with('/') {
        format!("{}{}", base_url, url)
    } else {
        format!("{}/{}", base_url, url)
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// How the browser is launched and where run artifacts go.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerOptions {
    /// Default timeout for every browser action, in milliseconds
    pub timeout_ms: u64,

    pub headless: bool,

    pub viewport: Viewport,

    /// Accept self-signed or otherwise invalid TLS certificates
    pub ignore_https_errors: bool,

    pub browser: Browser,

    /// Directory holding YAML scenarios
    pub test_dir: PathBuf,

    /// Capture a screenshot when a scenario fails
    pub screenshots: bool,

    /// Where screenshots go; `<output_dir>/screenshots` when unset
    pub screenshot_dir: Option<PathBuf>,

    /// Where `test-results.json` is written
    pub output_dir: PathBuf,

    /// Trim whitespace around credentials before filling them in
    pub trim_credentials: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            headless: true,
            viewport: Viewport::default(),
            ignore_https_errors: true,
            browser: Browser::Chromium,
            test_dir: PathBuf::from("scenarios"),
            screenshots: true,
            screenshot_dir: None,
            output_dir: PathBuf::from("test-results"),
            trim_credentials: false,
        }
    }
}

impl RunnerOptions {
    /// Parse runner options from YAML. Missing keys keep their defaults.
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let options: Self = serde_yaml::from_str(yaml)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a file, or defaults if the file does not exist
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_yaml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Effective screenshot directory, or None when screenshots are off
    pub fn screenshot_dir(&self) -> Option<PathBuf> {
        if !self.screenshots {
            return None;
        }
        Some(
            self.screenshot_dir
                .clone()
                .unwrap_or_else(|| self.output_dir.join("screenshots")),
        )
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.timeout_ms == 0 {
            return Err(E2eError::Config("timeout_ms must be greater than zero".into()));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(E2eError::Config(format!(
                "viewport must be non-empty, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1280, height: 720 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_env_defaults() {
        let config = ProbeConfig::from_lookup(lookup(&[]));
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.credentials.username, "user666");
        assert_eq!(config.credentials.password, "secret");
        assert_eq!(config.root_url(), "http://localhost:8080/");
    }

    #[test]
    fn test_env_overrides_and_trailing_slash() {
        let config = ProbeConfig::from_lookup(lookup(&[
            ("APP_URL", "https://nll.example.se/"),
            ("KEYCLOAK_USER", "prescriber1"),
            ("KEYCLOAK_PASS", "hunter2"),
        ]));
        assert_eq!(config.base_url, "https://nll.example.se");
        assert_eq!(config.root_url(), "https://nll.example.se/");
        assert_eq!(config.credentials, Credentials::new("prescriber1", "hunter2"));
    }

    #[test]
    fn test_empty_env_value_falls_back() {
        let config = ProbeConfig::from_lookup(lookup(&[("KEYCLOAK_USER", "")]));
        assert_eq!(config.credentials.username, "user666");
    }

    #[test]
    fn test_resolve() {
        let config = ProbeConfig::new("http://localhost:8080", Credentials::new("a", "b"));
        assert_eq!(config.resolve("/login?logout"), "http://localhost:8080/login?logout");
        assert_eq!(config.resolve("prescriptions"), "http://localhost:8080/prescriptions");
        assert_eq!(config.resolve("http://other:1/x"), "http://other:1/x");
    }

    #[test]
    fn test_password_is_redacted() {
        let creds = Credentials::new("user666", "secret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("user666"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_trimmed_keeps_empty_values() {
        let creds = Credentials::new("  user666 \t", "   ").trimmed();
        assert_eq!(creds.username, "user666");
        assert_eq!(creds.password, "");
    }

    #[test]
    fn test_runner_defaults() {
        let options = RunnerOptions::default();
        assert_eq!(options.timeout_ms, 30_000);
        assert!(options.headless);
        assert!(options.ignore_https_errors);
        assert_eq!(options.viewport, Viewport { width: 1280, height: 720 });
        assert_eq!(options.browser, Browser::Chromium);
        assert_eq!(options.test_dir, PathBuf::from("scenarios"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let options = RunnerOptions::from_yaml(
            r#"
headless: false
browser: firefox
viewport:
  width: 1920
  height: 1080
"#,
        )
        .unwrap();
        assert!(!options.headless);
        assert_eq!(options.browser, Browser::Firefox);
        assert_eq!(options.viewport.width, 1920);
        assert_eq!(options.timeout_ms, 30_000);
    }

    #[test]
    fn test_screenshots_follow_output_dir() {
        let options = RunnerOptions {
            output_dir: PathBuf::from("/var/probe/out"),
            ..RunnerOptions::default()
        };
        assert_eq!(
            options.screenshot_dir(),
            Some(PathBuf::from("/var/probe/out/screenshots"))
        );

        let options = RunnerOptions::from_yaml(
            "output_dir: /var/probe/out\nscreenshot_dir: /srv/shots\n",
        )
        .unwrap();
        assert_eq!(options.screenshot_dir(), Some(PathBuf::from("/srv/shots")));

        let options = RunnerOptions::from_yaml("screenshots: false").unwrap();
        assert_eq!(options.screenshot_dir(), None);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = RunnerOptions::from_yaml("timeout_ms: 0").unwrap_err();
        assert!(matches!(err, E2eError::Config(_)));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunnerOptions::load(&dir.path().join("probe.yaml")).unwrap();
        assert_eq!(options.timeout_ms, 30_000);
    }
}
