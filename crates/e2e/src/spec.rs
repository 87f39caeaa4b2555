//! Declarative YAML scenario specification

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{Credentials, ProbeConfig, Viewport};
use crate::error::{E2eError, E2eResult};

/// Default bound for `wait_for_url` when a scenario does not give one
pub const DEFAULT_REDIRECT_TIMEOUT_MS: u64 = 10_000;

/// A complete scenario parsed from YAML or built in code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Overrides the runner viewport when set
    #[serde(default)]
    pub viewport: Option<Viewport>,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,
}

/// A single step in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a URL (relative to base)
    Navigate { url: String },

    /// Require the current address to equal a URL (relative to base) exactly
    ExpectUrl { url: String },

    /// Click an element
    Click {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Wait for an element to reach a state
    Wait {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
        #[serde(default)]
        state: WaitState,
    },

    /// Fill an input field
    Fill { selector: String, value: String },

    /// Wait until the address starts with a prefix (the base URL if unset)
    WaitForUrl {
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default = "default_redirect_timeout")]
        timeout_ms: u64,
    },

    /// Require the summed match count of the selectors to reach `min_count`
    ExpectAny {
        selectors: Vec<String>,
        #[serde(default = "default_min_count")]
        min_count: usize,
    },

    /// Take a screenshot
    Screenshot {
        name: String,
        #[serde(default)]
        full_page: bool,
    },
}

fn default_redirect_timeout() -> u64 {
    DEFAULT_REDIRECT_TIMEOUT_MS
}

fn default_min_count() -> usize {
    1
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

impl TestStep {
    /// Short label used in logs and results. Never contains fill values.
    pub fn name(&self) -> String {
        match self {
            TestStep::Navigate { url } => format!("navigate:{}", url),
            TestStep::ExpectUrl { url } => format!("expect_url:{}", url),
            TestStep::Click { selector, .. } => format!("click:{}", selector),
            TestStep::Wait { selector, .. } => format!("wait:{}", selector),
            TestStep::Fill { selector, .. } => format!("fill:{}", selector),
            TestStep::WaitForUrl { prefix, .. } => {
                format!("wait_for_url:{}", prefix.as_deref().unwrap_or("${base_url}"))
            }
            TestStep::ExpectAny { selectors, .. } => format!("expect_any:{}", selectors.join(" | ")),
            TestStep::Screenshot { name, .. } => format!("screenshot:{}", name),
        }
    }

    /// Upper bound this step may block for, given the default action timeout
    pub fn bound_ms(&self, default_timeout_ms: u64) -> u64 {
        match self {
            TestStep::Click { timeout_ms, .. } | TestStep::Wait { timeout_ms, .. } => {
                timeout_ms.unwrap_or(default_timeout_ms)
            }
            TestStep::WaitForUrl { timeout_ms, .. } => *timeout_ms,
            TestStep::ExpectUrl { .. } | TestStep::ExpectAny { .. } => 0,
            _ => default_timeout_ms,
        }
    }

    fn map_strings(&self, f: &impl Fn(&str) -> String) -> Self {
        match self {
            TestStep::Navigate { url } => TestStep::Navigate { url: f(url) },
            TestStep::ExpectUrl { url } => TestStep::ExpectUrl { url: f(url) },
            TestStep::Click { selector, timeout_ms } => TestStep::Click {
                selector: f(selector),
                timeout_ms: *timeout_ms,
            },
            TestStep::Wait { selector, timeout_ms, state } => TestStep::Wait {
                selector: f(selector),
                timeout_ms: *timeout_ms,
                state: *state,
            },
            TestStep::Fill { selector, value } => TestStep::Fill {
                selector: f(selector),
                value: f(value),
            },
            TestStep::WaitForUrl { prefix, timeout_ms } => TestStep::WaitForUrl {
                prefix: prefix.as_deref().map(f),
                timeout_ms: *timeout_ms,
            },
            TestStep::ExpectAny { selectors, min_count } => TestStep::ExpectAny {
                selectors: selectors.iter().map(|s| f(s)).collect(),
                min_count: *min_count,
            },
            TestStep::Screenshot { name, full_page } => TestStep::Screenshot {
                name: name.clone(),
                full_page: *full_page,
            },
        }
    }
}

/// Replace `${base_url}`, `${username}` and `${password}` in a string.
///
/// Substituted values are never scanned again, so a credential that itself
/// contains a placeholder is filled in literally. Unknown placeholders are
/// left as they are.
pub fn interpolate(template: &str, base_url: &str, credentials: &Credentials) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            rest = &rest[start..];
            break;
        };
        let value = match &after[..end] {
            "base_url" => Some(base_url),
            "username" => Some(credentials.username.as_str()),
            "password" => Some(credentials.password.as_str()),
            _ => None,
        };
        match value {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

impl TestSpec {
    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios from a directory
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        for path in paths {
            specs.push(Self::from_file(&path)?);
        }

        Ok(specs)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    fn validate(&self) -> E2eResult<()> {
        if self.name.trim().is_empty() {
            return Err(E2eError::SpecParse("scenario name is empty".into()));
        }
        if self.steps.is_empty() {
            return Err(E2eError::SpecParse(format!("scenario '{}' has no steps", self.name)));
        }
        for step in &self.steps {
            if let TestStep::ExpectAny { selectors, min_count } = step {
                if selectors.is_empty() || *min_count == 0 {
                    return Err(E2eError::SpecParse(format!(
                        "scenario '{}': expect_any needs selectors and a min_count above zero",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Substitute probe variables into every step. Relative URLs are kept
    /// relative; the driver resolves them against the base URL.
    pub fn resolve(&self, config: &ProbeConfig, trim_credentials: bool) -> Self {
        let credentials = if trim_credentials {
            config.credentials.trimmed()
        } else {
            config.credentials.clone()
        };
        let subst = |s: &str| interpolate(s, &config.base_url, &credentials);

        Self {
            steps: self.steps.iter().map(|s| s.map_strings(&subst)).collect(),
            ..self.clone()
        }
    }

    /// Sum of the bounds of all steps
    pub fn total_bound_ms(&self, default_timeout_ms: u64) -> u64 {
        self.steps.iter().map(|s| s.bound_ms(default_timeout_ms)).sum()
    }
}
