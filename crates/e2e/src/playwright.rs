//! Playwright browser automation
//!
//! A scenario is rendered into a single Node script that drives one page
//! through every step. The script reports progress as `@@probe {json}` lines
//! on stdout; the Rust side parses those events, re-checks what the browser
//! observed, and turns the first failure into an [`E2eError`].

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{resolve_url, RunnerOptions, Viewport, DEFAULT_TIMEOUT_MS};
use crate::error::{E2eError, E2eResult};
use crate::spec::{TestSpec, TestStep};

/// Prefix marking a structured event line in the script's stdout
pub const EVENT_PREFIX: &str = "@@probe ";

/// Time allowed on top of the step bounds for launching and closing the browser
const LAUNCH_SLACK: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Result of executing a test step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
    /// Address the page was at when the step finished, when reported
    pub url: Option<String>,
    /// Marker match count, for `expect_any` steps
    pub count: Option<usize>,
    pub screenshot_path: Option<PathBuf>,
}

/// Kind of failure reported by the script for a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NavigationMismatch,
    Timeout,
    RedirectTimeout,
    MarkerMissing,
    Error,
}

/// One structured line emitted by the generated script
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProbeEvent {
    StepStarted {
        index: usize,
        name: String,
    },
    StepPassed {
        index: usize,
        name: String,
        duration_ms: u64,
        actual: Option<String>,
        count: Option<usize>,
        path: Option<PathBuf>,
    },
    StepFailed {
        index: usize,
        name: String,
        duration_ms: u64,
        kind: FailureKind,
        message: String,
        expected: Option<String>,
        actual: Option<String>,
        count: Option<usize>,
        selector: Option<String>,
        timeout_ms: Option<u64>,
    },
    Screenshot {
        path: PathBuf,
    },
    Fatal {
        message: String,
    },
}

/// Parse every event line out of the script's stdout. Other output is
/// logged and skipped.
pub fn parse_events(stdout: &str) -> Vec<ProbeEvent> {
    stdout
        .lines()
        .filter_map(|line| {
            let payload = match line.strip_prefix(EVENT_PREFIX) {
                Some(payload) => payload,
                None => {
                    if !line.trim().is_empty() {
                        debug!("[node] {}", line);
                    }
                    return None;
                }
            };
            match serde_json::from_str(payload) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!("Unparseable probe event ({}): {}", e, payload);
                    None
                }
            }
        })
        .collect()
}

/// What the Node process left behind
#[derive(Debug, Clone)]
pub struct ScriptOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Step results plus the failure that ended the run, if any
#[derive(Debug)]
pub struct ScenarioRun {
    pub steps: Vec<StepResult>,
    pub failure: Option<E2eError>,
    pub screenshot: Option<PathBuf>,
}

impl ScenarioRun {
    /// Interpret the event stream of a run of `spec` against `base_url`.
    ///
    /// A run only passes if every step reported success, the observations
    /// hold when checked again here, and the process exited cleanly.
    pub fn from_output(spec: &TestSpec, base_url: &str, output: &ScriptOutput) -> Self {
        let mut steps = Vec::new();
        let mut failure = None;
        let mut screenshot = None;
        let mut fatal = None;
        // Set once a step fails its re-check; later step events are ignored
        let mut stopped = false;
        let step_bound = |index: usize| {
            spec.steps
                .get(index)
                .map(|step| step.bound_ms(DEFAULT_TIMEOUT_MS))
                .unwrap_or(DEFAULT_TIMEOUT_MS)
        };

        for event in parse_events(&output.stdout) {
            match event {
                ProbeEvent::StepStarted { .. }
                | ProbeEvent::StepPassed { .. }
                | ProbeEvent::StepFailed { .. }
                    if stopped => {}
                ProbeEvent::StepStarted { index, name } => {
                    debug!("Step {} started: {}", index + 1, name);
                }
                ProbeEvent::StepPassed { index, name, duration_ms, actual, count, path } => {
                    let recheck = spec
                        .steps
                        .get(index)
                        .and_then(|step| recheck_step(step, base_url, actual.as_deref(), count));

                    steps.push(StepResult {
                        success: recheck.is_none(),
                        step_name: name,
                        duration_ms,
                        error: recheck.as_ref().map(|e| e.to_string()),
                        url: actual,
                        count,
                        screenshot_path: path,
                    });

                    if let Some(err) = recheck {
                        failure.get_or_insert(err);
                        stopped = true;
                    }
                }
                ProbeEvent::StepFailed {
                    index,
                    name,
                    duration_ms,
                    kind,
                    message,
                    expected,
                    actual,
                    count,
                    selector,
                    timeout_ms,
                } => {
                    let err = match kind {
                        FailureKind::NavigationMismatch => E2eError::NavigationMismatch {
                            expected: expected.unwrap_or_default(),
                            actual: actual.clone().unwrap_or_default(),
                        },
                        FailureKind::Timeout => E2eError::ElementTimeout {
                            selector: selector.unwrap_or_else(|| name.clone()),
                            timeout_ms: timeout_ms.unwrap_or_else(|| step_bound(index)),
                        },
                        FailureKind::RedirectTimeout => E2eError::RedirectTimeout {
                            prefix: expected.unwrap_or_default(),
                            timeout_ms: timeout_ms.unwrap_or_else(|| step_bound(index)),
                            actual: actual.clone().unwrap_or_default(),
                        },
                        FailureKind::MarkerMissing => E2eError::MarkerNotFound {
                            selectors: marker_selectors(spec.steps.get(index)),
                        },
                        FailureKind::Error => E2eError::StepFailed {
                            step: name.clone(),
                            reason: message,
                        },
                    };

                    steps.push(StepResult {
                        success: false,
                        step_name: name,
                        duration_ms,
                        error: Some(err.to_string()),
                        url: actual,
                        count,
                        screenshot_path: None,
                    });
                    failure.get_or_insert(err);
                }
                ProbeEvent::Screenshot { path } => {
                    screenshot = Some(path);
                }
                ProbeEvent::Fatal { message } => {
                    fatal = Some(message);
                }
            }
        }

        if failure.is_none() {
            let passed = steps.iter().filter(|s| s.success).count();
            if let Some(message) = fatal {
                failure = Some(E2eError::Playwright(message));
            } else if !output.success {
                failure = Some(E2eError::Playwright(format!(
                    "script exited with failure:\n{}",
                    output.stderr.trim()
                )));
            } else if passed < spec.steps.len() {
                failure = Some(E2eError::Playwright(format!(
                    "script stopped after {} of {} steps",
                    passed,
                    spec.steps.len()
                )));
            }
        }

        Self { steps, failure, screenshot }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

fn marker_selectors(step: Option<&TestStep>) -> Vec<String> {
    match step {
        Some(TestStep::ExpectAny { selectors, .. }) => selectors.clone(),
        _ => Vec::new(),
    }
}

/// Check a step the script claims passed against what it observed
fn recheck_step(
    step: &TestStep,
    base_url: &str,
    actual: Option<&str>,
    count: Option<usize>,
) -> Option<E2eError> {
    match step {
        TestStep::ExpectUrl { url } => {
            let expected = resolve_url(base_url, url);
            let actual = actual.unwrap_or_default();
            (actual != expected).then(|| E2eError::NavigationMismatch {
                expected,
                actual: actual.to_string(),
            })
        }
        TestStep::ExpectAny { selectors, min_count } => {
            (count.unwrap_or(0) < *min_count).then(|| E2eError::MarkerNotFound {
                selectors: selectors.clone(),
            })
        }
        _ => None,
    }
}

/// Quote a string as a JavaScript literal
fn js(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub screenshot_dir: Option<PathBuf>,
    pub viewport: Viewport,
    pub browser: Browser,
    pub headless: bool,
    pub ignore_https_errors: bool,
    pub timeout_ms: u64,
}

impl PlaywrightConfig {
    pub fn from_options(base_url: &str, options: &RunnerOptions) -> Self {
        Self {
            base_url: base_url.to_string(),
            screenshot_dir: options.screenshot_dir(),
            viewport: options.viewport,
            browser: options.browser,
            headless: options.headless,
            ignore_https_errors: options.ignore_https_errors,
            timeout_ms: options.timeout_ms,
        }
    }
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self::from_options("http://localhost:8080", &RunnerOptions::default())
    }
}

/// Playwright browser handle
pub struct PlaywrightHandle {
    config: PlaywrightConfig,
}

impl PlaywrightHandle {
    /// Create a new Playwright handle, verifying Node can load Playwright
    pub async fn new(mut config: PlaywrightConfig) -> E2eResult<Self> {
        if !Self::is_available().await {
            return Err(E2eError::PlaywrightNotFound);
        }

        // The script runs from a temp dir, so screenshot paths must be absolute
        if let Some(dir) = &config.screenshot_dir {
            std::fs::create_dir_all(dir)?;
            config.screenshot_dir = Some(std::fs::canonicalize(dir)?);
        }

        Ok(Self::with_config(config))
    }

    /// Build a handle without checking the local Node installation
    pub fn with_config(config: PlaywrightConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }

    /// Whether `node` is on PATH and can resolve the `playwright` package
    pub async fn is_available() -> bool {
        let status = Command::new("node")
            .args(["-e", "require.resolve('playwright')"])
            .env("NODE_PATH", node_path())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        matches!(status, Ok(s) if s.success())
    }

    /// Run a scenario in a fresh browser and interpret the outcome
    pub async fn run(&self, spec: &TestSpec) -> E2eResult<ScenarioRun> {
        let script = self.build_script(spec);
        let deadline =
            Duration::from_millis(spec.total_bound_ms(self.config.timeout_ms)) + LAUNCH_SLACK;

        let output = self.run_script(&script, deadline).await?;
        let run = ScenarioRun::from_output(spec, &self.config.base_url, &output);

        if let Some(path) = &run.screenshot {
            info!("Failure screenshot: {}", path.display());
        }
        Ok(run)
    }

    /// Build the Playwright script for a scenario
    pub fn build_script(&self, spec: &TestSpec) -> String {
        let c = &self.config;
        let viewport = spec.viewport.unwrap_or(c.viewport);
        let mut script = String::new();

        // Header
        script.push_str(&format!(
            r#"
const {{ chromium, firefox, webkit }} = require('playwright');

const emit = (event) => console.log({prefix} + JSON.stringify(event));
const fail = (kind, message, detail) =>
  Object.assign(new Error(message), {{ probeKind: kind, probeDetail: detail || {{}} }});

async function step(index, name, body) {{
  const started = Date.now();
  emit({{ event: 'step_started', index, name }});
  try {{
    const detail = (await body()) || {{}};
    emit({{ event: 'step_passed', index, name, duration_ms: Date.now() - started, ...detail }});
  }} catch (error) {{
    const kind = error.probeKind || (error.name === 'TimeoutError' ? 'timeout' : 'error');
    emit({{
      event: 'step_failed', index, name, duration_ms: Date.now() - started,
      kind, message: error.message, ...(error.probeDetail || {{}})
    }});
    throw error;
  }}
}}

async function bounded(selector, timeout, body) {{
  try {{
    return await body();
  }} catch (error) {{
    if (error.name === 'TimeoutError') {{
      throw fail('timeout', error.message, {{ selector, timeout_ms: timeout }});
    }}
    throw error;
  }}
}}

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }},
    ignoreHTTPSErrors: {ignore_https}
  }});
  const page = await context.newPage();
  page.setDefaultTimeout({timeout});
  const baseUrl = {base_url};
  let failed = false;

  try {{
"#,
            prefix = js(EVENT_PREFIX),
            browser = c.browser.as_str(),
            headless = c.headless,
            width = viewport.width,
            height = viewport.height,
            ignore_https = c.ignore_https_errors,
            timeout = c.timeout_ms,
            base_url = js(&c.base_url),
        ));

        // Generate step code
        for (i, step) in spec.steps.iter().enumerate() {
            script.push_str(&format!(
                "\n    // Step {}: {}\n    await step({}, {}, async () => {{\n{}\n    }});\n",
                i + 1,
                step.name(),
                i,
                js(&step.name()),
                self.step_to_js(step)
            ));
        }

        // Footer
        script.push_str("  } catch (error) {\n    failed = true;\n");
        if let Some(dir) = &c.screenshot_dir {
            let path = dir.join(format!("{}-failure.png", spec.name));
            script.push_str(&format!(
                r#"    try {{
      await page.screenshot({{ path: {path}, fullPage: true }});
      emit({{ event: 'screenshot', path: {path} }});
    }} catch (_) {{}}
"#,
                path = js(&path.to_string_lossy()),
            ));
        }
        script.push_str(
            r#"  } finally {
    await browser.close();
  }
  process.exit(failed ? 1 : 0);
})().catch((error) => {
  emit({ event: 'fatal', message: error.message });
  process.exit(2);
});
"#,
        );

        script
    }

    /// Convert a step to the body of its `step()` call
    fn step_to_js(&self, step: &TestStep) -> String {
        let default_timeout = self.config.timeout_ms;
        let base_url = &self.config.base_url;

        match step {
            TestStep::Navigate { url } => {
                let target = js(&resolve_url(base_url, url));
                format!(
                    "      await bounded({target}, {default_timeout}, () => page.goto({target}, {{ timeout: {default_timeout} }}));\n      return {{ actual: page.url() }};"
                )
            }
            TestStep::ExpectUrl { url } => {
                let expected = js(&resolve_url(base_url, url));
                format!(
                    r#"      const expected = {expected};
      const actual = page.url();
      if (actual !== expected) {{
        throw fail('navigation_mismatch', `expected ${{expected}}, got ${{actual}}`, {{ expected, actual }});
      }}
      return {{ actual }};"#
                )
            }
            TestStep::Click { selector, timeout_ms } => {
                let timeout = timeout_ms.unwrap_or(default_timeout);
                let sel = js(selector);
                format!(
                    "      await bounded({sel}, {timeout}, () => page.click({sel}, {{ timeout: {timeout} }}));\n      return {{ actual: page.url() }};"
                )
            }
            TestStep::Wait { selector, timeout_ms, state } => {
                let timeout = timeout_ms.unwrap_or(default_timeout);
                let sel = js(selector);
                format!(
                    "      await bounded({sel}, {timeout}, () => page.waitForSelector({sel}, {{ state: '{}', timeout: {timeout} }}));\n      return {{ actual: page.url() }};",
                    state.as_str()
                )
            }
            TestStep::Fill { selector, value } => {
                let sel = js(selector);
                format!(
                    "      await bounded({sel}, {timeout}, () => page.fill({sel}, {value}, {{ timeout: {timeout} }}));",
                    timeout = default_timeout,
                    value = js(value),
                )
            }
            TestStep::WaitForUrl { prefix, timeout_ms } => {
                let prefix = js(prefix.as_deref().unwrap_or(base_url));
                format!(
                    r#"      const prefix = {prefix};
      try {{
        await page.waitForURL((url) => url.toString().startsWith(prefix), {{ timeout: {timeout_ms} }});
      }} catch (error) {{
        if (error.name === 'TimeoutError') {{
          throw fail('redirect_timeout', error.message, {{ expected: prefix, actual: page.url(), timeout_ms: {timeout_ms} }});
        }}
        throw error;
      }}
      return {{ actual: page.url() }};"#
                )
            }
            TestStep::ExpectAny { selectors, min_count } => {
                let list = selectors.iter().map(|s| js(s)).collect::<Vec<_>>().join(", ");
                format!(
                    r#"      let count = 0;
      for (const selector of [{list}]) {{
        count += await page.locator(selector).count();
      }}
      if (count < {min_count}) {{
        throw fail('marker_missing', `found ${{count}} post-login marker(s), need {min_count}`, {{ count }});
      }}
      return {{ count, actual: page.url() }};"#
                )
            }
            TestStep::Screenshot { name, full_page } => match &self.config.screenshot_dir {
                Some(dir) => {
                    let path = js(&dir.join(format!("{}.png", name)).to_string_lossy());
                    format!(
                        "      await page.screenshot({{ path: {path}, fullPage: {full_page} }});\n      return {{ path: {path} }};"
                    )
                }
                None => "      console.log('screenshots disabled');".to_string(),
            },
        }
    }

    /// Execute a script via Node, killing it if it outlives `deadline`
    pub async fn run_script(&self, script: &str, deadline: Duration) -> E2eResult<ScriptOutput> {
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("probe.js");
        std::fs::write(&script_path, script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let child = Command::new("node")
            .arg(&script_path)
            .current_dir(temp_dir.path())
            .env("NODE_PATH", node_path())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(deadline, child.wait_with_output())
            .await
            .map_err(|_| {
                E2eError::Playwright(format!(
                    "browser run exceeded its overall bound of {} ms",
                    deadline.as_millis()
                ))
            })??;

        Ok(ScriptOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// NODE_PATH with the working directory's `node_modules` appended, so a
/// script in a temp dir can still load a project-local Playwright install
fn node_path() -> OsString {
    let local = std::env::current_dir()
        .map(|dir| dir.join("node_modules"))
        .unwrap_or_else(|_| Path::new("node_modules").to_path_buf());

    let mut paths: Vec<PathBuf> = std::env::var_os("NODE_PATH")
        .map(|existing| std::env::split_paths(&existing).collect())
        .unwrap_or_default();
    paths.push(local);

    std::env::join_paths(paths).unwrap_or_default()
}
