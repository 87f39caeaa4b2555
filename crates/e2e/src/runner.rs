//! Test runner that checks the target, drives Playwright and collects results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::{ProbeConfig, RunnerOptions};
use crate::error::{E2eError, E2eResult};
use crate::playwright::{PlaywrightConfig, PlaywrightHandle, ScenarioRun, StepResult};
use crate::scenario;
use crate::spec::TestSpec;
use crate::target::TargetCheck;

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}

impl TestResult {
    fn from_run(name: &str, started_at: DateTime<Utc>, duration_ms: u64, run: ScenarioRun) -> Self {
        Self {
            name: name.to_string(),
            success: run.passed(),
            started_at,
            duration_ms,
            steps: run.steps,
            error: run.failure.map(|e| e.to_string()),
            screenshot_path: run.screenshot,
        }
    }

    fn errored(name: &str, started_at: DateTime<Utc>, err: &E2eError) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            started_at,
            duration_ms: 0,
            steps: vec![],
            error: Some(err.to_string()),
            screenshot_path: None,
        }
    }
}

/// Result of running a set of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub base_url: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn from_results(base_url: &str, results: Vec<TestResult>, duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            base_url: base_url.to_string(),
            total: results.len(),
            passed,
            failed: results.len() - passed,
            duration_ms,
            results,
        }
    }

    /// True only if at least one scenario ran and none failed
    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.failed == 0
    }
}

/// Which scenarios a run executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The scenario with this name in the test directory
    Named(String),
    /// Scenarios carrying this tag in the test directory
    Tagged(String),
    /// Every scenario in the test directory, which must exist
    Directory,
    /// The test directory if present, else the built-in scenarios
    Default { check_logout: bool },
}

/// Main login probe runner
pub struct TestRunner {
    probe: ProbeConfig,
    options: RunnerOptions,
    check_reachability: bool,
}

impl TestRunner {
    pub fn new(probe: ProbeConfig, options: RunnerOptions) -> Self {
        Self {
            probe,
            options,
            check_reachability: true,
        }
    }

    /// Skip the HTTP reachability check before launching the browser
    pub fn skip_reachability(mut self) -> Self {
        self.check_reachability = false;
        self
    }

    pub fn probe(&self) -> &ProbeConfig {
        &self.probe
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Load the scenarios in the configured test directory
    pub fn load_specs(&self) -> E2eResult<Vec<TestSpec>> {
        let dir = &self.options.test_dir;
        if !dir.is_dir() {
            return Err(E2eError::SpecParse(format!(
                "scenario directory not found: {}",
                dir.display()
            )));
        }
        TestSpec::load_all(dir)
    }

    /// Pick the scenarios a run should execute.
    ///
    /// Name and tag filters always read the test directory. Without a
    /// filter, YAML in the test directory wins when the directory exists;
    /// otherwise the built-in login scenario runs.
    pub fn select_specs(&self, selection: &Selection) -> E2eResult<Vec<TestSpec>> {
        match selection {
            Selection::Named(name) => {
                let spec = self
                    .load_specs()?
                    .into_iter()
                    .find(|s| &s.name == name)
                    .ok_or_else(|| E2eError::SpecParse(format!("Test not found: {}", name)))?;
                Ok(vec![spec])
            }
            Selection::Tagged(tag) => {
                let specs = self.load_specs()?;
                Ok(TestSpec::filter_by_tag(&specs, tag).into_iter().cloned().collect())
            }
            Selection::Directory => self.load_specs(),
            Selection::Default { check_logout } => {
                if self.options.test_dir.is_dir() {
                    info!("Loading scenarios from {}", self.options.test_dir.display());
                    return self.load_specs();
                }
                let mut specs = vec![scenario::login_via_keycloak()];
                if *check_logout {
                    specs.push(scenario::logout_after_login());
                }
                Ok(specs)
            }
        }
    }

    /// Run scenarios matching a tag from the test directory
    pub async fn run_tagged(&self, tag: &str) -> E2eResult<TestSuiteResult> {
        let specs = self.select_specs(&Selection::Tagged(tag.to_string()))?;
        self.run_specs(&specs).await
    }

    /// Run one scenario from the test directory by name
    pub async fn run_named(&self, name: &str) -> E2eResult<TestSuiteResult> {
        let specs = self.select_specs(&Selection::Named(name.to_string()))?;
        self.run_specs(&specs).await
    }

    /// Run scenarios one after another. Each gets its own browser and a
    /// single attempt.
    pub async fn run_specs(&self, specs: &[TestSpec]) -> E2eResult<TestSuiteResult> {
        let start = Instant::now();

        if self.check_reachability {
            let check = TargetCheck::new(&self.probe.base_url, self.options.ignore_https_errors)?;
            check
                .wait_until_reachable(Duration::from_millis(self.options.timeout_ms))
                .await?;
        }

        let playwright = PlaywrightHandle::new(PlaywrightConfig::from_options(
            &self.probe.base_url,
            &self.options,
        ))
        .await?;

        info!("Running {} scenario(s) against {}", specs.len(), self.probe.base_url);
        debug!("Probe account: {:?}", self.probe.credentials);

        let mut results = Vec::with_capacity(specs.len());
        for spec in specs {
            let result = self.run_spec(&playwright, spec).await;
            if result.success {
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let suite = TestSuiteResult::from_results(
            &self.probe.base_url,
            results,
            start.elapsed().as_millis() as u64,
        );

        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            suite.passed, suite.failed, suite.duration_ms
        );
        Ok(suite)
    }

    async fn run_spec(&self, playwright: &PlaywrightHandle, spec: &TestSpec) -> TestResult {
        let started_at = Utc::now();
        let start = Instant::now();
        debug!("Running scenario: {}", spec.name);

        let resolved = spec.resolve(&self.probe, self.options.trim_credentials);
        match playwright.run(&resolved).await {
            Ok(run) => TestResult::from_run(
                &spec.name,
                started_at,
                start.elapsed().as_millis() as u64,
                run,
            ),
            Err(e) => TestResult::errored(&spec.name, started_at, &e),
        }
    }

    /// Write results to `<output_dir>/test-results.json`
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.options.output_dir)?;

        let path = self.options.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
