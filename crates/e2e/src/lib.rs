//! nll-light login probe
//!
//! A Rust-controlled end-to-end check of the federated login flow:
//! - Verifies the application answers over HTTP
//! - Renders a scenario into a Playwright script and runs it under Node
//! - Parses the script's step events and re-checks what the browser saw
//! - Reports one pass/fail outcome per scenario, with no retries
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Login Probe (Rust)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── TargetCheck::wait_until_reachable()                  │
//! │    ├── PlaywrightHandle::run(spec) -> ScenarioRun           │
//! │    └── write_results(TestSuiteResult)                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestSpec (built-in or YAML)                                │
//! │    ├── navigate { url }          expect_url { url }         │
//! │    ├── click { selector }        wait { selector }          │
//! │    ├── fill { selector, value }  wait_for_url { prefix }    │
//! │    └── expect_any { selectors }  screenshot { name }        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod playwright;
pub mod runner;
pub mod scenario;
pub mod spec;
pub mod target;

pub use config::{Credentials, ProbeConfig, RunnerOptions};
pub use error::{E2eError, E2eResult};
pub use runner::{TestResult, TestRunner, TestSuiteResult};
pub use spec::{TestSpec, TestStep};
