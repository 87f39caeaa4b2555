//! Login scenario tests
//!
//! The bundled YAML scenarios must describe the same flow as the built-in
//! ones. The live test drives a real browser and only runs when Node with
//! Playwright is installed and `APP_URL` answers; otherwise it is skipped.
//!
//! Run live with: APP_URL=http://localhost:8080 cargo test -p nll-light-e2e --test login

use std::path::PathBuf;

use nll_light_e2e::playwright::PlaywrightHandle;
use nll_light_e2e::scenario;
use nll_light_e2e::target::TargetCheck;
use nll_light_e2e::{Credentials, ProbeConfig, RunnerOptions, TestRunner, TestSpec};

fn scenarios_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios")
}

#[test]
fn bundled_login_yaml_matches_builtin() {
    let spec = TestSpec::from_file(&scenarios_dir().join("login.yaml")).unwrap();
    let builtin = scenario::login_via_keycloak();

    assert_eq!(spec.name, builtin.name);
    assert_eq!(spec.tags, builtin.tags);
    assert_eq!(spec.steps, builtin.steps);
}

#[test]
fn bundled_logout_yaml_matches_builtin() {
    let spec = TestSpec::from_file(&scenarios_dir().join("logout.yaml")).unwrap();
    assert_eq!(spec.steps, scenario::logout_after_login().steps);
}

#[test]
fn bundled_scenarios_filter_by_tag() {
    let specs = TestSpec::load_all(&scenarios_dir()).unwrap();
    assert_eq!(specs.len(), 2);

    let smoke = TestSpec::filter_by_tag(&specs, "smoke");
    assert_eq!(smoke.len(), 1);
    assert_eq!(smoke[0].name, scenario::LOGIN_SCENARIO);
}

#[test]
fn rendered_script_uses_configured_target() {
    let probe = ProbeConfig::new(
        "https://nll.test:8443",
        Credentials::new("prescriber1", "pw"),
    );
    let options = RunnerOptions {
        screenshots: false,
        ..RunnerOptions::default()
    };
    let handle = PlaywrightHandle::with_config(
        nll_light_e2e::playwright::PlaywrightConfig::from_options(&probe.base_url, &options),
    );

    let script = handle.build_script(&scenario::login_via_keycloak().resolve(&probe, false));
    assert!(script.contains(r#"page.goto("https://nll.test:8443/", { timeout: 30000 })"#));
    assert!(script.contains(r#"const prefix = "https://nll.test:8443";"#));
    assert!(script.contains(r#""text=prescriber1""#));
    assert!(!script.contains("page.screenshot"));
}

#[tokio::test]
async fn live_login_via_keycloak() {
    let probe = ProbeConfig::from_env();

    if !PlaywrightHandle::is_available().await {
        eprintln!("Skipping: node with the playwright package is not available");
        return;
    }
    let reachable = match TargetCheck::new(&probe.base_url, true) {
        Ok(check) => check.check().await.is_ok(),
        Err(_) => false,
    };
    if !reachable {
        eprintln!("Skipping: {} is not reachable", probe.root_url());
        return;
    }

    let out = tempfile::tempdir().unwrap();
    let options = RunnerOptions {
        screenshot_dir: Some(out.path().join("screenshots")),
        output_dir: out.path().to_path_buf(),
        ..RunnerOptions::default()
    };
    let runner = TestRunner::new(probe, options);

    let suite = runner
        .run_specs(&[scenario::login_via_keycloak()])
        .await
        .unwrap();
    runner.write_results(&suite).unwrap();

    let result = &suite.results[0];
    assert!(result.success, "login failed: {:?}", result.error);
    let marker = result.steps.last().unwrap();
    assert!(marker.count.unwrap_or(0) > 0);
}

#[tokio::test]
async fn live_login_with_wrong_password_fails() {
    let env = ProbeConfig::from_env();

    if !PlaywrightHandle::is_available().await {
        eprintln!("Skipping: node with the playwright package is not available");
        return;
    }
    let reachable = match TargetCheck::new(&env.base_url, true) {
        Ok(check) => check.check().await.is_ok(),
        Err(_) => false,
    };
    if !reachable {
        eprintln!("Skipping: {} is not reachable", env.root_url());
        return;
    }

    let probe = ProbeConfig::new(
        &env.base_url,
        Credentials::new(env.credentials.username.clone(), "definitely-not-the-password"),
    );
    let out = tempfile::tempdir().unwrap();
    let options = RunnerOptions {
        screenshots: false,
        output_dir: out.path().to_path_buf(),
        ..RunnerOptions::default()
    };
    let runner = TestRunner::new(probe, options);

    let suite = runner
        .run_specs(&[scenario::login_via_keycloak()])
        .await
        .unwrap();

    assert!(!suite.all_passed());
    let failed_step = suite.results[0].steps.last().unwrap();
    assert!(
        failed_step.step_name.starts_with("wait_for_url") || failed_step.step_name.starts_with("expect_any"),
        "failed at unexpected step {}",
        failed_step.step_name
    );
}
