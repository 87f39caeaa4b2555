//! nll-login-probe
//!
//! Logs in to the nll-light web app through Keycloak in a real browser and
//! reports whether the post-login page was reached.
//!
//! Exit codes: 0 all scenarios passed, 1 a scenario failed, 2 setup error.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use tracing_subscriber::EnvFilter;

use nll_light_e2e::playwright::Browser;
use nll_light_e2e::runner::Selection;
use nll_light_e2e::{Credentials, ProbeConfig, RunnerOptions, TestRunner, TestSuiteResult};

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "nll-login-probe")]
#[command(about = "End-to-end login probe for nll-light behind Keycloak")]
#[command(version)]
struct Args {
    /// Runner options file (YAML); defaults apply when it does not exist
    #[arg(short, long, default_value = "probe.yaml")]
    config: PathBuf,

    /// Application base URL [default: $APP_URL or http://localhost:8080]
    #[arg(long)]
    app_url: Option<String>,

    /// Keycloak username [default: $KEYCLOAK_USER or user666]
    #[arg(long)]
    user: Option<String>,

    /// Keycloak password [default: $KEYCLOAK_PASS or secret]
    #[arg(long)]
    password: Option<String>,

    /// Scenario directory [default: test_dir from the config file]
    #[arg(short, long)]
    scenarios: Option<PathBuf>,

    /// Run only scenarios with this tag from the scenario directory
    #[arg(short, long)]
    tag: Option<String>,

    /// Run only the scenario with this name from the scenario directory
    #[arg(short, long, conflicts_with = "tag")]
    name: Option<String>,

    /// Also log out again and expect the logged-out page
    #[arg(long)]
    check_logout: bool,

    /// Browser engine
    #[arg(long)]
    browser: Option<Browser>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Trim whitespace around the credentials before filling them in
    #[arg(long)]
    trim_credentials: bool,

    /// Output directory for results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Summary format
    #[arg(long, default_value = "table")]
    format: OutputFormat,

    /// Do not check that the app answers before launching the browser
    #[arg(long)]
    skip_reachability: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match run(args).await {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let mut options = RunnerOptions::load(&args.config)?;
    if let Some(browser) = args.browser {
        options.browser = browser;
    }
    if args.headed {
        options.headless = false;
    }
    if args.trim_credentials {
        options.trim_credentials = true;
    }
    if let Some(output) = args.output {
        options.output_dir = output;
    }
    if let Some(dir) = &args.scenarios {
        options.test_dir = dir.clone();
    }

    let env = ProbeConfig::from_env();
    let probe = ProbeConfig::new(
        args.app_url.as_deref().unwrap_or(&env.base_url),
        Credentials::new(
            args.user.unwrap_or(env.credentials.username),
            args.password.unwrap_or(env.credentials.password),
        ),
    );

    let mut runner = TestRunner::new(probe, options);
    if args.skip_reachability {
        runner = runner.skip_reachability();
    }

    let selection = if let Some(name) = args.name {
        Selection::Named(name)
    } else if let Some(tag) = args.tag {
        Selection::Tagged(tag)
    } else if args.scenarios.is_some() {
        Selection::Directory
    } else {
        Selection::Default { check_logout: args.check_logout }
    };

    let specs = runner.select_specs(&selection)?;
    let results = runner.run_specs(&specs).await?;

    runner.write_results(&results)?;
    print_summary(&results, args.format)?;

    Ok(results.all_passed())
}

fn print_summary(results: &TestSuiteResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["Scenario", "Result", "Steps", "Duration", "Error"]);

            for r in &results.results {
                let passed_steps = r.steps.iter().filter(|s| s.success).count();
                table.add_row(vec![
                    r.name.clone(),
                    if r.success { "PASS".into() } else { "FAIL".into() },
                    format!("{}/{}", passed_steps, r.steps.len()),
                    format!("{} ms", r.duration_ms),
                    r.error.clone().unwrap_or_default(),
                ]);
            }

            println!("{table}");
            println!(
                "{} passed, {} failed against {}",
                results.passed, results.failed, results.base_url
            );
        }
    }
    Ok(())
}
