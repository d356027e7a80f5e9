//! Webprobe - natural-language browser tests against a remote agent service
//!
//! The `webprobe` command runs every markdown test case in the test directory
//! against the Browser Use cloud, one isolated browser session per test.
//!
//! ## Modes
//!
//! - `webprobe`: run the static tests in `TEST_DIRECTORY`
//! - `webprobe <REVISION>`: generate tests from the diff of `REVISION`
//!   (`A..B`, or `R` meaning `R..HEAD`), then run them before the static ones
//! - `webprobe <REVISION> --generate-only`: write the generated tests and stop
//!
//! ## Exit codes
//!
//! - `0`: success
//! - `1`: failed or timed-out tests while `FAIL_ON_ERROR` is set
//! - `2`: configuration error, generation failure, errored tests, or an
//!   interrupted run

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use tokio::sync::watch;
use tracing::{error, info, warn};

use webprobe_core::config::{DEFAULT_BASE_URL, DEFAULT_LLM_MODEL};
use webprobe_core::{
    decide_exit, load_test_suite, render_console_summary, write_results_json, write_summary_md,
    ConfigError, ResultsRecord, RunnerConfig, SuiteEntry,
};
use webprobe_exec::{run_suite, BrowserUseClient, ExecutorConfig, SessionExecutor, SessionRegistry};
use webprobe_gen::config::{DEFAULT_GENERATION_BASE_URL, DEFAULT_GENERATION_MODEL};
use webprobe_gen::{GenerationClient, GenerationConfig, GitDiffProvider, OpenAiCompatibleModel};

#[derive(Parser, Debug)]
#[command(name = "webprobe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run natural-language browser tests with Browser Use", long_about = None)]
struct Cli {
    /// Git revision to generate tests from (`A..B`, or `R` for `R..HEAD`)
    revision: Option<String>,

    /// Extra context for test generation
    #[arg(long)]
    context: Option<String>,

    /// Write generated tests and exit without running anything
    #[arg(long, requires = "revision")]
    generate_only: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json_logs: bool,

    /// Browser Use API key
    #[arg(long, env = "BROWSER_USE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "BROWSER_USE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Directory holding markdown test cases
    #[arg(long, env = "TEST_DIRECTORY", default_value = "tests")]
    test_directory: PathBuf,

    /// Default model for tests that do not set one
    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_LLM_MODEL)]
    llm_model: String,

    /// Default per-test timeout in seconds
    #[arg(long, env = "TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Tests running at the same time
    #[arg(long, env = "MAX_CONCURRENCY", default_value_t = 3)]
    max_concurrency: usize,

    #[arg(long, env = "FAIL_ON_ERROR", default_value = "true", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    fail_on_error: bool,

    /// Download output files of passing tests
    #[arg(long, env = "SAVE_OUTPUTS", default_value = "true", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    save_outputs: bool,

    #[arg(long, env = "OUTPUT_DIR", default_value = "browser-use-outputs")]
    output_dir: PathBuf,

    #[arg(long, env = "RESULTS_DIR", default_value = "test-results")]
    results_dir: PathBuf,

    /// URL of the deployment under test
    #[arg(long, env = "DEPLOYMENT_URL")]
    deployment_url: Option<String>,

    #[arg(long, env = "GENERATION_API_KEY", hide_env_values = true)]
    generation_api_key: Option<String>,

    #[arg(long, env = "GENERATION_BASE_URL", default_value = DEFAULT_GENERATION_BASE_URL)]
    generation_base_url: String,

    #[arg(long, env = "GENERATION_MODEL", default_value = DEFAULT_GENERATION_MODEL)]
    generation_model: String,

    /// Diff bytes sent to the model before truncation
    #[arg(long, env = "MAX_DIFF_SIZE", default_value_t = 100_000)]
    max_diff_size: usize,

    /// Maximum number of generated tests
    #[arg(long, env = "MAX_TESTS", default_value_t = 10)]
    max_tests: usize,

    #[arg(long, env = "GENERATED_TESTS_DIR", default_value = "generated-tests")]
    generated_tests_dir: PathBuf,

    #[arg(long, env = "GENERATION_ARTIFACTS_DIR", default_value = "generation-artifacts")]
    generation_artifacts_dir: PathBuf,
}

impl Cli {
    fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            test_directory: self.test_directory.clone(),
            llm_model: self.llm_model.clone(),
            timeout_secs: self.timeout,
            max_concurrency: self.max_concurrency,
            fail_on_error: self.fail_on_error,
            save_outputs: self.save_outputs,
            output_dir: self.output_dir.clone(),
            results_dir: self.results_dir.clone(),
            deployment_url: self.deployment_url.clone().filter(|u| !u.trim().is_empty()),
        }
    }

    fn generation_config(&self, runner: &RunnerConfig) -> GenerationConfig {
        GenerationConfig {
            api_key: self.generation_api_key.clone(),
            base_url: self.generation_base_url.clone(),
            model: self.generation_model.clone(),
            max_diff_size: self.max_diff_size,
            max_tests: self.max_tests,
            generated_tests_dir: self.generated_tests_dir.clone(),
            artifacts_dir: self.generation_artifacts_dir.clone(),
            deployment_url: runner.deployment_url.clone(),
            spec_defaults: runner.spec_defaults(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    webprobe_core::init_tracing(cli.json_logs, webprobe_core::telemetry::level_for(cli.verbose));

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let runner = cli.runner_config();
    let generation = cli
        .revision
        .as_ref()
        .map(|reference| (reference.clone(), cli.generation_config(&runner)));

    // Validate everything this invocation needs before any remote call.
    if let Some((_, cfg)) = &generation {
        cfg.validate().context("invalid generation configuration")?;
    }
    if !cli.generate_only {
        runner.validate().context("invalid runner configuration")?;
    }

    let mut entries = Vec::new();
    if let Some((reference, cfg)) = generation {
        let specs = generate(&reference, cli.context.as_deref(), cfg).await?;
        if cli.generate_only {
            return Ok(ExitCode::SUCCESS);
        }
        entries.extend(specs.into_iter().map(SuiteEntry::Ready));
    }

    match load_test_suite(&runner.test_directory, &runner.spec_defaults()) {
        Ok(found) => entries.extend(found),
        Err(ConfigError::TestDirectoryMissing(dir)) if !entries.is_empty() => {
            warn!(dir = %dir.display(), "test directory missing, running generated tests only");
        }
        Err(e) => return Err(e).context("failed to load test cases"),
    }
    if entries.is_empty() {
        warn!(dir = %runner.test_directory.display(), "no test files found");
    }

    execute(entries, &runner).await
}

async fn generate(
    reference: &str,
    context: Option<&str>,
    cfg: GenerationConfig,
) -> Result<Vec<webprobe_core::TestSpecification>> {
    let api_key = cfg.api_key.clone().unwrap_or_default();
    let model = OpenAiCompatibleModel::new(&cfg.base_url, &api_key)
        .context("failed to build generation client")?;
    let repo = std::env::current_dir().context("failed to read current directory")?;
    let git = GitDiffProvider::open(&repo).await?;

    info!(reference, model = %cfg.model, "generating tests from diff");
    let client = GenerationClient::new(Arc::new(git), Arc::new(model), cfg);
    let outcome = client
        .generate(reference, context)
        .await
        .context("test generation failed")?;

    println!(
        "Generated {} test(s) from {} in {} attempt(s):",
        outcome.specs.len(),
        outcome.range.reference,
        outcome.attempts
    );
    for spec in &outcome.specs {
        println!("  {} ({})", spec.name, spec.origin);
    }
    Ok(outcome.specs)
}

async fn execute(entries: Vec<SuiteEntry>, runner: &RunnerConfig) -> Result<ExitCode> {
    let api_key = runner.api_key.clone().unwrap_or_default();
    let client = BrowserUseClient::new(&runner.base_url, &api_key)
        .context("failed to build Browser Use client")?;
    let registry = Arc::new(SessionRegistry::new(Arc::new(client)));
    let executor = Arc::new(SessionExecutor::new(
        Arc::clone(&registry),
        ExecutorConfig::from(runner),
    ));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping run");
            let _ = cancel_tx.send(true);
        }
    });

    let results = run_suite(entries, executor, runner.max_concurrency, cancel_rx.clone()).await;
    interrupt.abort();

    let interrupted = *cancel_rx.borrow();
    let closed = registry.close_all().await;
    if closed > 0 {
        info!(closed, "closed sessions left open by the interrupted run");
    }

    let record = ResultsRecord::new(results, Utc::now());
    let json_path = write_results_json(&runner.results_dir, &record)?;
    let md_path = write_summary_md(&runner.results_dir, &record)?;
    info!(json = %json_path.display(), markdown = %md_path.display(), "wrote reports");
    print!("{}", render_console_summary(&record));

    if interrupted {
        bail!("run interrupted; {} test(s) did not finish", record.summary.pending);
    }

    let decision = decide_exit(&record.summary, runner.fail_on_error);
    info!(?decision, "run complete");
    Ok(ExitCode::from(decision.exit_code() as u8))
}
