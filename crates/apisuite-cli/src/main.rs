//! apisuite CLI - Generate and run API test suites from an OpenAPI document

mod storage;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use apisuite_core::model::{ExecutionStatus, RunStatus, SuiteGroup, TriggerKind};
use apisuite_core::{
    ApiDocument, Config, FeatureBundle, InMemoryRepository, Repository, RunReport, generate,
    openapi, to_http_file,
};
use apisuite_runner::{EngineSettings, ExecutionEngine, SuiteRunner, WorkerPool};

#[derive(Parser)]
#[command(name = "apisuite")]
#[command(about = "Generate and run API test suites from an OpenAPI document")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Verbose output (info-level logs; RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate test scenarios without running them
    Generate {
        /// Config file (default: .apisuite.toml)
        #[arg(short, long)]
        config: Option<String>,

        /// Also write scenarios as a .http file
        #[arg(long)]
        http: Option<PathBuf>,
    },

    /// Run the generated suite against the server
    Run {
        /// Config file (default: .apisuite.toml)
        #[arg(short, long)]
        config: Option<String>,

        /// Only run one suite group
        #[arg(short, long)]
        group: Option<GroupArg>,
    },

    /// Re-run the failed executions of a saved report
    Retry {
        /// Path to a saved report.json
        report: PathBuf,

        /// Config file (default: .apisuite.toml)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Run the full suite on a fixed interval
    Watch {
        /// Config file (default: .apisuite.toml)
        #[arg(short, long)]
        config: Option<String>,

        /// Run a single sweep and exit
        #[arg(long)]
        once: bool,
    },

    /// Initialize config file
    Init,

    /// Export JSON Schema for the run report format
    Schema,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GroupArg {
    Smoke,
    System,
    Negative,
    Integration,
}

impl From<GroupArg> for SuiteGroup {
    fn from(arg: GroupArg) -> Self {
        match arg {
            GroupArg::Smoke => SuiteGroup::Smoke,
            GroupArg::System => SuiteGroup::System,
            GroupArg::Negative => SuiteGroup::Negative,
            GroupArg::Integration => SuiteGroup::Integration,
        }
    }
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::Generate { config, http } => {
            let cfg = load_config(config.as_deref())?;
            let doc = load_document(&cfg)?;
            let bundles = generate(&doc)?;

            match cli.output {
                OutputFormat::Terminal => print_bundles(&doc, &bundles),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&bundles)?),
                OutputFormat::Silent => {}
            }

            if let Some(path) = http {
                let scenarios: Vec<_> = bundles
                    .iter()
                    .flat_map(|b| b.scenarios.iter().cloned())
                    .collect();
                std::fs::write(&path, to_http_file(&scenarios, "base_url"))
                    .with_context(|| format!("cannot write {}", path.display()))?;
                if cli.output != OutputFormat::Silent {
                    eprintln!("Scenarios: {}", path.display());
                }
            }
            Ok(0)
        }

        Commands::Run { config, group } => {
            let cfg = load_config(config.as_deref())?;
            let doc = load_document(&cfg)?;
            let runner = build_runner(&cfg)?;

            if cli.output != OutputFormat::Silent {
                eprintln!("Config:");
                eprintln!("  spec:     {}", cfg.spec.display());
                eprintln!(
                    "  base_url: {}",
                    cfg.base_url
                        .as_deref()
                        .or(doc.base_url.as_deref())
                        .unwrap_or("(none)")
                );
                if !cfg.headers.is_empty() {
                    eprintln!("  headers:  {} configured", cfg.headers.len());
                }
                eprintln!("  workers:  {}", cfg.workers);
                eprintln!();
            }

            runner.import(&doc)?;
            let finished = match group {
                Some(g) => runner.run_suite_group(&doc.id, g.into(), TriggerKind::Manual)?,
                None => runner.run_full_suite(&doc.id, TriggerKind::Manual)?,
            };
            finish(&cli.output, &cfg, runner.repository().as_ref(), &finished.id)
        }

        Commands::Retry { report, config } => {
            let cfg = load_config(config.as_deref())?;
            let saved = RunReport::load(&report)?;
            let runner = build_runner(&cfg)?;
            saved.restore(runner.repository().as_ref())?;

            let finished = runner.retry(&saved.run.id)?;
            finish(&cli.output, &cfg, runner.repository().as_ref(), &finished.id)
        }

        Commands::Watch { config, once } => {
            let cfg = load_config(config.as_deref())?;
            let doc = load_document(&cfg)?;
            let runner = build_runner(&cfg)?;
            runner.import(&doc)?;

            loop {
                let summary = runner.scheduled_sweep()?;
                match cli.output {
                    OutputFormat::Terminal => println!(
                        "Sweep: {} succeeded, {} failed, {} skipped",
                        summary.succeeded, summary.failed, summary.skipped
                    ),
                    OutputFormat::Json => println!(
                        "{}",
                        serde_json::json!({
                            "succeeded": summary.succeeded,
                            "failed": summary.failed,
                            "skipped": summary.skipped,
                        })
                    ),
                    OutputFormat::Silent => {}
                }
                if once {
                    return Ok(if summary.failed == 0 { 0 } else { 1 });
                }
                std::thread::sleep(cfg.schedule_interval());
            }
        }

        Commands::Init => {
            let config_path = ".apisuite.toml";
            if Path::new(config_path).exists() {
                eprintln!("{config_path} already exists");
                return Ok(1);
            }

            std::fs::write(config_path, Config::example())?;
            println!("Created {config_path}");
            println!("\nEdit the file to configure:");
            println!("  - spec: path to your OpenAPI document");
            println!("  - base_url: server to test");
            println!("  - headers: auth tokens, API keys");
            println!("  - workers: parallel calls");
            Ok(0)
        }

        Commands::Schema => {
            let schema = apisuite_core::report::generate_schema();
            println!("{schema}");
            Ok(0)
        }
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let cfg = match path {
        Some(p) => Config::load(Path::new(p))?,
        None => Config::load_default()?,
    };
    tracing::debug!(spec = %cfg.spec.display(), workers = cfg.workers, "config loaded");
    Ok(cfg)
}

fn load_document(cfg: &Config) -> Result<ApiDocument> {
    let doc =
        openapi::load(&cfg.spec).with_context(|| format!("cannot load {}", cfg.spec.display()))?;
    Ok(with_target(doc, cfg))
}

/// A configured `base_url` replaces the document's servers, so scenario URLs
/// stay relative and the engine joins them onto the configured target.
fn with_target(mut doc: ApiDocument, cfg: &Config) -> ApiDocument {
    if cfg.base_url.is_some() {
        if let Some(server) = doc.base_url.take() {
            tracing::debug!(server = %server, "document server overridden by base_url");
        }
    }
    doc
}

fn build_runner(cfg: &Config) -> Result<SuiteRunner> {
    let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
    let pool = Arc::new(WorkerPool::new(cfg.workers)?);
    let engine = ExecutionEngine::new(repo, pool, EngineSettings::from_config(cfg))?;
    Ok(SuiteRunner::new(engine))
}

/// Print, save and map a finished run to an exit code.
fn finish(output: &OutputFormat, cfg: &Config, repo: &dyn Repository, run_id: &str) -> Result<u8> {
    let report = RunReport::collect(repo, run_id)?;
    match output {
        OutputFormat::Terminal => print_report(&report),
        OutputFormat::Json => {
            let mut masked = report.clone();
            masked.mask_sensitive_headers();
            println!("{}", serde_json::to_string_pretty(&masked)?);
        }
        OutputFormat::Silent => {}
    }

    match storage::save_report(cfg, &report) {
        Ok(path) => {
            if *output != OutputFormat::Silent {
                eprintln!("Report saved: {}", path.display());
            }
        }
        Err(e) => eprintln!("Warning: failed to save report: {e}"),
    }

    Ok(exit_code(&report))
}

/// 0 all passed, 1 any Failed or Error execution, 3 run could not be finalized.
fn exit_code(report: &RunReport) -> u8 {
    if report.run.status == RunStatus::Failed {
        3
    } else if report.run.stats.failed > 0 || report.errors() > 0 {
        1
    } else {
        0
    }
}

fn print_bundles(doc: &ApiDocument, bundles: &[FeatureBundle]) {
    println!("{}", doc.title);
    for bundle in bundles {
        println!(
            "\n== {} ({} scenarios) ==",
            bundle.group.title(),
            bundle.scenarios.len()
        );
        print!("{}", bundle.narrative);
    }
    let total: usize = bundles.iter().map(|b| b.scenarios.len()).sum();
    println!("\nTotal: {total} scenarios");
}

fn print_report(report: &RunReport) {
    let run = &report.run;
    let icon = if exit_code(report) == 0 { "PASS" } else { "FAIL" };
    println!("\n{icon}: {}", run.name);
    println!(
        "  Executions: {} total, {} passed, {} failed, {} skipped, {} errors",
        run.stats.total,
        run.stats.passed,
        run.stats.failed,
        run.stats.skipped,
        report.errors()
    );
    if let Some(d) = run.duration() {
        println!("  Duration: {}ms", d.num_milliseconds());
    }
    if let Some(msg) = &run.error_message {
        println!("  Run error: {msg}");
    }

    let problems: Vec<_> = report
        .executions
        .iter()
        .filter(|e| matches!(e.status, ExecutionStatus::Failed | ExecutionStatus::Error))
        .collect();
    if problems.is_empty() {
        return;
    }
    println!("\nProblems ({}):", problems.len());
    for exec in problems {
        let label = report
            .scenarios
            .iter()
            .find(|s| s.id == exec.scenario_id)
            .map_or_else(|| exec.scenario_id.clone(), |s| format!("{} {}", s.name, s.label()));
        let got = exec
            .response
            .as_ref()
            .map_or_else(|| "-".to_string(), |r| r.status_code.to_string());
        println!("  [{}] {label} -> {got}", exec.status);
        if let Some(msg) = &exec.error_message {
            for line in msg.lines() {
                println!("         {line}");
            }
        }
    }
}
