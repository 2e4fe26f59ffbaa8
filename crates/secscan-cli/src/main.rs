use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use secscan_core::{
    render_report, Adapter, Aggregator, ClangTidyAdapter, CppcheckAdapter, DependencyAdapter,
    OutputFormat, PatternScanAdapter, PermissionAdapter,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "secscan",
    author,
    version,
    about = "Aggregated code security scanner"
)]
struct Cli {
    /// Root directory of the project to scan
    #[arg(
        long = "project-root",
        value_name = "DIR",
        default_value = "."
    )]
    project_root: PathBuf,

    /// Write the report to this file instead of standard output
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Emit the machine-readable JSON document instead of text
    #[arg(long)]
    json: bool,

    /// Exit non-zero when high severity findings are present
    #[arg(long = "fail-on-high")]
    fail_on_high: bool,

    /// Skip a backend; may be given multiple times
    #[arg(long = "skip", value_enum, value_name = "BACKEND")]
    skip: Vec<Backend>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Cppcheck,
    ClangTidy,
    PatternScan,
    Dependencies,
    Permissions,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if !cli.project_root.exists() {
        println!(
            "Error: Project root {} does not exist",
            cli.project_root.display()
        );
        return Ok(ExitCode::FAILURE);
    }

    let aggregator = Aggregator::new(selected_adapters(&cli.skip));
    let result = aggregator.run(&cli.project_root).await;

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let report = render_report(&result, format)?;

    match &cli.output {
        Some(path) => {
            fs::write(path, &report)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            println!("Report saved to: {}", path.display());
        }
        None => {
            print!("{report}");
            if !report.ends_with('\n') {
                println!();
            }
        }
    }

    // Gate on severity: the report above is complete either way, only the
    // process outcome changes.
    let high = result.summary.severity_breakdown.high;
    if cli.fail_on_high && high > 0 {
        println!("Error: Found {high} high severity issues");
        return Ok(ExitCode::FAILURE);
    }

    println!(
        "Security scan completed. Found {} total issues.",
        result.summary.total_issues
    );
    Ok(ExitCode::SUCCESS)
}

fn selected_adapters(skip: &[Backend]) -> Vec<Box<dyn Adapter>> {
    let mut adapters: Vec<Box<dyn Adapter>> = Vec::new();
    if !skip.contains(&Backend::Cppcheck) {
        adapters.push(Box::new(CppcheckAdapter::new()));
    }
    if !skip.contains(&Backend::ClangTidy) {
        adapters.push(Box::new(ClangTidyAdapter::new()));
    }
    if !skip.contains(&Backend::PatternScan) {
        adapters.push(Box::new(PatternScanAdapter::new()));
    }
    if !skip.contains(&Backend::Dependencies) {
        adapters.push(Box::new(DependencyAdapter::new()));
    }
    if !skip.contains(&Backend::Permissions) {
        adapters.push(Box::new(PermissionAdapter::new()));
    }
    adapters
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tokio=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
