//! SchemaFlow Remediation CLI
//!
//! Compares a previous and a current schema snapshot and prints one
//! remediation recommendation per drifted column.

use clap::{Parser, ValueEnum};
use schemaflow_remediation::config::Settings;
use schemaflow_remediation::pipeline::{
    AgentOrchestrator, AgentOutcome, GatewayHandle, GenerationOptions, GroqGateway, RemediationPlanner,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit status when `--fail-on-drift` is set and drift was found
const DRIFT_EXIT_CODE: u8 = 2;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "schemaflow-remediation")]
#[command(about = "Detect schema drift and suggest transformation script fixes")]
struct Cli {
    /// Previous schema snapshot (JSON object of column -> type)
    #[arg(long)]
    previous: Option<PathBuf>,

    /// Current schema snapshot (JSON object of column -> type)
    #[arg(long)]
    current: Option<PathBuf>,

    /// Transformation script used as prompt context
    #[arg(long)]
    script: Option<PathBuf>,

    /// API key for the text-generation backend (overrides GROQ_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Exit with status 2 when drift is detected
    #[arg(long)]
    fail_on_drift: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Load configuration
    let mut settings = Settings::load()?;
    if let Some(path) = cli.previous {
        settings.paths.previous_schema = path;
    }
    if let Some(path) = cli.current {
        settings.paths.current_schema = path;
    }
    if let Some(path) = cli.script {
        settings.paths.script = path;
    }
    info!(
        "Comparing {} -> {}",
        settings.paths.previous_schema.display(),
        settings.paths.current_schema.display()
    );

    let gateway = GatewayHandle::from_result(GroqGateway::new(&settings.gateway, cli.api_key));
    if !gateway.is_ready() {
        warn!("Text generation unavailable, recommendations will be marked as failed: {:?}", gateway);
    }

    let planner = RemediationPlanner::new(
        gateway,
        GenerationOptions::from(&settings.gateway),
        &settings.planner,
    );
    let agent = AgentOrchestrator::new(settings.paths, planner);

    let outcome = match agent.run().await {
        Ok(outcome) => outcome,
        Err(e) if e.is_fatal() => {
            error!("Run aborted before detection ({}): {}", e.code(), e);
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    print_outcome(&outcome, cli.format)?;

    if cli.fail_on_drift && outcome.has_drift() {
        return Ok(ExitCode::from(DRIFT_EXIT_CODE));
    }
    Ok(ExitCode::SUCCESS)
}

fn print_outcome(outcome: &AgentOutcome, format: OutputFormat) -> anyhow::Result<()> {
    match (format, outcome) {
        (OutputFormat::Text, AgentOutcome::NoIssues) => {
            println!("No issues detected. No remediation needed.");
        }
        (OutputFormat::Text, AgentOutcome::Remediated(report)) => {
            println!("Remediation recommendations:");
            for (column, recommendation) in &report.recommendations {
                println!("- {}: {}", column, recommendation);
            }
        }
        (OutputFormat::Json, AgentOutcome::NoIssues) => {
            println!("{}", serde_json::json!({ "status": "no_issues" }));
        }
        (OutputFormat::Json, AgentOutcome::Remediated(report)) => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
    }
    Ok(())
}

/// Initialize tracing with structured logging on stderr
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "info,schemaflow_remediation=debug"
    } else {
        "warn,schemaflow_remediation=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .compact(),
        )
        .init();
}
