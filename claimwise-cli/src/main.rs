//! Claimwise CLI
//!
//! Runs auto insurance claims through the guardrailed multi-agent pipeline
//! and prints the adjuster report.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

mod app;
mod config;
mod error;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use claimwise::pipeline::{ClaimRequest, RunOutcome};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::config::{IssueLevel, config_path as default_config_path};
use crate::error::{CliError, Result};

/// Exit code of a run the guardrail rejected.
const EXIT_REJECTED: u8 = 2;

/// Claimwise - turn an auto insurance claim into an adjuster report
#[derive(Parser)]
#[command(name = "claimwise")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "CLAIMWISE_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init(InitArgs),

    /// Process one claim
    Process(ProcessArgs),

    /// Process every claim listed in a JSON file
    ProcessBatch(BatchArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the init command
#[derive(Args)]
struct InitArgs {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    force: bool,
}

/// Arguments for the process command
#[derive(Args)]
struct ProcessArgs {
    /// Raw claim record id
    #[arg(long)]
    claim: String,

    /// Customer record id
    #[arg(long)]
    customer: String,

    /// Damage photo id or URL (repeatable, in order)
    #[arg(long = "image", required = true)]
    images: Vec<String>,

    /// Skip document generation even when it is configured
    #[arg(long)]
    no_docgen: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the process-batch command
#[derive(Args)]
struct BatchArgs {
    /// JSON file holding an array of `{claim_id, customer_id, image_ids}`
    file: PathBuf,

    /// Skip document generation even when it is configured
    #[arg(long)]
    no_docgen: bool,
}

/// Arguments for the config command
#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("{}", CliError::Runtime(e.to_string()));
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "claimwise={level},claimwise_cli={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    let config_file = cli.config.unwrap_or_else(default_config_path);
    match cli.command {
        Commands::Init(args) => cmd_init(args, &config_file).await,
        Commands::Process(args) => cmd_process(args, &config_file).await,
        Commands::ProcessBatch(args) => cmd_process_batch(args, &config_file).await,
        Commands::Config(args) => cmd_config(args, &config_file).await,
    }
}

/// Write a default configuration.
async fn cmd_init(args: InitArgs, config_file: &Path) -> Result<ExitCode> {
    if config_file.exists() && !args.force {
        println!("Configuration already exists at: {}", config_file.display());
        println!("Use --force to overwrite.");
        return Ok(ExitCode::SUCCESS);
    }

    config::init_config(config_file).await?;

    println!("Configuration created: {}", config_file.display());
    println!();
    println!("Next steps:");
    println!("  1. export OPENAI_API_KEY=<key>");
    println!("  2. set [storage] root to the directory holding claims, customers and photos");
    println!("  3. claimwise process --claim <id> --customer <id> --image <id>");

    Ok(ExitCode::SUCCESS)
}

/// Process one claim.
async fn cmd_process(args: ProcessArgs, config_file: &Path) -> Result<ExitCode> {
    let config = config::load_config_from(config_file).await?;
    config::ensure_valid(&config)?;
    let pipeline = app::pipeline(&config, !args.no_docgen)?;

    let request = ClaimRequest {
        claim_id: args.claim,
        customer_id: args.customer,
        image_ids: args.images,
    };
    let outcome = pipeline.process_insurance_claim(&request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    Ok(exit_code(&outcome))
}

/// Process a batch of claims.
async fn cmd_process_batch(args: BatchArgs, config_file: &Path) -> Result<ExitCode> {
    let config = config::load_config_from(config_file).await?;
    config::ensure_valid(&config)?;
    let pipeline = app::pipeline(&config, !args.no_docgen)?;

    let content = tokio::fs::read_to_string(&args.file).await?;
    let requests: Vec<ClaimRequest> = serde_json::from_str(&content)?;
    tracing::info!(claims = requests.len(), "Processing batch");

    let results = pipeline.process_many(&requests).await;

    let mut failed = 0_usize;
    let lines: Vec<serde_json::Value> = requests
        .iter()
        .zip(&results)
        .map(|(request, result)| match result {
            Ok(outcome) => serde_json::json!({
                "claim_id": request.claim_id,
                "outcome": outcome,
            }),
            Err(e) => {
                failed += 1;
                serde_json::json!({
                    "claim_id": request.claim_id,
                    "error": e.to_string(),
                })
            }
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&lines)?);

    if failed == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::error!(failed, total = requests.len(), "Some claims failed");
        Ok(ExitCode::FAILURE)
    }
}

/// Configuration management.
async fn cmd_config(args: ConfigArgs, config_file: &Path) -> Result<ExitCode> {
    match args.command {
        ConfigCommands::Path => {
            println!("{}", config_file.display());
        }
        ConfigCommands::Show => {
            if config_file.exists() {
                let content = tokio::fs::read_to_string(config_file).await?;
                println!("{content}");
            } else {
                println!("Configuration file does not exist.");
                println!("Run 'claimwise init' to create one.");
            }
        }
        ConfigCommands::Validate => {
            let config = config::load_config_from(config_file).await?;
            let issues = config.validate();
            for issue in &issues {
                println!("{issue}");
            }
            if issues.iter().any(|i| i.level == IssueLevel::Error) {
                return Ok(ExitCode::FAILURE);
            }
            println!("Configuration is valid");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn exit_code(outcome: &RunOutcome) -> ExitCode {
    if outcome.is_rejected() {
        ExitCode::from(EXIT_REJECTED)
    } else {
        ExitCode::SUCCESS
    }
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Rejected(rejection) => {
            println!("Request rejected: {}", rejection.verdict.reasoning);
        }
        RunOutcome::Completed(run) => {
            let report = &run.report;
            let customer = &report.customer;
            println!("Claim {}", report.claim_number);
            println!("  Customer:  {}", customer.customer_name);
            println!("  Vehicle:   {}", customer.vehicle_identity());
            println!("  Reported:  {}", report.claim.report_date);
            println!("  Damage:    {}", report.claim.damage_description);
            println!("  Parts:     {}", report.claim.affected_parts.join(", "));
            println!("  Estimate:  {}", report.claim.estimated_repair_cost);
            println!("  Repair shops:");
            for shop in report.repair_shops.shops() {
                println!("    - {} | {} | {}", shop.name, shop.address, shop.phone);
            }
            println!(
                "  Tokens:    {} in / {} out",
                run.usage.input_tokens, run.usage.output_tokens
            );
            if let Some(document) = &run.document {
                println!("  Document batch: {}", document.id);
            }
        }
    }
}
