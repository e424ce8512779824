//! mipsrun CLI
//!
//! Serves the simulation HTTP API, or runs one-shot simulations locally.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mipsrun::{Config, EXAMPLE_CONFIG, SimulationRequest, Simulator, catalog};
use tracing::{Level, debug, info};
use tracing_subscriber::EnvFilter;

use crate::api::{Api, AppState};

mod api;

#[derive(Parser)]
#[command(name = "mipsrun")]
#[command(about = "Run MIPS programs on an external simulator")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to listen on (default: from config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Simulate a program file and print the result as JSON
    Simulate {
        /// Program file to simulate
        #[arg(value_name = "FILE")]
        program: PathBuf,

        /// Execution mode (step or run)
        #[arg(short, long)]
        mode: Option<String>,

        /// Enable the pipelined datapath
        #[arg(short, long)]
        pipeline: bool,

        /// Enable branch prediction
        #[arg(short, long)]
        branch_prediction: bool,

        /// Branch predictor scheme (e.g., static, 1bit, 2bit, gshare)
        #[arg(long)]
        predictor: Option<String>,
    },

    /// List example programs
    Examples,

    /// Initialize a new configuration file
    Init {
        /// Output path (default: mipsrun.toml)
        #[arg(short, long, default_value = "mipsrun.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = if let Some(ref path) = cli.config {
        info!(?path, "loading configuration");
        Config::from_file(path).context("failed to load configuration")?
    } else {
        debug!("using default configuration");
        Config::default()
    };

    match cli.command {
        Commands::Init { output, force } => init_config(&output, force).await,
        Commands::Serve { bind } => serve(config, bind).await,
        Commands::Simulate {
            program,
            mode,
            pipeline,
            branch_prediction,
            predictor,
        } => {
            let mut request = SimulationRequest::new(
                tokio::fs::read_to_string(&program)
                    .await
                    .context("failed to read program file")?,
            );
            if let Some(mode) = mode {
                request = request.option("mode", mode);
            }
            if pipeline {
                request = request.option("pipeline", true);
            }
            if branch_prediction {
                request = request.option("branch_prediction", true);
            }
            if let Some(predictor) = predictor {
                request = request.option("predictor", predictor);
            }
            run_simulate(config, request).await
        }
        Commands::Examples => {
            list_examples();
            Ok(())
        }
        Commands::ShowConfig => {
            show_config(&config);
            Ok(())
        }
    }
}

async fn serve(config: Config, bind: Option<String>) -> Result<()> {
    let addr = bind.unwrap_or_else(|| config.server.bind.clone());
    let simulator = Simulator::new(config).context("failed to initialize simulator")?;

    Api::serve(AppState::new(simulator), &addr)
        .await
        .with_context(|| format!("failed to serve on {addr}"))
}

async fn run_simulate(config: Config, request: SimulationRequest) -> Result<()> {
    let simulator = Simulator::new(config).context("failed to initialize simulator")?;
    let result = simulator.simulate(request).await;

    // Result JSON goes to stdout, logs stay on stderr for piping
    let json = serde_json::to_string_pretty(&result).context("failed to serialize result")?;
    println!("{json}");

    if result.is_success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn list_examples() {
    println!("Example programs:\n");

    for example in catalog::list() {
        println!("  {:<15} {}", example.key, example.name);
        println!("  {:<15} {}", "", example.description);
    }
}

fn show_config(config: &Config) {
    println!("Simulator: {}", config.simulator_binary().display());
    if !config.simulator_args.is_empty() {
        println!("  Extra args: {}", config.simulator_args.join(" "));
    }
    println!("  Contract: {}", config.contract.name());
    println!();
    println!("Limits:");
    println!("  Timeout: {}s", config.timeout_secs);
    println!("  Max output: {} bytes", config.max_output_bytes);
    println!("  Max program: {} bytes", config.max_program_bytes);
    println!("  Max concurrent: {}", config.max_concurrent);
    println!();
    println!("Workspaces: {}", config.workspace_root().display());
    println!("  Program file: {}", config.program_file);
    println!("  Config file: {}", config.config_file);
    println!();
    println!("Server bind: {}", config.server.bind);
    println!();
    match config.default_simulation() {
        Ok(defaults) => match serde_json::to_string_pretty(&defaults) {
            Ok(json) => println!("Simulation defaults:\n{json}"),
            Err(e) => println!("Simulation defaults: <unprintable: {e}>"),
        },
        Err(e) => println!("Simulation defaults: invalid ({e})"),
    }
}

async fn init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at '{}'. Use --force to overwrite.",
            output.display()
        );
    }

    tokio::fs::write(output, EXAMPLE_CONFIG)
        .await
        .context("failed to write configuration file")?;

    println!("Created configuration file at '{}'", output.display());
    Ok(())
}
