//! Pipeline CLI
//!
//! Trains and publishes the model, and drives the prediction service with
//! a random row from the dataset.

mod client;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use commands::{predict, train};
use pipeline_lib::PipelineConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logistic regression training and prediction pipeline
#[derive(Parser)]
#[command(name = "pipeline")]
#[command(author, version, about = "Train, publish and query the prediction pipeline", long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, short, global = true, env = "PIPELINE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the model on the dataset and publish it
    Train {
        /// Keep going when the upload fails instead of exiting with an error
        #[arg(long)]
        allow_publish_failure: bool,
    },

    /// Send a random dataset row to the prediction API
    Predict(PredictArgs),
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct PredictArgs {
    /// Use the local API endpoint
    #[arg(long)]
    pub local: bool,

    /// Use the remote API endpoint
    #[arg(long)]
    pub remote: bool,
}

impl PredictArgs {
    fn mode(&self) -> predict::ApiMode {
        if self.remote {
            predict::ApiMode::Remote
        } else {
            predict::ApiMode::Local
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();

    let config = PipelineConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    tracing::debug!(path = %cli.config, "Configuration loaded");

    match cli.command {
        Commands::Train {
            allow_publish_failure,
        } => train::train(&config, allow_publish_failure, cli.format).await,
        Commands::Predict(args) => predict::run(&config, args.mode(), cli.format).await,
    }
}
