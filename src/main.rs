use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use itinero_core::config::EngineConfig;
use itinero_engine::WorkflowRunner;
use itinero_tools::{ToolGateway, ToolRegistry};
use itinero_workflow::{trip_planning_workflow, SessionManager};

#[derive(Parser)]
#[command(name = "itinero", version, about = "Multi-stage trip planning workflow engine")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "itinero.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a trip and print the resulting itinerary
    Plan {
        /// Destination, e.g. "Switzerland"
        #[arg(long)]
        destination: String,

        /// Comma-separated traveler ids
        #[arg(long, value_delimiter = ',')]
        members: Vec<String>,

        /// Trip start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Trip end date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Free-form request text
        #[arg(trailing_var_arg = true)]
        request: Vec<String>,
    },
    /// Show the effective configuration
    Config,
}

fn load_config(path: &PathBuf) -> EngineConfig {
    match EngineConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Falling back to default configuration");
            EngineConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config);

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Plan {
            destination,
            members,
            start,
            end,
            request,
        } => {
            let travel_dates = match (start, end) {
                (Some(s), Some(e)) => Some((s, e)),
                (None, None) => None,
                _ => anyhow::bail!("--start and --end must be given together"),
            };

            let gateway = Arc::new(ToolGateway::new(
                ToolRegistry::with_builtins(),
                config.retry.clone(),
                config.tool_timeout_ms,
            ));
            let runner = WorkflowRunner::new(gateway);
            let manager = SessionManager::new(runner, trip_planning_workflow(&config));

            let session = manager
                .create_session(members, destination, travel_dates)
                .await
                .context("failed to create session")?;
            info!(session = %session, "Session created");

            let request = if request.is_empty() {
                "Plan the trip.".to_string()
            } else {
                request.join(" ")
            };
            let outcome = manager
                .run_workflow(&session, &request)
                .await
                .context("workflow run failed to start")?;

            println!("{}", outcome.summary);
            if !outcome.report.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
