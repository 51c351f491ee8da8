use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use campaign_core::SignalAnalysis;
use clap::{Parser, Subcommand};
use orchestrator::TaskPlanner;
use server::config::AppConfig;
use server::{create_router, state::AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG_FILE: &str = "config.toml";

#[derive(Parser)]
#[command(name = "campaign-orchestrator")]
#[command(about = "Plans campaigns from signals and runs them as compensating sagas", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Overrides `server.port` from the config file
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init,
    /// Run the HTTP API
    Serve,
    /// Print the plan for a signal analysis JSON file without executing it
    Plan {
        #[arg(short, long)]
        signal: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init) => init_config(&cli.config).await,
        Some(Commands::Plan { signal }) => plan(&cli.config, &signal).await,
        Some(Commands::Serve) | None => serve(&cli.config, cli.port).await,
    }
}

async fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    AppConfig::default()
        .write(path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Wrote default configuration to {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set [agents] base_url to call remote agent services");
    println!("  2. Run 'campaign-orchestrator serve'");

    Ok(())
}

async fn plan(config_path: &Path, signal_path: &Path) -> Result<()> {
    let config = AppConfig::load(config_path).await;
    init_tracing(&config.server.log_level);

    let content = tokio::fs::read_to_string(signal_path)
        .await
        .with_context(|| format!("Failed to read {}", signal_path.display()))?;
    let signal: SignalAnalysis =
        serde_json::from_str(&content).context("Signal file is not a valid signal analysis")?;

    let result = TaskPlanner::new(config.planner)
        .build_plan(&signal)
        .context("Failed to generate plan")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn serve(config_path: &Path, port: Option<u16>) -> Result<()> {
    let config = AppConfig::load(config_path).await;
    init_tracing(&config.server.log_level);

    let state = AppState::from_config(&config).context("Failed to build orchestrator")?;
    state
        .start_event_logging(config.events.default_concurrency)
        .await
        .context("Failed to subscribe event logging")?;
    let event_bus = state.event_bus.clone();
    let app = create_router(state);

    let port = port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", config.server.host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!(address = %addr, "Campaign orchestrator listening");
    match &config.agents.base_url {
        Some(url) => tracing::info!(agents = %url, "Calling remote agents"),
        None => tracing::info!("No agent base URL configured, using local agents"),
    }

    println!();
    println!("  API Server:  http://localhost:{}", port);
    println!("  Swagger UI:  http://localhost:{}/swagger-ui", port);
    println!();
    println!("Press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let dropped = event_bus.shutdown().await;
    tracing::info!(dropped_retries = dropped, "Event bus stopped");

    Ok(())
}

fn init_tracing(log_level: &str) {
    let default_filter = format!(
        "campaign_orchestrator={level},server={level},orchestrator={level},events={level},tower_http=info",
        level = log_level
    );
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}
