use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tasklane_server::config::{self, Config};

#[derive(Parser)]
#[command(name = "tasklane-server", about = "Task management API with a cache-aside read path")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop every cached task entry and exit
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let state = config::build_state(&cli.config).await?;

    match cli.command {
        Some(Commands::ClearCache) => {
            if state.tasks.clear_cache().await {
                eprintln!("Task cache cleared.");
            } else {
                anyhow::bail!("cache is unavailable, nothing was cleared");
            }
        }
        None => {
            let addr = cli.config.addr();
            if cli.config.require_auth {
                info!("authentication required for task routes");
            } else {
                info!("authentication disabled for task routes (TASKLANE_REQUIRE_AUTH not set)");
            }

            let listener = TcpListener::bind(addr).await?;
            info!("tasklane-server listening on http://{addr}");

            tasklane_server::serve(listener, state).await?;
        }
    }

    Ok(())
}
