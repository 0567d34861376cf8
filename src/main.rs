use anyhow::Context;
use builder_e2e::auth::{bootstrap, ensure_session, BootstrapOutcome};
use builder_e2e::core::SessionStore;
use builder_e2e::{ChromeBrowser, Config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "builder-e2e", version, about = "Session management for the builder UI suite")]
struct Cli {
    /// Runner config file (defaults to harness.toml)
    #[arg(long, env = "HARNESS_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in to the admin interactively and save the session file
    SetupAuth {
        /// Replace an existing session file
        #[arg(long)]
        force: bool,
    },
    /// Delete the session file
    ClearAuth,
    /// Report whether a session file is present
    CheckAuth,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = Config::load_with(cli.config.as_deref()).context("loading configuration")?;
    let store = SessionStore::new(&config.session.storage_state_path);

    match cli.command {
        Command::SetupAuth { force } => {
            let launcher = ChromeBrowser::new(&config);
            let outcome = if force {
                bootstrap(&launcher, &config, &store).await?
            } else {
                ensure_session(&launcher, &config).await?
            };
            match outcome {
                BootstrapOutcome::Skipped { path } => info!(
                    "Session file {} already exists, use --force to replace it",
                    path.display()
                ),
                BootstrapOutcome::Created { path, cookies } => {
                    info!("Saved {} cookies to {}", cookies, path.display())
                }
            }
        }
        Command::ClearAuth => {
            if store.clear().await? {
                info!("Removed {}", store.path().display());
            } else {
                info!("No session file at {}", store.path().display());
            }
        }
        Command::CheckAuth => {
            if !store.exists() {
                warn!("No session file at {}, run setup-auth", store.path().display());
                std::process::exit(1);
            }
            let state = store
                .load()
                .await
                .with_context(|| format!("reading {}", store.path().display()))?;
            let captured = state
                .captured_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            info!(
                "Session file {}: {} cookies, {} origins, captured {}",
                store.path().display(),
                state.cookies.len(),
                state.origins.len(),
                captured
            );
        }
    }

    Ok(())
}
