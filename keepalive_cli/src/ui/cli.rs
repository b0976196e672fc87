use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keepalive_core::core::connection_manager::DEFAULT_APP_NAME;
use keepalive_core::storage::config::redact;
use keepalive_core::{ConfigStore, ConnectionManager, KeepAliveService, StatusSnapshot};
use log::info;

use super::console_notifier::ConsoleNotifier;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "keepalive", version = "0.1.0", subcommand_required = true)]
pub struct Args {
    /// Directory holding notify.json (defaults to the per-user config dir)
    #[arg(long, global = true, env = "KEEPALIVE_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Set the notification endpoint and/or sub-path
    Config {
        /// Base URL of the backend, e.g. https://chat.example.org
        #[arg(long)]
        endpoint: Option<String>,
        /// Socket.IO path on that backend
        #[arg(long)]
        path: Option<String>,
    },
    /// Store or clear the session token
    Token {
        #[arg(required_unless_present = "clear")]
        token: Option<String>,
        /// Forget the stored token
        #[arg(long, conflicts_with = "token")]
        clear: bool,
    },
    /// Print the stored configuration
    Show,
    /// Stay connected and print notifications until Ctrl+C
    Run {
        /// How often the stored configuration is re-read
        #[arg(long, default_value_t = 5)]
        poll_secs: u64,
        /// Title used when a message names no chat
        #[arg(long, default_value = DEFAULT_APP_NAME)]
        app_name: String,
    },
}

pub async fn run_cli(args: Args) -> Result<()> {
    let store = open_store(args.config_dir)?;

    match args.command {
        Command::Config { endpoint, path } => {
            store.set_config(endpoint.as_deref(), path.as_deref())?;
            info!("Configuration saved to {:?}", store.path());
        }
        Command::Token { token, clear } => {
            let token = if clear { None } else { token };
            store.set_token(token.as_deref())?;
            info!("Token {}", if clear { "cleared" } else { "saved" });
        }
        Command::Show => {
            let cfg = store.try_get()?;
            println!("file:     {}", store.path().display());
            println!("endpoint: {}", cfg.base_endpoint);
            println!("path:     {}", cfg.sub_path);
            println!("token:    {}", redact(&cfg.token));
        }
        Command::Run {
            poll_secs,
            app_name,
        } => run_service(store, poll_secs, app_name).await?,
    }
    Ok(())
}

fn open_store(dir: Option<PathBuf>) -> Result<ConfigStore> {
    let store = match dir {
        Some(dir) => ConfigStore::with_dir(&dir)
            .with_context(|| format!("cannot use config dir {}", dir.display()))?,
        None => ConfigStore::new().context("cannot locate the config dir")?,
    };
    Ok(store)
}

/// Keeps the service running, re-reading the store every `poll_secs` so
/// `keepalive token ...` from another shell takes effect without a restart.
async fn run_service(store: ConfigStore, poll_secs: u64, app_name: String) -> Result<()> {
    let manager = ConnectionManager::builder(Arc::new(ConsoleNotifier))
        .app_name(app_name)
        .build();
    let service = KeepAliveService::new(store, manager.clone());
    let mut status = manager.subscribe();

    service.start().await;
    print_status(&manager.status());

    let mut poll = tokio::time::interval(Duration::from_secs(poll_secs.max(1)));
    poll.tick().await;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("Running. Press Ctrl+C to exit.");
    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res.context("cannot listen for Ctrl+C")?;
                break;
            }
            _ = poll.tick() => service.refresh().await,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                print_status(&snapshot);
            }
        }
    }

    service.shutdown().await;
    info!("Exiting...");
    Ok(())
}

fn print_status(snapshot: &StatusSnapshot) {
    if snapshot.last_error.is_empty() {
        println!("{}", snapshot.state.label());
    } else {
        println!("{} ({})", snapshot.state.label(), snapshot.last_error);
    }
}
