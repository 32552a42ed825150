// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compass - school counseling backend.
//!
//! This is the binary entry point: the chat gateway server plus operator
//! tools for badge counts and the local view cache.

mod badges;
mod cache;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use compass_config::CompassConfig;
use tracing_subscriber::EnvFilter;

use crate::cache::CacheAction;

/// Compass - school counseling backend.
#[derive(Parser, Debug)]
#[command(name = "compass", version, about, long_about = None)]
struct Cli {
    /// Config file to load instead of the standard search locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Start the chat gateway server.
    Serve,
    /// Print navigation badge counts for a user as JSON.
    Badges {
        /// User id as stored in the directory.
        #[arg(long)]
        user: String,
        /// Keep polling and print each change until interrupted.
        #[arg(long)]
        watch: bool,
    },
    /// Inspect or clear the local view cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("compass={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> CompassConfig {
    let loaded = match path {
        Some(path) => compass_config::load_and_validate_path(path),
        None => compass_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            compass_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    init_tracing(&config.app.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Badges { user, watch }) => badges::run_badges(&config, &user, watch).await,
        Some(Commands::Cache { action }) => cache::run_cache(&config, action),
        None => {
            println!("compass: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
