// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! pipeflow - DAG pipeline runner
//!
//! Run pipelines of dependent steps by hand or from schedule, filesystem and
//! webhook triggers.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pipeflow::cli::monitor::MonitorOverrides;
use pipeflow::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "pipeflow=debug"
    } else {
        "pipeflow=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    let config = cli.config.as_path();

    // Dispatch to command handlers
    match cli.command {
        Commands::List => pipeflow::cli::list::run(config, cli.verbose).await,
        Commands::Run { pipeline, params } => {
            pipeflow::cli::run::run(config, &pipeline, params, cli.verbose).await
        }
        Commands::Validate => pipeflow::cli::validate::run(config, cli.verbose).await,
        Commands::Graph { pipeline, format } => {
            pipeflow::cli::graph::run(config, &pipeline, format, cli.verbose).await
        }
        Commands::Monitor {
            poll_interval,
            webhook_host,
            webhook_port,
        } => {
            let overrides = MonitorOverrides {
                poll_interval,
                webhook_host,
                webhook_port,
            };
            pipeflow::cli::monitor::run(config, overrides, cli.verbose).await
        }
    }
}
