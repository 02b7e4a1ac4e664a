// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Monitor command - serve every trigger until interrupted

use colored::Colorize;
use miette::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::load_definition;
use crate::monitor::TriggerMonitor;

/// Settings given on the command line; each one overrides the file
#[derive(Debug, Clone, Default)]
pub struct MonitorOverrides {
    pub poll_interval: Option<u64>,
    pub webhook_host: Option<String>,
    pub webhook_port: Option<u16>,
}

/// Run the monitor command
pub async fn run(config: &Path, overrides: MonitorOverrides, verbose: bool) -> Result<()> {
    let definition = load_definition(config)?;
    let pipelines = Arc::new(definition.pipelines()?);
    let triggers = Arc::new(definition.triggers()?);

    let mut settings = definition.monitor_config();
    if let Some(secs) = overrides.poll_interval {
        settings.poll_interval = Duration::from_secs(secs.max(1));
    }
    if let Some(host) = overrides.webhook_host {
        settings.webhook_host = host;
    }
    if let Some(port) = overrides.webhook_port {
        settings.webhook_port = port;
    }

    println!("{}", "Starting trigger monitor...".bold());
    println!(
        "{} pipeline(s), {} trigger(s)",
        pipelines.len(),
        triggers.len()
    );
    if verbose {
        for trigger in triggers.iter() {
            println!(
                "  {} {} -> {}",
                trigger.id().bold(),
                trigger.describe().dimmed(),
                trigger.pipeline_name()
            );
        }
    }
    if triggers.webhook_triggers().next().is_some() {
        println!("Webhooks on {}", settings.webhook_address().cyan());
    }
    println!("Press {} to exit.", "Ctrl+C".cyan());
    println!();

    let monitor = TriggerMonitor::new(triggers, pipelines, settings);
    monitor.run_forever().await?;

    println!("{}", "Monitor stopped".green());
    Ok(())
}
