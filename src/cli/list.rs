// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! List command - show pipelines and triggers

use colored::Colorize;
use miette::Result;
use std::path::Path;

use super::load_definition;
use crate::utils::print_section;

/// Run the list command
pub async fn run(config: &Path, verbose: bool) -> Result<()> {
    let definition = load_definition(config)?;
    let pipelines = definition.pipelines()?;
    let triggers = definition.triggers()?;

    print_section("Pipelines");
    if pipelines.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for pipeline in pipelines.iter() {
        println!(
            "  {} {}",
            pipeline.name().bold(),
            format!("({} steps)", pipeline.len()).dimmed()
        );
        for step in pipeline.steps() {
            let deps = pipeline.dependencies_of(step.name());
            let deps = if deps.is_empty() {
                String::new()
            } else {
                format!(" [depends: {}]", deps.join(", "))
            };
            if verbose {
                println!("    - {} {}{}", step.name(), step.describe().cyan(), deps.dimmed());
            } else {
                println!("    - {}{}", step.name(), deps.dimmed());
            }
        }
    }

    print_section("Triggers");
    if triggers.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for trigger in triggers.iter() {
        let target = if pipelines.get(trigger.pipeline_name()).is_some() {
            trigger.pipeline_name().normal()
        } else {
            format!("{} (undefined)", trigger.pipeline_name()).yellow()
        };
        println!(
            "  {} {} {} -> {}",
            trigger.id().bold(),
            format!("[{}]", trigger.kind()).dimmed(),
            trigger.describe(),
            target
        );
    }

    if verbose {
        let monitor = definition.monitor_config();
        print_section("Monitor");
        println!("  poll interval: {}s", monitor.poll_interval.as_secs());
        println!("  webhook address: {}", monitor.webhook_address());
        println!("  shutdown grace: {}s", monitor.shutdown_grace.as_secs());
    }

    Ok(())
}
