// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Validate command - check the definition file

use colored::Colorize;
use miette::Result;
use std::path::Path;

use super::load_definition;
use crate::pipeline::DagBuilder;
use crate::utils::{print_error, print_section, print_success, print_warning};

/// Run the validate command
pub async fn run(config: &Path, verbose: bool) -> Result<()> {
    println!("{}", "Validating definition...".bold());
    println!();

    let definition = match load_definition(config) {
        Ok(d) => d,
        Err(e) => {
            print_error("Failed to parse definition file");
            println!();
            return Err(e);
        }
    };
    print_success(&format!("{} parsed", config.display()));

    let pipelines = definition.pipelines()?;
    print_success(&format!("{} pipeline(s) built", pipelines.len()));

    let triggers = definition.triggers()?;
    print_success(&format!("{} trigger(s) built", triggers.len()));

    let mut errors = Vec::new();
    for pipeline in pipelines.iter() {
        match DagBuilder::build(pipeline).topological_order_names() {
            Ok(order) => {
                if verbose {
                    print_success(&format!("{}: {}", pipeline.name(), order.join(" -> ")));
                }
            }
            Err(e) => errors.push(e.to_string()),
        }
    }

    let mut warnings = Vec::new();
    for trigger in triggers.iter() {
        if pipelines.get(trigger.pipeline_name()).is_none() {
            warnings.push(format!(
                "trigger '{}' targets undefined pipeline '{}'",
                trigger.id(),
                trigger.pipeline_name()
            ));
        }
    }

    if !errors.is_empty() {
        print_section(&"Errors".red().bold().to_string());
        for error in &errors {
            print_error(error);
        }
    }

    if !warnings.is_empty() {
        print_section(&"Warnings".yellow().bold().to_string());
        for warning in &warnings {
            print_warning(warning);
        }
    }

    println!();

    if !errors.is_empty() {
        Err(miette::miette!("Definition validation failed"))
    } else if !warnings.is_empty() {
        println!("{}", "Definition is valid but has warnings.".yellow().bold());
        Ok(())
    } else {
        println!("{}", "Definition is valid!".green().bold());
        Ok(())
    }
}
