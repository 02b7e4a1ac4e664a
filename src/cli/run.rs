// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Run command - execute one pipeline

use colored::Colorize;
use miette::Result;
use serde_json::Value;
use std::path::Path;
use std::time::Instant;

use super::load_definition;
use crate::pipeline::{generate_run_id, ExecutionEngine, Parameters, RunContext};
use crate::utils::{print_marked, print_success, Mark};

/// Run a pipeline once
pub async fn run(
    config: &Path,
    pipeline: &str,
    params: Vec<(String, Value)>,
    verbose: bool,
) -> Result<()> {
    let definition = load_definition(config)?;
    let pipelines = definition.pipelines()?;
    let pipeline = pipelines.require(pipeline)?;

    let parameters: Parameters = params.into_iter().collect();
    let mut context = RunContext::new(generate_run_id(), pipeline.name(), parameters);

    println!(
        "{} {} {}",
        "Running".bold(),
        pipeline.name().bold(),
        format!("({})", context.run_id).dimmed()
    );
    println!();

    let start = Instant::now();
    let outcome = ExecutionEngine::new(&pipeline).execute(&mut context).await;
    let elapsed = start.elapsed();

    for (step, result) in context.results().iter() {
        print_success(step);
        if verbose {
            print_output(result);
        }
    }

    println!();
    match outcome {
        Ok(()) => {
            println!(
                "{} ({:.2}s)",
                "Pipeline completed successfully".green(),
                elapsed.as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            if let Some(step) = e.failed_step() {
                print_marked(Mark::Failed, step);
                println!();
            }
            eprintln!(
                "{} ({:.2}s)",
                "Pipeline failed".red(),
                elapsed.as_secs_f64()
            );
            Err(e.into())
        }
    }
}

fn print_output(result: &Value) {
    let stdout = result.get("stdout").and_then(Value::as_str).unwrap_or_default();
    for line in stdout.lines() {
        println!("      {}", line.dimmed());
    }
}
