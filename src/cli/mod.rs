// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for pipeflow.

pub mod graph;
pub mod list;
pub mod monitor;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand, ValueEnum};
use miette::Result;
use std::path::{Path, PathBuf};

use crate::config::{Definition, DEFAULT_DEFINITION_FILE};

/// DAG pipeline runner
///
/// Run pipelines of dependent steps by hand or from schedule, filesystem
/// and webhook triggers.
#[derive(Parser, Debug)]
#[clap(
    name = "pipeflow",
    version,
    about = "Run DAG pipelines by hand or from schedule, filesystem and webhook triggers",
    long_about = None,
    after_help = "Examples:\n\
        pipeflow list                       Show pipelines and triggers\n\
        pipeflow run etl --param day=mon    Run a pipeline once\n\
        pipeflow graph etl -f mermaid       Draw a pipeline\n\
        pipeflow monitor                    Serve every trigger until interrupted\n\n\
        See 'pipeflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Definition file
    #[clap(short, long, global = true, value_name = "FILE", default_value = DEFAULT_DEFINITION_FILE)]
    pub config: PathBuf,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List pipelines, their steps and triggers
    List,

    /// Run a pipeline once
    Run {
        /// Pipeline to run
        pipeline: String,

        /// Run parameter as KEY=VALUE (repeatable)
        #[clap(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, serde_json::Value)>,
    },

    /// Check every pipeline and trigger in the definition file
    Validate,

    /// Show a pipeline as a graph
    Graph {
        /// Pipeline to draw
        pipeline: String,

        /// Output format
        #[clap(short, long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },

    /// Serve every trigger until interrupted
    Monitor {
        /// Seconds between schedule checks
        #[clap(long, value_name = "SECS")]
        poll_interval: Option<u64>,

        /// Address the webhook listener binds to
        #[clap(long, value_name = "HOST")]
        webhook_host: Option<String>,

        /// Port the webhook listener binds to
        #[clap(long, value_name = "PORT")]
        webhook_port: Option<u16>,
    },
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Parse `KEY=VALUE`; values that read as JSON scalars keep their type
fn parse_param(s: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in '{}'", s));
    }

    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(v) if !v.is_object() && !v.is_array() => v,
        _ => serde_json::Value::String(value.to_string()),
    };
    Ok((key.to_string(), value))
}

/// Load the definition file, rendering problems as diagnostics
pub(crate) fn load_definition(path: &Path) -> Result<Definition> {
    Ok(Definition::load(path)?)
}
