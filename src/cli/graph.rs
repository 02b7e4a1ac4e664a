// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Graph command - visualize a pipeline as a graph

use miette::Result;
use std::path::Path;

use super::{load_definition, GraphFormat};
use crate::pipeline::DagBuilder;

/// Run the graph command
pub async fn run(config: &Path, pipeline: &str, format: GraphFormat, _verbose: bool) -> Result<()> {
    let definition = load_definition(config)?;
    let pipelines = definition.pipelines()?;
    let pipeline = pipelines.require(pipeline)?;

    let dag = DagBuilder::build(&pipeline);

    let output = match format {
        GraphFormat::Text => dag.to_text(&pipeline)?,
        GraphFormat::Dot => dag.to_dot(),
        GraphFormat::Mermaid => dag.to_mermaid(),
    };

    println!("{}", output);

    Ok(())
}
