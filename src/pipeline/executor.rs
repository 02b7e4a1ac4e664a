// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Execution engine
//!
//! Runs the steps of one pipeline, in dependency order, against one
//! [`RunContext`]. Execution is strictly sequential and stops at the first
//! failing step.

use std::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::{DagBuilder, Parameters, Pipeline, RunContext};

/// Generate a fresh run id
pub fn generate_run_id() -> String {
    format!("run_{}", Uuid::new_v4().simple())
}

/// Execution engine for one pipeline
pub struct ExecutionEngine<'a> {
    pipeline: &'a Pipeline,
}

impl<'a> ExecutionEngine<'a> {
    /// Create an engine for a pipeline
    pub fn new(pipeline: &'a Pipeline) -> Self {
        Self { pipeline }
    }

    /// Compute a valid execution order, failing if the graph has cycles
    pub fn execution_order(&self) -> PipeflowResult<Vec<String>> {
        DagBuilder::build(self.pipeline).topological_order_names()
    }

    /// Run the whole pipeline with a fresh context.
    ///
    /// A run id is generated when none is given.
    pub async fn run(
        &self,
        run_id: Option<String>,
        parameters: Option<Parameters>,
    ) -> PipeflowResult<RunContext> {
        let run_id = run_id.unwrap_or_else(generate_run_id);
        let mut context =
            RunContext::new(run_id, self.pipeline.name(), parameters.unwrap_or_default());

        self.execute(&mut context).await?;
        Ok(context)
    }

    /// Run the pipeline against an existing context.
    ///
    /// On failure the context keeps the results of every step that completed
    /// before the failing one.
    pub async fn execute(&self, context: &mut RunContext) -> PipeflowResult<()> {
        let pipeline = self.pipeline.name();
        info!(pipeline = %pipeline, run_id = %context.run_id, "starting pipeline run");
        let start = Instant::now();

        let order = self.execution_order().map_err(|e| {
            error!(pipeline = %pipeline, error = %e, "pipeline cannot run");
            e
        })?;
        info!(pipeline = %pipeline, order = ?order, "execution order");

        for name in &order {
            let step = self.pipeline.get_step(name)?;
            let step_start = Instant::now();
            info!(run_id = %context.run_id, step = %name, "executing step");

            match step.execute(context).await {
                Ok(result) => {
                    context.record_result(name, result);
                    debug!(
                        step = %name,
                        duration_ms = step_start.elapsed().as_millis() as u64,
                        "step completed"
                    );
                }
                Err(source) => {
                    error!(
                        run_id = %context.run_id,
                        step = %name,
                        completed = context.results().len(),
                        duration_ms = start.elapsed().as_millis() as u64,
                        error = %source,
                        "pipeline run failed"
                    );
                    return Err(PipeflowError::StepFailed {
                        step: name.clone(),
                        source,
                    });
                }
            }
        }

        info!(
            pipeline = %pipeline,
            run_id = %context.run_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "pipeline run completed"
        );
        Ok(())
    }
}
