// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Run dispatch
//!
//! Every producer hands its [`RunRequest`]s to one [`Dispatcher`]. Each run
//! gets a fresh engine and context and executes in its own task, so a
//! failing or panicking pipeline never takes a producer down with it.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::pipeline::{generate_run_id, ExecutionEngine, PipelineRegistry, RunContext};
use crate::triggers::RunRequest;

/// How a dispatched run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Every step ran
    Completed { run_id: String, results: Value },
    /// A step failed or the graph could not run
    Failed {
        run_id: String,
        step: Option<String>,
        error: String,
    },
    /// No pipeline with the requested name
    PipelineNotFound { pipeline: String },
    /// The run task panicked
    Panicked { run_id: String, message: String },
}

impl DispatchOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn run_id(&self) -> Option<&str> {
        match self {
            Self::Completed { run_id, .. }
            | Self::Failed { run_id, .. }
            | Self::Panicked { run_id, .. } => Some(run_id),
            Self::PipelineNotFound { .. } => None,
        }
    }
}

/// Launches pipeline runs for trigger requests
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pipelines: Arc<PipelineRegistry>,
}

impl Dispatcher {
    pub fn new(pipelines: Arc<PipelineRegistry>) -> Self {
        Self { pipelines }
    }

    pub fn pipelines(&self) -> &PipelineRegistry {
        &self.pipelines
    }

    /// Run the requested pipeline in an isolated task and wait for it.
    ///
    /// Never fails: every problem is logged and reported in the outcome.
    pub async fn dispatch(&self, request: RunRequest) -> DispatchOutcome {
        let RunRequest {
            pipeline_name,
            parameters,
            trigger_id,
        } = request;

        let Some(pipeline) = self.pipelines.get(&pipeline_name) else {
            warn!(
                trigger = %trigger_id,
                pipeline = %pipeline_name,
                "trigger fired for unknown pipeline, dropping run"
            );
            return DispatchOutcome::PipelineNotFound {
                pipeline: pipeline_name,
            };
        };

        let run_id = generate_run_id();
        info!(
            trigger = %trigger_id,
            pipeline = %pipeline_name,
            run_id = %run_id,
            "dispatching pipeline run"
        );

        let task_run_id = run_id.clone();
        let handle = tokio::spawn(async move {
            let mut context = RunContext::new(task_run_id, pipeline.name(), parameters);
            let outcome = ExecutionEngine::new(&pipeline).execute(&mut context).await;
            (outcome, context)
        });

        match handle.await {
            Ok((Ok(()), context)) => {
                let results = serde_json::to_value(context.results()).unwrap_or(Value::Null);
                DispatchOutcome::Completed { run_id, results }
            }
            Ok((Err(e), context)) => {
                error!(
                    trigger = %trigger_id,
                    pipeline = %pipeline_name,
                    run_id = %run_id,
                    completed = context.results().len(),
                    error = %e,
                    "triggered run failed"
                );
                DispatchOutcome::Failed {
                    run_id,
                    step: e.failed_step().map(str::to_string),
                    error: e.to_string(),
                }
            }
            Err(join_error) => {
                let message = panic_message(join_error);
                error!(
                    trigger = %trigger_id,
                    pipeline = %pipeline_name,
                    run_id = %run_id,
                    panic = %message,
                    "triggered run panicked"
                );
                DispatchOutcome::Panicked { run_id, message }
            }
        }
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
