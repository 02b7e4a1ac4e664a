// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! # pipeflow - DAG pipeline runner
//!
//! `pipeflow` runs pipelines of dependent steps, either on demand or when a
//! trigger fires.
//!
//! ## Features
//!
//! - **Dependency graphs** - steps run in topological order, cycles are reported in full
//! - **Fail fast** - a run stops at the first failing step and keeps earlier results
//! - **Triggers** - cron schedules, filesystem changes and HTTP webhooks
//! - **Monitor** - one long-running service drives every trigger
//!
//! ## Quick Start
//!
//! ```bash
//! # Show what is defined in pipeflow.yaml
//! pipeflow list
//!
//! # Run a pipeline once
//! pipeflow run etl --param day=mon
//!
//! # Serve every trigger until Ctrl+C
//! pipeflow monitor
//! ```
//!
//! ## Library use
//!
//! ```no_run
//! use pipeflow::{ExecutionEngine, Pipeline, Step};
//! use serde_json::json;
//!
//! # async fn demo() -> pipeflow::PipeflowResult<()> {
//! let mut pipeline = Pipeline::new("demo");
//! pipeline.add_step(Step::new("extract", |_| Ok(json!([1, 2, 3]))), &[])?;
//! pipeline.add_step(Step::new("count", |ctx| {
//!     let rows = ctx.result("extract").and_then(|v| v.as_array()).map_or(0, Vec::len);
//!     Ok(json!(rows))
//! }), &["extract"])?;
//!
//! let context = ExecutionEngine::new(&pipeline).run(None, None).await?;
//! assert_eq!(context.result("count"), Some(&json!(3)));
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod executors;
pub mod monitor;
pub mod pipeline;
pub mod triggers;
pub mod utils;

// Re-export commonly used types
pub use errors::{PipeflowError, PipeflowResult};
pub use executors::{ShellAction, StepAction};
pub use monitor::{DispatchOutcome, Dispatcher, MonitorConfig, TriggerMonitor};
pub use pipeline::{
    generate_run_id, DagBuilder, ExecutionEngine, Parameters, Pipeline, PipelineRegistry,
    RunContext, Step,
};
pub use triggers::{
    FileTrigger, FileWatchSpec, FsEvent, FsEventKind, RunRequest, ScheduleTrigger, Trigger,
    TriggerRegistry, WebhookRequest, WebhookTrigger,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
