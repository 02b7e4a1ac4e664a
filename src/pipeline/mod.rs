// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Pipeline definitions and execution
//!
//! This module defines steps, pipelines and run contexts, the dependency
//! graph built from them, and the engine that runs them.

mod dag;
mod definition;
mod executor;
mod registry;

pub use dag::DagBuilder;
pub use definition::{Parameters, Pipeline, RunContext, Step, StepResults};
pub use executor::{generate_run_id, ExecutionEngine};
pub use registry::PipelineRegistry;
