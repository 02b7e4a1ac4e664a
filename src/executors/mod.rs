// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Step actions
//!
//! A [`StepAction`] is what a step actually does when it runs. Closures are
//! wrapped in [`FnAction`]; steps declared in a definition file run shell
//! commands through [`ShellAction`].

mod shell;

pub use shell::ShellAction;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::pipeline::RunContext;

/// Trait for the executable part of a step
#[async_trait]
pub trait StepAction: Send + Sync {
    /// Run against the current context, returning the step result
    async fn run(&self, context: &RunContext) -> anyhow::Result<Value>;

    /// Human-readable summary used in plans and logs
    fn describe(&self) -> String {
        "function".to_string()
    }
}

/// Adapter for plain closures.
///
/// The closure is synchronous, so it runs on tokio's blocking pool against a
/// snapshot of the context and never holds up a runtime worker.
pub struct FnAction<F> {
    func: Arc<F>,
}

impl<F> FnAction<F>
where
    F: Fn(&RunContext) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    pub fn new(func: F) -> Self {
        Self {
            func: Arc::new(func),
        }
    }
}

#[async_trait]
impl<F> StepAction for FnAction<F>
where
    F: Fn(&RunContext) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    async fn run(&self, context: &RunContext) -> anyhow::Result<Value> {
        let func = Arc::clone(&self.func);
        let snapshot = context.clone();

        match tokio::task::spawn_blocking(move || (*func)(&snapshot)).await {
            Ok(result) => result,
            // Keep panics visible to whoever awaits the run
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(anyhow::anyhow!("step task was cancelled: {}", e)),
        }
    }
}
