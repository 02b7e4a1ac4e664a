// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Pipeline registry
//!
//! Name -> pipeline lookup, filled before the monitor starts and only read
//! afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::Pipeline;

/// Registered pipelines by name
#[derive(Debug, Clone, Default)]
pub struct PipelineRegistry {
    pipelines: BTreeMap<String, Arc<Pipeline>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline; names must be unique
    pub fn register(&mut self, pipeline: Pipeline) -> PipeflowResult<()> {
        if self.pipelines.contains_key(pipeline.name()) {
            return Err(PipeflowError::DuplicatePipeline {
                pipeline: pipeline.name().to_string(),
            });
        }

        tracing::debug!(pipeline = %pipeline.name(), steps = pipeline.len(), "registering pipeline");
        self.pipelines
            .insert(pipeline.name().to_string(), Arc::new(pipeline));
        Ok(())
    }

    /// Look up a pipeline by name
    pub fn get(&self, name: &str) -> Option<Arc<Pipeline>> {
        self.pipelines.get(name).cloned()
    }

    /// Look up a pipeline, failing if it is not registered
    pub fn require(&self, name: &str) -> PipeflowResult<Arc<Pipeline>> {
        self.get(name).ok_or_else(|| PipeflowError::PipelineNotFound {
            pipeline: name.to_string(),
        })
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.pipelines.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pipeline> {
        self.pipelines.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}
