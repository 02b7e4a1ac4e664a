// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Pipeline definition structures
//!
//! A [`Pipeline`] is a named set of [`Step`]s plus the dependency edges
//! between them. Dependencies must name steps that are already registered,
//! so a pipeline is always built bottom-up.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{PipeflowError, PipeflowResult};
use crate::executors::{FnAction, StepAction};

/// Parameters handed to a run by its caller or trigger
pub type Parameters = serde_json::Map<String, Value>;

/// A single named unit of work
#[derive(Clone)]
pub struct Step {
    name: String,
    action: Arc<dyn StepAction>,
}

impl Step {
    /// Create a step from a synchronous closure
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&RunContext) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self::from_action(name, FnAction::new(func))
    }

    /// Create a step from any [`StepAction`]
    pub fn from_action(name: impl Into<String>, action: impl StepAction + 'static) -> Self {
        Self {
            name: name.into(),
            action: Arc::new(action),
        }
    }

    /// Step name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Short description of what the step runs
    pub fn describe(&self) -> String {
        self.action.describe()
    }

    /// Run the step against a context
    pub async fn execute(&self, context: &RunContext) -> anyhow::Result<Value> {
        self.action.run(context).await
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("action", &self.action.describe())
            .finish()
    }
}

/// Pipeline: steps plus forward and reverse dependency adjacency
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    steps: HashMap<String, Step>,
    /// Step names in registration order
    order: Vec<String>,
    /// step -> steps it depends on
    dependencies: HashMap<String, Vec<String>>,
    /// step -> steps that depend on it
    reverse_dependencies: HashMap<String, Vec<String>>,
}

impl Pipeline {
    /// Create an empty pipeline
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: HashMap::new(),
            order: Vec::new(),
            dependencies: HashMap::new(),
            reverse_dependencies: HashMap::new(),
        }
    }

    /// Pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a step that depends on already-registered steps.
    ///
    /// Nothing is recorded unless every check passes.
    pub fn add_step(&mut self, step: Step, depends_on: &[&str]) -> PipeflowResult<()> {
        if step.name.trim().is_empty() {
            return Err(PipeflowError::invalid_config(
                &self.name,
                "step name cannot be empty",
            ));
        }

        if self.steps.contains_key(&step.name) {
            return Err(PipeflowError::DuplicateStep {
                pipeline: self.name.clone(),
                step: step.name.clone(),
            });
        }

        if let Some(missing) = depends_on.iter().find(|dep| !self.steps.contains_key(**dep)) {
            return Err(PipeflowError::UnknownDependency {
                step: step.name.clone(),
                dependency: missing.to_string(),
            });
        }

        tracing::debug!(pipeline = %self.name, step = %step.name, "adding step");

        let name = step.name.clone();
        let mut deps: Vec<String> = Vec::with_capacity(depends_on.len());
        for dep in depends_on {
            if !deps.iter().any(|d| d == *dep) {
                deps.push(dep.to_string());
            }
        }

        for dep in &deps {
            self.reverse_dependencies
                .entry(dep.clone())
                .or_default()
                .push(name.clone());
        }

        self.reverse_dependencies.entry(name.clone()).or_default();
        self.dependencies.insert(name.clone(), deps);
        self.order.push(name.clone());
        self.steps.insert(name, step);

        Ok(())
    }

    /// Record that `step` depends on `dependency`, both already registered.
    ///
    /// Unlike [`Pipeline::add_step`] this can close a cycle; cycles are
    /// reported when the pipeline runs.
    pub fn add_dependency(&mut self, step: &str, dependency: &str) -> PipeflowResult<()> {
        if !self.steps.contains_key(step) {
            return Err(PipeflowError::StepNotFound {
                pipeline: self.name.clone(),
                step: step.to_string(),
            });
        }
        if !self.steps.contains_key(dependency) {
            return Err(PipeflowError::UnknownDependency {
                step: step.to_string(),
                dependency: dependency.to_string(),
            });
        }

        let deps = self.dependencies.entry(step.to_string()).or_default();
        if deps.iter().any(|d| d == dependency) {
            return Ok(());
        }
        deps.push(dependency.to_string());
        self.reverse_dependencies
            .entry(dependency.to_string())
            .or_default()
            .push(step.to_string());

        Ok(())
    }

    /// Get a step by name
    pub fn get_step(&self, name: &str) -> PipeflowResult<&Step> {
        self.steps.get(name).ok_or_else(|| PipeflowError::StepNotFound {
            pipeline: self.name.clone(),
            step: name.to_string(),
        })
    }

    /// Steps in registration order
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.order.iter().filter_map(|name| self.steps.get(name))
    }

    /// Step names in registration order
    pub fn step_names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Full dependency map (step -> its dependencies)
    pub fn dependencies(&self) -> &HashMap<String, Vec<String>> {
        &self.dependencies
    }

    /// Direct dependencies of one step
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.dependencies.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Steps that directly depend on `name`
    pub fn dependents(&self, name: &str) -> &[String] {
        self.reverse_dependencies
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Results of completed steps, in completion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepResults {
    entries: Vec<(String, Value)>,
}

impl StepResults {
    /// Result of one step
    pub fn get(&self, step: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == step)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, step: &str) -> bool {
        self.get(step).is_some()
    }

    /// Step names in completion order
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write-once insert; returns false if the step already has a result
    fn insert(&mut self, step: &str, value: Value) -> bool {
        if self.contains(step) {
            return false;
        }
        self.entries.push((step.to_string(), value));
        true
    }
}

impl Serialize for StepResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Per-invocation state of a pipeline run
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunContext {
    /// Run identifier
    pub run_id: String,
    /// Name of the pipeline being run
    pub pipeline_name: String,
    results: StepResults,
    parameters: Parameters,
}

impl RunContext {
    /// Create a fresh context with no results
    pub fn new(
        run_id: impl Into<String>,
        pipeline_name: impl Into<String>,
        parameters: Parameters,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            pipeline_name: pipeline_name.into(),
            results: StepResults::default(),
            parameters,
        }
    }

    /// Results of the steps completed so far
    pub fn results(&self) -> &StepResults {
        &self.results
    }

    /// Result of a completed step
    pub fn result(&self, step: &str) -> Option<&Value> {
        self.results.get(step)
    }

    /// Run parameters
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// One run parameter
    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    pub(crate) fn record_result(&mut self, step: &str, value: Value) -> bool {
        self.results.insert(step, value)
    }
}
