// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Error types
//!
//! Every failure pipeflow can surface is a variant of [`PipeflowError`].
//! Definition-time errors (bad triggers, duplicate steps) are fatal to the
//! definition that caused them; run-time errors (cycles, step failures) are
//! fatal to one run only.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeflow operations
pub type PipeflowResult<T> = Result<T, PipeflowError>;

/// Main error type for pipeflow
#[derive(Error, Debug, Diagnostic)]
pub enum PipeflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Definition Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Invalid configuration for '{subject}': {reason}")]
    #[diagnostic(code(pipeflow::invalid_configuration))]
    InvalidConfiguration {
        subject: String,
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Step '{step}' already exists in pipeline '{pipeline}'")]
    #[diagnostic(
        code(pipeflow::duplicate_step),
        help("Step names must be unique within a pipeline")
    )]
    DuplicateStep { pipeline: String, step: String },

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    #[diagnostic(
        code(pipeflow::unknown_dependency),
        help("Add '{dependency}' to the pipeline before the steps that depend on it")
    )]
    UnknownDependency { step: String, dependency: String },

    #[error("Step '{step}' not found in pipeline '{pipeline}'")]
    #[diagnostic(code(pipeflow::step_not_found))]
    StepNotFound { pipeline: String, step: String },

    #[error("Pipeline '{pipeline}' is already registered")]
    #[diagnostic(code(pipeflow::duplicate_pipeline))]
    DuplicatePipeline { pipeline: String },

    #[error("Trigger '{trigger}' is already registered")]
    #[diagnostic(
        code(pipeflow::duplicate_trigger),
        help("Trigger ids must be unique across the whole process")
    )]
    DuplicateTrigger { trigger: String },

    #[error("Trigger '{trigger}' not found")]
    #[diagnostic(code(pipeflow::trigger_not_found))]
    TriggerNotFound { trigger: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Run Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline '{pipeline}' contains cycles: {}", format_cycles(.cycles))]
    #[diagnostic(
        code(pipeflow::cyclic_dependency),
        help("Review your step dependencies to remove the cycle")
    )]
    CyclicDependency {
        pipeline: String,
        cycles: Vec<Vec<String>>,
    },

    #[error("Error executing step '{step}': {source}")]
    #[diagnostic(code(pipeflow::step_failed))]
    StepFailed {
        step: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Pipeline '{pipeline}' not found")]
    #[diagnostic(
        code(pipeflow::pipeline_not_found),
        help("Run 'pipeflow list' to see the registered pipelines")
    )]
    PipelineNotFound { pipeline: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Monitor Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Trigger monitor is already running")]
    #[diagnostic(code(pipeflow::monitor_running))]
    MonitorAlreadyRunning,

    #[error("File watcher error: {message}")]
    #[diagnostic(code(pipeflow::watch_error))]
    Watch { message: String },

    #[error("Failed to bind webhook listener on {address}: {message}")]
    #[diagnostic(
        code(pipeflow::bind_error),
        help("Pick another port with --webhook-port")
    )]
    Bind { address: String, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Definition file not found: {path}")]
    #[diagnostic(
        code(pipeflow::definition_not_found),
        help("Create pipeflow.yaml or pass --config")
    )]
    DefinitionNotFound { path: PathBuf },

    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(pipeflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(pipeflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(pipeflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(pipeflow::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(pipeflow::toml_error))]
    Toml { message: String },
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| format!("[{}]", cycle.join(" -> ")))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<std::io::Error> for PipeflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for PipeflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for PipeflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for PipeflowError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl From<notify::Error> for PipeflowError {
    fn from(e: notify::Error) -> Self {
        Self::Watch { message: e.to_string() }
    }
}

impl PipeflowError {
    /// Create a configuration error without a help line
    pub fn invalid_config(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            subject: subject.into(),
            reason: reason.into(),
            help: None,
        }
    }

    /// Create a configuration error with a suggestion
    pub fn invalid_config_with_help(
        subject: impl Into<String>,
        reason: impl Into<String>,
        help: impl Into<String>,
    ) -> Self {
        Self::InvalidConfiguration {
            subject: subject.into(),
            reason: reason.into(),
            help: Some(help.into()),
        }
    }

    /// Name of the failing step, for step failures
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            Self::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Cycles carried by a cyclic dependency error
    pub fn cycles(&self) -> Option<&[Vec<String>]> {
        match self {
            Self::CyclicDependency { cycles, .. } => Some(cycles),
            _ => None,
        }
    }
}
