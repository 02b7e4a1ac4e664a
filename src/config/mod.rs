// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Definition files
//!
//! Pipelines, triggers and monitor settings are declared in one YAML or TOML
//! file. Loading checks the file eagerly and turns it into the registries the
//! engine and the monitor work with.

mod model;

pub use model::{
    DefinitionFile, MonitorSection, PipelineConfig, StepConfig, TriggerConfig, TriggerKindConfig,
};

use std::path::{Path, PathBuf};

use crate::errors::{PipeflowError, PipeflowResult};
use crate::executors::ShellAction;
use crate::monitor::MonitorConfig;
use crate::pipeline::{Pipeline, PipelineRegistry, Step};
use crate::triggers::{
    FileTrigger, FileWatchSpec, ScheduleTrigger, Trigger, TriggerRegistry, WebhookTrigger,
};

/// Default definition file name
pub const DEFAULT_DEFINITION_FILE: &str = "pipeflow.yaml";

/// Serialization format of a definition file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Toml,
}

impl Format {
    /// Pick the format from the file extension; anything but `.toml` is YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }
}

/// A parsed definition file and the directory relative paths resolve against
#[derive(Debug, Clone)]
pub struct Definition {
    pub file: DefinitionFile,
    base_dir: PathBuf,
}

impl Definition {
    /// Read and parse a definition file
    pub fn load(path: &Path) -> PipeflowResult<Self> {
        if !path.exists() {
            return Err(PipeflowError::DefinitionNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| PipeflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let base_dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let base_dir = base_dir.canonicalize().unwrap_or(base_dir);

        tracing::debug!(path = %path.display(), "loading definition file");
        Self::parse(&content, Format::from_path(path), base_dir)
    }

    /// Parse definition text
    pub fn parse(content: &str, format: Format, base_dir: impl Into<PathBuf>) -> PipeflowResult<Self> {
        let file = match format {
            Format::Yaml => serde_yaml::from_str(content)?,
            Format::Toml => toml::from_str(content)?,
        };

        Ok(Self {
            file,
            base_dir: base_dir.into(),
        })
    }

    /// Directory relative paths resolve against
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Build every declared pipeline
    pub fn pipelines(&self) -> PipeflowResult<PipelineRegistry> {
        let mut registry = PipelineRegistry::new();
        for config in &self.file.pipelines {
            registry.register(self.build_pipeline(config)?)?;
        }
        Ok(registry)
    }

    fn build_pipeline(&self, config: &PipelineConfig) -> PipeflowResult<Pipeline> {
        let mut pipeline = Pipeline::new(&config.name);

        // Steps may be listed before their dependencies; add every step
        // first, then wire the edges
        for step in &config.steps {
            let action = ShellAction::new(&step.run, &step.shell, &self.base_dir)
                .map_err(|e| match e {
                    PipeflowError::InvalidConfiguration { reason, help, .. } => {
                        PipeflowError::InvalidConfiguration {
                            subject: format!("{}.{}", config.name, step.name),
                            reason,
                            help,
                        }
                    }
                    other => other,
                })?
                .with_env(step.env.clone());
            pipeline.add_step(Step::from_action(&step.name, action), &[])?;
        }

        for step in &config.steps {
            for dependency in &step.depends_on {
                pipeline.add_dependency(&step.name, dependency)?;
            }
        }

        Ok(pipeline)
    }

    /// Build every declared trigger
    pub fn triggers(&self) -> PipeflowResult<TriggerRegistry> {
        let mut registry = TriggerRegistry::new();
        for config in &self.file.triggers {
            if !self.file.pipelines.iter().any(|p| p.name == config.pipeline) {
                tracing::warn!(
                    trigger = %config.id,
                    pipeline = %config.pipeline,
                    "trigger targets a pipeline that is not defined; its runs will be dropped"
                );
            }
            registry.register(self.build_trigger(config)?)?;
        }
        Ok(registry)
    }

    fn build_trigger(&self, config: &TriggerConfig) -> PipeflowResult<Trigger> {
        let trigger: Trigger = match &config.kind {
            TriggerKindConfig::Schedule { schedule } => {
                ScheduleTrigger::new(&config.id, &config.pipeline, schedule)?.into()
            }
            TriggerKindConfig::Filesystem {
                path,
                patterns,
                recursive,
                events,
            } => {
                let spec = FileWatchSpec::new(self.resolve(path))
                    .patterns(patterns.iter().cloned())
                    .recursive(*recursive)
                    .events(events.clone());
                FileTrigger::new(&config.id, &config.pipeline, spec)?.into()
            }
            TriggerKindConfig::Webhook { endpoint, methods } => {
                WebhookTrigger::new(&config.id, &config.pipeline, endpoint, methods.clone())?.into()
            }
        };
        Ok(trigger)
    }

    /// Monitor settings from the file
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig::from(&self.file.monitor)
    }
}
