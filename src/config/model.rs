// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Definition file models

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::monitor::MonitorConfig;
use crate::triggers::FsEventKind;

/// Top-level definition file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionFile {
    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,

    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,

    #[serde(default)]
    pub monitor: MonitorSection,
}

/// A pipeline and its steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// A shell step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    pub name: String,

    /// Command passed to `<shell> -c`
    pub run: String,

    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default = "default_shell")]
    pub shell: String,

    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_shell() -> String {
    "sh".to_string()
}

/// A trigger bound to a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub id: String,

    pub pipeline: String,

    #[serde(flatten)]
    pub kind: TriggerKindConfig,
}

/// Kind-specific trigger settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TriggerKindConfig {
    Schedule {
        schedule: String,
    },

    Filesystem {
        path: PathBuf,

        #[serde(default)]
        patterns: Vec<String>,

        #[serde(default)]
        recursive: bool,

        #[serde(default = "default_events")]
        events: Vec<FsEventKind>,
    },

    Webhook {
        endpoint: String,

        #[serde(default)]
        methods: Vec<String>,
    },
}

fn default_events() -> Vec<FsEventKind> {
    vec![FsEventKind::Created, FsEventKind::Modified]
}

/// `monitor` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorSection {
    pub poll_interval_secs: u64,
    pub webhook_host: String,
    pub webhook_port: u16,
    pub shutdown_grace_secs: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        let defaults = MonitorConfig::default();
        Self {
            poll_interval_secs: defaults.poll_interval.as_secs(),
            webhook_host: defaults.webhook_host,
            webhook_port: defaults.webhook_port,
            shutdown_grace_secs: defaults.shutdown_grace.as_secs(),
        }
    }
}

impl From<&MonitorSection> for MonitorConfig {
    fn from(section: &MonitorSection) -> Self {
        Self {
            poll_interval: Duration::from_secs(section.poll_interval_secs.max(1)),
            webhook_host: section.webhook_host.clone(),
            webhook_port: section.webhook_port,
            shutdown_grace: Duration::from_secs(section.shutdown_grace_secs),
        }
    }
}
