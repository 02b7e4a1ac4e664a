// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Triggers
//!
//! A trigger decides when a pipeline should run and produces a
//! [`RunRequest`] for it. Triggers come in two shapes:
//!
//! - **poll-capable** ([`PollTrigger`]): the monitor calls `check()` on a
//!   fixed interval (schedules)
//! - **event-capable** ([`EventTrigger`]): the monitor delivers external
//!   events, the trigger decides whether they match and turns the matched
//!   event into run parameters (filesystem changes, webhooks)

mod filesystem;
mod registry;
mod schedule;
mod webhook;

pub use filesystem::{FileTrigger, FileWatchSpec, FsEvent, FsEventKind};
pub use registry::TriggerRegistry;
pub use schedule::ScheduleTrigger;
pub use webhook::{WebhookRequest, WebhookTrigger};

use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::Parameters;

/// Request to run a pipeline, handed from a trigger to the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    /// Pipeline to run
    pub pipeline_name: String,
    /// Run parameters
    pub parameters: Parameters,
    /// Trigger that produced the request
    pub trigger_id: String,
}

/// Trigger checked periodically by the monitor
pub trait PollTrigger: Send + Sync {
    /// Non-blocking check; at most one fire per call
    fn check(&self) -> Option<RunRequest>;
}

/// Trigger fed with externally delivered events
pub trait EventTrigger: Send + Sync {
    type Event;

    /// Whether this trigger reacts to the event
    fn matches(&self, event: &Self::Event) -> bool;

    /// Remember the event that matched
    fn record(&self, event: Self::Event);

    /// Parameters for the recorded event; clears it
    fn take_parameters(&self) -> Parameters;

    /// Record the event and build its run request in one step
    fn fire(&self, event: Self::Event) -> RunRequest;
}

/// Identity shared by every trigger kind
#[derive(Debug, Clone)]
pub(crate) struct TriggerBase {
    pub(crate) id: String,
    pub(crate) pipeline_name: String,
}

impl TriggerBase {
    pub(crate) fn new(id: impl Into<String>, pipeline_name: impl Into<String>) -> PipeflowResult<Self> {
        let id = id.into();
        let pipeline_name = pipeline_name.into();

        if id.trim().is_empty() {
            return Err(PipeflowError::invalid_config(
                "trigger",
                "trigger id cannot be empty",
            ));
        }
        if pipeline_name.trim().is_empty() {
            return Err(PipeflowError::invalid_config(
                &id,
                "pipeline name cannot be empty",
            ));
        }

        Ok(Self { id, pipeline_name })
    }

    /// Parameters every trigger contributes
    pub(crate) fn parameters(&self) -> Parameters {
        let mut params = Parameters::new();
        params.insert("trigger_id".into(), Value::String(self.id.clone()));
        params
    }

    pub(crate) fn request(&self, parameters: Parameters) -> RunRequest {
        RunRequest {
            pipeline_name: self.pipeline_name.clone(),
            parameters,
            trigger_id: self.id.clone(),
        }
    }
}

/// Lock a trigger's state, recovering from a poisoned lock
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Any configured trigger
#[derive(Debug)]
pub enum Trigger {
    Schedule(ScheduleTrigger),
    Filesystem(FileTrigger),
    Webhook(WebhookTrigger),
}

impl Trigger {
    pub fn id(&self) -> &str {
        match self {
            Self::Schedule(t) => t.id(),
            Self::Filesystem(t) => t.id(),
            Self::Webhook(t) => t.id(),
        }
    }

    pub fn pipeline_name(&self) -> &str {
        match self {
            Self::Schedule(t) => t.pipeline_name(),
            Self::Filesystem(t) => t.pipeline_name(),
            Self::Webhook(t) => t.pipeline_name(),
        }
    }

    /// Short kind label
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schedule(_) => "schedule",
            Self::Filesystem(_) => "filesystem",
            Self::Webhook(_) => "webhook",
        }
    }

    /// One-line description of the trigger's condition
    pub fn describe(&self) -> String {
        match self {
            Self::Schedule(t) => format!("cron '{}'", t.expression()),
            Self::Filesystem(t) => format!(
                "{} {}{}",
                t.path().display(),
                if t.patterns().is_empty() {
                    "*".to_string()
                } else {
                    t.patterns().join(",")
                },
                if t.recursive() { " (recursive)" } else { "" }
            ),
            Self::Webhook(t) => format!("{} {}", t.methods().join("|"), t.endpoint()),
        }
    }

    /// Poll-capable view, if this trigger is polled
    pub fn as_pollable(&self) -> Option<&dyn PollTrigger> {
        match self {
            Self::Schedule(t) => Some(t),
            _ => None,
        }
    }

    /// Poll the trigger. Event-capable triggers never fire from here.
    pub fn check(&self) -> Option<RunRequest> {
        self.as_pollable().and_then(|t| t.check())
    }

    pub fn as_filesystem(&self) -> Option<&FileTrigger> {
        match self {
            Self::Filesystem(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_webhook(&self) -> Option<&WebhookTrigger> {
        match self {
            Self::Webhook(t) => Some(t),
            _ => None,
        }
    }
}

impl From<ScheduleTrigger> for Trigger {
    fn from(t: ScheduleTrigger) -> Self {
        Self::Schedule(t)
    }
}

impl From<FileTrigger> for Trigger {
    fn from(t: FileTrigger) -> Self {
        Self::Filesystem(t)
    }
}

impl From<WebhookTrigger> for Trigger {
    fn from(t: WebhookTrigger) -> Self {
        Self::Webhook(t)
    }
}
