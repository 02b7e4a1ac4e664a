// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Trigger registry

use std::collections::BTreeMap;

use super::{FileTrigger, PollTrigger, Trigger, WebhookTrigger};
use crate::errors::{PipeflowError, PipeflowResult};

/// Registered triggers by id
#[derive(Debug, Default)]
pub struct TriggerRegistry {
    triggers: BTreeMap<String, Trigger>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trigger; ids must be unique
    pub fn register(&mut self, trigger: impl Into<Trigger>) -> PipeflowResult<()> {
        let trigger = trigger.into();
        if self.triggers.contains_key(trigger.id()) {
            return Err(PipeflowError::DuplicateTrigger {
                trigger: trigger.id().to_string(),
            });
        }

        if let Some(hook) = trigger.as_webhook() {
            let clash = self
                .webhook_triggers()
                .find(|other| other.endpoint() == hook.endpoint());
            if let Some(other) = clash {
                return Err(PipeflowError::invalid_config(
                    hook.id(),
                    format!(
                        "endpoint '{}' is already served by trigger '{}'",
                        hook.endpoint(),
                        other.id()
                    ),
                ));
            }
        }

        tracing::debug!(
            trigger = %trigger.id(),
            kind = trigger.kind(),
            pipeline = %trigger.pipeline_name(),
            "registering trigger"
        );
        self.triggers.insert(trigger.id().to_string(), trigger);
        Ok(())
    }

    pub fn get(&self, id: &str) -> PipeflowResult<&Trigger> {
        self.triggers
            .get(id)
            .ok_or_else(|| PipeflowError::TriggerNotFound {
                trigger: id.to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.values()
    }

    pub fn pollable(&self) -> impl Iterator<Item = &dyn PollTrigger> {
        self.triggers.values().filter_map(Trigger::as_pollable)
    }

    pub fn filesystem_triggers(&self) -> impl Iterator<Item = &FileTrigger> {
        self.triggers.values().filter_map(Trigger::as_filesystem)
    }

    pub fn webhook_triggers(&self) -> impl Iterator<Item = &WebhookTrigger> {
        self.triggers.values().filter_map(Trigger::as_webhook)
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triggers::{FileWatchSpec, ScheduleTrigger};
    use tempfile::TempDir;

    #[test]
    fn test_register_and_partition() {
        let temp = TempDir::new().unwrap();
        let mut registry = TriggerRegistry::new();
        registry
            .register(ScheduleTrigger::new("cron", "p", "* * * * *").unwrap())
            .unwrap();
        registry
            .register(FileTrigger::new("fs", "p", FileWatchSpec::new(temp.path())).unwrap())
            .unwrap();
        registry
            .register(WebhookTrigger::new("hook", "p", "/hook", vec![]).unwrap())
            .unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.pollable().count(), 1);
        assert_eq!(registry.filesystem_triggers().count(), 1);
        assert_eq!(registry.webhook_triggers().count(), 1);
        assert_eq!(registry.get("fs").unwrap().kind(), "filesystem");
        assert!(matches!(
            registry.get("nope"),
            Err(PipeflowError::TriggerNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = TriggerRegistry::new();
        registry
            .register(WebhookTrigger::new("hook", "p", "/a", vec![]).unwrap())
            .unwrap();

        let err = registry
            .register(WebhookTrigger::new("hook", "p", "/b", vec![]).unwrap())
            .unwrap_err();
        assert!(matches!(err, PipeflowError::DuplicateTrigger { .. }));
    }

    #[test]
    fn test_shared_endpoint_rejected() {
        let mut registry = TriggerRegistry::new();
        registry
            .register(WebhookTrigger::new("one", "p", "/same", vec![]).unwrap())
            .unwrap();

        let err = registry
            .register(WebhookTrigger::new("two", "q", "/same", vec!["GET".into()]).unwrap())
            .unwrap_err();
        assert!(matches!(err, PipeflowError::InvalidConfiguration { .. }));
        assert_eq!(registry.len(), 1);
    }
}
