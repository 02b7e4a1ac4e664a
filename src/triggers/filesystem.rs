// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Filesystem trigger
//!
//! Reacts to files created or modified under a watched directory. The
//! trigger only holds the watch configuration; the monitor owns the actual
//! watcher and delivers [`FsEvent`]s to every filesystem trigger.

use glob::Pattern;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{lock, EventTrigger, RunRequest, TriggerBase};
use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::Parameters;

/// Kind of filesystem change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsEventKind {
    #[serde(alias = "create")]
    Created,
    #[serde(alias = "modify")]
    Modified,
}

impl FsEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
        }
    }
}

/// A filesystem change delivered to filesystem triggers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: PathBuf,
    pub kind: FsEventKind,
    pub is_directory: bool,
}

impl FsEvent {
    /// Event for a regular file
    pub fn file(path: impl Into<PathBuf>, kind: FsEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
            is_directory: false,
        }
    }
}

/// What a filesystem trigger watches
#[derive(Debug, Clone, PartialEq)]
pub struct FileWatchSpec {
    /// Directory to watch
    pub path: PathBuf,
    /// Filename globs; empty matches every file
    pub patterns: Vec<String>,
    pub recursive: bool,
    /// Event kinds that fire the trigger
    pub events: Vec<FsEventKind>,
}

impl FileWatchSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn events(mut self, events: Vec<FsEventKind>) -> Self {
        self.events = events;
        self
    }
}

impl Default for FileWatchSpec {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            patterns: Vec::new(),
            recursive: false,
            events: vec![FsEventKind::Created, FsEventKind::Modified],
        }
    }
}

/// Trigger fired by file creation or modification
#[derive(Debug)]
pub struct FileTrigger {
    base: TriggerBase,
    path: PathBuf,
    patterns: Vec<String>,
    compiled: Vec<Pattern>,
    recursive: bool,
    events: Vec<FsEventKind>,
    last_event: Mutex<Option<FsEvent>>,
}

impl FileTrigger {
    pub fn new(
        id: impl Into<String>,
        pipeline_name: impl Into<String>,
        spec: FileWatchSpec,
    ) -> PipeflowResult<Self> {
        let base = TriggerBase::new(id, pipeline_name)?;

        if !spec.path.is_dir() {
            return Err(PipeflowError::invalid_config(
                &base.id,
                format!("path must be an existing directory: {}", spec.path.display()),
            ));
        }
        let path = spec.path.canonicalize()?;

        let compiled = spec
            .patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    PipeflowError::invalid_config(
                        &base.id,
                        format!("invalid file pattern '{}': {}", p, e),
                    )
                })
            })
            .collect::<PipeflowResult<Vec<_>>>()?;

        if spec.events.is_empty() {
            return Err(PipeflowError::invalid_config_with_help(
                &base.id,
                "no event types to watch",
                "Watch 'create', 'modify' or both",
            ));
        }

        tracing::info!(
            trigger = %base.id,
            path = %path.display(),
            recursive = spec.recursive,
            patterns = ?spec.patterns,
            "filesystem trigger initialized"
        );

        Ok(Self {
            base,
            path,
            patterns: spec.patterns,
            compiled,
            recursive: spec.recursive,
            events: spec.events,
            last_event: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &str {
        &self.base.id
    }

    pub fn pipeline_name(&self) -> &str {
        &self.base.pipeline_name
    }

    /// Watched directory, canonicalized
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn recursive(&self) -> bool {
        self.recursive
    }

    pub fn events(&self) -> &[FsEventKind] {
        &self.events
    }

    fn matches_filename(&self, path: &Path) -> bool {
        if self.compiled.is_empty() {
            return true;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.compiled.iter().any(|p| p.matches(name))
    }

    fn is_watched_location(&self, path: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        if self.recursive {
            parent.starts_with(&self.path)
        } else {
            parent == self.path
        }
    }
}

/// Resolve symlinks in the event's directory so it compares against the
/// canonical watch path. The file itself may already be gone.
fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => parent
            .canonicalize()
            .map(|p| p.join(name))
            .unwrap_or(absolute),
        _ => absolute,
    }
}

impl EventTrigger for FileTrigger {
    type Event = FsEvent;

    fn matches(&self, event: &FsEvent) -> bool {
        if event.is_directory || !self.events.contains(&event.kind) {
            return false;
        }

        let path = normalize(&event.path);
        let matched = self.is_watched_location(&path) && self.matches_filename(&path);
        if matched {
            tracing::debug!(
                trigger = %self.base.id,
                path = %event.path.display(),
                "filesystem event matches"
            );
        }
        matched
    }

    fn record(&self, event: FsEvent) {
        *lock(&self.last_event) = Some(event);
    }

    fn take_parameters(&self) -> Parameters {
        let mut params = self.base.parameters();
        if let Some(event) = lock(&self.last_event).take() {
            insert_event(&mut params, &event);
        }
        params
    }

    fn fire(&self, event: FsEvent) -> RunRequest {
        let mut params = self.base.parameters();
        {
            let mut slot = lock(&self.last_event);
            *slot = Some(event);
            if let Some(event) = slot.take() {
                insert_event(&mut params, &event);
            }
        }
        self.base.request(params)
    }
}

fn insert_event(params: &mut Parameters, event: &FsEvent) {
    params.insert(
        "event_type".into(),
        Value::String(event.kind.as_str().to_string()),
    );
    params.insert(
        "src_path".into(),
        Value::String(event.path.display().to_string()),
    );
}
