// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Filesystem watcher
//!
//! Bridges notify's callback thread into the monitor's filesystem queue.

use notify::event::{CreateKind, ModifyKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::errors::PipeflowResult;
use crate::triggers::{FsEvent, FsEventKind};

/// Message on the filesystem queue
#[derive(Debug, Clone)]
pub(crate) enum FsMessage {
    Event(FsEvent),
    /// Sentinel pushed by `stop()` to wake the loop
    Stop,
}

/// Keeps the notify watcher alive; dropping it stops watching
pub(crate) struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Start watching every directory, forwarding file create/modify events.
///
/// A directory requested both flat and recursive is watched once,
/// recursively; triggers still filter by their own recursion flag.
pub(crate) fn spawn_watcher(
    roots: impl IntoIterator<Item = (PathBuf, bool)>,
    queue: UnboundedSender<FsMessage>,
) -> PipeflowResult<WatcherHandle> {
    let mut watches: BTreeMap<PathBuf, bool> = BTreeMap::new();
    for (path, recursive) in roots {
        *watches.entry(path).or_insert(false) |= recursive;
    }

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for fs_event in translate(&event) {
                    debug!(path = %fs_event.path.display(), kind = fs_event.kind.as_str(), "filesystem event");
                    if queue.send(FsMessage::Event(fs_event)).is_err() {
                        // Monitor is gone
                        return;
                    }
                }
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )?;

    for (path, recursive) in &watches {
        let mode = if *recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(path, mode)?;
        info!(path = %path.display(), recursive = *recursive, "watching directory");
    }

    Ok(WatcherHandle { _inner: watcher })
}

/// Turn a notify event into the file events triggers care about
pub(crate) fn translate(event: &Event) -> Vec<FsEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => FsEventKind::Created,
        EventKind::Modify(ModifyKind::Name(_)) => return Vec::new(),
        EventKind::Modify(_) => FsEventKind::Modified,
        _ => return Vec::new(),
    };
    let folder = matches!(event.kind, EventKind::Create(CreateKind::Folder));

    event
        .paths
        .iter()
        .map(|path| FsEvent {
            path: path.clone(),
            kind,
            is_directory: folder || path.is_dir(),
        })
        .collect()
}
