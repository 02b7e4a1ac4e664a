// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Trigger monitor
//!
//! Long-running service that turns trigger activity into pipeline runs.
//! Up to three producers feed one [`Dispatcher`]:
//!
//! - a poll loop checking schedule triggers on a fixed interval
//! - a filesystem loop draining events from a notify watcher
//! - an HTTP listener serving webhook routes
//!
//! Producers only start when triggers of their kind are registered.

mod dispatch;
mod server;
mod watcher;

pub use dispatch::{DispatchOutcome, Dispatcher};

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::PipelineRegistry;
use crate::triggers::{EventTrigger, FsEvent, TriggerRegistry};
use watcher::{FsMessage, WatcherHandle};

/// How long the filesystem loop waits on its queue before rechecking shutdown
const FS_QUEUE_TIMEOUT: Duration = Duration::from_secs(1);

/// Monitor settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Interval between schedule checks
    pub poll_interval: Duration,
    pub webhook_host: String,
    /// Port for the webhook listener; 0 picks a free port
    pub webhook_port: u16,
    /// How long `stop()` waits for producers to finish
    pub shutdown_grace: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            webhook_host: "127.0.0.1".to_string(),
            webhook_port: 5000,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl MonitorConfig {
    pub fn webhook_address(&self) -> String {
        format!("{}:{}", self.webhook_host, self.webhook_port)
    }
}

/// State of a started monitor
struct Running {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    fs_queue: Option<mpsc::UnboundedSender<FsMessage>>,
    watcher: Option<WatcherHandle>,
    local_addr: Option<SocketAddr>,
}

/// Runs pipelines when their triggers fire
pub struct TriggerMonitor {
    triggers: Arc<TriggerRegistry>,
    dispatcher: Dispatcher,
    config: MonitorConfig,
    running: Mutex<Option<Running>>,
}

impl TriggerMonitor {
    pub fn new(
        triggers: Arc<TriggerRegistry>,
        pipelines: Arc<PipelineRegistry>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            triggers,
            dispatcher: Dispatcher::new(pipelines),
            config,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Address the webhook listener is bound to, while running
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().and_then(|r| r.local_addr)
    }

    /// Start every producer that has triggers to serve.
    ///
    /// Fails if the monitor is already running, the watcher cannot be set up
    /// or the webhook address cannot be bound. Nothing is left running on
    /// failure.
    pub async fn start(&self) -> PipeflowResult<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(PipeflowError::MonitorAlreadyRunning);
        }

        info!(
            triggers = self.triggers.len(),
            pipelines = self.dispatcher.pipelines().len(),
            "starting trigger monitor"
        );

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        // Fallible setup first
        let fs_setup = if self.triggers.filesystem_triggers().next().is_some() {
            let (tx, rx) = mpsc::unbounded_channel();
            let roots = self
                .triggers
                .filesystem_triggers()
                .map(|t| (t.path().to_path_buf(), t.recursive()));
            let handle = watcher::spawn_watcher(roots, tx.clone())?;
            Some((tx, rx, handle))
        } else {
            debug!("no filesystem triggers, watcher not started");
            None
        };

        let listener = if self.triggers.webhook_triggers().next().is_some() {
            let address = self.config.webhook_address();
            let listener = tokio::net::TcpListener::bind((
                self.config.webhook_host.as_str(),
                self.config.webhook_port,
            ))
            .await
            .map_err(|e| PipeflowError::Bind {
                address,
                message: e.to_string(),
            })?;
            let addr = listener.local_addr()?;
            Some((listener, addr))
        } else {
            debug!("no webhook triggers, listener not bound");
            None
        };

        if self.triggers.pollable().next().is_some() {
            tasks.push((
                "poll",
                tokio::spawn(poll_loop(
                    Arc::clone(&self.triggers),
                    self.dispatcher.clone(),
                    self.config.poll_interval,
                    shutdown_rx.clone(),
                )),
            ));
        } else {
            debug!("no schedule triggers, poll loop not started");
        }

        let (fs_queue, watcher) = match fs_setup {
            Some((tx, rx, handle)) => {
                tasks.push((
                    "filesystem",
                    tokio::spawn(fs_loop(
                        Arc::clone(&self.triggers),
                        self.dispatcher.clone(),
                        rx,
                        shutdown_rx.clone(),
                    )),
                ));
                (Some(tx), Some(handle))
            }
            None => (None, None),
        };

        let local_addr = match listener {
            Some((listener, addr)) => {
                let app = server::router(Arc::clone(&self.triggers), self.dispatcher.clone());
                let mut stop_rx = shutdown_rx.clone();
                tasks.push((
                    "webhook",
                    tokio::spawn(async move {
                        info!(address = %addr, "webhook listener started");
                        let served = axum::serve(listener, app)
                            .with_graceful_shutdown(async move {
                                let _ = stop_rx.wait_for(|stopped| *stopped).await;
                            })
                            .await;
                        match served {
                            Ok(()) => info!("webhook listener stopped"),
                            Err(e) => error!(error = %e, "webhook listener failed"),
                        }
                    }),
                ));
                Some(addr)
            }
            None => None,
        };

        info!(producers = tasks.len(), "trigger monitor running");
        *running = Some(Running {
            shutdown,
            tasks,
            fs_queue,
            watcher,
            local_addr,
        });
        Ok(())
    }

    /// Signal every producer to stop and wait for them within the grace
    /// period. In-flight runs are not interrupted. Stopping a monitor that is
    /// not running does nothing.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            debug!("trigger monitor is not running");
            return;
        };
        info!("stopping trigger monitor");

        let Running {
            shutdown,
            tasks,
            fs_queue,
            watcher,
            ..
        } = running;

        let _ = shutdown.send(true);
        drop(watcher);
        if let Some(queue) = fs_queue {
            let _ = queue.send(FsMessage::Stop);
        }

        let grace = self.config.shutdown_grace;
        let joined = tokio::time::timeout(grace, async {
            for (name, task) in tasks {
                if let Err(e) = task.await {
                    warn!(producer = name, error = %e, "producer ended abnormally");
                }
            }
        })
        .await;

        match joined {
            Ok(()) => info!("trigger monitor stopped"),
            Err(_) => warn!(
                grace_ms = grace.as_millis() as u64,
                "producers still busy after grace period, leaving them behind"
            ),
        }
    }

    /// Start, wait for `until` to resolve, then stop
    pub async fn run_until<F>(&self, until: F) -> PipeflowResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        until.await;
        self.stop().await;
        Ok(())
    }

    /// Start and run until SIGINT or SIGTERM
    pub async fn run_forever(&self) -> PipeflowResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Push an event onto the filesystem queue as if the watcher saw it.
    ///
    /// Returns false when no filesystem loop is running.
    pub async fn deliver_fs_event(&self, event: FsEvent) -> bool {
        let running = self.running.lock().await;
        match running.as_ref().and_then(|r| r.fs_queue.as_ref()) {
            Some(queue) => queue.send(FsMessage::Event(event)).is_ok(),
            None => false,
        }
    }
}

async fn poll_loop(
    triggers: Arc<TriggerRegistry>,
    dispatcher: Dispatcher,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(interval_ms = interval.as_millis() as u64, "poll loop started");

    loop {
        for trigger in triggers.pollable() {
            if let Some(request) = trigger.check() {
                dispatcher.dispatch(request).await;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
        if *shutdown.borrow() {
            break;
        }
    }

    info!("poll loop stopped");
}

async fn fs_loop(
    triggers: Arc<TriggerRegistry>,
    dispatcher: Dispatcher,
    mut queue: mpsc::UnboundedReceiver<FsMessage>,
    shutdown: watch::Receiver<bool>,
) {
    info!("filesystem loop started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let event = match tokio::time::timeout(FS_QUEUE_TIMEOUT, queue.recv()).await {
            Err(_) => continue,
            Ok(None) | Ok(Some(FsMessage::Stop)) => break,
            Ok(Some(FsMessage::Event(event))) => event,
        };

        for trigger in triggers.filesystem_triggers() {
            if trigger.matches(&event) {
                info!(
                    trigger = %trigger.id(),
                    path = %event.path.display(),
                    kind = event.kind.as_str(),
                    "filesystem trigger fired"
                );
                let request = trigger.fire(event.clone());
                dispatcher.dispatch(request).await;
            }
        }
    }

    info!("filesystem loop stopped");
}

/// Resolves on SIGINT, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received interrupt"),
        _ = terminate => info!("received terminate"),
    }
}
