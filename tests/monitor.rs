// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

use pipeflow::{
    FileTrigger, FileWatchSpec, MonitorConfig, Pipeline, PipelineRegistry, ScheduleTrigger, Step,
    TriggerMonitor, TriggerRegistry, WebhookTrigger,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

type Seen = Arc<Mutex<Vec<(String, Value)>>>;

/// Pipeline with one step that records the run id and parameters it saw
fn recording_pipeline(name: &str, seen: &Seen, delay: Duration) -> Pipeline {
    let seen = Arc::clone(seen);
    let mut p = Pipeline::new(name);
    p.add_step(
        Step::new("record", move |ctx| {
            std::thread::sleep(delay);
            seen.lock()
                .unwrap()
                .push((ctx.run_id.clone(), Value::Object(ctx.parameters().clone())));
            Ok(json!(ctx.pipeline_name))
        }),
        &[],
    )
    .unwrap();
    p
}

fn config() -> MonitorConfig {
    MonitorConfig {
        poll_interval: Duration::from_millis(50),
        webhook_host: "127.0.0.1".into(),
        webhook_port: 0,
        shutdown_grace: Duration::from_secs(3),
    }
}

async fn post(addr: SocketAddr, path: &str, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        path,
        addr,
        body.len(),
        body
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

async fn wait_for(seen: &Seen, count: usize, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while seen.lock().unwrap().len() < count && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn webhook_request_runs_pipeline() {
    let seen = Seen::default();
    let mut pipelines = PipelineRegistry::new();
    pipelines
        .register(recording_pipeline("deploy", &seen, Duration::ZERO))
        .unwrap();
    let mut triggers = TriggerRegistry::new();
    triggers
        .register(WebhookTrigger::new("deploy_hook", "deploy", "/hooks/deploy", vec![]).unwrap())
        .unwrap();

    let monitor = TriggerMonitor::new(Arc::new(triggers), Arc::new(pipelines), config());
    monitor.start().await.unwrap();
    let addr = monitor.local_addr().await.expect("listener bound");

    let response = post(addr, "/hooks/deploy?env=prod", r#"{"tag":"v2"}"#).await;
    assert!(response.starts_with("HTTP/1.1 202"), "{}", response);
    assert!(response.contains("\"outcome\":\"completed\""), "{}", response);

    let health = {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /_health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).await.unwrap();
        out
    };
    assert!(health.starts_with("HTTP/1.1 200"), "{}", health);

    monitor.stop().await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let params = &seen[0].1;
    assert_eq!(params["trigger_id"], "deploy_hook");
    assert_eq!(params["args"], json!({"env": "prod"}));
    assert_eq!(params["json_data"], json!({"tag": "v2"}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_triggers_run_concurrently_with_independent_contexts() {
    let seen = Seen::default();
    let mut pipelines = PipelineRegistry::new();
    pipelines
        .register(recording_pipeline("alpha", &seen, Duration::from_millis(500)))
        .unwrap();
    pipelines
        .register(recording_pipeline("beta", &seen, Duration::from_millis(500)))
        .unwrap();
    let mut triggers = TriggerRegistry::new();
    triggers
        .register(WebhookTrigger::new("a_hook", "alpha", "/alpha", vec![]).unwrap())
        .unwrap();
    triggers
        .register(WebhookTrigger::new("b_hook", "beta", "/beta", vec![]).unwrap())
        .unwrap();

    let monitor = TriggerMonitor::new(Arc::new(triggers), Arc::new(pipelines), config());
    monitor.start().await.unwrap();
    let addr = monitor.local_addr().await.unwrap();

    let started = std::time::Instant::now();
    let (a, b) = tokio::join!(post(addr, "/alpha", "{}"), post(addr, "/beta", "{}"));
    let elapsed = started.elapsed();
    monitor.stop().await;

    assert!(a.starts_with("HTTP/1.1 202"), "{}", a);
    assert!(b.starts_with("HTTP/1.1 202"), "{}", b);
    // Both runs overlapped instead of queueing behind each other
    assert!(elapsed < Duration::from_millis(950), "took {:?}", elapsed);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_ne!(seen[0].0, seen[1].0);
    let mut ids: Vec<_> = seen
        .iter()
        .map(|(_, p)| p["trigger_id"].as_str().unwrap().to_string())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["a_hook", "b_hook"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn blocking_steps_do_not_serialize_runs_on_one_worker() {
    let seen = Seen::default();
    let mut pipelines = PipelineRegistry::new();
    pipelines
        .register(recording_pipeline("left", &seen, Duration::from_millis(500)))
        .unwrap();
    pipelines
        .register(recording_pipeline("right", &seen, Duration::from_millis(500)))
        .unwrap();
    let mut triggers = TriggerRegistry::new();
    triggers
        .register(WebhookTrigger::new("left_hook", "left", "/left", vec![]).unwrap())
        .unwrap();
    triggers
        .register(WebhookTrigger::new("right_hook", "right", "/right", vec![]).unwrap())
        .unwrap();

    let monitor = TriggerMonitor::new(Arc::new(triggers), Arc::new(pipelines), config());
    monitor.start().await.unwrap();
    let addr = monitor.local_addr().await.unwrap();

    let started = std::time::Instant::now();
    let (a, b) = tokio::join!(post(addr, "/left", "{}"), post(addr, "/right", "{}"));
    let elapsed = started.elapsed();
    monitor.stop().await;

    assert!(a.starts_with("HTTP/1.1 202"), "{}", a);
    assert!(b.starts_with("HTTP/1.1 202"), "{}", b);
    assert!(elapsed < Duration::from_millis(950), "took {:?}", elapsed);
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_pipeline_gets_404() {
    let mut triggers = TriggerRegistry::new();
    triggers
        .register(WebhookTrigger::new("orphan", "nowhere", "/orphan", vec![]).unwrap())
        .unwrap();

    let monitor = TriggerMonitor::new(
        Arc::new(triggers),
        Arc::new(PipelineRegistry::new()),
        config(),
    );
    monitor.start().await.unwrap();
    let addr = monitor.local_addr().await.unwrap();

    let response = post(addr, "/orphan", "{}").await;
    monitor.stop().await;

    assert!(response.starts_with("HTTP/1.1 404"), "{}", response);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn schedule_trigger_fires_from_poll_loop() {
    let seen = Seen::default();
    let mut pipelines = PipelineRegistry::new();
    pipelines
        .register(recording_pipeline("tick", &seen, Duration::ZERO))
        .unwrap();
    let mut triggers = TriggerRegistry::new();
    triggers
        .register(ScheduleTrigger::new("every_second", "tick", "* * * * * *").unwrap())
        .unwrap();

    let monitor = TriggerMonitor::new(Arc::new(triggers), Arc::new(pipelines), config());
    monitor.start().await.unwrap();
    wait_for(&seen, 1, Duration::from_secs(5)).await;
    monitor.stop().await;

    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert_eq!(seen[0].1["trigger_id"], "every_second");
    assert!(seen[0].1["scheduled_fire_time_utc"].is_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn created_file_runs_pipeline() {
    let temp = TempDir::new().unwrap();
    let seen = Seen::default();
    let mut pipelines = PipelineRegistry::new();
    pipelines
        .register(recording_pipeline("ingest", &seen, Duration::ZERO))
        .unwrap();
    let mut triggers = TriggerRegistry::new();
    triggers
        .register(
            FileTrigger::new(
                "csv_drop",
                "ingest",
                FileWatchSpec::new(temp.path()).patterns(["*.csv"]),
            )
            .unwrap(),
        )
        .unwrap();

    let monitor = TriggerMonitor::new(Arc::new(triggers), Arc::new(pipelines), config());
    monitor.start().await.unwrap();

    // Give the watcher a moment to register
    tokio::time::sleep(Duration::from_millis(200)).await;
    std::fs::write(temp.path().join("ignored.txt"), "x").unwrap();
    std::fs::write(temp.path().join("data.csv"), "a,b\n1,2\n").unwrap();

    wait_for(&seen, 1, Duration::from_secs(10)).await;
    monitor.stop().await;

    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty(), "no run for the created file");
    for (_, params) in seen.iter() {
        assert_eq!(params["trigger_id"], "csv_drop");
        assert!(params["src_path"].as_str().unwrap().ends_with("data.csv"));
    }
    assert_eq!(seen[0].1["event_type"], "created");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bind_failure_is_reported() {
    let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = blocker.local_addr().unwrap().port();

    let mut triggers = TriggerRegistry::new();
    triggers
        .register(WebhookTrigger::new("hook", "p", "/hook", vec![]).unwrap())
        .unwrap();

    let monitor = TriggerMonitor::new(
        Arc::new(triggers),
        Arc::new(PipelineRegistry::new()),
        MonitorConfig {
            webhook_port: port,
            ..config()
        },
    );

    let err = monitor.start().await.unwrap_err();
    assert!(matches!(err, pipeflow::PipeflowError::Bind { .. }));
    assert!(!monitor.is_running().await);
}
