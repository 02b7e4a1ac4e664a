// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Webhook listener
//!
//! One route per webhook trigger plus `GET /_health`. A request is answered
//! once its run has finished.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, MethodFilter, MethodRouter};
use axum::{Json, Router};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::dispatch::{DispatchOutcome, Dispatcher};
use crate::triggers::{EventTrigger, TriggerRegistry, WebhookRequest};

#[derive(Debug, Clone)]
struct WebhookState {
    triggers: Arc<TriggerRegistry>,
    dispatcher: Dispatcher,
}

/// Build the router for every registered webhook trigger
pub(crate) fn router(triggers: Arc<TriggerRegistry>, dispatcher: Dispatcher) -> Router {
    let state = WebhookState {
        triggers: Arc::clone(&triggers),
        dispatcher,
    };

    let mut router = Router::new().route("/_health", get(health));

    for hook in triggers.webhook_triggers() {
        let mut route: MethodRouter<WebhookState> = MethodRouter::new();
        for method in hook.methods() {
            let filter = match Method::from_bytes(method.as_bytes())
                .ok()
                .and_then(|m| MethodFilter::try_from(m).ok())
            {
                Some(filter) => filter,
                None => {
                    warn!(trigger = %hook.id(), method = %method, "skipping unroutable method");
                    continue;
                }
            };

            let trigger_id = hook.id().to_string();
            route = route.on(
                filter,
                move |State(state): State<WebhookState>,
                      method: Method,
                      uri: Uri,
                      headers: HeaderMap,
                      Query(query): Query<BTreeMap<String, String>>,
                      body: Bytes| async move {
                    // Undecodable bytes become U+FFFD rather than a rejection
                    let body = String::from_utf8_lossy(&body).into_owned();
                    let request =
                        WebhookRequest::new(method.as_str(), uri.path(), query, header_map(&headers), body);
                    handle(state, &trigger_id, request).await
                },
            );
        }

        info!(
            trigger = %hook.id(),
            endpoint = %hook.endpoint(),
            methods = ?hook.methods(),
            "webhook route registered"
        );
        router = router.route(hook.endpoint(), route);
    }

    router.with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

async fn handle(state: WebhookState, trigger_id: &str, request: WebhookRequest) -> Response {
    let Some(trigger) = state
        .triggers
        .get(trigger_id)
        .ok()
        .and_then(|t| t.as_webhook())
    else {
        error!(trigger = %trigger_id, "route has no webhook trigger");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "message": "trigger not registered" })),
        )
            .into_response();
    };

    info!(
        trigger = %trigger_id,
        method = %request.method,
        endpoint = %request.path,
        "webhook request received"
    );

    let run = trigger.fire(request);
    let pipeline = run.pipeline_name.clone();
    let outcome = state.dispatcher.dispatch(run).await;

    let status = match &outcome {
        DispatchOutcome::Completed { .. } | DispatchOutcome::Failed { .. } => StatusCode::ACCEPTED,
        DispatchOutcome::PipelineNotFound { .. } => StatusCode::NOT_FOUND,
        DispatchOutcome::Panicked { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let label = if status == StatusCode::ACCEPTED {
        "accepted"
    } else {
        "error"
    };

    (
        status,
        Json(json!({
            "status": label,
            "trigger_id": trigger_id,
            "pipeline": pipeline,
            "run": outcome,
        })),
    )
        .into_response()
}
