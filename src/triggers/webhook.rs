// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Webhook trigger
//!
//! Fires when an HTTP request arrives on its endpoint with an accepted
//! method. The monitor owns the listener and hands each request over as a
//! [`WebhookRequest`].

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{lock, EventTrigger, RunRequest, TriggerBase};
use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::Parameters;

const ALLOWED_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

const ENDPOINT_PATTERN: &str = r"^(/[A-Za-z0-9._~\-]+)*/?$";

/// An inbound HTTP request, detached from the server framework
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebhookRequest {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    /// Parsed body, when the content type is JSON and the body parses
    pub json: Option<Value>,
}

impl WebhookRequest {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        query: BTreeMap<String, String>,
        headers: BTreeMap<String, String>,
        body: impl Into<String>,
    ) -> Self {
        let body = body.into();
        let is_json = headers
            .iter()
            .any(|(k, v)| k.eq_ignore_ascii_case("content-type") && v.to_ascii_lowercase().contains("json"));
        let json = if is_json {
            serde_json::from_str(&body).ok()
        } else {
            None
        };

        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            query,
            headers,
            body,
            json,
        }
    }
}

/// Trigger fired by an HTTP request
#[derive(Debug)]
pub struct WebhookTrigger {
    base: TriggerBase,
    endpoint: String,
    methods: Vec<String>,
    last_request: Mutex<Option<WebhookRequest>>,
}

impl WebhookTrigger {
    /// Create a webhook trigger; an empty method list accepts `POST`
    pub fn new(
        id: impl Into<String>,
        pipeline_name: impl Into<String>,
        endpoint: impl Into<String>,
        methods: Vec<String>,
    ) -> PipeflowResult<Self> {
        let base = TriggerBase::new(id, pipeline_name)?;
        let endpoint = endpoint.into();

        let re = Regex::new(ENDPOINT_PATTERN)
            .map_err(|e| PipeflowError::invalid_config(&base.id, e.to_string()))?;
        if !endpoint.starts_with('/') || !re.is_match(&endpoint) {
            return Err(PipeflowError::invalid_config_with_help(
                &base.id,
                format!("malformed webhook endpoint '{}'", endpoint),
                "Endpoints start with '/' and use letters, digits, '.', '_', '~' or '-'",
            ));
        }
        if endpoint == "/_health" {
            return Err(PipeflowError::invalid_config(
                &base.id,
                "'/_health' is reserved for the health check",
            ));
        }

        let methods = if methods.is_empty() {
            vec!["POST".to_string()]
        } else {
            methods.iter().map(|m| m.trim().to_ascii_uppercase()).collect()
        };
        if let Some(bad) = methods.iter().find(|m| !ALLOWED_METHODS.contains(&m.as_str())) {
            return Err(PipeflowError::invalid_config(
                &base.id,
                format!("unsupported HTTP method '{}'", bad),
            ));
        }

        tracing::info!(
            trigger = %base.id,
            endpoint = %endpoint,
            methods = ?methods,
            "webhook trigger initialized"
        );

        Ok(Self {
            base,
            endpoint,
            methods,
            last_request: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &str {
        &self.base.id
    }

    pub fn pipeline_name(&self) -> &str {
        &self.base.pipeline_name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Accepted methods, uppercase
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn accepts(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

impl EventTrigger for WebhookTrigger {
    type Event = WebhookRequest;

    fn matches(&self, request: &WebhookRequest) -> bool {
        request.path == self.endpoint && self.accepts(&request.method)
    }

    fn record(&self, request: WebhookRequest) {
        *lock(&self.last_request) = Some(request);
    }

    fn take_parameters(&self) -> Parameters {
        let mut params = self.base.parameters();
        if let Some(request) = lock(&self.last_request).take() {
            insert_request(&mut params, request);
        }
        params
    }

    fn fire(&self, request: WebhookRequest) -> RunRequest {
        let mut params = self.base.parameters();
        {
            let mut slot = lock(&self.last_request);
            *slot = Some(request);
            if let Some(request) = slot.take() {
                insert_request(&mut params, request);
            }
        }
        self.base.request(params)
    }
}

fn string_map(map: BTreeMap<String, String>) -> Value {
    Value::Object(
        map.into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect::<Map<_, _>>(),
    )
}

fn insert_request(params: &mut Parameters, request: WebhookRequest) {
    params.insert("method".into(), Value::String(request.method));
    params.insert("endpoint".into(), Value::String(request.path));
    params.insert("args".into(), string_map(request.query));
    params.insert("headers".into(), string_map(request.headers));
    params.insert("data".into(), Value::String(request.body));
    params.insert("json_data".into(), request.json.unwrap_or(Value::Null));
}
