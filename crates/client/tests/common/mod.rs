//! Shared helpers: a scripted in-memory transport and client builders.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use osb_client::{BrokerClient, Transport};
use osb_domain::config::BrokerConfig;
use osb_domain::error::{Error, Result};
use osb_protocol::{ApiVersion, RequestDescriptor, TransportResponse};
use parking_lot::Mutex;
use tokio::time::Instant;

/// Replays queued responses in order and records every request sent.
///
/// When the queue is empty the `repeat` response (if any) is returned
/// forever; otherwise the call fails as a transport error.
#[derive(Default)]
pub struct ScriptedTransport {
    queue: Mutex<VecDeque<Result<TransportResponse>>>,
    repeat: Mutex<Option<TransportResponse>>,
    sent: Mutex<Vec<(Instant, RequestDescriptor)>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, resp: TransportResponse) {
        self.queue.lock().push_back(Ok(resp));
    }

    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push(TransportResponse::new(
            status,
            serde_json::to_vec(&body).unwrap(),
        ));
    }

    pub fn push_err(&self, err: Error) {
        self.queue.lock().push_back(Err(err));
    }

    pub fn repeat(&self, resp: TransportResponse) {
        *self.repeat.lock() = Some(resp);
    }

    pub fn sent(&self) -> Vec<RequestDescriptor> {
        self.sent.lock().iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn sent_at(&self) -> Vec<Instant> {
        self.sent.lock().iter().map(|(t, _)| *t).collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<TransportResponse> {
        self.sent.lock().push((Instant::now(), request));
        if let Some(next) = self.queue.lock().pop_front() {
            return next;
        }
        match self.repeat.lock().clone() {
            Some(resp) => Ok(resp),
            None => Err(Error::transport("script exhausted")),
        }
    }
}

pub fn config(version: ApiVersion) -> BrokerConfig {
    BrokerConfig {
        name: "test-broker".into(),
        url: "https://broker.test/".into(),
        api_version: Some(version.label().to_owned()),
        ..Default::default()
    }
}

pub fn client(transport: &Arc<ScriptedTransport>, version: ApiVersion) -> BrokerClient {
    BrokerClient::with_transport(&config(version), transport.clone()).unwrap()
}

pub fn in_progress(retry_after: Option<u64>) -> TransportResponse {
    let resp = TransportResponse::new(200, r#"{"state":"in progress"}"#);
    match retry_after {
        Some(secs) => resp.with_header("Retry-After", secs.to_string()),
        None => resp,
    }
}

pub fn finished(state: &str, description: &str) -> TransportResponse {
    TransportResponse::new(
        200,
        serde_json::to_vec(&serde_json::json!({"state": state, "description": description}))
            .unwrap(),
    )
}
