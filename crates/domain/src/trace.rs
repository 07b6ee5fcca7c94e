use serde::Serialize;

/// Structured trace events emitted across all osb crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    BrokerRequest {
        broker: String,
        operation: String,
        method: String,
        url: String,
        status: u16,
        duration_ms: u64,
    },
    AsyncAccepted {
        broker: String,
        operation: String,
        operation_key: Option<String>,
    },
    PollAttempt {
        broker: String,
        operation: String,
        attempt: u32,
        state: Option<String>,
        next_delay_ms: Option<u64>,
    },
    PollFinished {
        broker: String,
        operation: String,
        outcome: String,
        queries: u32,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "osb_event");
    }
}
