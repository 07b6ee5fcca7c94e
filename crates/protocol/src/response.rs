//! Classifies a transport response into an [`OperationOutcome`].
//!
//! Status dispatch:
//! - a status in the operation's sync set decodes the typed response
//! - 202 is async acceptance, but only when the request asked for it
//! - 410 on deprovision/unbind is success (already gone)
//! - anything else is a broker failure built from `{error, description}`
//!
//! Undecodable bodies never become transport errors: they produce an
//! [`HttpStatusCodeError`] with the real status and `response_error` set.

use std::time::Duration;

use osb_domain::error::{Error, HttpStatusCodeError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::gating::{self, Direction, Negotiated};
use crate::operation::Operation;
use crate::request::POLLING_DELAY_HEADER;
use crate::types::{LastOperationResponse, OperationKey};

const ACCEPTED: u16 = 202;
const GONE: u16 = 410;

/// What a transport hands back: status, headers, fully-read body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `Retry-After` as a positive number of seconds.
    pub fn retry_after(&self) -> Option<Duration> {
        let secs: u64 = self.header(POLLING_DELAY_HEADER)?.trim().parse().ok()?;
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}

/// Result of one operation call.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome<T> {
    /// The broker finished the work before responding.
    Sync(T),
    /// The broker accepted the work; poll the matching last-operation query.
    Async {
        response: T,
        operation: Option<OperationKey>,
    },
    /// 410 on a delete: the resource was already absent.
    Gone,
}

impl<T> OperationOutcome<T> {
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async { .. })
    }

    pub fn operation_key(&self) -> Option<&OperationKey> {
        match self {
            Self::Async { operation, .. } => operation.as_ref(),
            _ => None,
        }
    }

    /// The typed response, if the outcome carried one.
    pub fn into_response(self) -> Option<T> {
        match self {
            Self::Sync(r) | Self::Async { response: r, .. } => Some(r),
            Self::Gone => None,
        }
    }
}

/// What the interpreter needs to know about the request that was sent.
#[derive(Debug, Clone, Copy)]
pub struct ResponseContext {
    pub operation: Operation,
    pub negotiated: Negotiated,
    pub accepts_incomplete: bool,
}

pub fn interpret<T: DeserializeOwned>(
    response: &TransportResponse,
    ctx: &ResponseContext,
) -> Result<OperationOutcome<T>> {
    let status = response.status;
    let op = ctx.operation;

    if op.sync_statuses().contains(&status) {
        return decode(op, ctx.negotiated, status, &response.body).map(OperationOutcome::Sync);
    }
    if status == ACCEPTED && ctx.accepts_incomplete && op.async_since().is_some() {
        let mut value = parse(op, status, &response.body)?;
        let operation = value
            .get("operation")
            .and_then(Value::as_str)
            .map(OperationKey::from);
        if let Some(obj) = value.as_object_mut() {
            obj.remove("operation");
        }
        let response = decode_value(op, ctx.negotiated, status, value)?;
        return Ok(OperationOutcome::Async {
            response,
            operation,
        });
    }
    if status == GONE && op.gone_is_success() {
        return Ok(OperationOutcome::Gone);
    }
    if status == ACCEPTED {
        tracing::warn!(
            operation = %op,
            "broker answered 202 to a request that did not accept incomplete results"
        );
    }
    Err(failure(status, &response.body).into())
}

/// Like [`interpret`] for operations that never complete asynchronously.
pub fn interpret_sync<T: DeserializeOwned>(
    response: &TransportResponse,
    operation: Operation,
    negotiated: Negotiated,
) -> Result<T> {
    let ctx = ResponseContext {
        operation,
        negotiated,
        accepts_incomplete: false,
    };
    match interpret(response, &ctx)? {
        OperationOutcome::Sync(r) => Ok(r),
        _ => Err(failure(response.status, &response.body).into()),
    }
}

/// Decode a last-operation response and attach the broker's polling hint.
pub fn interpret_last_operation(
    response: &TransportResponse,
    operation: Operation,
    negotiated: Negotiated,
) -> Result<LastOperationResponse> {
    let mut status: LastOperationResponse = interpret_sync(response, operation, negotiated)?;
    status.poll_delay = response.retry_after();
    Ok(status)
}

/// Build the broker error for a non-success response.
///
/// `error` and `description` are copied only when present as strings. A
/// body that is not JSON at all, empty included, is recorded in
/// `response_error`.
pub fn failure(status: u16, body: &[u8]) -> HttpStatusCodeError {
    let mut err = HttpStatusCodeError::new(status);
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => {
            err.error_message = string_field(&value, "error");
            err.description = string_field(&value, "description");
        }
        Err(e) => err.response_error = Some(e.to_string()),
    }
    err
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn decode<T: DeserializeOwned>(
    operation: Operation,
    negotiated: Negotiated,
    status: u16,
    body: &[u8],
) -> Result<T> {
    let value = parse(operation, status, body)?;
    decode_value(operation, negotiated, status, value)
}

/// Deletes may answer with no body at all, which reads as `{}`. Any other
/// operation needs a JSON document.
fn parse(operation: Operation, status: u16, body: &[u8]) -> Result<Value> {
    if operation.gone_is_success() && body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body).map_err(|e| decode_error(status, e))
}

fn decode_value<T: DeserializeOwned>(
    operation: Operation,
    negotiated: Negotiated,
    status: u16,
    mut value: Value,
) -> Result<T> {
    gating::scrub(operation, Direction::Response, negotiated, &mut value);
    serde_json::from_value(value).map_err(|e| decode_error(status, e))
}

fn decode_error(status: u16, e: serde_json::Error) -> Error {
    Error::Broker(HttpStatusCodeError {
        status,
        response_error: Some(e.to_string()),
        ..Default::default()
    })
}
