use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identity::OriginatingIdentity;

/// Broker-issued token tying status queries to one asynchronous action.
/// Passed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationKey(pub String);

impl OperationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for OperationKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET .../last_operation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Status query for an instance operation. All fields but the instance id
/// are optional hints sent in the query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LastOperationRequest {
    pub instance_id: String,
    pub service_id: Option<String>,
    pub plan_id: Option<String>,
    pub operation_key: Option<OperationKey>,
    pub originating_identity: Option<OriginatingIdentity>,
}

/// Status query for a binding operation. 2.14+.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingLastOperationRequest {
    pub instance_id: String,
    pub binding_id: String,
    pub service_id: Option<String>,
    pub plan_id: Option<String>,
    pub operation_key: Option<OperationKey>,
    pub originating_identity: Option<OriginatingIdentity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastOperationState {
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
}

impl LastOperationState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, LastOperationState::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LastOperationState::InProgress => "in progress",
            LastOperationState::Succeeded => "succeeded",
            LastOperationState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastOperationResponse {
    pub state: LastOperationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Read from 2.16.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_usable: Option<bool>,
    /// Read from 2.16.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_repeatable: Option<bool>,
    /// Broker's hint for the next query, from the `Retry-After` header.
    #[serde(skip)]
    pub poll_delay: Option<Duration>,
}
