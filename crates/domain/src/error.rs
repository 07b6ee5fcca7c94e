use std::fmt;

/// Shared error type used across all osb crates.
///
/// Every variant is a distinct failure category so callers can branch on
/// the kind without inspecting messages. Local validation failures
/// (`MissingRequiredField`, `OperationNotAllowed`, `InvalidIdentityAssertion`,
/// `Config`) are raised before any I/O happens.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0} is required")]
    MissingRequiredField(&'static str),

    #[error("{operation} not allowed: {reason}")]
    OperationNotAllowed { operation: String, reason: String },

    #[error("invalid originating identity: {0}")]
    InvalidIdentityAssertion(String),

    #[error("transport: {message}")]
    Transport { message: String, timeout: bool },

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Broker(#[from] HttpStatusCodeError),

    #[error("polling cancelled after {queries} queries (deadline elapsed: {deadline_elapsed})")]
    PollCancelled { queries: u32, deadline_elapsed: bool },

    #[error("polling gave up after {attempts} failed queries: {last}")]
    PollExceededRetries { attempts: u32, last: Box<Error> },

    #[error("config: {0}")]
    Config(String),
}

impl Error {
    /// Build a transport failure that is not a timeout.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timeout: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timeout: true,
        }
    }

    /// The broker's status error, if this is one.
    pub fn as_broker(&self) -> Option<&HttpStatusCodeError> {
        match self {
            Self::Broker(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Whether the failure happened before anything was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::MissingRequiredField(_)
                | Self::OperationNotAllowed { .. }
                | Self::InvalidIdentityAssertion(_)
                | Self::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Broker-reported failures
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const ASYNC_REQUIRED: &str = "AsyncRequired";
const CONCURRENCY_ERROR: &str = "ConcurrencyError";
const APP_GUID_REQUIRED: &str = "RequiresApp";
const MAINTENANCE_INFO_CONFLICT: &str = "MaintenanceInfoConflict";

/// A response from the broker that was not the success shape the
/// operation expects.
///
/// `error_message` and `description` are copied from the broker's
/// `{"error": .., "description": ..}` body when present and are never
/// invented. `response_error` records why the body could not be decoded,
/// which covers both garbage failure bodies and garbage success bodies.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpStatusCodeError {
    pub status: u16,
    pub error_message: Option<String>,
    pub description: Option<String>,
    pub response_error: Option<String>,
}

impl HttpStatusCodeError {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn is_gone(&self) -> bool {
        self.status == 410
    }

    pub fn is_conflict(&self) -> bool {
        self.status == 409
    }

    /// The broker only supports this operation asynchronously.
    pub fn is_async_required(&self) -> bool {
        self.is_unprocessable_with(ASYNC_REQUIRED)
    }

    /// Another operation is in progress on the same resource.
    pub fn is_concurrency_error(&self) -> bool {
        self.is_unprocessable_with(CONCURRENCY_ERROR)
    }

    pub fn is_app_guid_required(&self) -> bool {
        self.is_unprocessable_with(APP_GUID_REQUIRED)
    }

    pub fn is_maintenance_info_conflict(&self) -> bool {
        self.is_unprocessable_with(MAINTENANCE_INFO_CONFLICT)
    }

    /// The body of the response could not be decoded.
    pub fn is_decode_failure(&self) -> bool {
        self.response_error.is_some()
    }

    fn is_unprocessable_with(&self, code: &str) -> bool {
        self.status == 422 && self.error_message.as_deref() == Some(code)
    }
}

impl fmt::Display for HttpStatusCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_unset(v: &Option<String>) -> &str {
            v.as_deref().unwrap_or("<unset>")
        }
        write!(
            f,
            "status: {}; error: {}; description: {}; response error: {}",
            self.status,
            or_unset(&self.error_message),
            or_unset(&self.description),
            or_unset(&self.response_error),
        )
    }
}
