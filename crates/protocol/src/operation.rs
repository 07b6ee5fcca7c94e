//! The closed set of broker operations and the per-operation contract:
//! HTTP method, minimum protocol version, async support, and which status
//! codes mean synchronous success.

use std::fmt;

use osb_domain::error::{Error, Result};

use crate::version::ApiVersion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetCatalog,
    ProvisionInstance,
    UpdateInstance,
    DeprovisionInstance,
    GetInstance,
    PollLastOperation,
    Bind,
    RotateBinding,
    Unbind,
    GetBinding,
    PollBindingLastOperation,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::GetCatalog,
        Operation::ProvisionInstance,
        Operation::UpdateInstance,
        Operation::DeprovisionInstance,
        Operation::GetInstance,
        Operation::PollLastOperation,
        Operation::Bind,
        Operation::RotateBinding,
        Operation::Unbind,
        Operation::GetBinding,
        Operation::PollBindingLastOperation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::GetCatalog => "GetCatalog",
            Operation::ProvisionInstance => "ProvisionInstance",
            Operation::UpdateInstance => "UpdateInstance",
            Operation::DeprovisionInstance => "DeprovisionInstance",
            Operation::GetInstance => "GetInstance",
            Operation::PollLastOperation => "PollLastOperation",
            Operation::Bind => "Bind",
            Operation::RotateBinding => "RotateBinding",
            Operation::Unbind => "Unbind",
            Operation::GetBinding => "GetBinding",
            Operation::PollBindingLastOperation => "PollBindingLastOperation",
        }
    }

    pub fn method(self) -> HttpMethod {
        match self {
            Operation::GetCatalog
            | Operation::GetInstance
            | Operation::PollLastOperation
            | Operation::GetBinding
            | Operation::PollBindingLastOperation => HttpMethod::Get,
            Operation::ProvisionInstance | Operation::Bind | Operation::RotateBinding => {
                HttpMethod::Put
            }
            Operation::UpdateInstance => HttpMethod::Patch,
            Operation::DeprovisionInstance | Operation::Unbind => HttpMethod::Delete,
        }
    }

    /// First protocol version in which the operation exists.
    pub fn min_version(self) -> ApiVersion {
        match self {
            Operation::GetInstance | Operation::GetBinding | Operation::PollBindingLastOperation => {
                ApiVersion::V2_14
            }
            Operation::RotateBinding => ApiVersion::V2_17,
            _ => ApiVersion::V2_11,
        }
    }

    /// First protocol version in which the operation may complete
    /// asynchronously, or `None` if it never does.
    pub fn async_since(self) -> Option<ApiVersion> {
        match self {
            Operation::ProvisionInstance
            | Operation::UpdateInstance
            | Operation::DeprovisionInstance => Some(ApiVersion::V2_11),
            Operation::Bind | Operation::Unbind => Some(ApiVersion::V2_14),
            Operation::RotateBinding => Some(ApiVersion::V2_17),
            _ => None,
        }
    }

    /// Status codes that mean the operation completed synchronously.
    pub fn sync_statuses(self) -> &'static [u16] {
        match self {
            Operation::ProvisionInstance | Operation::Bind | Operation::RotateBinding => &[200, 201],
            _ => &[200],
        }
    }

    /// 410 Gone means the resource is already absent: success for deletes.
    pub fn gone_is_success(self) -> bool {
        matches!(self, Operation::DeprovisionInstance | Operation::Unbind)
    }

    /// The status query that tracks this operation when it runs async.
    pub fn last_operation(self) -> Option<Operation> {
        match self {
            Operation::ProvisionInstance
            | Operation::UpdateInstance
            | Operation::DeprovisionInstance => Some(Operation::PollLastOperation),
            Operation::Bind | Operation::RotateBinding | Operation::Unbind => {
                Some(Operation::PollBindingLastOperation)
            }
            _ => None,
        }
    }

    /// Fail fast when the operation, or async handling of it, does not
    /// exist at `version`.
    pub fn check_allowed(self, version: ApiVersion, accepts_incomplete: bool) -> Result<()> {
        let required = self.min_version();
        if !version.at_least(required) {
            return Err(self.not_allowed(format!(
                "must have API version >= {required}. Current: {version}"
            )));
        }
        if accepts_incomplete {
            match self.async_since() {
                Some(since) if version.at_least(since) => {}
                Some(since) => {
                    return Err(self.not_allowed(format!(
                        "asynchronous handling requires API version >= {since}. Current: {version}"
                    )))
                }
                None => {
                    return Err(self.not_allowed(
                        "operation does not support asynchronous handling".into(),
                    ))
                }
            }
        }
        Ok(())
    }

    fn not_allowed(self, reason: String) -> Error {
        Error::OperationNotAllowed {
            operation: self.name().to_owned(),
            reason,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
