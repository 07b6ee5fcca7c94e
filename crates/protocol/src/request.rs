//! Turns a typed request into a transport-agnostic [`RequestDescriptor`].
//!
//! Nothing here performs I/O. Every failure is local: a missing identifier,
//! an operation or async mode the negotiated version does not have, or a
//! body that cannot be encoded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use osb_domain::config::Credential;
use osb_domain::error::{Error, Result};
use serde::Serialize;
use uuid::Uuid;

use crate::gating::{self, Direction, Negotiated};
use crate::identity::OriginatingIdentity;
use crate::operation::{HttpMethod, Operation};
use crate::types::*;
use crate::version::ApiVersion;

pub const API_VERSION_HEADER: &str = "X-Broker-API-Version";
pub const REQUEST_IDENTITY_HEADER: &str = "X-Broker-API-Request-Identity";
pub const ORIGINATING_IDENTITY_HEADER: &str = "X-Broker-API-Originating-Identity";
pub const POLLING_DELAY_HEADER: &str = "Retry-After";
pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const JSON_CONTENT_TYPE: &str = "application/json";

pub const ACCEPTS_INCOMPLETE: &str = "accepts_incomplete";
const SERVICE_ID: &str = "service_id";
const PLAN_ID: &str = "plan_id";
const OPERATION: &str = "operation";

/// Query keys owned by the protocol; caller extras may not set them.
pub const RESERVED_QUERY_KEYS: [&str; 4] = [ACCEPTS_INCOMPLETE, SERVICE_ID, PLAN_ID, OPERATION];

/// Originating identity headers were introduced in 2.13.
const ORIGINATING_IDENTITY_SINCE: ApiVersion = ApiVersion::V2_13;

/// A fully-shaped HTTP request, ready for any transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub operation: Operation,
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl RequestDescriptor {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the caller told the broker it may answer asynchronously.
    pub fn accepts_incomplete(&self) -> bool {
        self.query_param(ACCEPTS_INCOMPLETE) == Some("true")
    }
}

/// Client-wide settings the builder needs on every call.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// Broker URL without a trailing slash.
    pub base_url: &'a str,
    pub negotiated: Negotiated,
    pub credential: Option<&'a Credential>,
    /// Caller-supplied query parameters, appended after the protocol's own.
    /// Keys in [`RESERVED_QUERY_KEYS`] are dropped.
    pub extra_query: &'a [(String, String)],
}

/// One operation together with its request record.
#[derive(Debug, Clone, Copy)]
pub enum OperationRequest<'a> {
    GetCatalog,
    ProvisionInstance(&'a ProvisionRequest),
    UpdateInstance(&'a UpdateInstanceRequest),
    DeprovisionInstance(&'a DeprovisionRequest),
    GetInstance(&'a GetInstanceRequest),
    PollLastOperation(&'a LastOperationRequest),
    Bind(&'a BindRequest),
    RotateBinding(&'a RotateBindingRequest),
    Unbind(&'a UnbindRequest),
    GetBinding(&'a GetBindingRequest),
    PollBindingLastOperation(&'a BindingLastOperationRequest),
}

impl<'a> OperationRequest<'a> {
    pub fn operation(&self) -> Operation {
        match self {
            Self::GetCatalog => Operation::GetCatalog,
            Self::ProvisionInstance(_) => Operation::ProvisionInstance,
            Self::UpdateInstance(_) => Operation::UpdateInstance,
            Self::DeprovisionInstance(_) => Operation::DeprovisionInstance,
            Self::GetInstance(_) => Operation::GetInstance,
            Self::PollLastOperation(_) => Operation::PollLastOperation,
            Self::Bind(_) => Operation::Bind,
            Self::RotateBinding(_) => Operation::RotateBinding,
            Self::Unbind(_) => Operation::Unbind,
            Self::GetBinding(_) => Operation::GetBinding,
            Self::PollBindingLastOperation(_) => Operation::PollBindingLastOperation,
        }
    }

    pub fn accepts_incomplete(&self) -> bool {
        match self {
            Self::ProvisionInstance(r) => r.accepts_incomplete,
            Self::UpdateInstance(r) => r.accepts_incomplete,
            Self::DeprovisionInstance(r) => r.accepts_incomplete,
            Self::Bind(r) => r.accepts_incomplete,
            Self::RotateBinding(r) => r.accepts_incomplete,
            Self::Unbind(r) => r.accepts_incomplete,
            _ => false,
        }
    }

    pub fn originating_identity(&self) -> Option<&'a OriginatingIdentity> {
        match *self {
            Self::GetCatalog => None,
            Self::ProvisionInstance(r) => r.originating_identity.as_ref(),
            Self::UpdateInstance(r) => r.originating_identity.as_ref(),
            Self::DeprovisionInstance(r) => r.originating_identity.as_ref(),
            Self::GetInstance(r) => r.originating_identity.as_ref(),
            Self::PollLastOperation(r) => r.originating_identity.as_ref(),
            Self::Bind(r) => r.originating_identity.as_ref(),
            Self::RotateBinding(r) => r.originating_identity.as_ref(),
            Self::Unbind(r) => r.originating_identity.as_ref(),
            Self::GetBinding(r) => r.originating_identity.as_ref(),
            Self::PollBindingLastOperation(r) => r.originating_identity.as_ref(),
        }
    }

    /// Check that every identifier the operation needs is present.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::GetCatalog => Ok(()),
            Self::ProvisionInstance(r) => {
                required("instanceID", &r.instance_id)?;
                required("serviceID", &r.service_id)?;
                required("planID", &r.plan_id)?;
                required("organizationGUID", &r.organization_guid)?;
                required("spaceGUID", &r.space_guid)
            }
            Self::UpdateInstance(r) => {
                required("instanceID", &r.instance_id)?;
                required("serviceID", &r.service_id)?;
                if let Some(plan_id) = &r.plan_id {
                    required("planID", plan_id)?;
                }
                Ok(())
            }
            Self::DeprovisionInstance(r) => {
                required("instanceID", &r.instance_id)?;
                required("serviceID", &r.service_id)?;
                required("planID", &r.plan_id)
            }
            Self::GetInstance(r) => required("instanceID", &r.instance_id),
            Self::PollLastOperation(r) => required("instanceID", &r.instance_id),
            Self::Bind(r) => {
                required("bindingID", &r.binding_id)?;
                required("instanceID", &r.instance_id)?;
                required("serviceID", &r.service_id)?;
                required("planID", &r.plan_id)
            }
            Self::RotateBinding(r) => {
                required("instanceID", &r.instance_id)?;
                required("bindingID", &r.binding_id)?;
                required("predecessorBindingID", &r.predecessor_binding_id)
            }
            Self::Unbind(r) => {
                required("instanceID", &r.instance_id)?;
                required("bindingID", &r.binding_id)?;
                required("serviceID", &r.service_id)?;
                required("planID", &r.plan_id)
            }
            Self::GetBinding(r) => {
                required("instanceID", &r.instance_id)?;
                required("bindingID", &r.binding_id)
            }
            Self::PollBindingLastOperation(r) => {
                required("instanceID", &r.instance_id)?;
                required("bindingID", &r.binding_id)
            }
        }
    }

    /// Base-URL-relative path. Identifiers are interpolated verbatim.
    pub fn path(&self) -> String {
        match self {
            Self::GetCatalog => "/v2/catalog".to_owned(),
            Self::ProvisionInstance(r) => instance_path(&r.instance_id),
            Self::UpdateInstance(r) => instance_path(&r.instance_id),
            Self::DeprovisionInstance(r) => instance_path(&r.instance_id),
            Self::GetInstance(r) => instance_path(&r.instance_id),
            Self::PollLastOperation(r) => {
                format!("{}/last_operation", instance_path(&r.instance_id))
            }
            Self::Bind(r) => binding_path(&r.instance_id, &r.binding_id),
            Self::RotateBinding(r) => binding_path(&r.instance_id, &r.binding_id),
            Self::Unbind(r) => binding_path(&r.instance_id, &r.binding_id),
            Self::GetBinding(r) => binding_path(&r.instance_id, &r.binding_id),
            Self::PollBindingLastOperation(r) => format!(
                "{}/last_operation",
                binding_path(&r.instance_id, &r.binding_id)
            ),
        }
    }

    /// Operation-defined query parameters (not including `accepts_incomplete`).
    pub fn query(&self) -> Vec<(String, String)> {
        let mut q = Vec::new();
        match self {
            Self::DeprovisionInstance(r) => {
                push(&mut q, SERVICE_ID, &r.service_id);
                push(&mut q, PLAN_ID, &r.plan_id);
            }
            Self::Unbind(r) => {
                push(&mut q, SERVICE_ID, &r.service_id);
                push(&mut q, PLAN_ID, &r.plan_id);
            }
            Self::GetInstance(r) => {
                push_opt(&mut q, SERVICE_ID, r.service_id.as_deref());
                push_opt(&mut q, PLAN_ID, r.plan_id.as_deref());
            }
            Self::PollLastOperation(r) => {
                push_opt(&mut q, SERVICE_ID, r.service_id.as_deref());
                push_opt(&mut q, PLAN_ID, r.plan_id.as_deref());
                push_opt(&mut q, OPERATION, r.operation_key.as_ref().map(|k| k.as_str()));
            }
            Self::PollBindingLastOperation(r) => {
                push_opt(&mut q, SERVICE_ID, r.service_id.as_deref());
                push_opt(&mut q, PLAN_ID, r.plan_id.as_deref());
                push_opt(&mut q, OPERATION, r.operation_key.as_ref().map(|k| k.as_str()));
            }
            _ => {}
        }
        q
    }

    /// The JSON body with version/alpha-gated fields removed, or `None` for
    /// operations that carry no body.
    pub fn body(&self, negotiated: Negotiated) -> Result<Option<Vec<u8>>> {
        match self {
            Self::ProvisionInstance(r) => self.encode(*r, negotiated).map(Some),
            Self::UpdateInstance(r) => self.encode(*r, negotiated).map(Some),
            Self::Bind(r) => self.encode(*r, negotiated).map(Some),
            Self::RotateBinding(r) => self.encode(*r, negotiated).map(Some),
            _ => Ok(None),
        }
    }

    fn encode<T: Serialize>(&self, record: &T, negotiated: Negotiated) -> Result<Vec<u8>> {
        let mut value = serde_json::to_value(record)?;
        gating::scrub(self.operation(), Direction::Request, negotiated, &mut value);
        Ok(serde_json::to_vec(&value)?)
    }
}

/// Build the wire request for `request` under the client-wide `ctx`.
///
/// Order of checks: operation version gate, required fields, async gate,
/// then body encoding.
pub fn build_request(
    request: OperationRequest<'_>,
    ctx: &RequestContext<'_>,
) -> Result<RequestDescriptor> {
    let operation = request.operation();
    let version = ctx.negotiated.version;

    operation.check_allowed(version, false)?;
    request.validate()?;
    let accepts_incomplete = request.accepts_incomplete();
    operation.check_allowed(version, accepts_incomplete)?;

    let mut query = request.query();
    if accepts_incomplete {
        query.push((ACCEPTS_INCOMPLETE.to_owned(), "true".to_owned()));
    }
    for (key, value) in ctx.extra_query {
        if RESERVED_QUERY_KEYS.contains(&key.as_str()) {
            tracing::warn!(operation = %operation, key = %key, "dropping reserved query parameter");
            continue;
        }
        query.push((key.clone(), value.clone()));
    }

    let body = request.body(ctx.negotiated)?;

    let mut headers = vec![
        (API_VERSION_HEADER.to_owned(), version.label().to_owned()),
        (REQUEST_IDENTITY_HEADER.to_owned(), Uuid::new_v4().to_string()),
    ];
    if body.is_some() {
        headers.push((CONTENT_TYPE_HEADER.to_owned(), JSON_CONTENT_TYPE.to_owned()));
    }
    if let Some(credential) = ctx.credential {
        headers.push((AUTHORIZATION_HEADER.to_owned(), authorization(credential)));
    }
    if let Some(identity) = request.originating_identity() {
        if version.at_least(ORIGINATING_IDENTITY_SINCE) {
            headers.push((
                ORIGINATING_IDENTITY_HEADER.to_owned(),
                identity.header_value(),
            ));
        }
    }

    Ok(RequestDescriptor {
        operation,
        method: operation.method(),
        url: format!("{}{}", ctx.base_url, request.path()),
        query,
        headers,
        body,
    })
}

/// `Authorization` header value for a credential.
pub fn authorization(credential: &Credential) -> String {
    match credential {
        Credential::Basic { username, password } => {
            format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
        }
        Credential::Bearer { token } => format!("Bearer {token}"),
    }
}

fn required(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        Err(Error::MissingRequiredField(field))
    } else {
        Ok(())
    }
}

fn instance_path(instance_id: &str) -> String {
    format!("/v2/service_instances/{instance_id}")
}

fn binding_path(instance_id: &str, binding_id: &str) -> String {
    format!("/v2/service_instances/{instance_id}/service_bindings/{binding_id}")
}

fn push(q: &mut Vec<(String, String)>, key: &str, value: &str) {
    q.push((key.to_owned(), value.to_owned()));
}

fn push_opt(q: &mut Vec<(String, String)>, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        push(q, key, v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(version: ApiVersion) -> RequestContext<'static> {
        RequestContext {
            base_url: "https://broker.example.com",
            negotiated: Negotiated::new(version, false),
            credential: None,
            extra_query: &[],
        }
    }

    #[test]
    fn authorization_values() {
        let basic = Credential::Basic {
            username: "admin".into(),
            password: "secret".into(),
        };
        assert_eq!(authorization(&basic), "Basic YWRtaW46c2VjcmV0");
        let bearer = Credential::Bearer {
            token: "abc".into(),
        };
        assert_eq!(authorization(&bearer), "Bearer abc");
    }

    #[test]
    fn paths_interpolate_raw_ids() {
        let r = BindingLastOperationRequest {
            instance_id: "inst/1".into(),
            binding_id: "b 2".into(),
            ..Default::default()
        };
        assert_eq!(
            OperationRequest::PollBindingLastOperation(&r).path(),
            "/v2/service_instances/inst/1/service_bindings/b 2/last_operation"
        );
    }

    #[test]
    fn request_identity_is_fresh_per_call() {
        let a = build_request(OperationRequest::GetCatalog, &ctx(ApiVersion::V2_13)).unwrap();
        let b = build_request(OperationRequest::GetCatalog, &ctx(ApiVersion::V2_13)).unwrap();
        let id_a = a.header(REQUEST_IDENTITY_HEADER).unwrap();
        let id_b = b.header(REQUEST_IDENTITY_HEADER).unwrap();
        assert_ne!(id_a, id_b);
        assert!(Uuid::parse_str(id_a).is_ok());
    }

    #[test]
    fn version_gate_runs_before_validation() {
        let r = RotateBindingRequest::default();
        let err = build_request(OperationRequest::RotateBinding(&r), &ctx(ApiVersion::V2_16))
            .unwrap_err();
        assert!(matches!(err, Error::OperationNotAllowed { .. }));

        let err = build_request(OperationRequest::RotateBinding(&r), &ctx(ApiVersion::V2_17))
            .unwrap_err();
        assert!(matches!(err, Error::MissingRequiredField("instanceID")));
    }

    #[test]
    fn empty_optional_plan_is_rejected_on_update() {
        let r = UpdateInstanceRequest {
            instance_id: "i".into(),
            service_id: "s".into(),
            plan_id: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(
            OperationRequest::UpdateInstance(&r).validate(),
            Err(Error::MissingRequiredField("planID"))
        ));
    }
}
