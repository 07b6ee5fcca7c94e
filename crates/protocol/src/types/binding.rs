use serde::{Deserialize, Serialize};

use super::JsonObject;
use crate::identity::OriginatingIdentity;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PUT /v2/service_instances/:instance_id/service_bindings/:binding_id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindRequest {
    #[serde(skip)]
    pub binding_id: String,
    #[serde(skip)]
    pub instance_id: String,
    /// Async bind is only allowed from 2.14.
    #[serde(skip)]
    pub accepts_incomplete: bool,
    pub service_id: String,
    pub plan_id: String,
    /// Deprecated in favour of `bind_resource.app_guid`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_resource: Option<BindResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<JsonObject>,
    /// Sent from 2.13.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<JsonObject>,
    #[serde(skip)]
    pub originating_identity: Option<OriginatingIdentity>,
}

/// The resource being bound to the instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindResource {
    #[serde(default, alias = "appGuid", skip_serializing_if = "Option::is_none")]
    pub app_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

impl BindResource {
    /// True when neither an app nor a route is named.
    pub fn is_empty(&self) -> bool {
        self.app_guid.as_deref().map_or(true, str::is_empty)
            && self.route.as_deref().map_or(true, str::is_empty)
    }
}

/// Response to a bind or a binding rotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<JsonObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog_drain_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
    /// Alpha.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<Endpoint>>,
    /// Read from 2.16.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BindingMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointProtocol {
    Tcp,
    Udp,
    All,
}

/// A network endpoint the application uses to reach the instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub ports: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<EndpointProtocol>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub driver: String,
    pub container_dir: String,
    /// `r` or `rw`.
    pub mode: String,
    pub device_type: String,
    pub device: VolumeMountDevice,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeMountDevice {
    pub volume_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_config: Option<JsonObject>,
}

/// Lifetime hints for a binding's credentials (RFC 3339 timestamps).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renew_before: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Binding rotation (PUT with a predecessor)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Create `binding_id` as a rotation of `predecessor_binding_id`. 2.17+.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RotateBindingRequest {
    #[serde(skip)]
    pub instance_id: String,
    #[serde(skip)]
    pub binding_id: String,
    #[serde(skip)]
    pub accepts_incomplete: bool,
    pub predecessor_binding_id: String,
    #[serde(skip)]
    pub originating_identity: Option<OriginatingIdentity>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DELETE .../service_bindings/:binding_id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnbindRequest {
    pub instance_id: String,
    pub binding_id: String,
    /// Async unbind is only allowed from 2.14.
    pub accepts_incomplete: bool,
    pub service_id: String,
    pub plan_id: String,
    pub originating_identity: Option<OriginatingIdentity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnbindResponse {}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GET .../service_bindings/:binding_id
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetBindingRequest {
    pub instance_id: String,
    pub binding_id: String,
    pub originating_identity: Option<OriginatingIdentity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetBindingResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<JsonObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog_drain_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<JsonObject>,
    /// Alpha.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<Endpoint>>,
    /// Read from 2.16.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BindingMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_resource_emptiness() {
        assert!(BindResource::default().is_empty());
        assert!(BindResource {
            app_guid: Some(String::new()),
            route: None,
        }
        .is_empty());
        assert!(!BindResource {
            app_guid: None,
            route: Some("example.com".into()),
        }
        .is_empty());
    }

    #[test]
    fn bind_resource_accepts_camel_case_app_guid() {
        let r: BindResource = serde_json::from_str(r#"{"appGuid":"app-1"}"#).unwrap();
        assert_eq!(r.app_guid.as_deref(), Some("app-1"));
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"app_guid":"app-1"}"#);
    }

    #[test]
    fn rotate_body_is_only_the_predecessor() {
        let r = RotateBindingRequest {
            instance_id: "i".into(),
            binding_id: "b".into(),
            accepts_incomplete: true,
            predecessor_binding_id: "old".into(),
            originating_identity: None,
        };
        assert_eq!(
            serde_json::to_string(&r).unwrap(),
            r#"{"predecessor_binding_id":"old"}"#
        );
    }
}
