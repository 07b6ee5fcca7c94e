//! Which message fields exist at which protocol version.
//!
//! The whole matrix lives in [`FIELD_GATES`]. The request builder scrubs
//! outgoing bodies with it and the response interpreter scrubs decoded
//! bodies with it, so neither side carries per-operation conditionals.
//!
//! Paths are dotted wire keys; a `[]` suffix descends into every element of
//! an array (`services[].plans[].schemas`).

use serde_json::Value;

use crate::operation::Operation;
use crate::version::ApiVersion;

/// The negotiated protocol features of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub version: ApiVersion,
    pub alpha: bool,
}

impl Negotiated {
    pub fn new(version: ApiVersion, alpha: bool) -> Self {
        Self { version, alpha }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    MinVersion(ApiVersion),
    Alpha,
}

impl Gate {
    pub fn allows(self, negotiated: Negotiated) -> bool {
        match self {
            Gate::MinVersion(v) => negotiated.version.at_least(v),
            Gate::Alpha => negotiated.alpha,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldGate {
    pub operation: Operation,
    pub direction: Direction,
    pub path: &'static str,
    pub gate: Gate,
}

const fn gate(
    operation: Operation,
    direction: Direction,
    path: &'static str,
    gate: Gate,
) -> FieldGate {
    FieldGate {
        operation,
        direction,
        path,
        gate,
    }
}

use self::Direction::{Request as Req, Response as Resp};
use crate::operation::Operation as Op;
use crate::version::ApiVersion as V;

pub const FIELD_GATES: &[FieldGate] = &[
    // Request bodies
    gate(Op::ProvisionInstance, Req, "context", Gate::MinVersion(V::V2_12)),
    gate(Op::UpdateInstance, Req, "context", Gate::MinVersion(V::V2_12)),
    gate(Op::Bind, Req, "context", Gate::MinVersion(V::V2_13)),
    // Catalog
    gate(Op::GetCatalog, Resp, "services[].instances_retrievable", Gate::Alpha),
    gate(Op::GetCatalog, Resp, "services[].bindings_retrievable", Gate::Alpha),
    gate(Op::GetCatalog, Resp, "services[].plans[].schemas", Gate::MinVersion(V::V2_13)),
    gate(Op::GetCatalog, Resp, "services[].plans[].plan_updateable", Gate::Alpha),
    gate(Op::GetCatalog, Resp, "services[].plans[].maximum_polling_duration", Gate::Alpha),
    gate(Op::GetCatalog, Resp, "services[].plans[].maintenance_info", Gate::Alpha),
    gate(Op::GetCatalog, Resp, "services[].plans[].binding_rotatable", Gate::MinVersion(V::V2_17)),
    // Instances
    gate(Op::ProvisionInstance, Resp, "metadata", Gate::MinVersion(V::V2_16)),
    gate(Op::UpdateInstance, Resp, "dashboard_url", Gate::MinVersion(V::V2_14)),
    gate(Op::UpdateInstance, Resp, "metadata", Gate::MinVersion(V::V2_16)),
    gate(Op::GetInstance, Resp, "metadata", Gate::MinVersion(V::V2_16)),
    // Bindings
    gate(Op::Bind, Resp, "endpoints", Gate::Alpha),
    gate(Op::Bind, Resp, "metadata", Gate::MinVersion(V::V2_16)),
    gate(Op::RotateBinding, Resp, "endpoints", Gate::Alpha),
    gate(Op::RotateBinding, Resp, "metadata", Gate::MinVersion(V::V2_16)),
    gate(Op::GetBinding, Resp, "endpoints", Gate::Alpha),
    gate(Op::GetBinding, Resp, "metadata", Gate::MinVersion(V::V2_16)),
    // Last operation
    gate(Op::PollLastOperation, Resp, "instance_usable", Gate::MinVersion(V::V2_16)),
    gate(Op::PollLastOperation, Resp, "update_repeatable", Gate::MinVersion(V::V2_16)),
    gate(Op::PollBindingLastOperation, Resp, "instance_usable", Gate::MinVersion(V::V2_16)),
    gate(Op::PollBindingLastOperation, Resp, "update_repeatable", Gate::MinVersion(V::V2_16)),
];

/// Gates that apply to one side of one operation.
pub fn gates_for(
    operation: Operation,
    direction: Direction,
) -> impl Iterator<Item = &'static FieldGate> {
    FIELD_GATES
        .iter()
        .filter(move |g| g.operation == operation && g.direction == direction)
}

/// Whether `path` may appear in the given message under `negotiated`.
/// Paths with no gate are always allowed.
pub fn field_allowed(
    operation: Operation,
    direction: Direction,
    path: &str,
    negotiated: Negotiated,
) -> bool {
    gates_for(operation, direction)
        .filter(|g| g.path == path)
        .all(|g| g.gate.allows(negotiated))
}

/// Remove every field the negotiated features do not allow.
///
/// Returns the gated paths that were actually present and removed.
pub fn scrub(
    operation: Operation,
    direction: Direction,
    negotiated: Negotiated,
    value: &mut Value,
) -> Vec<&'static str> {
    let mut removed = Vec::new();
    for g in gates_for(operation, direction) {
        if g.gate.allows(negotiated) {
            continue;
        }
        let segments: Vec<&str> = g.path.split('.').collect();
        if remove_path(value, &segments) {
            removed.push(g.path);
        }
    }
    if !removed.is_empty() {
        tracing::debug!(
            operation = %operation,
            ?direction,
            version = %negotiated.version,
            alpha = negotiated.alpha,
            fields = ?removed,
            "dropped fields not available at negotiated version"
        );
    }
    removed
}

fn remove_path(value: &mut Value, segments: &[&str]) -> bool {
    match segments {
        [] => false,
        [last] => value
            .as_object_mut()
            .map_or(false, |obj| obj.remove(*last).is_some()),
        [head, rest @ ..] => {
            if let Some(key) = head.strip_suffix("[]") {
                match value.get_mut(key).and_then(Value::as_array_mut) {
                    Some(items) => items
                        .iter_mut()
                        .fold(false, |acc, item| remove_path(item, rest) || acc),
                    None => false,
                }
            } else {
                value
                    .get_mut(*head)
                    .map_or(false, |inner| remove_path(inner, rest))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_path_is_well_formed() {
        for g in FIELD_GATES {
            assert!(!g.path.is_empty());
            assert!(!g.path.ends_with("[]"), "{} must name a field", g.path);
            assert!(g.path.split('.').all(|s| !s.is_empty()), "{}", g.path);
        }
    }

    #[test]
    fn request_gates_only_cover_operations_with_bodies() {
        for g in FIELD_GATES.iter().filter(|g| g.direction == Direction::Request) {
            assert!(matches!(
                g.operation,
                Operation::ProvisionInstance | Operation::UpdateInstance | Operation::Bind
            ));
        }
    }

    #[test]
    fn scrubs_nested_array_fields() {
        let mut catalog = json!({
            "services": [{
                "id": "s1",
                "instances_retrievable": true,
                "plans": [
                    {"id": "p1", "schemas": {}, "maintenance_info": {"version": "1.0.0"}},
                    {"id": "p2"}
                ]
            }]
        });
        let removed = scrub(
            Operation::GetCatalog,
            Direction::Response,
            Negotiated::new(ApiVersion::V2_12, false),
            &mut catalog,
        );
        assert!(removed.contains(&"services[].instances_retrievable"));
        assert!(removed.contains(&"services[].plans[].schemas"));
        assert!(removed.contains(&"services[].plans[].maintenance_info"));
        assert_eq!(
            catalog,
            json!({"services": [{"id": "s1", "plans": [{"id": "p1"}, {"id": "p2"}]}]})
        );
    }

    #[test]
    fn alpha_and_version_keep_fields() {
        let original = json!({"endpoints": [], "metadata": {"expires_at": "x"}});
        let mut body = original.clone();
        let removed = scrub(
            Operation::Bind,
            Direction::Response,
            Negotiated::new(ApiVersion::V2_17, true),
            &mut body,
        );
        assert!(removed.is_empty());
        assert_eq!(body, original);
    }

    #[test]
    fn field_allowed_consults_table() {
        let old = Negotiated::new(ApiVersion::V2_11, false);
        let new = Negotiated::new(ApiVersion::V2_12, false);
        assert!(!field_allowed(Operation::ProvisionInstance, Direction::Request, "context", old));
        assert!(field_allowed(Operation::ProvisionInstance, Direction::Request, "context", new));
        assert!(field_allowed(Operation::ProvisionInstance, Direction::Request, "plan_id", old));
    }

    #[test]
    fn non_object_bodies_are_left_alone() {
        let mut v = json!(["endpoints"]);
        let removed = scrub(
            Operation::Bind,
            Direction::Response,
            Negotiated::new(ApiVersion::V2_11, false),
            &mut v,
        );
        assert!(removed.is_empty());
    }
}
