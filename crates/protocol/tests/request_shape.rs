use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use osb_domain::config::Credential;
use osb_domain::error::Error;
use osb_protocol::request::{
    ACCEPTS_INCOMPLETE, API_VERSION_HEADER, AUTHORIZATION_HEADER, CONTENT_TYPE_HEADER,
    ORIGINATING_IDENTITY_HEADER,
};
use osb_protocol::types::*;
use osb_protocol::{
    build_request, ApiVersion, HttpMethod, Negotiated, Operation, OperationRequest,
    OriginatingIdentity, RequestContext,
};
use serde_json::{json, Value};

const BASE: &str = "https://broker.example.com";

fn ctx(version: ApiVersion) -> RequestContext<'static> {
    RequestContext {
        base_url: BASE,
        negotiated: Negotiated::new(version, false),
        credential: None,
        extra_query: &[],
    }
}

fn identity() -> OriginatingIdentity {
    OriginatingIdentity::new("cloudfoundry", r#"{"user_id":"683ea748"}"#).unwrap()
}

fn provision() -> ProvisionRequest {
    let mut context = JsonObject::new();
    context.insert("platform".into(), json!("cloudfoundry"));
    ProvisionRequest {
        instance_id: "inst-1".into(),
        service_id: "svc".into(),
        plan_id: "plan".into(),
        organization_guid: "org".into(),
        space_guid: "space".into(),
        context: Some(context),
        ..Default::default()
    }
}

fn full_requests() -> (
    ProvisionRequest,
    UpdateInstanceRequest,
    DeprovisionRequest,
    GetInstanceRequest,
    LastOperationRequest,
    BindRequest,
    RotateBindingRequest,
    UnbindRequest,
    GetBindingRequest,
    BindingLastOperationRequest,
) {
    (
        provision(),
        UpdateInstanceRequest {
            instance_id: "i".into(),
            service_id: "s".into(),
            ..Default::default()
        },
        DeprovisionRequest {
            instance_id: "i".into(),
            service_id: "s".into(),
            plan_id: "p".into(),
            ..Default::default()
        },
        GetInstanceRequest {
            instance_id: "i".into(),
            ..Default::default()
        },
        LastOperationRequest {
            instance_id: "i".into(),
            ..Default::default()
        },
        BindRequest {
            instance_id: "i".into(),
            binding_id: "b".into(),
            service_id: "s".into(),
            plan_id: "p".into(),
            ..Default::default()
        },
        RotateBindingRequest {
            instance_id: "i".into(),
            binding_id: "b2".into(),
            predecessor_binding_id: "b1".into(),
            ..Default::default()
        },
        UnbindRequest {
            instance_id: "i".into(),
            binding_id: "b".into(),
            service_id: "s".into(),
            plan_id: "p".into(),
            ..Default::default()
        },
        GetBindingRequest {
            instance_id: "i".into(),
            binding_id: "b".into(),
            ..Default::default()
        },
        BindingLastOperationRequest {
            instance_id: "i".into(),
            binding_id: "b".into(),
            ..Default::default()
        },
    )
}

#[test]
fn every_operation_is_gated_by_its_minimum_version() {
    let (p, u, d, gi, lo, b, r, ub, gb, blo) = full_requests();
    let requests = [
        OperationRequest::GetCatalog,
        OperationRequest::ProvisionInstance(&p),
        OperationRequest::UpdateInstance(&u),
        OperationRequest::DeprovisionInstance(&d),
        OperationRequest::GetInstance(&gi),
        OperationRequest::PollLastOperation(&lo),
        OperationRequest::Bind(&b),
        OperationRequest::RotateBinding(&r),
        OperationRequest::Unbind(&ub),
        OperationRequest::GetBinding(&gb),
        OperationRequest::PollBindingLastOperation(&blo),
    ];
    for req in requests {
        let op = req.operation();
        for v in ApiVersion::all() {
            let result = build_request(req, &ctx(*v));
            if v.at_least(op.min_version()) {
                let desc = result.unwrap_or_else(|e| panic!("{op} at {v}: {e}"));
                assert_eq!(desc.method, op.method());
                assert_eq!(desc.header(API_VERSION_HEADER), Some(v.label()));
            } else {
                assert!(
                    matches!(result, Err(Error::OperationNotAllowed { .. })),
                    "{op} at {v}"
                );
            }
        }
    }
}

#[test]
fn context_is_dropped_below_2_12() {
    let req = provision();
    let old = build_request(OperationRequest::ProvisionInstance(&req), &ctx(ApiVersion::V2_11))
        .unwrap();
    let body: Value = serde_json::from_slice(old.body.as_deref().unwrap()).unwrap();
    assert!(body.get("context").is_none());
    assert_eq!(body["organization_guid"], "org");

    let new = build_request(OperationRequest::ProvisionInstance(&req), &ctx(ApiVersion::V2_12))
        .unwrap();
    let body: Value = serde_json::from_slice(new.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["context"]["platform"], "cloudfoundry");
}

#[test]
fn bind_context_needs_2_13() {
    let mut context = JsonObject::new();
    context.insert("platform".into(), json!("kubernetes"));
    let req = BindRequest {
        instance_id: "i".into(),
        binding_id: "b".into(),
        service_id: "s".into(),
        plan_id: "p".into(),
        context: Some(context),
        ..Default::default()
    };
    let desc = build_request(OperationRequest::Bind(&req), &ctx(ApiVersion::V2_12)).unwrap();
    let body: Value = serde_json::from_slice(desc.body.as_deref().unwrap()).unwrap();
    assert!(body.get("context").is_none());
}

#[test]
fn identity_header_follows_version() {
    let mut req = provision();
    req.originating_identity = Some(identity());

    let old = build_request(OperationRequest::ProvisionInstance(&req), &ctx(ApiVersion::V2_12))
        .unwrap();
    assert!(old.header(ORIGINATING_IDENTITY_HEADER).is_none());

    let new = build_request(OperationRequest::ProvisionInstance(&req), &ctx(ApiVersion::V2_13))
        .unwrap();
    let header = new.header(ORIGINATING_IDENTITY_HEADER).unwrap();
    let (platform, encoded) = header.split_once(' ').unwrap();
    assert_eq!(platform, "cloudfoundry");
    let decoded = STANDARD.decode(encoded).unwrap();
    let value: Value = serde_json::from_slice(&decoded).unwrap();
    assert_eq!(value, json!({"user_id": "683ea748"}));

    let without = build_request(OperationRequest::ProvisionInstance(&provision()), &ctx(ApiVersion::V2_17))
        .unwrap();
    assert!(without.header(ORIGINATING_IDENTITY_HEADER).is_none());
}

#[test]
fn deprovision_carries_ids_in_query_and_no_body() {
    let (_, _, d, ..) = full_requests();
    let mut d = d;
    d.accepts_incomplete = true;
    let extra = vec![("trace".to_owned(), "abc".to_owned())];
    let ctx = RequestContext {
        extra_query: &extra,
        ..ctx(ApiVersion::V2_14)
    };
    let desc = build_request(OperationRequest::DeprovisionInstance(&d), &ctx).unwrap();
    assert_eq!(desc.method, HttpMethod::Delete);
    assert_eq!(desc.url, format!("{BASE}/v2/service_instances/i"));
    assert_eq!(desc.query_param("service_id"), Some("s"));
    assert_eq!(desc.query_param("plan_id"), Some("p"));
    assert_eq!(desc.query_param(ACCEPTS_INCOMPLETE), Some("true"));
    assert_eq!(desc.query_param("trace"), Some("abc"));
    assert!(desc.accepts_incomplete());
    assert!(desc.body.is_none());
    assert!(desc.header(CONTENT_TYPE_HEADER).is_none());
}

#[test]
fn extra_query_cannot_override_protocol_keys() {
    let (_, _, _, _, _, bind, ..) = full_requests();
    let extra = vec![
        ("accepts_incomplete".to_owned(), "true".to_owned()),
        ("operation".to_owned(), "forged".to_owned()),
        ("region".to_owned(), "eu".to_owned()),
    ];
    let ctx = RequestContext {
        extra_query: &extra,
        ..ctx(ApiVersion::V2_13)
    };
    let desc = build_request(OperationRequest::Bind(&bind), &ctx).unwrap();
    assert!(!desc.accepts_incomplete());
    assert_eq!(desc.query, vec![("region".to_owned(), "eu".to_owned())]);
}

#[test]
fn last_operation_query_only_has_what_was_set() {
    let req = LastOperationRequest {
        instance_id: "i".into(),
        operation_key: Some(OperationKey::from("op-1")),
        ..Default::default()
    };
    let desc = build_request(OperationRequest::PollLastOperation(&req), &ctx(ApiVersion::V2_11))
        .unwrap();
    assert_eq!(desc.url, format!("{BASE}/v2/service_instances/i/last_operation"));
    assert_eq!(desc.query, vec![("operation".to_owned(), "op-1".to_owned())]);
}

#[test]
fn async_unbind_needs_2_14() {
    let (.., ub, _, _) = full_requests();
    let mut ub = ub;
    ub.accepts_incomplete = true;
    let err = build_request(OperationRequest::Unbind(&ub), &ctx(ApiVersion::V2_13)).unwrap_err();
    assert!(matches!(err, Error::OperationNotAllowed { .. }));
    assert!(err.is_local());

    ub.accepts_incomplete = false;
    let desc = build_request(OperationRequest::Unbind(&ub), &ctx(ApiVersion::V2_13)).unwrap();
    assert!(desc.query_param(ACCEPTS_INCOMPLETE).is_none());
}

#[test]
fn missing_fields_are_named() {
    let mut req = provision();
    req.space_guid.clear();
    let err = build_request(OperationRequest::ProvisionInstance(&req), &ctx(ApiVersion::latest()))
        .unwrap_err();
    assert_eq!(err.to_string(), "spaceGUID is required");
}

#[test]
fn bearer_credential_is_applied() {
    let cred = Credential::Bearer {
        token: "tok".into(),
    };
    let ctx = RequestContext {
        credential: Some(&cred),
        ..ctx(ApiVersion::latest())
    };
    let desc = build_request(OperationRequest::GetCatalog, &ctx).unwrap();
    assert_eq!(desc.header(AUTHORIZATION_HEADER), Some("Bearer tok"));
    assert_eq!(desc.url, format!("{BASE}/v2/catalog"));
    assert_eq!(desc.operation, Operation::GetCatalog);
}

#[test]
fn rotate_body_is_just_the_predecessor() {
    let (.., r, _, _, _) = full_requests();
    let desc = build_request(OperationRequest::RotateBinding(&r), &ctx(ApiVersion::V2_17)).unwrap();
    let body: Value = serde_json::from_slice(desc.body.as_deref().unwrap()).unwrap();
    assert_eq!(body, json!({"predecessor_binding_id": "b1"}));
    assert_eq!(
        desc.url,
        format!("{BASE}/v2/service_instances/i/service_bindings/b2")
    );
}
