//! Drives the real reqwest transport against an in-process axum broker.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, put};
use axum::{Json, Router};
use osb_client::BrokerClient;
use osb_domain::config::BrokerConfig;
use osb_protocol::types::*;
use osb_protocol::OperationOutcome;
use serde_json::{json, Value};

async fn catalog(headers: HeaderMap) -> Json<Value> {
    let version = headers
        .get("x-broker-api-version")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none")
        .to_owned();
    Json(json!({
        "services": [{"id": "svc", "name": version, "description": "echo", "plans": []}]
    }))
}

async fn provision(
    Path(instance_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    (
        StatusCode::CREATED,
        Json(json!({
            "dashboard_url": format!("https://dash/{instance_id}/{}", body["plan_id"].as_str().unwrap_or("")),
            "metadata": {"labels": {"content_type": content_type}}
        })),
    )
}

async fn deprovision(Query(q): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    if q.get("service_id").map(String::as_str) == Some("svc") {
        (StatusCode::GONE, Json(json!({})))
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "BadRequest", "description": "missing service_id"})),
        )
    }
}

async fn huge() -> String {
    format!("{{\"services\": [], \"pad\": \"{}\"}}", "x".repeat(64 * 1024))
}

async fn spawn_broker(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn config(addr: SocketAddr) -> BrokerConfig {
    BrokerConfig {
        url: format!("http://{addr}/"),
        api_version: Some("2.16".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn round_trips_through_http() {
    let router = Router::new()
        .route("/v2/catalog", get(catalog))
        .route(
            "/v2/service_instances/:instance_id",
            put(provision).delete(deprovision),
        );
    let addr = spawn_broker(router).await;
    let client = BrokerClient::new(&config(addr)).unwrap();

    let cat = client.get_catalog().await.unwrap();
    assert_eq!(cat.services[0].name, "2.16");

    let req = ProvisionRequest {
        instance_id: "inst-9".into(),
        service_id: "svc".into(),
        plan_id: "large".into(),
        organization_guid: "org".into(),
        space_guid: "space".into(),
        ..Default::default()
    };
    let resp = client
        .provision_instance(&req)
        .await
        .unwrap()
        .into_response()
        .unwrap();
    assert_eq!(resp.dashboard_url.as_deref(), Some("https://dash/inst-9/large"));
    let labels = resp.metadata.unwrap().labels;
    assert_eq!(labels["content_type"], "application/json");

    let out = client
        .deprovision_instance(&DeprovisionRequest {
            instance_id: "inst-9".into(),
            service_id: "svc".into(),
            plan_id: "large".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(out, OperationOutcome::Gone);
}

#[tokio::test]
async fn oversized_bodies_fail_as_transport_errors() {
    let router = Router::new().route("/v2/catalog", get(huge));
    let addr = spawn_broker(router).await;
    let cfg = BrokerConfig {
        max_response_bytes: 1024,
        ..config(addr)
    };
    let client = BrokerClient::new(&cfg).unwrap();

    let err = client.get_catalog().await.unwrap_err();
    assert!(err.is_transport(), "{err}");
    assert!(err.to_string().contains("exceeds 1024 bytes"));
}

#[tokio::test]
async fn unreachable_broker_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = BrokerClient::new(&config(addr)).unwrap();
    let err = client.get_catalog().await.unwrap_err();
    assert!(err.is_transport());
    assert!(err.as_broker().is_none());
}
