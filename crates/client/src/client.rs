//! [`BrokerClient`]: one method per broker operation.
//!
//! Each call builds the wire request with `osb-protocol`, performs exactly
//! one transport exchange, and classifies the response. The client holds
//! only read-only configuration and a shared transport, so clones are cheap
//! and can be used from many tasks at once.

use std::sync::Arc;
use std::time::Instant;

use osb_domain::config::{AuthConfig, BrokerConfig, Credential};
use osb_domain::error::{Error, Result};
use osb_domain::trace::TraceEvent;
use osb_protocol::types::*;
use osb_protocol::{
    build_request, interpret, interpret_last_operation, interpret_sync, ApiVersion, Negotiated,
    Operation, OperationOutcome, OperationRequest, RequestContext, ResponseContext,
    TransportResponse,
};
use serde::de::DeserializeOwned;

use crate::transport::{ReqwestTransport, Transport};

#[derive(Clone)]
pub struct BrokerClient {
    inner: Arc<Inner>,
    extra_query: Vec<(String, String)>,
}

struct Inner {
    name: String,
    base_url: String,
    negotiated: Negotiated,
    credential: Option<Credential>,
    verbose: bool,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for BrokerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerClient")
            .field("name", &self.inner.name)
            .field("base_url", &self.inner.base_url)
            .field("negotiated", &self.inner.negotiated)
            .field("credential", &self.inner.credential)
            .finish_non_exhaustive()
    }
}

impl BrokerClient {
    /// Build a client that talks to the broker over HTTP(S).
    pub fn new(cfg: &BrokerConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(cfg)?;
        Self::with_transport(cfg, Arc::new(transport))
    }

    /// Build a client over any [`Transport`].
    ///
    /// Fails with [`Error::Config`] on an unknown version label, an auth
    /// block that is empty or sets both kinds, an unresolvable secret, or
    /// `insecure_skip_verify` combined with `ca_file`.
    pub fn with_transport(cfg: &BrokerConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let base_url = cfg.url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(Error::Config("broker.url must not be empty".into()));
        }
        if cfg.insecure_skip_verify && cfg.ca_file.is_some() {
            return Err(Error::Config(
                "insecure_skip_verify and ca_file are mutually exclusive".into(),
            ));
        }
        let version = cfg
            .api_version
            .as_deref()
            .map(str::parse::<ApiVersion>)
            .transpose()?
            .unwrap_or_default();
        let credential = cfg.auth.as_ref().map(AuthConfig::resolve).transpose()?;

        tracing::debug!(
            broker = %cfg.name,
            url = %base_url,
            version = %version,
            alpha = cfg.enable_alpha_features,
            "broker client configured"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                name: cfg.name.clone(),
                base_url,
                negotiated: Negotiated::new(version, cfg.enable_alpha_features),
                credential,
                verbose: cfg.verbose,
                transport,
            }),
            extra_query: Vec::new(),
        })
    }

    /// Append a query parameter to every request made through the
    /// returned client. Protocol-owned keys such as `accepts_incomplete`
    /// or `operation` are dropped when the request is built.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_query.push((key.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn version(&self) -> ApiVersion {
        self.inner.negotiated.version
    }

    pub fn alpha_enabled(&self) -> bool {
        self.inner.negotiated.alpha
    }

    pub fn negotiated(&self) -> Negotiated {
        self.inner.negotiated
    }

    // ── Catalog ─────────────────────────────────────────────────────

    pub async fn get_catalog(&self) -> Result<CatalogResponse> {
        self.call_sync(OperationRequest::GetCatalog).await
    }

    // ── Instances ───────────────────────────────────────────────────

    pub async fn provision_instance(
        &self,
        req: &ProvisionRequest,
    ) -> Result<OperationOutcome<ProvisionResponse>> {
        self.call(OperationRequest::ProvisionInstance(req)).await
    }

    pub async fn update_instance(
        &self,
        req: &UpdateInstanceRequest,
    ) -> Result<OperationOutcome<UpdateInstanceResponse>> {
        self.call(OperationRequest::UpdateInstance(req)).await
    }

    /// A 410 from the broker yields [`OperationOutcome::Gone`].
    pub async fn deprovision_instance(
        &self,
        req: &DeprovisionRequest,
    ) -> Result<OperationOutcome<DeprovisionResponse>> {
        self.call(OperationRequest::DeprovisionInstance(req)).await
    }

    pub async fn get_instance(&self, req: &GetInstanceRequest) -> Result<GetInstanceResponse> {
        self.call_sync(OperationRequest::GetInstance(req)).await
    }

    pub async fn poll_last_operation(
        &self,
        req: &LastOperationRequest,
    ) -> Result<LastOperationResponse> {
        let resp = self.exchange(OperationRequest::PollLastOperation(req)).await?;
        interpret_last_operation(&resp, Operation::PollLastOperation, self.inner.negotiated)
    }

    // ── Bindings ────────────────────────────────────────────────────

    pub async fn bind(&self, req: &BindRequest) -> Result<OperationOutcome<BindResponse>> {
        self.call(OperationRequest::Bind(req)).await
    }

    pub async fn rotate_binding(
        &self,
        req: &RotateBindingRequest,
    ) -> Result<OperationOutcome<BindResponse>> {
        self.call(OperationRequest::RotateBinding(req)).await
    }

    /// A 410 from the broker yields [`OperationOutcome::Gone`].
    pub async fn unbind(&self, req: &UnbindRequest) -> Result<OperationOutcome<UnbindResponse>> {
        self.call(OperationRequest::Unbind(req)).await
    }

    pub async fn get_binding(&self, req: &GetBindingRequest) -> Result<GetBindingResponse> {
        self.call_sync(OperationRequest::GetBinding(req)).await
    }

    pub async fn poll_binding_last_operation(
        &self,
        req: &BindingLastOperationRequest,
    ) -> Result<LastOperationResponse> {
        let resp = self
            .exchange(OperationRequest::PollBindingLastOperation(req))
            .await?;
        interpret_last_operation(
            &resp,
            Operation::PollBindingLastOperation,
            self.inner.negotiated,
        )
    }

    // ── plumbing ────────────────────────────────────────────────────

    async fn call<T: DeserializeOwned>(
        &self,
        request: OperationRequest<'_>,
    ) -> Result<OperationOutcome<T>> {
        let operation = request.operation();
        let ctx = ResponseContext {
            operation,
            negotiated: self.inner.negotiated,
            accepts_incomplete: request.accepts_incomplete(),
        };
        let resp = self.exchange(request).await?;
        let outcome = interpret(&resp, &ctx)?;
        if let OperationOutcome::Async { operation: key, .. } = &outcome {
            TraceEvent::AsyncAccepted {
                broker: self.inner.name.clone(),
                operation: operation.to_string(),
                operation_key: key.as_ref().map(|k| k.to_string()),
            }
            .emit();
        }
        Ok(outcome)
    }

    async fn call_sync<T: DeserializeOwned>(&self, request: OperationRequest<'_>) -> Result<T> {
        let operation = request.operation();
        let resp = self.exchange(request).await?;
        interpret_sync(&resp, operation, self.inner.negotiated)
    }

    /// Build, send, and trace one request.
    async fn exchange(&self, request: OperationRequest<'_>) -> Result<TransportResponse> {
        let inner = &self.inner;
        let ctx = RequestContext {
            base_url: &inner.base_url,
            negotiated: inner.negotiated,
            credential: inner.credential.as_ref(),
            extra_query: &self.extra_query,
        };
        let descriptor = build_request(request, &ctx)?;
        let operation = descriptor.operation;
        let method = descriptor.method;
        let url = descriptor.url.clone();

        if inner.verbose {
            if let Some(body) = &descriptor.body {
                tracing::debug!(
                    broker = %inner.name,
                    operation = %operation,
                    body = %String::from_utf8_lossy(body),
                    "request body"
                );
            }
        }

        let start = Instant::now();
        let result = inner.transport.send(descriptor).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(
                    broker = %inner.name,
                    operation = %operation,
                    url = %url,
                    error = %e,
                    "broker request failed"
                );
                return Err(e);
            }
        };

        TraceEvent::BrokerRequest {
            broker: inner.name.clone(),
            operation: operation.to_string(),
            method: method.to_string(),
            url,
            status: resp.status,
            duration_ms,
        }
        .emit();

        if inner.verbose {
            tracing::debug!(
                broker = %inner.name,
                operation = %operation,
                status = resp.status,
                body = %String::from_utf8_lossy(&resp.body),
                "response body"
            );
        }

        Ok(resp)
    }
}
