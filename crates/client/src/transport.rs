//! The one I/O seam of the client: send a [`RequestDescriptor`], get back
//! status, headers and body.

use std::time::Duration;

use async_trait::async_trait;
use osb_domain::config::BrokerConfig;
use osb_domain::error::{Error, Result};
use osb_protocol::{HttpMethod, RequestDescriptor, TransportResponse};
use reqwest::{Certificate, Client, Method};

/// Bytes read and discarded after an oversized body before giving up on it.
pub const DRAIN_LIMIT: usize = 4096;

/// Sends one request and returns the complete response.
///
/// Implementations must read the body to completion (or a bounded drain)
/// before returning so pooled connections can be reused.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: RequestDescriptor) -> Result<TransportResponse>;
}

/// `reqwest`-backed transport with a shared connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
    max_response_bytes: usize,
}

impl ReqwestTransport {
    pub fn new(cfg: &BrokerConfig) -> Result<Self> {
        if cfg.insecure_skip_verify && cfg.ca_file.is_some() {
            return Err(Error::Config(
                "insecure_skip_verify and ca_file are mutually exclusive".into(),
            ));
        }

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .danger_accept_invalid_certs(cfg.insecure_skip_verify);

        if let Some(path) = &cfg.ca_file {
            let pem = std::fs::read(path)
                .map_err(|e| Error::Config(format!("reading CA file {path}: {e}")))?;
            let certs = Certificate::from_pem_bundle(&pem)
                .map_err(|e| Error::Config(format!("parsing CA file {path}: {e}")))?;
            if certs.is_empty() {
                return Err(Error::Config(format!("CA file {path} holds no certificates")));
            }
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        let http = builder
            .build()
            .map_err(|e| Error::Config(format!("building HTTP client: {e}")))?;

        Ok(Self {
            http,
            max_response_bytes: cfg.max_response_bytes,
        })
    }

    /// Wrap an existing client (shared pools, custom proxies).
    pub fn from_client(http: Client, max_response_bytes: usize) -> Self {
        Self {
            http,
            max_response_bytes,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<TransportResponse> {
        let mut rb = self
            .http
            .request(method(request.method), &request.url)
            .query(&request.query);
        for (name, value) in &request.headers {
            rb = rb.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            rb = rb.body(body);
        }

        let mut resp = rb.send().await.map_err(from_reqwest)?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect();

        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(from_reqwest)? {
            if body.len() + chunk.len() > self.max_response_bytes {
                drain(&mut resp).await;
                return Err(Error::transport(format!(
                    "response body from {} exceeds {} bytes",
                    request.url, self.max_response_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Read and discard up to [`DRAIN_LIMIT`] more bytes.
async fn drain(resp: &mut reqwest::Response) {
    let mut drained = 0;
    while drained < DRAIN_LIMIT {
        match resp.chunk().await {
            Ok(Some(chunk)) => drained += chunk.len(),
            _ => break,
        }
    }
}

fn method(m: HttpMethod) -> Method {
    match m {
        HttpMethod::Get => Method::GET,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Convert a `reqwest::Error` into the shared error type.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::timeout(e.to_string())
    } else {
        Error::transport(e.to_string())
    }
}
