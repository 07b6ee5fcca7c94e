use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Broker connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Human-readable broker name, used in logs only.
    #[serde(default = "d_name")]
    pub name: String,
    #[serde(default = "d_url")]
    pub url: String,
    /// Protocol version label (e.g. `"2.13"`). Latest when unset.
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub enable_alpha_features: bool,
    #[serde(default = "d_60")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub insecure_skip_verify: bool,
    /// PEM bundle of additional trusted roots.
    #[serde(default)]
    pub ca_file: Option<String>,
    /// Log request and response bodies at debug level.
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "d_max_response_bytes")]
    pub max_response_bytes: usize,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            name: d_name(),
            url: d_url(),
            api_version: None,
            enable_alpha_features: false,
            timeout_secs: 60,
            insecure_skip_verify: false,
            ca_file: None,
            verbose: false,
            max_response_bytes: d_max_response_bytes(),
            auth: None,
        }
    }
}

// ── Auth ────────────────────────────────────────────────────────────

/// Broker credentials. Exactly one of `basic` / `bearer` must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub basic: Option<BasicAuthConfig>,
    #[serde(default)]
    pub bearer: Option<BearerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicAuthConfig {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable holding the password.
    #[serde(default)]
    pub password_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerConfig {
    #[serde(default)]
    pub token: Option<String>,
    /// Environment variable holding the token.
    #[serde(default)]
    pub token_env: Option<String>,
}

/// A credential with its secret resolved.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
        }
    }
}

impl AuthConfig {
    /// Resolve the configured credential.
    ///
    /// An empty block and a block with both kinds set are configuration
    /// errors. Inline secrets win over `*_env` lookups.
    pub fn resolve(&self) -> Result<Credential> {
        match (&self.basic, &self.bearer) {
            (None, None) => Err(Error::Config(
                "auth block must configure either basic or bearer".into(),
            )),
            (Some(_), Some(_)) => Err(Error::Config(
                "only one of basic or bearer auth may be configured".into(),
            )),
            (Some(basic), None) => Ok(Credential::Basic {
                username: basic.username.clone(),
                password: resolve_secret(
                    "auth.basic.password",
                    &basic.password,
                    &basic.password_env,
                )?,
            }),
            (None, Some(bearer)) => Ok(Credential::Bearer {
                token: resolve_secret("auth.bearer.token", &bearer.token, &bearer.token_env)?,
            }),
        }
    }
}

fn resolve_secret(field: &str, inline: &Option<String>, env: &Option<String>) -> Result<String> {
    if let Some(value) = inline {
        tracing::warn!(
            field,
            "secret loaded from plaintext config field; prefer the *_env variant"
        );
        return Ok(value.clone());
    }
    if let Some(var) = env {
        return std::env::var(var).map_err(|_| {
            Error::Config(format!(
                "{field}: environment variable '{var}' not set or not valid UTF-8"
            ))
        });
    }
    Err(Error::Config(format!("{field}: no value or environment variable given")))
}

// ── serde default helpers ───────────────────────────────────────────

fn d_name() -> String {
    "broker".into()
}
fn d_url() -> String {
    "http://localhost:8080".into()
}
fn d_60() -> u64 {
    60
}
fn d_max_response_bytes() -> usize {
    4 * 1024 * 1024
}
