mod broker;
mod polling;

pub use broker::*;
pub use polling::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good. Version labels are
    /// checked by the client, which owns the version registry.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut push = |severity, field: &str, message: &str| {
            issues.push(ConfigIssue {
                severity,
                field: field.into(),
                message: message.into(),
            })
        };

        if self.broker.url.trim().is_empty() {
            push(ConfigSeverity::Error, "broker.url", "url must not be empty");
        } else if !self.broker.url.starts_with("http://") && !self.broker.url.starts_with("https://")
        {
            push(
                ConfigSeverity::Error,
                "broker.url",
                "url must start with http:// or https://",
            );
        } else if self.broker.url.starts_with("http://") && self.broker.auth.is_some() {
            push(
                ConfigSeverity::Warning,
                "broker.url",
                "credentials will be sent over plain http",
            );
        }

        if self.broker.insecure_skip_verify && self.broker.ca_file.is_some() {
            push(
                ConfigSeverity::Error,
                "broker.ca_file",
                "cannot specify root CAs and skip TLS verification",
            );
        }

        if let Some(auth) = &self.broker.auth {
            match (&auth.basic, &auth.bearer) {
                (None, None) => push(
                    ConfigSeverity::Error,
                    "broker.auth",
                    "auth block must configure either basic or bearer",
                ),
                (Some(_), Some(_)) => push(
                    ConfigSeverity::Error,
                    "broker.auth",
                    "only one of basic or bearer auth may be configured",
                ),
                _ => {}
            }
        }

        if self.broker.timeout_secs == 0 {
            push(
                ConfigSeverity::Error,
                "broker.timeout_secs",
                "timeout must be greater than 0",
            );
        }

        if self.polling.default_delay_secs == 0 {
            push(
                ConfigSeverity::Warning,
                "polling.default_delay_secs",
                "a zero delay polls the broker in a tight loop",
            );
        }
        if let Some(max) = self.polling.max_delay_secs {
            if max < self.polling.default_delay_secs {
                push(
                    ConfigSeverity::Warning,
                    "polling.max_delay_secs",
                    "ceiling is below the default delay and will clamp it",
                );
            }
        }

        issues
    }
}
