//! Originating identity: the platform user on whose behalf a request is made.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use osb_domain::error::{Error, Result};

/// A validated `<platform> <base64 JSON>` identity assertion.
///
/// Both parts are checked at construction, so holding one of these means
/// the header value can always be produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginatingIdentity {
    platform: String,
    value: String,
}

impl OriginatingIdentity {
    /// `value` must be a syntactically valid JSON document (typically an
    /// object such as `{"user_id": "683ea748"}`).
    pub fn new(platform: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let platform = platform.into();
        let value = value.into();

        if platform.is_empty() {
            return Err(Error::InvalidIdentityAssertion(
                "platform must not be empty".into(),
            ));
        }
        if platform.contains(char::is_whitespace) {
            return Err(Error::InvalidIdentityAssertion(
                "platform must not contain whitespace".into(),
            ));
        }
        if value.is_empty() {
            return Err(Error::InvalidIdentityAssertion(
                "value must not be empty".into(),
            ));
        }
        if let Err(e) = serde_json::from_str::<serde_json::Value>(&value) {
            return Err(Error::InvalidIdentityAssertion(format!(
                "value must be valid JSON: {e}"
            )));
        }

        Ok(Self { platform, value })
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Wire form of the originating identity header.
    pub fn header_value(&self) -> String {
        format!("{} {}", self.platform, STANDARD.encode(self.value.as_bytes()))
    }

    /// Parse a header value back into an identity.
    pub fn from_header_value(header: &str) -> Result<Self> {
        let (platform, encoded) = header.split_once(' ').ok_or_else(|| {
            Error::InvalidIdentityAssertion("expected '<platform> <base64 value>'".into())
        })?;
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::InvalidIdentityAssertion(format!("value is not base64: {e}")))?;
        let value = String::from_utf8(decoded)
            .map_err(|e| Error::InvalidIdentityAssertion(format!("value is not UTF-8: {e}")))?;
        Self::new(platform, value)
    }
}
