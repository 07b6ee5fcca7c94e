//! Registry of the protocol revisions this client speaks.
//!
//! Ordering is by release rank, never by label text: `"2.9"` would sort
//! after `"2.17"` as a string.

use std::fmt;
use std::str::FromStr;

use osb_domain::error::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A released revision of the broker API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    V2_11,
    V2_12,
    V2_13,
    V2_14,
    V2_15,
    V2_16,
    V2_17,
}

impl ApiVersion {
    /// Every supported revision, in release order.
    pub const ALL: [ApiVersion; 7] = [
        ApiVersion::V2_11,
        ApiVersion::V2_12,
        ApiVersion::V2_13,
        ApiVersion::V2_14,
        ApiVersion::V2_15,
        ApiVersion::V2_16,
        ApiVersion::V2_17,
    ];

    pub fn latest() -> Self {
        ApiVersion::V2_17
    }

    pub fn all() -> &'static [ApiVersion] {
        &Self::ALL
    }

    /// Position in release order.
    pub fn rank(self) -> u8 {
        match self {
            ApiVersion::V2_11 => 0,
            ApiVersion::V2_12 => 1,
            ApiVersion::V2_13 => 2,
            ApiVersion::V2_14 => 3,
            ApiVersion::V2_15 => 4,
            ApiVersion::V2_16 => 5,
            ApiVersion::V2_17 => 6,
        }
    }

    /// The value sent in the version header.
    pub fn label(self) -> &'static str {
        match self {
            ApiVersion::V2_11 => "2.11",
            ApiVersion::V2_12 => "2.12",
            ApiVersion::V2_13 => "2.13",
            ApiVersion::V2_14 => "2.14",
            ApiVersion::V2_15 => "2.15",
            ApiVersion::V2_16 => "2.16",
            ApiVersion::V2_17 => "2.17",
        }
    }

    pub fn at_least(self, other: ApiVersion) -> bool {
        self.rank() >= other.rank()
    }

    pub fn is_less_than(self, other: ApiVersion) -> bool {
        !self.at_least(other)
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::latest()
    }
}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.label() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|v| v.label()).collect();
                Error::Config(format!(
                    "unsupported API version '{s}' (supported: {})",
                    known.join(", ")
                ))
            })
    }
}

impl Serialize for ApiVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for ApiVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
