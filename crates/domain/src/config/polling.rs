use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Last-operation polling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Wait between queries when the broker gives no hint.
    #[serde(default = "d_5")]
    pub default_delay_secs: u64,
    /// Ceiling applied to broker-supplied hints. Unbounded when unset.
    #[serde(default)]
    pub max_delay_secs: Option<u64>,
    /// Consecutive transport/decode failures tolerated before giving up.
    #[serde(default = "d_3")]
    pub max_error_retries: u32,
    /// Overall deadline for a polling sequence.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            default_delay_secs: 5,
            max_delay_secs: None,
            max_error_retries: 3,
            timeout_secs: None,
        }
    }
}

fn d_5() -> u64 {
    5
}
fn d_3() -> u32 {
    3
}
