use clap::ValueEnum;
use serde::Serialize;

/// What a gate decides when the service backing it is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailPolicy {
    /// Let the request through.
    Open,
    /// Reject the request.
    Closed,
}

impl FailPolicy {
    /// Whether a request passes the gate when the gate cannot decide.
    pub fn admits(self) -> bool {
        matches!(self, FailPolicy::Open)
    }
}

/// Per-gate fail policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GatePolicies {
    pub rate_limit: FailPolicy,
    pub daily_lock: FailPolicy,
    pub monthly_cap: FailPolicy,
    pub bot_verification: FailPolicy,
}

impl Default for GatePolicies {
    fn default() -> Self {
        Self {
            rate_limit: FailPolicy::Open,
            daily_lock: FailPolicy::Open,
            monthly_cap: FailPolicy::Open,
            bot_verification: FailPolicy::Closed,
        }
    }
}
