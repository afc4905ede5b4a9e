use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::generation::gemini::{DEFAULT_BASE_URL, DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL};
use crate::policy::{FailPolicy, GatePolicies};
use crate::quota::QuotaSettings;
use crate::verification::DEFAULT_VERIFY_URL;

/// Image edits send the photo base64-encoded inside the JSON body.
pub const DEFAULT_MAX_BODY_BYTES: usize = 6 * 1024 * 1024;

/// Quota-gated proxy in front of a generative-AI API.
#[derive(Debug, Clone, Parser)]
#[command(name = "pawgate", version, about)]
pub struct Config {
    /// Server bind address
    #[arg(long, env = "BIND_ADDRESS", default_value = "127.0.0.1:3000")]
    pub bind_address: SocketAddr,

    /// Redis connection URL; `memory://` for an in-process store, empty to run without one
    #[arg(long, env = "REDIS_URL", default_value = "")]
    pub redis_url: String,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub gemini_base_url: String,

    #[arg(long, env = "GEMINI_TEXT_MODEL", default_value = DEFAULT_TEXT_MODEL)]
    pub text_model: String,

    #[arg(long, env = "GEMINI_IMAGE_MODEL", default_value = DEFAULT_IMAGE_MODEL)]
    pub image_model: String,

    /// Turnstile secret; bot verification is skipped when unset
    #[arg(long, env = "TURNSTILE_SECRET_KEY", hide_env_values = true)]
    pub turnstile_secret: Option<String>,

    #[arg(long, env = "TURNSTILE_VERIFY_URL", default_value = DEFAULT_VERIFY_URL)]
    pub turnstile_verify_url: String,

    /// Reject metered requests that carry no Turnstile token
    #[arg(long, env = "TURNSTILE_REQUIRE_TOKEN", default_value_t = false)]
    pub turnstile_require_token: bool,

    /// Global monthly ceiling for image generations
    #[arg(long, env = "MONTHLY_IMAGE_CAP", default_value_t = 2000)]
    pub monthly_image_cap: i64,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 5)]
    pub rate_limit_window_secs: u64,

    #[arg(long, env = "DAILY_LOCK_TTL_SECS", default_value_t = 86_400)]
    pub daily_lock_ttl_secs: u64,

    /// Retention for monthly counters, applied on the first increment of a month
    #[arg(long, env = "MONTHLY_COUNTER_TTL_SECS", default_value_t = 3_456_000)]
    pub monthly_counter_ttl_secs: u64,

    #[arg(long, env = "RATE_LIMIT_FAIL_POLICY", value_enum, default_value_t = FailPolicy::Open)]
    pub rate_limit_fail_policy: FailPolicy,

    #[arg(long, env = "DAILY_LOCK_FAIL_POLICY", value_enum, default_value_t = FailPolicy::Open)]
    pub daily_lock_fail_policy: FailPolicy,

    #[arg(long, env = "MONTHLY_CAP_FAIL_POLICY", value_enum, default_value_t = FailPolicy::Open)]
    pub monthly_cap_fail_policy: FailPolicy,

    #[arg(
        long,
        env = "BOT_VERIFICATION_FAIL_POLICY",
        value_enum,
        default_value_t = FailPolicy::Closed
    )]
    pub bot_verification_fail_policy: FailPolicy,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from the command line and environment
    pub fn from_env() -> Result<Self, clap::Error> {
        Config::try_parse()
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn policies(&self) -> GatePolicies {
        GatePolicies {
            rate_limit: self.rate_limit_fail_policy,
            daily_lock: self.daily_lock_fail_policy,
            monthly_cap: self.monthly_cap_fail_policy,
            bot_verification: self.bot_verification_fail_policy,
        }
    }

    pub fn quota_settings(&self) -> QuotaSettings {
        QuotaSettings {
            monthly_ceiling: self.monthly_image_cap,
            daily_lock_ttl: Duration::from_secs(self.daily_lock_ttl_secs),
            counter_retention: Duration::from_secs(self.monthly_counter_ttl_secs),
        }
    }
}
