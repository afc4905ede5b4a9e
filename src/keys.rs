//! Key layout in the store and request identity helpers.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub const DEVICE_ID_HEADER: &str = "x-device-id";
pub const TURNSTILE_TOKEN_HEADER: &str = "x-turnstile-token";

/// Device identifier used when the caller omits one.
pub const UNKNOWN_DEVICE: &str = "unknown";

/// `rl:<endpoint>:<deviceId>`
pub fn rate_limit_key(endpoint: &str, device_id: &str) -> String {
    format!("rl:{}:{}", endpoint, device_id)
}

/// `daily:<resource>:<deviceId>`
pub fn daily_lock_key(resource: &str, device_id: &str) -> String {
    format!("daily:{}:{}", resource, device_id)
}

/// `global:<resource>count:<YYYY-MM>`, month taken in UTC.
pub fn monthly_counter_key(resource: &str, now: DateTime<Utc>) -> String {
    format!("global:{}count:{}", resource, now.format("%Y-%m"))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn device_id(headers: &HeaderMap) -> String {
    header_str(headers, DEVICE_ID_HEADER)
        .unwrap_or(UNKNOWN_DEVICE)
        .to_string()
}

pub fn bot_token(headers: &HeaderMap) -> Option<String> {
    header_str(headers, TURNSTILE_TOKEN_HEADER).map(str::to_string)
}

/// Extract client IP from the usual proxy headers.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|xff| xff.split(',').next().map(str::trim))
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
        .or_else(|| header_str(headers, "cf-connecting-ip"))
        .map(str::to_string)
}

/// Short, stable hash of a device id for log lines.
pub fn device_fingerprint(device_id: &str) -> String {
    let digest = Sha256::digest(device_id.as_bytes());
    digest[..4].iter().map(|b| format!("{:02x}", b)).collect()
}
