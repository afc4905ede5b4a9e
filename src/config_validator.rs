use crate::config::Config;
use crate::kv::MEMORY_URL;

#[derive(Debug, thiserror::Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_redis_url(&config.redis_url)?;
        Self::validate_http_url("GEMINI_BASE_URL", &config.gemini_base_url)?;
        Self::validate_http_url("TURNSTILE_VERIFY_URL", &config.turnstile_verify_url)?;
        Self::validate_model("GEMINI_TEXT_MODEL", &config.text_model)?;
        Self::validate_model("GEMINI_IMAGE_MODEL", &config.image_model)?;
        Self::validate_quota(
            config.monthly_image_cap,
            config.rate_limit_window_secs,
            config.daily_lock_ttl_secs,
            config.monthly_counter_ttl_secs,
        )?;
        Self::validate_body_limit(config.max_body_bytes)?;
        Ok(())
    }

    /// Empty disables the store; otherwise redis, rediss or memory.
    pub fn validate_redis_url(url: &str) -> Result<(), ConfigError> {
        let url = url.trim();
        if url.is_empty() || url == MEMORY_URL {
            return Ok(());
        }

        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(ConfigError(
                "REDIS_URL must start with 'redis://', 'rediss://' or be 'memory://'".to_string(),
            ));
        }

        Ok(())
    }

    pub fn validate_http_url(name: &str, url: &str) -> Result<(), ConfigError> {
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(ConfigError(format!("{} must be an http(s) URL", name)));
        }
        Ok(())
    }

    pub fn validate_model(name: &str, model: &str) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError(format!("{} cannot be empty", name)));
        }
        Ok(())
    }

    pub fn validate_body_limit(max_body_bytes: usize) -> Result<(), ConfigError> {
        if max_body_bytes < 1024 {
            return Err(ConfigError("MAX_BODY_BYTES must be at least 1024".to_string()));
        }
        Ok(())
    }

    pub fn validate_quota(
        monthly_cap: i64,
        rate_limit_window_secs: u64,
        daily_lock_ttl_secs: u64,
        counter_ttl_secs: u64,
    ) -> Result<(), ConfigError> {
        if monthly_cap <= 0 {
            return Err(ConfigError("MONTHLY_IMAGE_CAP must be greater than 0".to_string()));
        }
        if rate_limit_window_secs == 0 {
            return Err(ConfigError("RATE_LIMIT_WINDOW_SECS must be greater than 0".to_string()));
        }
        if daily_lock_ttl_secs == 0 {
            return Err(ConfigError("DAILY_LOCK_TTL_SECS must be greater than 0".to_string()));
        }
        // A counter must outlive the month it counts.
        if counter_ttl_secs < 31 * 24 * 60 * 60 {
            return Err(ConfigError(
                "MONTHLY_COUNTER_TTL_SECS must cover at least 31 days".to_string(),
            ));
        }
        Ok(())
    }
}
