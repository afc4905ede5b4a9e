use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::kv::KvStore;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: DependencyStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub kv: ServiceStatus,
    pub generator: ServiceStatus,
    pub bot_verification: ServiceStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

impl ServiceStatus {
    fn configured(configured: bool) -> Self {
        Self {
            status: if configured { "configured" } else { "not_configured" }.to_string(),
            response_time_ms: 0,
            error: None,
        }
    }
}

static START_TIME: std::sync::LazyLock<SystemTime> = std::sync::LazyLock::new(SystemTime::now);

#[derive(Clone)]
pub struct HealthChecker {
    store: Option<Arc<dyn KvStore>>,
    generator_configured: bool,
    verifier_configured: bool,
}

impl HealthChecker {
    pub fn new(
        store: Option<Arc<dyn KvStore>>,
        generator_configured: bool,
        verifier_configured: bool,
    ) -> Self {
        Self {
            store,
            generator_configured,
            verifier_configured,
        }
    }

    pub async fn check_health(&self) -> HealthStatus {
        let now = SystemTime::now();
        let uptime = now.duration_since(*START_TIME)
            .unwrap_or_default()
            .as_secs();

        let kv_status = self.check_kv().await;

        // Gates fail open without a store, so the service stays up.
        let overall_status = if kv_status.status == "healthy" {
            "healthy"
        } else {
            "degraded"
        };

        HealthStatus {
            status: overall_status.to_string(),
            timestamp: now.duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime,
            dependencies: DependencyStatus {
                kv: kv_status,
                generator: ServiceStatus::configured(self.generator_configured),
                bot_verification: ServiceStatus::configured(self.verifier_configured),
            },
        }
    }

    /// Ready once a model key is present and the store, if any, answers.
    pub async fn is_ready(&self) -> bool {
        self.generator_configured && self.check_kv().await.status != "unavailable"
    }

    async fn check_kv(&self) -> ServiceStatus {
        let Some(store) = &self.store else {
            return ServiceStatus {
                status: "not_configured".to_string(),
                response_time_ms: 0,
                error: Some(
                    "KV store not configured; gates run on their fail policies".to_string(),
                ),
            };
        };

        let start = Instant::now();
        let result = store.ping().await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => ServiceStatus {
                status: "healthy".to_string(),
                response_time_ms,
                error: None,
            },
            Err(e) => ServiceStatus {
                status: "unavailable".to_string(),
                response_time_ms,
                error: Some(e.to_string()),
            },
        }
    }
}
