use std::sync::Arc;
use std::time::Duration;

use crate::keys;
use crate::kv::KvStore;
use crate::policy::FailPolicy;

pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

const SENTINEL: &str = "1";

/// Per-device throttle for low-cost endpoints: one request per window.
#[derive(Clone)]
pub struct RateLimiter {
    store: Option<Arc<dyn KvStore>>,
    window: Duration,
    on_unavailable: FailPolicy,
}

impl RateLimiter {
    pub fn new(
        store: Option<Arc<dyn KvStore>>,
        window: Duration,
        on_unavailable: FailPolicy,
    ) -> Self {
        Self {
            store,
            window,
            on_unavailable,
        }
    }

    /// Returns true if the request is accepted and opens a new window.
    pub async fn try_acquire(&self, endpoint: &str, device_id: &str) -> bool {
        let Some(store) = &self.store else {
            return self.on_unavailable.admits();
        };

        let key = keys::rate_limit_key(endpoint, device_id);
        match store.get(&key).await {
            Ok(Some(_)) => return false,
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(endpoint, error = %e, "rate limiter unavailable");
                return self.on_unavailable.admits();
            }
        }

        if let Err(e) = store.set_ex(&key, SENTINEL, self.window).await {
            tracing::warn!(endpoint, error = %e, "failed to record rate limit window");
            return self.on_unavailable.admits();
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{KvError, MemoryStore, MockKvStore};

    fn limiter(store: Arc<dyn KvStore>) -> RateLimiter {
        RateLimiter::new(Some(store), DEFAULT_WINDOW, FailPolicy::Open)
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_request_per_window() {
        let limiter = limiter(Arc::new(MemoryStore::new()));

        assert!(limiter.try_acquire("generate-names", "dev").await);
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(!limiter.try_acquire("generate-names", "dev").await);

        tokio::time::advance(Duration::from_millis(2_100)).await;
        assert!(limiter.try_acquire("generate-names", "dev").await);
    }

    #[tokio::test]
    async fn test_windows_are_per_endpoint_and_device() {
        let limiter = limiter(Arc::new(MemoryStore::new()));

        assert!(limiter.try_acquire("generate-names", "a").await);
        assert!(limiter.try_acquire("generate-names", "b").await);
        assert!(limiter.try_acquire("generate-bio", "a").await);
        assert!(!limiter.try_acquire("generate-bio", "a").await);
    }

    #[tokio::test]
    async fn test_without_store_follows_policy() {
        let open = RateLimiter::new(None, DEFAULT_WINDOW, FailPolicy::Open);
        assert!(open.try_acquire("generate-names", "dev").await);
        assert!(open.try_acquire("generate-names", "dev").await);

        let closed = RateLimiter::new(None, DEFAULT_WINDOW, FailPolicy::Closed);
        assert!(!closed.try_acquire("generate-names", "dev").await);
    }

    #[tokio::test]
    async fn test_store_outage_follows_policy() {
        let mut store = MockKvStore::new();
        store
            .expect_get()
            .returning(|_| Err(KvError::NotAnInteger("boom".into())));
        let store: Arc<dyn KvStore> = Arc::new(store);

        let open = RateLimiter::new(Some(store.clone()), DEFAULT_WINDOW, FailPolicy::Open);
        assert!(open.try_acquire("generate-names", "dev").await);

        let closed = RateLimiter::new(Some(store), DEFAULT_WINDOW, FailPolicy::Closed);
        assert!(!closed.try_acquire("generate-names", "dev").await);
    }
}
