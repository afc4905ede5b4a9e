//! Per-device daily locks and global monthly counters.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::keys;
use crate::kv::KvStore;
use crate::policy::GatePolicies;

pub const DEFAULT_MONTHLY_CEILING: i64 = 2000;
pub const DEFAULT_DAILY_LOCK_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_COUNTER_RETENTION: Duration = Duration::from_secs(40 * 24 * 60 * 60);

const SENTINEL: &str = "1";

#[derive(Debug, Clone, Copy)]
pub struct QuotaSettings {
    pub monthly_ceiling: i64,
    pub daily_lock_ttl: Duration,
    pub counter_retention: Duration,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            monthly_ceiling: DEFAULT_MONTHLY_CEILING,
            daily_lock_ttl: DEFAULT_DAILY_LOCK_TTL,
            counter_retention: DEFAULT_COUNTER_RETENTION,
        }
    }
}

#[derive(Clone)]
pub struct QuotaLedger {
    store: Option<Arc<dyn KvStore>>,
    settings: QuotaSettings,
    policies: GatePolicies,
}

impl QuotaLedger {
    pub fn new(
        store: Option<Arc<dyn KvStore>>,
        settings: QuotaSettings,
        policies: GatePolicies,
    ) -> Self {
        Self {
            store,
            settings,
            policies,
        }
    }

    /// Take today's unit for `device_id`. False means it is already held.
    pub async fn acquire_daily_lock(&self, resource: &str, device_id: &str) -> bool {
        let Some(store) = &self.store else {
            return self.policies.daily_lock.admits();
        };

        let key = keys::daily_lock_key(resource, device_id);
        match store
            .set_nx_ex(&key, SENTINEL, self.settings.daily_lock_ttl)
            .await
        {
            Ok(acquired) => acquired,
            Err(e) => {
                tracing::warn!(resource, error = %e, "daily lock unavailable");
                self.policies.daily_lock.admits()
            }
        }
    }

    /// Give the unit back after the paid call failed.
    pub async fn release_daily_lock(&self, resource: &str, device_id: &str) {
        let Some(store) = &self.store else {
            return;
        };

        let key = keys::daily_lock_key(resource, device_id);
        if let Err(e) = store.del(&key).await {
            tracing::error!(resource, error = %e, "failed to release daily lock");
        }
    }

    pub async fn is_monthly_cap_reached(&self, resource: &str) -> bool {
        self.is_monthly_cap_reached_at(resource, Utc::now()).await
    }

    /// Check and increment are separate store calls, so concurrent requests
    /// can push the counter past the ceiling by the number in flight.
    pub async fn is_monthly_cap_reached_at(&self, resource: &str, now: DateTime<Utc>) -> bool {
        match self.monthly_count_at(resource, now).await {
            Some(count) => count >= self.settings.monthly_ceiling,
            None => !self.policies.monthly_cap.admits(),
        }
    }

    /// Current month's counter, or None when the store cannot answer.
    pub async fn monthly_count_at(&self, resource: &str, now: DateTime<Utc>) -> Option<i64> {
        let store = self.store.as_ref()?;
        let key = keys::monthly_counter_key(resource, now);
        match store.get(&key).await {
            Ok(None) => Some(0),
            Ok(Some(raw)) => match raw.parse::<i64>() {
                Ok(count) => Some(count),
                Err(_) => {
                    tracing::warn!(resource, key = %key, "monthly counter is not an integer");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(resource, error = %e, "monthly counter unavailable");
                None
            }
        }
    }

    pub async fn increment_monthly_counter(&self, resource: &str) -> Option<i64> {
        self.increment_monthly_counter_at(resource, Utc::now()).await
    }

    /// Count one more unit this month. The first increment of a month sets
    /// the retention expiry so old counters leave the store on their own.
    pub async fn increment_monthly_counter_at(
        &self,
        resource: &str,
        now: DateTime<Utc>,
    ) -> Option<i64> {
        let store = self.store.as_ref()?;
        let key = keys::monthly_counter_key(resource, now);

        let count = match store.incr(&key).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(resource, error = %e, "failed to increment monthly counter");
                return None;
            }
        };

        if count == 1 {
            if let Err(e) = store.expire(&key, self.settings.counter_retention).await {
                tracing::warn!(resource, error = %e, "failed to set monthly counter retention");
            }
        }

        Some(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{KvError, MemoryStore, MockKvStore};
    use crate::policy::FailPolicy;
    use chrono::TimeZone;

    fn ledger_with(store: Arc<dyn KvStore>, monthly_ceiling: i64) -> QuotaLedger {
        QuotaLedger::new(
            Some(store),
            QuotaSettings {
                monthly_ceiling,
                ..QuotaSettings::default()
            },
            GatePolicies::default(),
        )
    }

    fn outage() -> Arc<dyn KvStore> {
        let mut store = MockKvStore::new();
        store
            .expect_get()
            .returning(|_| Err(KvError::NotAnInteger("boom".into())));
        store
            .expect_set_nx_ex()
            .returning(|_, _, _| Err(KvError::NotAnInteger("boom".into())));
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_concurrent_daily_lock_is_exclusive() {
        let ledger = ledger_with(Arc::new(MemoryStore::new()), 10);

        let (a, b) = tokio::join!(
            ledger.acquire_daily_lock("image", "dev"),
            ledger.acquire_daily_lock("image", "dev"),
        );
        assert!(a ^ b);
    }

    #[tokio::test]
    async fn test_concurrent_daily_lock_across_tasks() {
        let ledger = ledger_with(Arc::new(MemoryStore::new()), 10);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.acquire_daily_lock("image", "dev").await })
            })
            .collect();

        let mut acquired = 0;
        for handle in handles {
            if handle.await.unwrap() {
                acquired += 1;
            }
        }
        assert_eq!(acquired, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_lock_expires_after_a_day() {
        let ledger = ledger_with(Arc::new(MemoryStore::new()), 10);

        assert!(ledger.acquire_daily_lock("image", "dev").await);
        tokio::time::advance(Duration::from_secs(23 * 60 * 60)).await;
        assert!(!ledger.acquire_daily_lock("image", "dev").await);

        tokio::time::advance(Duration::from_secs(60 * 60 + 1)).await;
        assert!(ledger.acquire_daily_lock("image", "dev").await);
    }

    #[tokio::test]
    async fn test_release_frees_the_slot() {
        let ledger = ledger_with(Arc::new(MemoryStore::new()), 10);

        assert!(ledger.acquire_daily_lock("image", "dev").await);
        ledger.release_daily_lock("image", "dev").await;
        assert!(ledger.acquire_daily_lock("image", "dev").await);
    }

    #[tokio::test]
    async fn test_monthly_cap_boundary() {
        let ledger = ledger_with(Arc::new(MemoryStore::new()), 3);
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();

        for expected in 1..=2 {
            assert!(!ledger.is_monthly_cap_reached_at("image", now).await);
            assert_eq!(ledger.increment_monthly_counter_at("image", now).await, Some(expected));
        }
        assert!(!ledger.is_monthly_cap_reached_at("image", now).await);
        ledger.increment_monthly_counter_at("image", now).await;
        assert!(ledger.is_monthly_cap_reached_at("image", now).await);

        ledger.increment_monthly_counter_at("image", now).await;
        assert!(ledger.is_monthly_cap_reached_at("image", now).await);
    }

    #[tokio::test]
    async fn test_monthly_counter_rolls_over() {
        let ledger = ledger_with(Arc::new(MemoryStore::new()), 1);
        let may = Utc.with_ymd_and_hms(2024, 5, 31, 23, 59, 59).unwrap();
        let june = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        ledger.increment_monthly_counter_at("image", may).await;
        assert!(ledger.is_monthly_cap_reached_at("image", may).await);
        assert!(!ledger.is_monthly_cap_reached_at("image", june).await);
        assert_eq!(ledger.monthly_count_at("image", june).await, Some(0));
    }

    #[tokio::test]
    async fn test_first_increment_sets_retention_once() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
        let mut store = MockKvStore::new();
        let mut count = 0;
        store.expect_incr().times(2).returning(move |_| {
            count += 1;
            Ok(count)
        });
        store
            .expect_expire()
            .withf(|key, ttl| {
                key == "global:imagecount:2024-05" && *ttl == DEFAULT_COUNTER_RETENTION
            })
            .times(1)
            .returning(|_, _| Ok(true));

        let ledger = ledger_with(Arc::new(store), 10);
        assert_eq!(ledger.increment_monthly_counter_at("image", now).await, Some(1));
        assert_eq!(ledger.increment_monthly_counter_at("image", now).await, Some(2));
    }

    #[tokio::test]
    async fn test_outage_fails_open_by_default() {
        let ledger = ledger_with(outage(), 10);
        assert!(!ledger.is_monthly_cap_reached("image").await);
        assert!(ledger.acquire_daily_lock("image", "dev").await);
    }

    #[tokio::test]
    async fn test_outage_with_closed_policies() {
        let ledger = QuotaLedger::new(
            Some(outage()),
            QuotaSettings::default(),
            GatePolicies {
                daily_lock: FailPolicy::Closed,
                monthly_cap: FailPolicy::Closed,
                ..GatePolicies::default()
            },
        );
        assert!(ledger.is_monthly_cap_reached("image").await);
        assert!(!ledger.acquire_daily_lock("image", "dev").await);
    }

    #[tokio::test]
    async fn test_no_store_is_inert() {
        let ledger = QuotaLedger::new(None, QuotaSettings::default(), GatePolicies::default());
        assert!(ledger.acquire_daily_lock("image", "dev").await);
        assert!(!ledger.is_monthly_cap_reached("image").await);
        assert_eq!(ledger.increment_monthly_counter("image").await, None);
        ledger.release_daily_lock("image", "dev").await;
    }
}
