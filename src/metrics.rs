use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Served,
    /// Turned away by a gate or validation.
    Rejected,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointMetrics {
    pub total_requests: u64,
    pub served: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl EndpointMetrics {
    fn record(&mut self, outcome: Outcome) {
        self.total_requests += 1;
        match outcome {
            Outcome::Served => self.served += 1,
            Outcome::Rejected => self.rejected += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    endpoints: Arc<RwLock<BTreeMap<&'static str, EndpointMetrics>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, endpoint: &'static str, outcome: Outcome) {
        let mut endpoints = self.endpoints.write().await;
        endpoints.entry(endpoint).or_default().record(outcome);
    }

    pub async fn endpoint(&self, endpoint: &str) -> Option<EndpointMetrics> {
        let endpoints = self.endpoints.read().await;
        endpoints.get(endpoint).cloned()
    }

    pub async fn snapshot(&self) -> BTreeMap<&'static str, EndpointMetrics> {
        self.endpoints.read().await.clone()
    }

    pub async fn totals(&self) -> EndpointMetrics {
        let endpoints = self.endpoints.read().await;
        endpoints
            .values()
            .fold(EndpointMetrics::default(), |mut acc, m| {
                acc.total_requests += m.total_requests;
                acc.served += m.served;
                acc.rejected += m.rejected;
                acc.failed += m.failed;
                acc
            })
    }
}
