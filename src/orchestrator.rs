//! Gate sequencing and compensation around each generation call.

use serde_json::Value;
use std::sync::Arc;

use crate::endpoint::{Endpoint, Gates};
use crate::error::ApiError;
use crate::generation::{GenerationRequest, Generator};
use crate::quota::QuotaLedger;
use crate::rate_limiter::RateLimiter;
use crate::verification::BotVerifier;

/// Caller identity taken from request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub device_id: String,
    pub bot_token: Option<String>,
    pub remote_ip: Option<String>,
}

impl RequestContext {
    pub fn for_device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            bot_token: None,
            remote_ip: None,
        }
    }
}

pub struct Orchestrator {
    generator: Arc<dyn Generator>,
    verifier: Arc<dyn BotVerifier>,
    rate_limiter: RateLimiter,
    ledger: QuotaLedger,
}

impl Orchestrator {
    pub fn new(
        generator: Arc<dyn Generator>,
        verifier: Arc<dyn BotVerifier>,
        rate_limiter: RateLimiter,
        ledger: QuotaLedger,
    ) -> Self {
        Self {
            generator,
            verifier,
            rate_limiter,
            ledger,
        }
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    pub async fn handle(
        &self,
        endpoint: Endpoint,
        ctx: &RequestContext,
        body: &[u8],
    ) -> Result<Value, ApiError> {
        let request = endpoint.prepare(body)?;

        match endpoint.gates() {
            Gates::Open => self.generate(endpoint, request).await,
            Gates::RateLimited => {
                if !self
                    .rate_limiter
                    .try_acquire(endpoint.name(), &ctx.device_id)
                    .await
                {
                    return Err(ApiError::RateLimited);
                }
                self.generate(endpoint, request).await
            }
            Gates::Metered { resource } => {
                self.generate_metered(endpoint, resource, ctx, request).await
            }
        }
    }

    async fn generate(
        &self,
        endpoint: Endpoint,
        request: GenerationRequest,
    ) -> Result<Value, ApiError> {
        let response = self
            .generator
            .generate(request)
            .await
            .map_err(ApiError::Generation)?;
        endpoint.render(&response).map_err(ApiError::Generation)
    }

    async fn generate_metered(
        &self,
        endpoint: Endpoint,
        resource: &'static str,
        ctx: &RequestContext,
        request: GenerationRequest,
    ) -> Result<Value, ApiError> {
        if !self
            .verifier
            .verify_human(ctx.bot_token.as_deref(), ctx.remote_ip.as_deref())
            .await
        {
            return Err(ApiError::BotVerificationFailed);
        }

        if self.ledger.is_monthly_cap_reached(resource).await {
            return Err(ApiError::GlobalCapReached);
        }

        if !self.ledger.acquire_daily_lock(resource, &ctx.device_id).await {
            return Err(ApiError::LimitReached);
        }

        let outcome = match self.generator.generate(request).await {
            Ok(response) => endpoint.render(&response),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(body) => {
                let count = self.ledger.increment_monthly_counter(resource).await;
                tracing::debug!(resource, monthly_count = ?count, "metered generation served");
                Ok(body)
            }
            Err(e) => {
                self.ledger.release_daily_lock(resource, &ctx.device_id).await;
                Err(ApiError::metered(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{GenerationResponse, Part, ProviderError};
    use crate::kv::{KvStore, MemoryStore};
    use crate::policy::GatePolicies;
    use crate::quota::QuotaSettings;
    use crate::rate_limiter::DEFAULT_WINDOW;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGenerator {
        calls: AtomicUsize,
        reply: fn() -> Result<GenerationResponse, ProviderError>,
    }

    #[async_trait]
    impl Generator for CountingGenerator {
        async fn generate(
            &self,
            _request: GenerationRequest,
        ) -> Result<GenerationResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.reply)()
        }
    }

    struct Verdict(bool);

    #[async_trait]
    impl BotVerifier for Verdict {
        async fn verify_human(&self, _token: Option<&str>, _remote_ip: Option<&str>) -> bool {
            self.0
        }
    }

    fn image_reply() -> Result<GenerationResponse, ProviderError> {
        Ok(GenerationResponse {
            parts: vec![Part::InlineData {
                mime_type: "image/png".into(),
                data: "iVBO".into(),
            }],
            grounding: Vec::new(),
        })
    }

    fn busy_reply() -> Result<GenerationResponse, ProviderError> {
        Err(ProviderError::RateLimited("quota".into()))
    }

    fn orchestrator(
        reply: fn() -> Result<GenerationResponse, ProviderError>,
        human: bool,
    ) -> (Orchestrator, Arc<CountingGenerator>) {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let policies = GatePolicies::default();
        let generator = Arc::new(CountingGenerator {
            calls: AtomicUsize::new(0),
            reply,
        });
        let orchestrator = Orchestrator::new(
            generator.clone(),
            Arc::new(Verdict(human)),
            RateLimiter::new(Some(store.clone()), DEFAULT_WINDOW, policies.rate_limit),
            QuotaLedger::new(Some(store), QuotaSettings::default(), policies),
        );
        (orchestrator, generator)
    }

    fn image_body() -> Vec<u8> {
        json!({ "base64Image": "QUJD", "mimeType": "image/png", "prompt": "hat", "style": "pixel" })
            .to_string()
            .into_bytes()
    }

    #[tokio::test]
    async fn test_upstream_busy_maps_to_503_and_releases_lock() {
        let (orchestrator, _) = orchestrator(busy_reply, true);
        let ctx = RequestContext::for_device("dev");

        let err = orchestrator
            .handle(Endpoint::GenerateImage, &ctx, &image_body())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UpstreamBusy(_)));
        assert!(orchestrator.ledger().acquire_daily_lock("image", "dev").await);
    }

    #[tokio::test]
    async fn test_invalid_body_touches_nothing() {
        let (orchestrator, generator) = orchestrator(image_reply, true);
        let ctx = RequestContext::for_device("dev");

        let err = orchestrator
            .handle(Endpoint::GenerateImage, &ctx, b"{}")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert!(orchestrator.ledger().acquire_daily_lock("image", "dev").await);
    }

    #[tokio::test]
    async fn test_rate_limited_endpoint_skips_generator() {
        fn names_reply() -> Result<GenerationResponse, ProviderError> {
            Ok(GenerationResponse {
                parts: vec![Part::Text(
                    r#"{"names":[{"id":"1","name":"Pip","meaning":"small"}]}"#.into(),
                )],
                grounding: Vec::new(),
            })
        }
        let (orchestrator, generator) = orchestrator(names_reply, true);
        let ctx = RequestContext::for_device("dev");
        let body = json!({ "petInfo": { "type": "cat" }, "language": "en" }).to_string();

        let first = orchestrator
            .handle(Endpoint::GenerateNames, &ctx, body.as_bytes())
            .await
            .unwrap();
        assert_eq!(first["names"][0]["name"], "Pip");

        let second = orchestrator
            .handle(Endpoint::GenerateNames, &ctx, body.as_bytes())
            .await;
        assert!(matches!(second, Err(ApiError::RateLimited)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_open_endpoint_failure_is_generic() {
        let (orchestrator, _) = orchestrator(busy_reply, true);
        let ctx = RequestContext::for_device("dev");
        let body = json!({ "name": "Luna", "targetLanguage": "ko" }).to_string();

        let err = orchestrator
            .handle(Endpoint::TranslateName, &ctx, body.as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Generation(_)));
    }
}
