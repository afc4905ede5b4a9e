use crate::config::Config;
use crate::config_validator::ConfigValidator;
use crate::generation::{GeminiClient, Generator};
use crate::handlers::{
    dispatch, health_check, metrics, not_found, readiness_check, AppState, SharedState,
};
use crate::health::HealthChecker;
use crate::kv::{self, KvStore};
use crate::metrics::MetricsCollector;
use crate::middleware::logging_middleware;
use crate::orchestrator::Orchestrator;
use crate::quota::QuotaLedger;
use crate::rate_limiter::RateLimiter;
use crate::verification::{BotVerifier, TurnstileVerifier};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

impl AppState {
    /// Wire the gates and clients around one shared store.
    pub fn new(
        config: &Config,
        store: Option<Arc<dyn KvStore>>,
        generator: Arc<dyn Generator>,
        verifier: Arc<dyn BotVerifier>,
        generator_configured: bool,
        verifier_configured: bool,
    ) -> Self {
        let policies = config.policies();
        let rate_limiter =
            RateLimiter::new(store.clone(), config.rate_limit_window(), policies.rate_limit);
        let ledger = QuotaLedger::new(store.clone(), config.quota_settings(), policies);

        Self {
            orchestrator: Orchestrator::new(generator, verifier, rate_limiter, ledger),
            metrics: MetricsCollector::new(),
            health: HealthChecker::new(store, generator_configured, verifier_configured),
            body_limit: config.max_body_bytes,
        }
    }

    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = kv::connect(&config.redis_url).await?;
        if store.is_none() {
            tracing::warn!("REDIS_URL not set; rate limits and quotas follow their fail policies");
        }

        let gemini = GeminiClient::new(config.gemini_api_key.clone())
            .with_base_url(&config.gemini_base_url)
            .with_models(&config.text_model, &config.image_model);
        if !gemini.is_configured() {
            tracing::warn!("GEMINI_API_KEY not set; generation requests will fail");
        }

        let turnstile = TurnstileVerifier::new(config.turnstile_secret.clone())
            .with_verify_url(&config.turnstile_verify_url)
            .with_require_token(config.turnstile_require_token)
            .with_error_policy(config.policies().bot_verification);
        if !turnstile.is_configured() {
            tracing::warn!("TURNSTILE_SECRET_KEY not set; bot verification is skipped");
        }

        let generator_configured = gemini.is_configured();
        let verifier_configured = turnstile.is_configured();
        Ok(Self::new(
            config,
            store,
            Arc::new(gemini),
            Arc::new(turnstile),
            generator_configured,
            verifier_configured,
        ))
    }
}

pub fn create_app(state: SharedState) -> Router {
    let body_limit = state.body_limit;
    Router::new()
        .route("/api/:endpoint", post(dispatch))
        // Health and readiness endpoints
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

pub struct Server {
    app: Router,
    bind_address: SocketAddr,
}

impl Server {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        ConfigValidator::validate(&config)?;
        let state = AppState::from_config(&config).await?;

        Ok(Self {
            app: create_app(Arc::new(state)),
            bind_address: config.bind_address,
        })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.bind_address).await?;

        tracing::info!("pawgate listening on {}", self.bind_address);
        tracing::info!("Health check available at /health");
        tracing::info!("Readiness check available at /ready");

        // Run server with graceful shutdown
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        },
    }
}
