pub mod config;
pub mod config_validator;
pub mod endpoint;
pub mod error;
pub mod generation;
pub mod handlers;
pub mod health;
pub mod keys;
pub mod kv;
pub mod metrics;
pub mod middleware;
pub mod orchestrator;
pub mod payloads;
pub mod policy;
pub mod prompts;
pub mod quota;
pub mod rate_limiter;
pub mod server;
pub mod verification;

pub use config::Config;
pub use endpoint::Endpoint;
pub use error::ApiError;
pub use orchestrator::{Orchestrator, RequestContext};
pub use server::create_app;
