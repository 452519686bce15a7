//! instance-manager-webhook library crate
//!
//! Validating admission webhook for InstanceManager custom resources: the
//! CRD model, the validator and its HTTPS surface, health/metrics, and
//! configuration.

pub mod config;
pub mod crd;
pub mod health;
pub mod webhooks;

pub use config::{Config, ConfigError};
pub use health::HealthState;
pub use webhooks::{
    InstanceManagerValidator, WebhookError, WebhookState, create_webhook_router,
    run_webhook_server,
};
