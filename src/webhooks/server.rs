//! Admission webhook server.
//!
//! Serves `POST /v1/webhook/validation` for InstanceManager admission reviews.
//!
//! To enable the webhook:
//! 1. Deploy cert-manager for TLS certificates
//! 2. Create a ValidatingWebhookConfiguration using the rule from
//!    [`AdmissionResource::to_rule`](super::AdmissionResource::to_rule)
//! 3. Mount the TLS certificate secret to the pod at /etc/webhook/certs/

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use axum_server::tls_rustls::RustlsConfig;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::resource::operation_name;
use super::validator::InstanceManagerValidator;
use crate::health::{AdmissionOutcome, HealthState};

/// Path the API server posts admission reviews to
pub const VALIDATION_PATH: &str = "/v1/webhook/validation";

/// Shared state for webhook handlers
pub struct WebhookState {
    pub validator: InstanceManagerValidator,
    /// Optional health state for metrics and readiness
    pub health_state: Option<Arc<HealthState>>,
}

impl WebhookState {
    pub fn new(validator: InstanceManagerValidator, health_state: Option<Arc<HealthState>>) -> Self {
        Self {
            validator,
            health_state,
        }
    }
}

/// Result of admitting one request
#[derive(Debug)]
pub struct AdmissionDecision {
    /// HTTP status to answer with
    pub status: StatusCode,
    pub outcome: AdmissionOutcome,
    pub response: AdmissionResponse,
}

impl AdmissionDecision {
    fn allowed(request: &AdmissionRequest<DynamicObject>) -> Self {
        Self {
            status: StatusCode::OK,
            outcome: AdmissionOutcome::Allowed,
            response: AdmissionResponse::from(request),
        }
    }

    fn denied(request: &AdmissionRequest<DynamicObject>, message: &str, reason: &str) -> Self {
        Self {
            status: StatusCode::OK,
            outcome: AdmissionOutcome::Denied,
            response: deny_with_reason(request, message, reason),
        }
    }

    fn internal(request: &AdmissionRequest<DynamicObject>, message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            outcome: AdmissionOutcome::Error,
            response: AdmissionResponse::from(request).deny(message),
        }
    }
}

/// Create a denial response.
/// kube-rs deny() only sets status.message, so a reason code is folded into it as "[reason] message"
fn deny_with_reason(
    request: &AdmissionRequest<DynamicObject>,
    message: &str,
    reason: &str,
) -> AdmissionResponse {
    let full_message = if reason.is_empty() {
        message.to_string()
    } else {
        format!("[{}] {}", reason, message)
    };
    AdmissionResponse::from(request).deny(full_message)
}

/// Route an admission request through the validator and map the outcome
pub async fn admit(
    validator: &InstanceManagerValidator,
    request: &AdmissionRequest<DynamicObject>,
) -> AdmissionDecision {
    let uid = &request.uid;
    debug!(
        uid = %uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing admission request"
    );

    if !validator.resource().handles(&request.operation) {
        info!(uid = %uid, operation = ?request.operation, "Admission request allowed (operation not validated)");
        return AdmissionDecision::allowed(request);
    }

    let Some(new_obj) = request.object.as_ref() else {
        error!(uid = %uid, "Missing object in request");
        return AdmissionDecision::denied(request, "Missing object in request", "InvalidRequest");
    };

    let result = match request.operation {
        Operation::Update => {
            let Some(old_obj) = request.old_object.as_ref() else {
                error!(uid = %uid, "Missing oldObject in UPDATE request");
                return AdmissionDecision::denied(
                    request,
                    "Missing oldObject in UPDATE request",
                    "InvalidRequest",
                );
            };
            validator.update(request, old_obj, new_obj).await
        }
        _ => validator.create(request, new_obj).await,
    };

    match result {
        Ok(()) => {
            info!(uid = %uid, name = %request.name, "Admission request allowed");
            AdmissionDecision::allowed(request)
        }
        Err(e) if e.is_internal() => {
            error!(uid = %uid, error = %e, "Admission request routed to the wrong validator");
            AdmissionDecision::internal(request, &e.to_string())
        }
        Err(e) => {
            let message = e.to_string();
            warn!(uid = %uid, name = %request.name, reason = %e.reason(), message = %message, "Admission request denied");
            AdmissionDecision::denied(request, &message, e.reason())
        }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(VALIDATION_PATH, post(validate_instance_manager))
        .with_state(state)
}

/// InstanceManager admission webhook handler
async fn validate_instance_manager(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> impl IntoResponse {
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            );
        }
    };

    let started = Instant::now();
    let decision = admit(&state.validator, &request).await;

    if let Some(health) = &state.health_state {
        health.metrics.record_admission(
            operation_name(&request.operation),
            decision.outcome,
            started.elapsed().as_secs_f64(),
        );
    }

    (decision.status, Json(decision.response.into_review()))
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("Webhook server error: {0}")]
    Server(String),
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0 on `port` and marks the health state ready once TLS
/// material is loaded.
///
/// # Arguments
/// * `state` - Shared webhook state
/// * `port` - Port to listen on
/// * `cert_path` - Path to TLS certificate file (PEM format)
/// * `key_path` - Path to TLS private key file (PEM format)
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    port: u16,
    cert_path: &str,
    key_path: &str,
) -> Result<(), WebhookError> {
    let health_state = state.health_state.clone();
    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(PathBuf::from(cert_path), PathBuf::from(key_path))
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port = port, path = VALIDATION_PATH, "Webhook server listening with TLS");

    if let Some(health) = &health_state {
        health.set_ready(true).await;
    }

    axum_server::bind_rustls(addr, config)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
