//! Validating admission webhook for InstanceManager resources.
//!
//! - [`resource`]: which resource and operations are routed here
//! - [`validator`]: entry points and the validation predicate
//! - [`cpu_mask`]: the CPU mask checker capability
//! - [`error`]: violation taxonomy and the invalid-request wrapper
//! - [`server`]: the HTTPS admission endpoint

pub mod cpu_mask;
pub mod error;
pub mod resource;
pub mod server;
pub mod validator;

pub use cpu_mask::{CpuMaskChecker, CpuMaskError, HostCpuMaskChecker};
pub use error::{Error, RequiredField, Result, Violation};
pub use resource::{AdmissionResource, Scope};
pub use server::{
    AdmissionDecision, VALIDATION_PATH, WebhookError, WebhookState, admit, create_webhook_router,
    run_webhook_server,
};
pub use validator::{DEFAULT_CPU_MASK_CHECK_TIMEOUT, InstanceManagerValidator};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
