//! InstanceManager validator.
//!
//! Admission entry points narrow the opaque request object to an
//! [`InstanceManager`] and run the validation predicate on it. The predicate
//! checks, in order and stopping at the first violation:
//!
//! 1. `metadata.labels` is set (an empty map counts as set)
//! 2. `metadata.ownerReferences` is set (an empty list counts as set)
//! 3. `spec.type` is non-empty
//! 4. `spec.dataEngine` is non-empty
//! 5. a non-empty `spec.dataEngineSpec.v2.cpuMask` passes the CPU mask checker
//!
//! UPDATE validates only the new object. No field is protected against
//! change between the old and new object.

use std::sync::Arc;
use std::time::Duration;

use kube::ResourceExt;
use kube::core::DynamicObject;
use kube::core::admission::AdmissionRequest;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::cpu_mask::CpuMaskChecker;
use super::error::{Error, RequiredField, Result, Violation};
use super::resource::AdmissionResource;
use crate::crd::InstanceManager;

/// Default upper bound for a single CPU mask check
pub const DEFAULT_CPU_MASK_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

/// Validator for InstanceManager admission requests
#[derive(Clone)]
pub struct InstanceManagerValidator {
    cpu_mask_checker: Arc<dyn CpuMaskChecker>,
    check_timeout: Duration,
    resource: AdmissionResource,
}

impl InstanceManagerValidator {
    pub fn new(cpu_mask_checker: Arc<dyn CpuMaskChecker>, check_timeout: Duration) -> Self {
        Self {
            cpu_mask_checker,
            check_timeout,
            resource: AdmissionResource::instance_manager(),
        }
    }

    /// The resource this validator governs
    pub fn resource(&self) -> &AdmissionResource {
        &self.resource
    }

    /// Validate an InstanceManager on CREATE
    pub async fn create(
        &self,
        request: &AdmissionRequest<DynamicObject>,
        new_obj: &DynamicObject,
    ) -> Result<()> {
        let im = self.narrow(new_obj)?;
        debug!(uid = %request.uid, name = %im.name_any(), "Validating InstanceManager create");
        self.validate(&im).await.map_err(|v| reject(&request.uid, v))
    }

    /// Validate an InstanceManager on UPDATE
    ///
    /// Only `new_obj` is validated; `old_obj` is not consulted.
    pub async fn update(
        &self,
        request: &AdmissionRequest<DynamicObject>,
        _old_obj: &DynamicObject,
        new_obj: &DynamicObject,
    ) -> Result<()> {
        let im = self.narrow(new_obj)?;
        debug!(uid = %request.uid, name = %im.name_any(), "Validating InstanceManager update");
        self.validate(&im).await.map_err(|v| reject(&request.uid, v))
    }

    /// Narrow an opaque object to an InstanceManager.
    ///
    /// Fails with [`Error::TypeMismatch`] if the object's `apiVersion`/`kind`
    /// do not match the governed resource or its body does not decode. A
    /// missing or `null` `spec` decodes as an empty spec so the predicate
    /// reports the unset fields.
    pub fn narrow(&self, obj: &DynamicObject) -> Result<InstanceManager> {
        let (api_version, kind) = obj
            .types
            .as_ref()
            .map(|t| (t.api_version.as_str(), t.kind.as_str()))
            .unwrap_or_default();
        let describe = || {
            format!(
                "{}/{} {}/{}",
                api_version,
                kind,
                obj.namespace().unwrap_or_default(),
                obj.name_any()
            )
        };

        if api_version != self.resource.api_version_string() || kind != self.resource.kind {
            return Err(Error::TypeMismatch(describe()));
        }

        let mut value = serde_json::to_value(obj)
            .map_err(|e| Error::TypeMismatch(format!("{} ({})", describe(), e)))?;
        if let Some(fields) = value.as_object_mut() {
            let spec = fields.entry("spec").or_insert(Value::Null);
            if spec.is_null() {
                *spec = Value::Object(Map::new());
            }
        }
        serde_json::from_value(value)
            .map_err(|e| Error::TypeMismatch(format!("{} ({})", describe(), e)))
    }

    /// Check the InstanceManager invariants, returning the first violation.
    pub async fn validate(&self, im: &InstanceManager) -> std::result::Result<(), Violation> {
        let name = im.name_any();

        if im.metadata.labels.is_none() {
            return Err(Violation::missing(RequiredField::Labels, &name));
        }

        if im.metadata.owner_references.is_none() {
            return Err(Violation::missing(RequiredField::OwnerReferences, &name));
        }

        if im.spec.r#type.is_empty() {
            return Err(Violation::missing(RequiredField::Type, &name));
        }

        if im.spec.data_engine.is_empty() {
            return Err(Violation::missing(RequiredField::DataEngine, &name));
        }

        let cpu_mask = &im.spec.data_engine_spec.v2.cpu_mask;
        if !cpu_mask.is_empty() {
            self.check_cpu_mask(&name, cpu_mask).await?;
        }

        Ok(())
    }

    /// Run the CPU mask checker on the blocking pool, bounded by the check timeout
    async fn check_cpu_mask(&self, name: &str, mask: &str) -> std::result::Result<(), Violation> {
        let checker = Arc::clone(&self.cpu_mask_checker);
        let owned_mask = mask.to_string();
        let check = tokio::task::spawn_blocking(move || checker.validate_cpu_mask(&owned_mask));

        match tokio::time::timeout(self.check_timeout, check).await {
            Ok(Ok(result)) => result.map_err(|e| Violation::InvalidFormat(e.to_string())),
            Ok(Err(join_err)) => {
                warn!(name = %name, mask = %mask, error = %join_err, "CPU mask check aborted");
                Err(Violation::CpuMaskCheckAborted {
                    mask: mask.to_string(),
                    name: name.to_string(),
                    reason: join_err.to_string(),
                })
            }
            Err(_) => {
                warn!(
                    name = %name,
                    mask = %mask,
                    timeout_ms = self.check_timeout.as_millis() as u64,
                    "CPU mask check timed out"
                );
                Err(Violation::CpuMaskCheckTimedOut {
                    mask: mask.to_string(),
                    name: name.to_string(),
                    timeout: self.check_timeout,
                })
            }
        }
    }
}

/// Wrap a violation for the admission pipeline
fn reject(uid: &str, violation: Violation) -> Error {
    if let Violation::MissingField { field, name } = &violation {
        debug!(uid = %uid, name = %name, field = field.path(), "Required field not set");
    }
    Error::from(violation)
}
