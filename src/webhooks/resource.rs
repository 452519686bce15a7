//! Resource descriptor for the InstanceManager validator.
//!
//! Declares which resource the validator governs and which admission
//! operations are routed to it. Registration with the API server happens
//! outside this crate; [`AdmissionResource::to_rule`] renders the descriptor
//! in the shape that registration expects.

use k8s_openapi::api::admissionregistration::v1::RuleWithOperations;
use kube::Resource;
use kube::core::admission::Operation;

use crate::crd::InstanceManager;

/// Scope of a governed resource
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Namespaced,
    Cluster,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Namespaced => "Namespaced",
            Scope::Cluster => "Cluster",
        }
    }
}

/// Static description of a resource routed through a validator
#[derive(Clone, Debug, PartialEq)]
pub struct AdmissionResource {
    /// Plural resource name
    pub name: String,
    pub scope: Scope,
    pub api_group: String,
    pub api_version: String,
    /// Kind of the object type the validator narrows to
    pub kind: String,
    /// Operations for which the validator must be invoked
    pub operation_types: Vec<Operation>,
}

impl AdmissionResource {
    /// Descriptor for InstanceManager: namespaced, validated on CREATE and UPDATE
    pub fn instance_manager() -> Self {
        Self {
            name: InstanceManager::plural(&()).into_owned(),
            scope: Scope::Namespaced,
            api_group: InstanceManager::group(&()).into_owned(),
            api_version: InstanceManager::version(&()).into_owned(),
            kind: InstanceManager::kind(&()).into_owned(),
            operation_types: vec![Operation::Create, Operation::Update],
        }
    }

    /// Check if the validator is registered for this operation
    pub fn handles(&self, operation: &Operation) -> bool {
        self.operation_types.contains(operation)
    }

    /// `apiVersion` string of the governed object type
    pub fn api_version_string(&self) -> String {
        if self.api_group.is_empty() {
            self.api_version.clone()
        } else {
            format!("{}/{}", self.api_group, self.api_version)
        }
    }

    /// Render as a ValidatingWebhookConfiguration rule
    pub fn to_rule(&self) -> RuleWithOperations {
        RuleWithOperations {
            api_groups: Some(vec![self.api_group.clone()]),
            api_versions: Some(vec![self.api_version.clone()]),
            operations: Some(
                self.operation_types
                    .iter()
                    .map(|op| operation_name(op).to_string())
                    .collect(),
            ),
            resources: Some(vec![self.name.clone()]),
            scope: Some(self.scope.as_str().to_string()),
        }
    }
}

/// Wire name of an admission operation
pub fn operation_name(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "CREATE",
        Operation::Update => "UPDATE",
        Operation::Delete => "DELETE",
        Operation::Connect => "CONNECT",
    }
}
