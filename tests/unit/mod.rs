// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for instance-manager-webhook.
//!
//! These tests run without a Kubernetes cluster and exercise the validator
//! through its public entry points.

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use common::fixtures::{InstanceManagerBuilder, RecordingChecker, admission_request};
use instance_manager_webhook::webhooks::{
    CpuMaskError, Error, HostCpuMaskChecker, InstanceManagerValidator, Operation,
};

fn validator_with(checker: Arc<RecordingChecker>) -> InstanceManagerValidator {
    InstanceManagerValidator::new(checker, Duration::from_secs(1))
}

mod create_tests {
    use super::*;

    #[tokio::test]
    async fn test_example_object_accepted() {
        let checker = Arc::new(RecordingChecker::default());
        let validator = validator_with(checker.clone());
        let obj = InstanceManagerBuilder::new("im-1")
            .data_engine("v2")
            .build_dynamic();
        let request = admission_request("CREATE", None, None);

        assert!(validator.create(&request, &obj).await.is_ok());
        assert!(checker.calls().is_empty());
    }

    #[tokio::test]
    async fn test_example_object_without_labels_rejected() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let obj = InstanceManagerBuilder::new("im-1")
            .data_engine("v2")
            .without_labels()
            .build_dynamic();
        let request = admission_request("CREATE", None, None);

        let err = validator.create(&request, &obj).await.unwrap_err();
        assert_eq!(
            err,
            Error::Invalid {
                message: "labels for instanceManager im-1 is not set".to_string(),
                reason: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn test_labels_with_entries_accepted() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let obj = InstanceManagerBuilder::new("im-1")
            .label("longhorn.io/node", "node-1")
            .build_dynamic();
        let request = admission_request("CREATE", None, None);

        assert!(validator.create(&request, &obj).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_owner_references_rejected() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let obj = InstanceManagerBuilder::new("im-2")
            .without_owner_references()
            .build_dynamic();
        let request = admission_request("CREATE", None, None);

        let message = validator.create(&request, &obj).await.unwrap_err().to_string();
        assert!(message.contains("ownerReferences"));
        assert!(message.contains("im-2"));
    }

    #[tokio::test]
    async fn test_empty_owner_references_accepted() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let obj = InstanceManagerBuilder::new("im-2")
            .empty_owner_references()
            .build_dynamic();
        let request = admission_request("CREATE", None, None);

        assert!(validator.create(&request, &obj).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_type_rejected() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let obj = InstanceManagerBuilder::new("im-3")
            .instance_manager_type("")
            .build_dynamic();
        let request = admission_request("CREATE", None, None);

        let message = validator.create(&request, &obj).await.unwrap_err().to_string();
        assert_eq!(message, "type for instanceManager im-3 is not set");
    }

    #[tokio::test]
    async fn test_empty_data_engine_rejected() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let obj = InstanceManagerBuilder::new("im-4")
            .data_engine("")
            .build_dynamic();
        let request = admission_request("CREATE", None, None);

        let message = validator.create(&request, &obj).await.unwrap_err().to_string();
        assert!(message.contains("data engine"));
        assert!(message.contains("im-4"));
    }

    #[tokio::test]
    async fn test_cpu_mask_checked_exactly_once() {
        let checker = Arc::new(RecordingChecker::default());
        let validator = validator_with(checker.clone());
        let obj = InstanceManagerBuilder::new("im-5")
            .data_engine("v2")
            .cpu_mask("0x3")
            .build_dynamic();
        let request = admission_request("CREATE", None, None);

        assert!(validator.create(&request, &obj).await.is_ok());
        assert_eq!(checker.calls(), vec!["0x3".to_string()]);
    }

    #[tokio::test]
    async fn test_cpu_mask_rejection_message_is_checker_text() {
        let checker_error = CpuMaskError::ExceedsHost {
            max: 15,
            mask: "0x10".to_string(),
        };
        let checker = Arc::new(RecordingChecker::rejecting("0x10", checker_error.clone()));
        let validator = validator_with(checker.clone());
        let obj = InstanceManagerBuilder::new("im-6")
            .data_engine("v2")
            .cpu_mask("0x10")
            .build_dynamic();
        let request = admission_request("CREATE", None, None);

        let err = validator.create(&request, &obj).await.unwrap_err();
        assert_eq!(err.to_string(), checker_error.to_string());
        assert!(!err.is_internal());
        assert_eq!(checker.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_host_checker_rejects_malformed_mask() {
        let checker = HostCpuMaskChecker::new(8, 8000).unwrap();
        let validator = InstanceManagerValidator::new(Arc::new(checker), Duration::from_secs(1));
        let obj = InstanceManagerBuilder::new("im-7")
            .data_engine("v2")
            .cpu_mask("3")
            .build_dynamic();
        let request = admission_request("CREATE", None, None);

        let err = validator.create(&request, &obj).await.unwrap_err();
        assert_eq!(err.to_string(), "invalid CPU mask: 3");
    }

    #[tokio::test]
    async fn test_non_instance_manager_is_type_mismatch() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let obj = serde_json::from_value(serde_json::json!({
            "apiVersion": "longhorn.io/v1beta2",
            "kind": "Volume",
            "metadata": { "name": "vol-1", "namespace": "longhorn-system" },
            "spec": {}
        }))
        .unwrap();
        let request = admission_request("CREATE", None, None);

        let err = validator.create(&request, &obj).await.unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
        assert!(err.is_internal());
    }
}

mod missing_spec_tests {
    use super::*;

    fn im_without_spec(spec: Option<serde_json::Value>) -> kube::core::DynamicObject {
        let mut object = serde_json::json!({
            "apiVersion": "longhorn.io/v1beta2",
            "kind": "InstanceManager",
            "metadata": {
                "name": "im-9",
                "namespace": "longhorn-system",
                "labels": {},
                "ownerReferences": []
            }
        });
        if let Some(spec) = spec {
            object["spec"] = spec;
        }
        serde_json::from_value(object).unwrap()
    }

    fn type_not_set() -> Error {
        Error::Invalid {
            message: "type for instanceManager im-9 is not set".to_string(),
            reason: String::new(),
        }
    }

    #[tokio::test]
    async fn test_absent_spec_rejected_as_type_not_set() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let request = admission_request("CREATE", None, None);

        let err = validator.create(&request, &im_without_spec(None)).await.unwrap_err();
        assert_eq!(err, type_not_set());
        assert!(!err.is_internal());
    }

    #[tokio::test]
    async fn test_null_spec_rejected_as_type_not_set() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let request = admission_request("CREATE", None, None);
        let obj = im_without_spec(Some(serde_json::Value::Null));

        assert_eq!(validator.create(&request, &obj).await.unwrap_err(), type_not_set());
    }

    #[tokio::test]
    async fn test_null_type_rejected_as_type_not_set() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let request = admission_request("UPDATE", None, None);
        let obj = im_without_spec(Some(serde_json::json!({ "type": null, "dataEngine": "v1" })));

        assert_eq!(
            validator.update(&request, &obj, &obj).await.unwrap_err(),
            type_not_set()
        );
    }

    #[tokio::test]
    async fn test_null_data_engine_rejected() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let request = admission_request("CREATE", None, None);
        let obj = im_without_spec(Some(serde_json::json!({ "type": "aio", "dataEngine": null })));

        let message = validator.create(&request, &obj).await.unwrap_err().to_string();
        assert_eq!(message, "data engine for instanceManager im-9 is not set");
    }

    #[tokio::test]
    async fn test_wrongly_typed_field_is_type_mismatch() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let request = admission_request("CREATE", None, None);
        let obj = im_without_spec(Some(serde_json::json!({ "type": 7 })));

        let err = validator.create(&request, &obj).await.unwrap_err();
        assert!(matches!(err, Error::TypeMismatch(_)));
    }
}

mod update_tests {
    use super::*;

    #[tokio::test]
    async fn test_type_change_accepted() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let old = InstanceManagerBuilder::new("im-1")
            .instance_manager_type("engine")
            .build_dynamic();
        let new = InstanceManagerBuilder::new("im-1")
            .instance_manager_type("aio")
            .build_dynamic();
        let request = admission_request("UPDATE", None, None);

        assert!(validator.update(&request, &old, &new).await.is_ok());
    }

    #[tokio::test]
    async fn test_only_new_object_validated() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let old = InstanceManagerBuilder::new("im-1").without_labels().build_dynamic();
        let new = InstanceManagerBuilder::new("im-1").build_dynamic();
        let request = admission_request("UPDATE", None, None);

        assert!(validator.update(&request, &old, &new).await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_new_object_rejected() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let old = InstanceManagerBuilder::new("im-1").build_dynamic();
        let new = InstanceManagerBuilder::new("im-1").without_labels().build_dynamic();
        let request = admission_request("UPDATE", None, None);

        let err = validator.update(&request, &old, &new).await.unwrap_err();
        assert!(err.to_string().contains("labels for instanceManager im-1"));
    }

    #[tokio::test]
    async fn test_old_object_of_other_kind_ignored() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let old = serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": { "name": "cm" }
        }))
        .unwrap();
        let new = InstanceManagerBuilder::new("im-1").build_dynamic();
        let request = admission_request("UPDATE", None, None);

        assert!(validator.update(&request, &old, &new).await.is_ok());
    }
}

mod resource_tests {
    use super::*;

    #[test]
    fn test_validator_descriptor() {
        let validator = validator_with(Arc::new(RecordingChecker::default()));
        let resource = validator.resource();
        assert_eq!(resource.name, "instancemanagers");
        assert_eq!(resource.api_group, "longhorn.io");
        assert_eq!(resource.api_version, "v1beta2");
        assert_eq!(resource.operation_types, vec![Operation::Create, Operation::Update]);
    }
}

mod fixture_tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let im = InstanceManagerBuilder::new("test").build();
        assert_eq!(im.metadata.name, Some("test".to_string()));
        assert_eq!(im.metadata.labels, Some(BTreeMap::new()));
        assert_eq!(im.spec.r#type, "engine");
        assert!(im.spec.data_engine_spec.v2.cpu_mask.is_empty());
    }

    #[test]
    fn test_builder_json_identity() {
        let value = InstanceManagerBuilder::new("test").build_json();
        assert_eq!(value["apiVersion"], "longhorn.io/v1beta2");
        assert_eq!(value["kind"], "InstanceManager");
    }
}
