//! InstanceManager Custom Resource Definition.
//!
//! An InstanceManager represents one managed storage-engine process host on a
//! node. The webhook only reads these objects; every spec field defaults to an
//! empty value on the wire, whether absent or `null`, so that unset fields
//! reach the validation predicate instead of failing to decode.

use std::fmt;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

/// InstanceManager is a custom resource describing a storage-engine process host.
///
/// Example:
/// ```yaml
/// apiVersion: longhorn.io/v1beta2
/// kind: InstanceManager
/// metadata:
///   name: instance-manager-0a1b2c
///   namespace: longhorn-system
///   labels:
///     longhorn.io/node: node-1
///   ownerReferences:
///     - apiVersion: longhorn.io/v1beta2
///       kind: Node
///       name: node-1
///       uid: 5d7c...
/// spec:
///   type: aio
///   dataEngine: v2
///   nodeID: node-1
///   dataEngineSpec:
///     v2:
///       cpuMask: "0x3"
/// ```
#[derive(CustomResource, Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "longhorn.io",
    version = "v1beta2",
    kind = "InstanceManager",
    plural = "instancemanagers",
    shortname = "lhim",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"Data Engine", "type":"string", "jsonPath":".spec.dataEngine"}"#,
    printcolumn = r#"{"name":"Type", "type":"string", "jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Node", "type":"string", "jsonPath":".spec.nodeID"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct InstanceManagerSpec {
    /// Instance manager image.
    #[serde(default, deserialize_with = "null_as_default")]
    pub image: String,

    /// Node the instance manager runs on.
    #[serde(default, rename = "nodeID", deserialize_with = "null_as_default")]
    pub node_id: String,

    /// Role of the instance manager (see [`InstanceManagerType`]).
    #[serde(default, deserialize_with = "null_as_default")]
    pub r#type: String,

    /// Storage engine variant (see [`DataEngineType`]).
    #[serde(default, deserialize_with = "null_as_default")]
    pub data_engine: String,

    /// Engine-specific settings.
    #[serde(default, deserialize_with = "null_as_default")]
    pub data_engine_spec: DataEngineSpec,
}

/// Per-engine settings.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataEngineSpec {
    #[serde(default, deserialize_with = "null_as_default")]
    pub v2: DataEngineV2Spec,
}

/// Settings for the v2 data engine.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataEngineV2Spec {
    /// CPU affinity mask in hexadecimal form, e.g. `0x3`. Empty means unset.
    #[serde(default, deserialize_with = "null_as_default")]
    pub cpu_mask: String,
}

/// Decode `null` as the field's default, matching an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Well-known instance manager roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstanceManagerType {
    Engine,
    Replica,
    AllInOne,
}

impl InstanceManagerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceManagerType::Engine => "engine",
            InstanceManagerType::Replica => "replica",
            InstanceManagerType::AllInOne => "aio",
        }
    }
}

impl fmt::Display for InstanceManagerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known data engine variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataEngineType {
    V1,
    V2,
}

impl DataEngineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataEngineType::V1 => "v1",
            DataEngineType::V2 => "v2",
        }
    }
}

impl fmt::Display for DataEngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
