//! Custom Resource Definitions governed by this webhook.
//!
//! - `InstanceManager`: a managed storage-engine process host

mod instance_manager;

pub use instance_manager::*;
