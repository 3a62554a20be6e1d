// Copyright 2026 Crdform Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Provider internals: condition waits, resource model and dynamic CRUD

use std::time::Duration;

use kube::core::gvk::ParseGroupVersionError;

/// Generic Error for resource operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Kubernetes API (transport) error
    #[error("Kube Error: {0}")]
    KubeError(#[from] kube::Error),

    /// The delete request itself failed, no wait was attempted
    #[error("Deletion Error: {0}")]
    Deletion(#[source] kube::Error),

    /// A wait condition was not met before its deadline
    #[error("wait timeout exceeded: {condition} not met within {timeout:?}")]
    WaitTimeout {
        /// Human readable condition
        condition: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// The addressed object does not exist
    #[error("Not Found: {0}")]
    NotFound(String),

    /// Malformed `JSONPath` expression
    #[error("JSONPath Error: {0}")]
    JsonPath(String),

    /// Malformed duration string
    #[error("Duration Error: {0}")]
    Duration(String),

    /// Malformed import id
    #[error("Invalid Id: {0}")]
    InvalidId(String),

    /// Spec rejected by the typed model of its kind
    #[error("Validation Error: {0}")]
    Validation(#[from] crdform_crd::ValidationError),

    /// `serde_json` errors
    #[error("Serialization Error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// `serde_yaml` errors
    #[error("YAML Error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Kubernetes API group/version parse errors
    #[error("Parse Error: {0}")]
    ParseError(#[from] ParseGroupVersionError),

    /// Kubeconfig could not be loaded
    #[error("Kubeconfig Error: {0}")]
    KubeconfigError(#[from] kube::config::KubeconfigError),

    /// Neither in-cluster nor kubeconfig configuration was found
    #[error("Kube Config Error: {0}")]
    InferConfigError(#[from] kube::config::InferConfigError),

    /// Generic string error messages
    #[error("{0}")]
    Message(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Message(msg)
    }
}

/// Generic result type used across the provider
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub mod config;
pub mod duration;
pub mod jsonpath;
pub mod manifest;
pub mod model;
pub mod resource;
pub mod telemetry;
pub mod wait;

pub use crate::config::ProviderConfig;
pub use crate::model::{ResourceId, ResourceModel};
pub use crate::resource::{DynamicResource, ResolvedKind};
pub use crate::wait::{PollOutcome, UpsertCondition, WaitTiming};
