//! `getambassador.io/v3alpha1` resources

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ValidateSpec, ValidationError};

/// Spec object for the Emissary `Mapping` CRD
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[serde(rename_all = "camelCase")]
#[kube(kind = "Mapping", group = "getambassador.io", version = "v3alpha1")]
#[kube(namespaced)]
pub struct MappingSpec {
    /// Hostname (or glob) that requests must carry to be routed by this mapping
    pub hostname: Option<String>,
    /// URL prefix identifying the route
    #[schemars(length(min = 1))]
    pub prefix: String,
    /// Upstream service, as `[scheme://]service[.namespace][:port]`
    #[schemars(length(min = 1))]
    pub service: String,
    /// Replacement for the matched prefix, defaults to `/` upstream
    pub rewrite: Option<String>,
    /// Per-request timeout in milliseconds
    #[schemars(range(min = 0))]
    pub timeout_ms: Option<i64>,
    /// Ambassador ids this mapping belongs to
    pub ambassador_id: Option<Vec<String>>,
    /// Headers a request must carry to match
    pub headers: Option<BTreeMap<String, String>>,
}

impl ValidateSpec for MappingSpec {
    fn validate(&self) -> Result<(), ValidationError> {
        if !self.prefix.starts_with('/') {
            return Err(ValidationError::field("prefix", "must start with '/'"));
        }
        if self.service.trim().is_empty() {
            return Err(ValidationError::field("service", "must not be empty"));
        }
        if self.timeout_ms.is_some_and(|t| t < 0) {
            return Err(ValidationError::field("timeoutMs", "must not be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn prefix_must_be_absolute() {
        let spec = MappingSpec {
            prefix: "backend/".into(),
            service: "quote".into(),
            ..Default::default()
        };
        let err = spec.validate().unwrap_err();
        assert_eq!(err.to_string(), "spec.prefix: must start with '/'");
    }

    #[test]
    fn valid_mapping() {
        let spec = MappingSpec {
            prefix: "/backend/".into(),
            service: "quote:8080".into(),
            timeout_ms: Some(3000),
            ..Default::default()
        };
        assert!(spec.validate().is_ok());
    }
}
