//! `kustomize.toolkit.fluxcd.io/v1` resources

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ValidateSpec, ValidationError};

/// Spec object for the Flux `Kustomization` CRD
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[serde(rename_all = "camelCase")]
#[kube(
    kind = "Kustomization",
    group = "kustomize.toolkit.fluxcd.io",
    version = "v1",
    shortname = "ks"
)]
#[kube(namespaced)]
pub struct KustomizationSpec {
    /// Reconciliation interval, e.g. `10m`
    pub interval: String,
    /// Path to the kustomization inside the source
    pub path: Option<String>,
    /// Garbage collect objects removed from the source
    pub prune: bool,
    /// Source the manifests come from
    pub source_ref: CrossNamespaceSourceReference,
    /// Namespace overriding every object's namespace
    pub target_namespace: Option<String>,
    /// Timeout for apply and health checks
    pub timeout: Option<String>,
    /// Wait for all applied objects to become ready
    pub wait: Option<bool>,
    /// Stop reconciling while set
    pub suspend: Option<bool>,
    /// Kustomizations that must be ready first
    pub depends_on: Option<Vec<DependencyReference>>,
}

/// Reference to a Flux source
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrossNamespaceSourceReference {
    /// Source API version
    pub api_version: Option<String>,
    /// Source kind
    pub kind: String,
    /// Source name
    pub name: String,
    /// Source namespace, defaults to the kustomization's
    pub namespace: Option<String>,
}

/// Reference to another `Kustomization`
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
pub struct DependencyReference {
    /// Name of the dependency
    pub name: String,
    /// Namespace of the dependency
    pub namespace: Option<String>,
}

const SOURCE_KINDS: [&str; 3] = ["GitRepository", "OCIRepository", "Bucket"];

impl ValidateSpec for KustomizationSpec {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.interval.trim().is_empty() {
            return Err(ValidationError::field("interval", "must not be empty"));
        }
        if !SOURCE_KINDS.contains(&self.source_ref.kind.as_str()) {
            let reason = format!("must be one of {}", SOURCE_KINDS.join(", "));
            return Err(ValidationError::field("sourceRef.kind", reason));
        }
        if self.source_ref.name.is_empty() {
            return Err(ValidationError::field("sourceRef.name", "must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_source_kind() {
        let spec = KustomizationSpec {
            interval: "10m".into(),
            source_ref: CrossNamespaceSourceReference {
                kind: "HelmRepository".into(),
                name: "podinfo".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(spec.validate().is_err());
    }
}
