//! Registry of the CRD kinds crdform knows by type name

use kube::core::ApiResource;
use kube::core::object::HasSpec;
use kube::{CustomResourceExt, Resource};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{ClusterQueue, Kustomization, Mapping, ValidateSpec, ValidationError};

/// Decodes and checks a raw `spec` against a typed model
pub type SpecValidator = fn(&Value) -> Result<(), ValidationError>;

/// One known kind: its type name, API coordinates, scope and validator
#[derive(Clone, Debug)]
pub struct KindEntry {
    type_name: String,
    api_resource: ApiResource,
    namespaced: bool,
    validator: SpecValidator,
}

impl KindEntry {
    /// Builds the entry for a derived custom resource
    #[must_use]
    pub fn of<K>() -> Self
    where
        K: CustomResourceExt + Resource<DynamicType = ()> + HasSpec,
        K::Spec: DeserializeOwned + ValidateSpec,
    {
        let api_resource = ApiResource::erase::<K>(&());
        Self {
            type_name: type_name(
                &api_resource.group,
                &api_resource.version,
                &api_resource.kind,
            ),
            namespaced: K::crd().spec.scope == "Namespaced",
            api_resource,
            validator: validate_spec::<K::Spec>,
        }
    }

    /// Provider type name, e.g. `getambassador_io_mapping_v3alpha1`
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// API coordinates of the kind
    #[must_use]
    pub fn api_resource(&self) -> &ApiResource {
        &self.api_resource
    }

    /// Whether objects of this kind live in a namespace
    #[must_use]
    pub fn namespaced(&self) -> bool {
        self.namespaced
    }

    /// Validator for the kind's `spec`
    #[must_use]
    pub fn validator(&self) -> SpecValidator {
        self.validator
    }

    /// Decodes and checks `spec` against the typed model
    ///
    /// # Errors
    /// Returns the decoding failure or the first broken constraint
    pub fn validate(&self, spec: &Value) -> Result<(), ValidationError> {
        (self.validator)(spec)
    }
}

fn validate_spec<S: DeserializeOwned + ValidateSpec>(spec: &Value) -> Result<(), ValidationError> {
    S::deserialize(spec)?.validate()
}

/// Provider type name for a group, version and kind
///
/// Dots and dashes of the group become underscores; the core group has no prefix.
#[must_use]
pub fn type_name(group: &str, version: &str, kind: &str) -> String {
    let kind = kind.to_lowercase();
    if group.is_empty() {
        return format!("{kind}_{version}");
    }
    let group = group.replace(['.', '-'], "_");
    format!("{group}_{kind}_{version}")
}

/// The set of known kinds
#[derive(Clone, Debug)]
pub struct Catalog {
    entries: Vec<KindEntry>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    /// Catalog with every kind this crate models
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                KindEntry::of::<Mapping>(),
                KindEntry::of::<ClusterQueue>(),
                KindEntry::of::<Kustomization>(),
            ],
        }
    }

    /// All entries, in registration order
    #[must_use]
    pub fn entries(&self) -> &[KindEntry] {
        &self.entries
    }

    /// Looks up a kind by provider type name
    #[must_use]
    pub fn by_type_name(&self, name: &str) -> Option<&KindEntry> {
        self.entries.iter().find(|e| e.type_name == name)
    }

    /// Looks up a kind by `apiVersion` and `kind`
    #[must_use]
    pub fn by_api_version_kind(&self, api_version: &str, kind: &str) -> Option<&KindEntry> {
        self.entries
            .iter()
            .find(|e| e.api_resource.api_version == api_version && e.api_resource.kind == kind)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_names() {
        let catalog = Catalog::builtin();
        let names: Vec<_> = catalog.entries().iter().map(KindEntry::type_name).collect();
        assert_eq!(
            names,
            [
                "getambassador_io_mapping_v3alpha1",
                "kueue_x_k8s_io_clusterqueue_v1beta1",
                "kustomize_toolkit_fluxcd_io_kustomization_v1",
            ]
        );
        assert_eq!(type_name("", "v1", "ConfigMap"), "configmap_v1");
    }

    #[test]
    fn lookups_agree() {
        let catalog = Catalog::builtin();
        let by_name = catalog
            .by_type_name("kueue_x_k8s_io_clusterqueue_v1beta1")
            .unwrap();
        let by_gvk = catalog
            .by_api_version_kind("kueue.x-k8s.io/v1beta1", "ClusterQueue")
            .unwrap();
        assert_eq!(by_name.type_name(), by_gvk.type_name());
        assert_eq!(by_name.api_resource().plural, "clusterqueues");
        assert!(!by_name.namespaced());
        assert!(catalog.by_api_version_kind("v1", "ClusterQueue").is_none());
    }

    #[test]
    fn scope_follows_crd() {
        let catalog = Catalog::builtin();
        let mapping = catalog
            .by_api_version_kind("getambassador.io/v3alpha1", "Mapping")
            .unwrap();
        assert!(mapping.namespaced());
    }

    #[test]
    fn validates_raw_specs() {
        let catalog = Catalog::builtin();
        let ks = catalog
            .by_type_name("kustomize_toolkit_fluxcd_io_kustomization_v1")
            .unwrap();

        let good = json!({
            "interval": "10m",
            "prune": true,
            "sourceRef": {"kind": "GitRepository", "name": "flux-system"},
        });
        assert!(ks.validate(&good).is_ok());

        let missing_prune = json!({
            "interval": "10m",
            "sourceRef": {"kind": "GitRepository", "name": "flux-system"},
        });
        assert!(matches!(
            ks.validate(&missing_prune),
            Err(ValidationError::Malformed(_))
        ));
    }
}
