//! Rendering a resource model as a plain Kubernetes manifest

use serde::Serialize;
use serde_json::Value;

use crate::Result;
use crate::model::{Metadata, ResourceModel};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Manifest<'a> {
    api_version: &'a str,
    kind: &'a str,
    metadata: &'a Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    spec: Option<&'a Value>,
}

/// YAML manifest of `model`, without any of its wait configuration
///
/// # Errors
/// Returns [`crate::Error::YamlError`] if the spec cannot be encoded
pub fn render_manifest(model: &ResourceModel) -> Result<String> {
    let manifest = Manifest {
        api_version: &model.api_version,
        kind: &model.kind,
        metadata: &model.metadata,
        spec: Some(&model.spec).filter(|spec| !spec.is_null()),
    };
    Ok(serde_yaml::to_string(&manifest)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn renders_kubernetes_shape() {
        let model = ResourceModel::from_yaml(
            r"
api_version: kueue.x-k8s.io/v1beta1
kind: ClusterQueue
metadata:
  name: team-a
spec:
  cohort: research
wait_for_upsert:
  - jsonpath: .metadata.uid
",
        )
        .unwrap();

        let rendered = render_manifest(&model).unwrap();
        assert_eq!(
            rendered,
            "apiVersion: kueue.x-k8s.io/v1beta1\n\
             kind: ClusterQueue\n\
             metadata:\n  name: team-a\n\
             spec:\n  cohort: research\n"
        );
    }

    #[test]
    fn omits_missing_spec() {
        let model = ResourceModel::from_yaml(
            r"
apiVersion: getambassador.io/v3alpha1
kind: Mapping
metadata:
  name: quote
  namespace: emissary
  annotations:
    owner: edge
",
        )
        .unwrap();

        let rendered = render_manifest(&model).unwrap();
        assert!(!rendered.contains("spec"));
        assert!(rendered.contains("namespace: emissary"));
        assert!(rendered.contains("annotations:\n    owner: edge"));
    }
}
