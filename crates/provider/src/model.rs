//! Resource configuration as written by users, and the ids objects are imported by

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::duration::parse_duration;
use crate::jsonpath::JsonPath;
use crate::wait::{UpsertCondition, WaitTiming};
use crate::{Error, Result};

fn default_timeout() -> String {
    "30s".to_string()
}

fn default_poll_interval() -> String {
    "5s".to_string()
}

/// One custom resource and how to wait on it
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ResourceModel {
    /// `group/version` of the kind
    #[serde(alias = "apiVersion")]
    pub api_version: String,
    /// Kind name
    pub kind: String,
    /// Object identity and labels
    pub metadata: Metadata,
    /// Free-form `spec` of the object
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub spec: Value,
    /// Conditions awaited after every create or update, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wait_for_upsert: Vec<WaitForUpsert>,
    /// Wait for the object to disappear after delete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_delete: Option<WaitForDelete>,
}

/// Subset of `ObjectMeta` managed through the provider
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Metadata {
    /// Object name
    pub name: String,
    /// Namespace, only for namespaced kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// A `wait_for_upsert` block
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct WaitForUpsert {
    /// Field to inspect, e.g. `.status.phase`
    pub jsonpath: String,
    /// Value the field must have, any non-empty value when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// How long to wait, negative means a week
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// How often to look
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

impl WaitForUpsert {
    /// Parsed condition
    ///
    /// # Errors
    /// Returns [`Error::JsonPath`] for a malformed `jsonpath`
    pub fn condition(&self) -> Result<UpsertCondition> {
        Ok(UpsertCondition::new(JsonPath::parse(&self.jsonpath)?, self.value.clone()))
    }

    /// Parsed timing
    ///
    /// # Errors
    /// Returns [`Error::Duration`] for malformed durations
    pub fn timing(&self) -> Result<WaitTiming> {
        WaitTiming::from_signed(
            parse_duration(&self.timeout)?,
            parse_duration(&self.poll_interval)?,
        )
    }
}

/// A `wait_for_delete` block
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct WaitForDelete {
    /// How long to wait, negative means a week
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// How often to look
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
}

impl Default for WaitForDelete {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

impl WaitForDelete {
    /// Parsed timing
    ///
    /// # Errors
    /// Returns [`Error::Duration`] for malformed durations
    pub fn timing(&self) -> Result<WaitTiming> {
        WaitTiming::from_signed(
            parse_duration(&self.timeout)?,
            parse_duration(&self.poll_interval)?,
        )
    }
}

impl ResourceModel {
    /// Reads a model from YAML (or JSON)
    ///
    /// # Errors
    /// Returns [`Error::YamlError`] when the document does not match the model
    pub fn from_yaml(doc: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(doc)?)
    }

    /// Id of the object this model addresses
    #[must_use]
    pub fn id(&self) -> ResourceId {
        ResourceId {
            namespace: self.metadata.namespace.clone(),
            name: self.metadata.name.clone(),
        }
    }

    /// Every upsert condition with its timing, parsed up front
    ///
    /// # Errors
    /// Returns the first malformed `jsonpath` or duration
    pub fn upsert_waits(&self) -> Result<Vec<(UpsertCondition, WaitTiming)>> {
        self.wait_for_upsert
            .iter()
            .map(|w| -> Result<_> { Ok((w.condition()?, w.timing()?)) })
            .collect()
    }

    /// Delete wait timing, `None` when no wait is configured
    ///
    /// # Errors
    /// Returns [`Error::Duration`] for malformed durations
    pub fn delete_wait(&self) -> Result<Option<WaitTiming>> {
        self.wait_for_delete
            .as_ref()
            .map(WaitForDelete::timing)
            .transpose()
    }

    /// The object sent with server-side apply
    #[must_use]
    pub fn to_object(&self, ar: &ApiResource) -> DynamicObject {
        let mut object = DynamicObject::new(&self.metadata.name, ar);
        object.metadata.namespace.clone_from(&self.metadata.namespace);
        if !self.metadata.labels.is_empty() {
            object.metadata.labels = Some(self.metadata.labels.clone());
        }
        if !self.metadata.annotations.is_empty() {
            object.metadata.annotations = Some(self.metadata.annotations.clone());
        }
        if !self.spec.is_null() {
            object.data = serde_json::json!({ "spec": self.spec });
        }
        object
    }

    /// Copy of this model with metadata and `spec` taken from the live object
    ///
    /// The wait configuration is kept.
    #[must_use]
    pub fn refreshed(&self, object: &DynamicObject) -> Self {
        let mut model = self.clone();
        model.metadata.labels = object.metadata.labels.clone().unwrap_or_default();
        model.metadata.annotations = object.metadata.annotations.clone().unwrap_or_default();
        model.spec = object.data.get("spec").cloned().unwrap_or(Value::Null);
        model
    }

    /// Model describing a live object, with no waits configured
    ///
    /// # Errors
    /// Returns [`Error::Message`] when the object has no name
    pub fn from_object(object: &DynamicObject, ar: &ApiResource) -> Result<Self> {
        let name = object
            .metadata
            .name
            .clone()
            .ok_or_else(|| "Object has a missing name".to_string())?;
        let model = Self {
            api_version: ar.api_version.clone(),
            kind: ar.kind.clone(),
            metadata: Metadata {
                name,
                namespace: object.metadata.namespace.clone(),
                ..Metadata::default()
            },
            spec: Value::Null,
            wait_for_upsert: Vec::new(),
            wait_for_delete: None,
        };
        Ok(model.refreshed(object))
    }
}

/// `namespace/name` for namespaced objects, `name` for cluster-scoped ones
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceId {
    /// Namespace, if any
    pub namespace: Option<String>,
    /// Object name
    pub name: String,
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(id: &str) -> Result<Self> {
        let invalid = || Error::InvalidId(format!("{id:?}, expected 'namespace/name' or 'name'"));
        let (namespace, name) = match id.split_once('/') {
            Some((ns, name)) => (Some(ns), name),
            None => (None, id),
        };
        if name.is_empty() || name.contains('/') || namespace.is_some_and(str::is_empty) {
            return Err(invalid());
        }
        Ok(Self {
            namespace: namespace.map(String::from),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use crdform_crd::Mapping;
    use serde_json::json;

    use super::*;

    const MAPPING: &str = r#"
apiVersion: getambassador.io/v3alpha1
kind: Mapping
metadata:
  name: quote
  namespace: emissary
  labels:
    team: edge
spec:
  prefix: /backend/
  service: quote
wait_for_upsert:
  - jsonpath: .status.state
    value: Running
    timeout: 2m
  - jsonpath: .metadata.uid
wait_for_delete: {}
"#;

    fn mapping_resource() -> ApiResource {
        ApiResource::erase::<Mapping>(&())
    }

    #[test]
    fn parses_with_defaults() {
        let model = ResourceModel::from_yaml(MAPPING).unwrap();
        assert_eq!(model.api_version, "getambassador.io/v3alpha1");
        assert_eq!(model.id().to_string(), "emissary/quote");

        let waits = model.upsert_waits().unwrap();
        assert_eq!(waits.len(), 2);
        assert_eq!(waits[0].1.timeout, Duration::from_secs(120));
        assert_eq!(waits[0].1.poll_interval, Duration::from_secs(5));
        assert_eq!(waits[1].0.to_string(), ".metadata.uid");
        assert_eq!(waits[1].1, WaitTiming::default());

        assert_eq!(model.delete_wait().unwrap(), Some(WaitTiming::default()));
    }

    #[test]
    fn bad_waits_are_reported() {
        let mut model = ResourceModel::from_yaml(MAPPING).unwrap();
        model.wait_for_upsert[0].timeout = "soon".into();
        assert!(matches!(model.upsert_waits(), Err(Error::Duration(_))));

        let mut model = ResourceModel::from_yaml(MAPPING).unwrap();
        model.wait_for_upsert[1].jsonpath = ".status[".into();
        assert!(matches!(model.upsert_waits(), Err(Error::JsonPath(_))));

        let mut model = ResourceModel::from_yaml(MAPPING).unwrap();
        model.wait_for_upsert[1].jsonpath = r#".status.conditions[?(@.type!="Ready")]"#.into();
        assert!(matches!(model.upsert_waits(), Err(Error::JsonPath(_))));

        let mut model = ResourceModel::from_yaml(MAPPING).unwrap();
        model.wait_for_delete.as_mut().unwrap().poll_interval = "0s".into();
        assert!(matches!(model.delete_wait(), Err(Error::Duration(_))));
    }

    #[test]
    fn object_round_trip() {
        let model = ResourceModel::from_yaml(MAPPING).unwrap();
        let ar = mapping_resource();
        let object = model.to_object(&ar);

        let types = object.types.as_ref().unwrap();
        assert_eq!(types.api_version, "getambassador.io/v3alpha1");
        assert_eq!(types.kind, "Mapping");
        assert_eq!(object.metadata.namespace.as_deref(), Some("emissary"));
        assert_eq!(object.data["spec"]["prefix"], "/backend/");

        let imported = ResourceModel::from_object(&object, &ar).unwrap();
        assert_eq!(imported.metadata, model.metadata);
        assert_eq!(imported.spec, model.spec);
        assert!(imported.wait_for_upsert.is_empty());
    }

    #[test]
    fn refresh_keeps_waits() {
        let model = ResourceModel::from_yaml(MAPPING).unwrap();
        let mut live = model.to_object(&mapping_resource());
        live.data["spec"]["rewrite"] = json!("/");

        let refreshed = model.refreshed(&live);
        assert_eq!(refreshed.spec["rewrite"], "/");
        assert_eq!(refreshed.wait_for_upsert, model.wait_for_upsert);
    }

    #[test]
    fn ids() {
        let id: ResourceId = "flux-system/apps".parse().unwrap();
        assert_eq!(id.namespace.as_deref(), Some("flux-system"));
        assert_eq!(id.name, "apps");

        let id: ResourceId = "team-a".parse().unwrap();
        assert_eq!(id.namespace, None);
        assert_eq!(id.to_string(), "team-a");

        for bad in ["", "/x", "ns/", "a/b/c"] {
            assert!(bad.parse::<ResourceId>().is_err(), "{bad:?}");
        }
    }
}
