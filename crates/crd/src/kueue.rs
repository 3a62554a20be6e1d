//! `kueue.x-k8s.io/v1beta1` resources

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{ValidateSpec, ValidationError};

/// Spec object for the Kueue `ClusterQueue` CRD
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[serde(rename_all = "camelCase")]
#[kube(kind = "ClusterQueue", group = "kueue.x-k8s.io", version = "v1beta1")]
pub struct ClusterQueueSpec {
    /// Cohort this queue borrows from and lends to
    pub cohort: Option<String>,
    /// Namespaces whose workloads may be admitted, empty selects all
    pub namespace_selector: Option<LabelSelector>,
    /// `StrictFIFO` or `BestEffortFIFO`
    pub queueing_strategy: Option<String>,
    /// Quotas grouped by the resources they cover
    #[serde(default)]
    pub resource_groups: Vec<ResourceGroup>,
}

/// A set of resources sharing the same flavors
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    /// Resource names covered by every flavor of the group
    #[schemars(length(min = 1, max = 16))]
    pub covered_resources: Vec<String>,
    /// Flavors in preference order
    #[schemars(length(min = 1, max = 16))]
    pub flavors: Vec<FlavorQuotas>,
}

/// Quotas for one `ResourceFlavor`
#[derive(Deserialize, Serialize, Clone, Debug, Default, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FlavorQuotas {
    /// Name of the referenced `ResourceFlavor`
    pub name: String,
    /// Quota per covered resource, in the group's order
    pub resources: Vec<ResourceQuota>,
}

/// Quota for a single resource within a flavor
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuota {
    /// Resource name, e.g. `cpu`
    pub name: String,
    /// Quantity available to this queue
    pub nominal_quota: IntOrString,
    /// Quantity this queue may borrow from its cohort
    pub borrowing_limit: Option<IntOrString>,
}

const QUEUEING_STRATEGIES: [&str; 2] = ["StrictFIFO", "BestEffortFIFO"];

impl ValidateSpec for ClusterQueueSpec {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(strategy) = &self.queueing_strategy
            && !QUEUEING_STRATEGIES.contains(&strategy.as_str())
        {
            return Err(ValidationError::field(
                "queueingStrategy",
                format!("must be one of {}", QUEUEING_STRATEGIES.join(", ")),
            ));
        }

        for (i, group) in self.resource_groups.iter().enumerate() {
            if group.covered_resources.is_empty() || group.flavors.is_empty() {
                return Err(ValidationError::field(
                    format!("resourceGroups[{i}]"),
                    "needs at least one covered resource and one flavor",
                ));
            }
            for flavor in &group.flavors {
                let names = flavor.resources.iter().map(|r| r.name.as_str());
                if !names.eq(group.covered_resources.iter().map(String::as_str)) {
                    return Err(ValidationError::field(
                        format!("resourceGroups[{i}].flavors[{}]", flavor.name),
                        "resources must match coveredResources in order",
                    ));
                }
            }
        }
        Ok(())
    }
}
