// Copyright 2026 Crdform Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Create, read, update, delete and import for any custom resource kind,
//! through the dynamic API and server-side apply.

use crdform_crd::{Catalog, KindEntry, SpecValidator};
use kube::api::{DeleteParams, DynamicObject, Patch};
use kube::core::gvk::GroupVersion;
use kube::discovery::{self, ApiResource, Scope};
use kube::{Api, Client};
use serde_json::Value;
use tracing::{Span, debug, field, info, instrument, warn};

use crate::config::ProviderConfig;
use crate::model::{ResourceId, ResourceModel};
use crate::wait::{PollOutcome, wait_for_delete_completion, wait_for_upsert_condition};
use crate::{Error, Result};

/// API coordinates and scope of a kind, with its spec validator when known
#[derive(Clone, Debug)]
pub struct ResolvedKind {
    /// Group, version, kind and plural
    pub api_resource: ApiResource,
    /// Whether objects live in a namespace
    pub namespaced: bool,
    /// Typed validation of `spec`, only for catalog kinds
    pub validator: Option<SpecValidator>,
}

impl From<&KindEntry> for ResolvedKind {
    fn from(entry: &KindEntry) -> Self {
        Self {
            api_resource: entry.api_resource().clone(),
            namespaced: entry.namespaced(),
            validator: Some(entry.validator()),
        }
    }
}

/// Resolves a kind from the catalog, falling back to API discovery
///
/// # Errors
/// Returns an error when discovery fails or the server does not serve the kind
#[instrument(skip(client, catalog))]
pub async fn resolve_kind(
    client: &Client,
    catalog: &Catalog,
    api_version: &str,
    kind: &str,
) -> Result<ResolvedKind> {
    if let Some(entry) = catalog.by_api_version_kind(api_version, kind) {
        debug!(type_name = entry.type_name(), "kind found in catalog");
        return Ok(entry.into());
    }

    let gv: GroupVersion = api_version.parse()?;
    let group = discovery::pinned_group(client, &gv).await?;
    let (api_resource, capabilities) = group
        .recommended_kind(kind)
        .ok_or_else(|| format!("Unable to find API kind {kind} in {api_version}"))?;

    info!(plural = %api_resource.plural, "kind discovered from the API server");
    Ok(ResolvedKind {
        api_resource,
        namespaced: matches!(capabilities.scope, Scope::Namespaced),
        validator: None,
    })
}

/// Handlers for one kind
#[derive(Clone)]
pub struct DynamicResource {
    client: Client,
    kind: ResolvedKind,
    config: ProviderConfig,
}

impl DynamicResource {
    /// Handlers for `kind` using `client`
    #[must_use]
    pub fn new(client: Client, kind: ResolvedKind, config: &ProviderConfig) -> Self {
        Self {
            client,
            kind,
            config: config.clone(),
        }
    }

    /// The handled kind
    #[must_use]
    pub fn kind(&self) -> &ResolvedKind {
        &self.kind
    }

    fn api(&self, id: &ResourceId) -> Result<Api<DynamicObject>> {
        let ar = &self.kind.api_resource;
        match (&id.namespace, self.kind.namespaced) {
            (Some(ns), true) => Ok(Api::namespaced_with(self.client.clone(), ns, ar)),
            (None, false) => Ok(Api::all_with(self.client.clone(), ar)),
            (None, true) => Err(Error::InvalidId(format!(
                "{} is namespaced, {id} has no namespace",
                ar.kind
            ))),
            (Some(_), false) => Err(Error::InvalidId(format!(
                "{} is cluster-scoped, {id} must not carry a namespace",
                ar.kind
            ))),
        }
    }

    /// Creates the object and waits for its upsert conditions
    ///
    /// # Errors
    /// See [`DynamicResource::apply`]
    pub async fn create(&self, model: &ResourceModel) -> Result<ResourceModel> {
        self.apply(model).await
    }

    /// Updates the object and waits for its upsert conditions
    ///
    /// # Errors
    /// See [`DynamicResource::apply`]
    pub async fn update(&self, model: &ResourceModel) -> Result<ResourceModel> {
        self.apply(model).await
    }

    /// Server-side applies `model`, then awaits every `wait_for_upsert` in order
    ///
    /// The applied object is left in place when a wait fails.
    ///
    /// # Errors
    /// Invalid configuration is rejected before any request. Afterwards the
    /// patch or lookup failure, or [`Error::WaitTimeout`] for the first unmet condition.
    #[instrument(skip(self, model), fields(
        kind = %self.kind.api_resource.kind,
        id = %model.id(),
        field_manager = %self.config.field_manager,
        resource_version = field::Empty,
    ))]
    pub async fn apply(&self, model: &ResourceModel) -> Result<ResourceModel> {
        let waits = model.upsert_waits()?;
        if let Some(validate) = self.kind.validator {
            validate(&model.spec)?;
        }

        let id = model.id();
        let api = self.api(&id)?;
        let object = model.to_object(&self.kind.api_resource);

        let applied = api
            .patch(&id.name, &self.config.patch_params(), &Patch::Apply(&object))
            .await?;
        if let Some(rv) = applied.metadata.resource_version.as_deref() {
            Span::current().record("resource_version", rv);
        }
        info!("object applied");

        let getter = || lookup(&api, &id.name);
        for (condition, timing) in &waits {
            let outcome = wait_for_upsert_condition(&getter, condition, *timing).await?;
            if outcome == PollOutcome::TimedOut {
                return Err(Error::WaitTimeout {
                    condition: condition.to_string(),
                    timeout: timing.timeout,
                });
            }
        }

        Ok(model.refreshed(&applied))
    }

    /// Current state of the object, `None` once it is gone
    ///
    /// # Errors
    /// Returns lookup failures other than absence
    #[instrument(skip(self, model), fields(kind = %self.kind.api_resource.kind, id = %model.id()))]
    pub async fn read(&self, model: &ResourceModel) -> Result<Option<ResourceModel>> {
        let id = model.id();
        let live = self.api(&id)?.get_opt(&id.name).await?;
        if live.is_none() {
            warn!("object no longer exists");
        }
        Ok(live.map(|object| model.refreshed(&object)))
    }

    /// Reads an object that must exist, as a data source does
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] when the object does not exist
    #[instrument(skip(self, id), fields(kind = %self.kind.api_resource.kind, id = %id))]
    pub async fn read_data_source(&self, id: &ResourceId) -> Result<ResourceModel> {
        let object = self
            .api(id)?
            .get_opt(&id.name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} {id}", self.kind.api_resource.kind)))?;
        ResourceModel::from_object(&object, &self.kind.api_resource)
    }

    /// Imports an existing object by its `namespace/name` or `name` id
    ///
    /// # Errors
    /// Returns [`Error::InvalidId`] for malformed ids and [`Error::NotFound`] for missing objects
    pub async fn import(&self, id: &str) -> Result<ResourceModel> {
        let id: ResourceId = id.parse()?;
        self.read_data_source(&id).await
    }

    /// Deletes the object and, if configured, waits until it is gone
    ///
    /// An object that is already gone counts as deleted.
    ///
    /// # Errors
    /// Returns [`Error::Deletion`] when the delete request fails, without waiting;
    /// lookup failures and [`Error::WaitTimeout`] come from the wait
    #[instrument(skip(self, model), fields(kind = %self.kind.api_resource.kind, id = %model.id()))]
    pub async fn delete(&self, model: &ResourceModel) -> Result<()> {
        let timing = model.delete_wait()?;
        let id = model.id();
        let api = self.api(&id)?;

        match api.delete(&id.name, &DeleteParams::default()).await {
            Ok(_) => info!("delete requested"),
            Err(kube::Error::Api(response)) if response.code == 404 => {
                info!("object already gone");
                return Ok(());
            }
            Err(e) => return Err(Error::Deletion(e)),
        }

        let Some(timing) = timing else {
            return Ok(());
        };

        let getter = || lookup(&api, &id.name);
        match wait_for_delete_completion(&getter, timing).await? {
            PollOutcome::TimedOut => Err(Error::WaitTimeout {
                condition: format!("deletion of {id}"),
                timeout: timing.timeout,
            }),
            PollOutcome::Satisfied | PollOutcome::ResourceAbsent => Ok(()),
        }
    }
}

async fn lookup(api: &Api<DynamicObject>, name: &str) -> Result<Option<Value>> {
    match api.get_opt(name).await? {
        Some(object) => Ok(Some(serde_json::to_value(object)?)),
        None => Ok(None),
    }
}
