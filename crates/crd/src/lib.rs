// Copyright 2026 Crdform Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Typed custom resource definitions known to crdform, and the catalog that
//! maps provider type names onto their API resources.

pub mod ambassador;
pub mod catalog;
pub mod flux;
pub mod kueue;

pub use ambassador::Mapping;
pub use catalog::{Catalog, KindEntry, SpecValidator};
pub use flux::Kustomization;
pub use kueue::ClusterQueue;

/// Rejection of a resource `spec` by its typed model
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    /// The spec could not be decoded into the typed model
    #[error("spec is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A single field broke a constraint of the kind
    #[error("spec.{field}: {reason}")]
    Field {
        /// Path of the field below `spec`
        field: String,
        /// Constraint that was broken
        reason: String,
    },
}

impl ValidationError {
    /// Builds a [`ValidationError::Field`]
    pub fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Field {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Semantic checks a typed spec runs on top of deserialization
pub trait ValidateSpec {
    /// Checks constraints the schema alone cannot express
    ///
    /// # Errors
    /// Returns the first broken constraint
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
