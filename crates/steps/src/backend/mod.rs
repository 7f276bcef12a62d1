//! Checkout backend abstraction
//!
//! A backend performs the actual version-control work for a source step. It
//! receives only the resolved branch, revision and patch; everything else it
//! needs comes from its own construction.

use async_trait::async_trait;
use cistep_config::StepDefinition;
use cistep_errors::{ConfigError, Error, StepError};
use cistep_types::{Change, Patch, StepResult};

mod dry_run;

pub use dry_run::{Checkout, DryRunBackend};

/// Names accepted in the `backend` field of a step definition
pub const BACKENDS: &[&str] = &[DryRunBackend::NAME];

/// Trait for checkout backend implementations
#[async_trait]
pub trait VcsBackend: Send + Sync {
    /// Get backend name, used as the step's default base name
    fn name(&self) -> &str;

    /// Validate backend-specific configuration before anything runs
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found.
    fn check_config(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Derive a revision from the changes of a stamp that carries none
    fn compute_source_revision(&self, _changes: &[Change]) -> Option<String> {
        None
    }

    /// Member names of one of the backend's attribute groups, sorted
    fn attr_group_members(&self, _group: &str) -> Vec<String> {
        Vec::new()
    }

    /// Attribute groups the backend exposes
    fn attr_group_names(&self) -> &'static [&'static str] {
        &[]
    }

    /// Check out the working tree
    ///
    /// # Errors
    ///
    /// Returns an error if the checkout could not be carried out at all; the
    /// step reports that as an exception.
    async fn run_vc(
        &self,
        _branch: Option<&str>,
        _revision: Option<&str>,
        _patch: Option<&Patch>,
    ) -> Result<StepResult, Error> {
        Err(StepError::NotImplemented {
            backend: self.name().to_string(),
            operation: "run_vc".to_string(),
        }
        .into())
    }

    /// Advisory interrupt; the backend decides how to honor it
    async fn interrupt(&self, _reason: &str) {}
}

#[async_trait]
impl<T: VcsBackend + ?Sized> VcsBackend for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn check_config(&self) -> Result<(), Error> {
        (**self).check_config()
    }

    fn compute_source_revision(&self, changes: &[Change]) -> Option<String> {
        (**self).compute_source_revision(changes)
    }

    fn attr_group_members(&self, group: &str) -> Vec<String> {
        (**self).attr_group_members(group)
    }

    fn attr_group_names(&self) -> &'static [&'static str] {
        (**self).attr_group_names()
    }

    async fn run_vc(
        &self,
        branch: Option<&str>,
        revision: Option<&str>,
        patch: Option<&Patch>,
    ) -> Result<StepResult, Error> {
        (**self).run_vc(branch, revision, patch).await
    }

    async fn interrupt(&self, reason: &str) {
        (**self).interrupt(reason).await;
    }
}

/// Construct the backend a step definition names
///
/// # Errors
///
/// Returns an error if the backend is unknown or rejects the definition.
pub fn backend_for(definition: &StepDefinition) -> Result<Box<dyn VcsBackend>, Error> {
    match definition.backend_name() {
        DryRunBackend::NAME => Ok(Box::new(DryRunBackend::from_definition(definition)?)),
        other => Err(ConfigError::UnsupportedVariant {
            field: "backend".to_string(),
            value: other.to_string(),
            expected: BACKENDS.join(", "),
        }
        .into()),
    }
}
