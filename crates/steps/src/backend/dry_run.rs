//! Backend that plans a checkout without touching disk or network

use super::VcsBackend;
use crate::attr_group::{AttrGroups, HasAttrGroups};
use async_trait::async_trait;
use cistep_config::StepDefinition;
use cistep_errors::{ConfigError, Error, StepError};
use cistep_types::{Change, Patch, StepResult};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

/// Resolved source handed to mode and method handlers
#[derive(Debug, Clone, Copy)]
pub struct Checkout<'a> {
    pub branch: Option<&'a str>,
    pub revision: Option<&'a str>,
    pub patch: Option<&'a Patch>,
}

type Handler = fn(&DryRunBackend, &Checkout<'_>, &mut Vec<String>) -> Result<(), Error>;

/// Records the operations a real checkout would perform
#[derive(Debug)]
pub struct DryRunBackend {
    mode: String,
    method: Option<String>,
    workdir: PathBuf,
    env: BTreeMap<String, String>,
    planned: Mutex<Vec<String>>,
    interrupted: Mutex<Option<String>>,
}

impl DryRunBackend {
    pub const NAME: &'static str = "dry-run";
    const GROUPS: &'static [&'static str] = &["mode", "method"];

    #[must_use]
    pub fn new(mode: impl Into<String>, method: Option<String>) -> Self {
        Self {
            mode: mode.into(),
            method,
            workdir: PathBuf::from("build"),
            env: BTreeMap::new(),
            planned: Mutex::default(),
            interrupted: Mutex::default(),
        }
    }

    /// Build from a step definition; mode defaults to `incremental`
    ///
    /// # Errors
    ///
    /// Returns an error if mode or method are not registered.
    pub fn from_definition(definition: &StepDefinition) -> Result<Self, Error> {
        let mut backend = Self::new(
            definition.mode.as_deref().unwrap_or("incremental"),
            definition.method.clone(),
        );
        if let Some(workdir) = &definition.workdir {
            backend.workdir.clone_from(workdir);
        }
        backend.env.clone_from(&definition.env);
        backend.check_config()?;
        Ok(backend)
    }

    /// Operations planned by the last checkout
    #[must_use]
    pub fn planned(&self) -> Vec<String> {
        self.planned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn interrupted(&self) -> Option<String> {
        self.interrupted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check_variant(group: &str, value: &str) -> Result<(), Error> {
        if Self::has_attr_group_member(group, value) {
            return Ok(());
        }
        Err(ConfigError::UnsupportedVariant {
            field: group.to_string(),
            value: value.to_string(),
            expected: Self::attr_groups().sorted_members(group).join(", "),
        }
        .into())
    }

    /// Directory a patch applies in; it may not leave the workdir
    fn patch_dir(&self, patch: &Patch) -> Result<PathBuf, Error> {
        let Some(subdir) = patch.subdir.as_deref() else {
            return Ok(self.workdir.clone());
        };
        let subdir = Path::new(subdir);
        if subdir
            .components()
            .any(|part| !matches!(part, Component::Normal(_) | Component::CurDir))
        {
            return Err(StepError::CheckoutFailed {
                message: format!("patch subdir '{}' is outside the workdir", subdir.display()),
            }
            .into());
        }
        Ok(self.workdir.join(subdir))
    }

    fn target(checkout: &Checkout<'_>) -> String {
        match (checkout.branch, checkout.revision) {
            (_, Some(revision)) => revision.to_string(),
            (Some(branch), None) => branch.to_string(),
            (None, None) => "HEAD".to_string(),
        }
    }

    fn mode_full(&self, checkout: &Checkout<'_>, plan: &mut Vec<String>) -> Result<(), Error> {
        let method = self.method.as_deref().ok_or_else(|| ConfigError::MissingField {
            field: "method".to_string(),
        })?;
        let prepare = Self::get_attr_group_member("method", method)?;
        prepare(self, checkout, plan)?;
        plan.push(format!("checkout {}", Self::target(checkout)));
        Ok(())
    }

    fn mode_incremental(
        &self,
        checkout: &Checkout<'_>,
        plan: &mut Vec<String>,
    ) -> Result<(), Error> {
        plan.push(format!(
            "update {} to {}",
            self.workdir.display(),
            Self::target(checkout)
        ));
        Ok(())
    }

    fn method_clobber(&self, checkout: &Checkout<'_>, plan: &mut Vec<String>) -> Result<(), Error> {
        plan.push(format!("remove {}", self.workdir.display()));
        plan.push(format!(
            "clone {} into {}",
            checkout.branch.unwrap_or("default branch"),
            self.workdir.display()
        ));
        Ok(())
    }

    fn method_fresh(&self, _checkout: &Checkout<'_>, plan: &mut Vec<String>) -> Result<(), Error> {
        plan.push(format!(
            "remove untracked and ignored files in {}",
            self.workdir.display()
        ));
        Ok(())
    }

    fn method_clean(&self, _checkout: &Checkout<'_>, plan: &mut Vec<String>) -> Result<(), Error> {
        plan.push(format!("remove untracked files in {}", self.workdir.display()));
        Ok(())
    }

    fn method_copy(&self, _checkout: &Checkout<'_>, plan: &mut Vec<String>) -> Result<(), Error> {
        plan.push(format!("remove {}", self.workdir.display()));
        plan.push(format!("copy source into {}", self.workdir.display()));
        Ok(())
    }
}

impl HasAttrGroups for DryRunBackend {
    type Member = Handler;

    fn attr_groups() -> &'static AttrGroups<Handler> {
        static GROUPS: OnceLock<AttrGroups<Handler>> = OnceLock::new();
        GROUPS.get_or_init(|| {
            AttrGroups::<Handler>::builder()
                .member("mode", "full", Self::mode_full)
                .member("mode", "incremental", Self::mode_incremental)
                .member("method", "clobber", Self::method_clobber)
                .member("method", "fresh", Self::method_fresh)
                .member("method", "clean", Self::method_clean)
                .member("method", "copy", Self::method_copy)
                .build()
        })
    }
}

#[async_trait]
impl VcsBackend for DryRunBackend {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn check_config(&self) -> Result<(), Error> {
        Self::check_variant("mode", &self.mode)?;
        if let Some(method) = &self.method {
            Self::check_variant("method", method)?;
        } else if self.mode == "full" {
            return Err(ConfigError::MissingField {
                field: "method".to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn compute_source_revision(&self, changes: &[Change]) -> Option<String> {
        changes.last().and_then(|change| change.revision.clone())
    }

    fn attr_group_members(&self, group: &str) -> Vec<String> {
        Self::attr_groups().sorted_members(group)
    }

    fn attr_group_names(&self) -> &'static [&'static str] {
        Self::GROUPS
    }

    async fn run_vc(
        &self,
        branch: Option<&str>,
        revision: Option<&str>,
        patch: Option<&Patch>,
    ) -> Result<StepResult, Error> {
        if let Some(reason) = self.interrupted() {
            tracing::debug!(backend = Self::NAME, %reason, "interrupted before checkout");
            return Ok(StepResult::Cancelled);
        }

        let checkout = Checkout {
            branch,
            revision,
            patch,
        };
        let mut plan = Vec::new();
        for (name, value) in &self.env {
            plan.push(format!("export {name}={value}"));
        }

        let handler = Self::get_attr_group_member("mode", &self.mode)?;
        tracing::debug!(
            backend = Self::NAME,
            handler = %AttrGroups::<Handler>::qualified_name("mode", &self.mode),
            "dispatching"
        );
        handler(self, &checkout, &mut plan)?;

        if let Some(patch) = patch {
            let dir = self.patch_dir(patch)?;
            plan.push(format!(
                "apply patch -p{} in {} ({} bytes)",
                patch.level,
                dir.display(),
                patch.body.len()
            ));
        }

        for operation in &plan {
            tracing::debug!(backend = Self::NAME, %operation, "planned");
        }
        *self.planned.lock().unwrap_or_else(PoisonError::into_inner) = plan;
        Ok(StepResult::Success)
    }

    async fn interrupt(&self, reason: &str) {
        let mut interrupted = self.interrupted.lock().unwrap_or_else(PoisonError::into_inner);
        if interrupted.is_none() {
            *interrupted = Some(reason.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_variants() {
        assert_eq!(
            DryRunBackend::attr_groups().sorted_members("method"),
            ["clean", "clobber", "copy", "fresh"]
        );
        assert!(DryRunBackend::has_attr_group_member("mode", "full"));
        assert!(!DryRunBackend::has_attr_group_member("mode", "mirror"));
        assert!(DryRunBackend::list_attr_group_members("branch").is_empty());
    }

    #[test]
    fn unknown_mode_lists_members() {
        let err = DryRunBackend::new("mirror", None).check_config().unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::UnsupportedVariant { ref field, ref expected, .. })
                if field == "mode" && expected == "full, incremental"
        ));
    }

    #[test]
    fn full_requires_a_method() {
        let err = DryRunBackend::new("full", None).check_config().unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::MissingField { ref field }) if field == "method"
        ));
        assert!(DryRunBackend::new("full", Some("fresh".into()))
            .check_config()
            .is_ok());
    }

    #[test]
    fn unknown_method_rejected() {
        let err = DryRunBackend::new("full", Some("rsync".into()))
            .check_config()
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::UnsupportedVariant { ref field, .. }) if field == "method"
        ));
    }

    #[test]
    fn revision_from_last_change() {
        let backend = DryRunBackend::new("incremental", None);
        let changes = [Change::at_revision("r1"), Change::at_revision("r2")];
        assert_eq!(backend.compute_source_revision(&changes).as_deref(), Some("r2"));
        assert_eq!(backend.compute_source_revision(&[]), None);
    }

    #[tokio::test]
    async fn full_fresh_plan() {
        let backend = DryRunBackend::new("full", Some("fresh".into()));
        let patch = Patch::new(1, "diff --git a/x b/x");
        let result = backend
            .run_vc(Some("main"), Some("abc"), Some(&patch))
            .await
            .unwrap();
        assert_eq!(result, StepResult::Success);
        assert_eq!(
            backend.planned(),
            [
                "remove untracked and ignored files in build",
                "checkout abc",
                "apply patch -p1 in build (18 bytes)",
            ]
        );
    }

    #[tokio::test]
    async fn patch_subdir_stays_inside_workdir() {
        let backend = DryRunBackend::new("incremental", None);
        let mut patch = Patch::new(0, "diff");
        patch.subdir = Some("docs".to_string());
        backend.run_vc(None, Some("abc"), Some(&patch)).await.unwrap();
        assert_eq!(
            backend.planned(),
            ["update build to abc", "apply patch -p0 in build/docs (4 bytes)"]
        );

        patch.subdir = Some("../etc".to_string());
        let err = backend.run_vc(None, Some("abc"), Some(&patch)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Step(StepError::CheckoutFailed { ref message }) if message.contains("../etc")
        ));
    }

    #[tokio::test]
    async fn incremental_without_revision_uses_branch() {
        let backend = DryRunBackend::new("incremental", None);
        backend.run_vc(Some("main"), None, None).await.unwrap();
        assert_eq!(backend.planned(), ["update build to main"]);
    }

    #[tokio::test]
    async fn unchecked_mode_fails_at_run() {
        let backend = DryRunBackend::new("mirror", None);
        let err = backend.run_vc(None, None, None).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Step(StepError::UnknownAttrGroupMember { .. })
        ));
    }

    #[tokio::test]
    async fn interrupted_before_checkout() {
        let backend = DryRunBackend::new("incremental", None);
        backend.interrupt("build stopped").await;
        backend.interrupt("second").await;
        assert_eq!(backend.interrupted().as_deref(), Some("build stopped"));
        let result = backend.run_vc(None, None, None).await.unwrap();
        assert_eq!(result, StepResult::Cancelled);
        assert!(backend.planned().is_empty());
    }
}
