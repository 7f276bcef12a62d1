//! Source step: resolves what to check out and hands it to a backend
//!
//! The step moves through [`Phase::Configured`], [`Phase::Resolving`],
//! [`Phase::Delegating`] and finally [`Phase::Done`]. Resolution reads the
//! build's source stamp for the step's codebase exactly once and settles on
//! one [`SourcingPolicy`]; the backend sees nothing but the resolved branch,
//! revision and patch.

use crate::backend::VcsBackend;
use crate::context::BuildContext;
use crate::template::StepName;
use cistep_config::{StepDefaults, StepDefinition};
use cistep_errors::{Error, StepError};
use cistep_events::{EventEmitter, EventSender, FailureContext, SourcingPolicy, StepEvent};
use cistep_types::{Patch, StepResult, Words};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Where a step is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Configured,
    Resolving,
    Delegating,
    Done(StepResult),
}

/// A complete log attached to a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepLog {
    pub name: String,
    pub text: String,
}

/// Branch, revision and patch the backend is invoked with
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedSource {
    policy: SourcingPolicy,
    branch: Option<String>,
    revision: Option<String>,
    patch: Option<Patch>,
}

impl ResolvedSource {
    fn latest(branch: Option<String>) -> Self {
        Self {
            policy: SourcingPolicy::Latest,
            branch,
            revision: None,
            patch: None,
        }
    }
}

/// Cloneable handle used to interrupt a running step from elsewhere
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle {
    token: CancellationToken,
    reason: Arc<Mutex<Option<String>>>,
}

impl InterruptHandle {
    /// Request an interrupt; the first reason given is kept
    pub fn interrupt(&self, reason: impl Into<String>) {
        {
            let mut current = self.reason.lock().unwrap_or_else(PoisonError::into_inner);
            if current.is_none() {
                *current = Some(reason.into());
            }
        }
        self.token.cancel();
    }

    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.token.is_cancelled()
    }

    #[must_use]
    pub fn reason(&self) -> String {
        self.reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| "interrupted".to_string())
    }
}

/// A build step that materializes one codebase's working tree
pub struct SourceStep<B> {
    backend: B,
    name: StepName,
    codebase: String,
    always_use_latest: bool,
    branch: Option<String>,
    description: Words,
    description_done: Words,
    description_suffix: Option<Words>,
    env: BTreeMap<String, String>,
    log_environ: bool,
    interrupt_grace: Duration,
    phase: Phase,
    logs: Vec<StepLog>,
    error: Option<Error>,
    interrupt: InterruptHandle,
    events: Option<EventSender>,
}

impl<B: VcsBackend> SourceStep<B> {
    /// Create a step from its definition
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects its configuration.
    pub fn new(
        backend: B,
        definition: &StepDefinition,
        defaults: &StepDefaults,
    ) -> Result<Self, Error> {
        backend.check_config()?;

        let codebase = definition.codebase.clone();
        let base = definition
            .name
            .clone()
            .unwrap_or_else(|| backend.name().to_string());
        let description_suffix = definition.description_suffix.clone().or_else(|| {
            (!codebase.is_empty()).then(|| Words::from(codebase.as_str()))
        });

        Ok(Self {
            name: StepName::for_codebase(&base, &codebase),
            always_use_latest: definition.always_use_latest,
            branch: definition.branch.clone(),
            description: definition
                .description
                .clone()
                .unwrap_or_else(|| Words::from("updating")),
            description_done: definition
                .description_done
                .clone()
                .unwrap_or_else(|| Words::from("update")),
            description_suffix,
            env: definition.env.clone(),
            log_environ: definition.log_environ(defaults),
            interrupt_grace: definition.interrupt_grace(defaults),
            phase: Phase::Configured,
            logs: Vec::new(),
            error: None,
            interrupt: InterruptHandle::default(),
            events: None,
            codebase,
            backend,
        })
    }

    #[must_use]
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn name(&self) -> &StepName {
        &self.name
    }

    #[must_use]
    pub fn codebase(&self) -> &str {
        &self.codebase
    }

    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Terminal result, once the step is done
    #[must_use]
    pub fn result(&self) -> Option<StepResult> {
        match self.phase {
            Phase::Done(result) => Some(result),
            _ => None,
        }
    }

    /// Error the backend failed with, if the step ended in an exception
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn logs(&self) -> &[StepLog] {
        &self.logs
    }

    #[must_use]
    pub fn log(&self, name: &str) -> Option<&str> {
        self.logs
            .iter()
            .find(|log| log.name == name)
            .map(|log| log.text.as_str())
    }

    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Advisory interrupt; see [`InterruptHandle::interrupt`]
    pub fn interrupt(&self, reason: impl Into<String>) {
        self.interrupt.interrupt(reason);
    }

    /// Override the step default branch before the step starts
    ///
    /// # Errors
    ///
    /// Returns `StepError::AlreadyStarted` once the step has left the
    /// configured phase.
    pub fn set_branch(&mut self, branch: Option<String>) -> Result<(), Error> {
        self.ensure_configured()?;
        self.branch = branch;
        Ok(())
    }

    /// Description words, with the suffix appended
    #[must_use]
    pub fn describe(&self, done: bool) -> Vec<String> {
        let words = if done {
            &self.description_done
        } else {
            &self.description
        };
        match &self.description_suffix {
            Some(suffix) => words.joined(suffix).into_vec(),
            None => words.clone().into_vec(),
        }
    }

    /// Render a templated name against the build; a no-op once rendered
    ///
    /// # Errors
    ///
    /// Returns an error if the template references an unset property.
    pub fn render_name(&mut self, build: &dyn BuildContext) -> Result<&str, Error> {
        if let StepName::Template(template) = &self.name {
            self.name = StepName::Rendered(build.render(template)?);
        }
        Ok(self.name.rendered().unwrap_or_default())
    }

    /// Record a property produced by this step
    ///
    /// With a codebase the value is stored in an object keyed by codebase so
    /// steps for other codebases keep theirs.
    pub fn update_source_property(&self, build: &dyn BuildContext, name: &str, value: Value) {
        let value = if self.codebase.is_empty() {
            value
        } else {
            let mut merged = match build.property(name) {
                Some(Value::Object(existing)) => existing,
                _ => Map::new(),
            };
            merged.insert(self.codebase.clone(), value);
            Value::Object(merged)
        };
        build.set_property(name, value, &self.name.to_string());
    }

    /// Settle on branch, revision and patch for this build
    ///
    /// Only reached from `start_step`, so the build's stamp for the
    /// configured codebase is read exactly once. Never fails; a missing
    /// stamp falls back to the latest policy.
    fn resolve_source(&mut self, build: &dyn BuildContext) -> ResolvedSource {
        let stamp = build.source_stamp(&self.codebase);

        if self.always_use_latest {
            return ResolvedSource::latest(self.branch.clone());
        }

        let Some(stamp) = stamp else {
            self.description_done = Words::from(vec![
                "Codebase".to_string(),
                self.codebase.clone(),
                "not".to_string(),
                "in".to_string(),
                "build".to_string(),
            ]);
            let message = format!(
                "No sourcestamp found in build for codebase '{}'",
                self.codebase
            );
            self.add_complete_log("log", message.clone());
            self.emit_step(StepEvent::SourceStampMissing {
                step: self.name.to_string(),
                codebase: self.codebase.clone(),
            });
            self.emit_warning(message);
            return ResolvedSource::latest(self.branch.clone());
        };

        let revision = match stamp.revision {
            Some(revision) => Some(revision),
            None => {
                let computed = self.backend.compute_source_revision(&stamp.changes);
                if let Some(revision) = &computed {
                    self.update_source_property(build, "revision", Value::from(revision.as_str()));
                }
                computed
            }
        };

        ResolvedSource {
            policy: SourcingPolicy::Stamped,
            branch: stamp.branch.or_else(|| self.branch.clone()),
            revision,
            patch: stamp.patch,
        }
    }

    /// Run the step against a build
    ///
    /// Backend errors do not surface here: they end the step with
    /// [`StepResult::Exception`] and are kept on the step.
    ///
    /// # Errors
    ///
    /// Returns an error if the step was already started or its name cannot
    /// be rendered.
    pub async fn start_step(&mut self, build: &dyn BuildContext) -> Result<StepResult, Error> {
        self.ensure_configured()?;
        let name = self.render_name(build)?.to_string();

        self.phase = Phase::Resolving;
        self.emit_step(StepEvent::Started {
            step: name.clone(),
            codebase: self.codebase.clone(),
        });

        let resolved = self.resolve_source(build);
        tracing::debug!(
            step = %name,
            codebase = %self.codebase,
            policy = resolved.policy.as_str(),
            branch = resolved.branch.as_deref().unwrap_or("<default>"),
            revision = resolved.revision.as_deref().unwrap_or("<latest>"),
            "resolved source"
        );
        self.emit_step(StepEvent::SourceResolved {
            step: name.clone(),
            codebase: self.codebase.clone(),
            policy: resolved.policy,
            branch: resolved.branch.clone(),
            revision: resolved.revision.clone(),
            patched: resolved.patch.is_some(),
        });

        if let Some(patch) = &resolved.patch {
            self.add_complete_log("patch", patch.body_lossy());
        }
        if self.log_environ && !self.env.is_empty() {
            let environ = self.env.iter().fold(String::new(), |mut out, (key, value)| {
                let _ = writeln!(out, "{key}={value}");
                out
            });
            self.add_complete_log("environ", environ);
        }

        self.phase = Phase::Delegating;
        let result = if self.interrupt.is_interrupted() {
            StepResult::Cancelled
        } else {
            match self.delegate(&resolved).await {
                Ok(result) => result,
                Err(err) => {
                    tracing::error!(step = %name, error = %err, "backend failed");
                    self.add_complete_log("err.text", err.to_string());
                    self.emit_step(StepEvent::BackendFailed {
                        step: name.clone(),
                        failure: FailureContext::from_error(&err),
                    });
                    self.error = Some(err);
                    StepResult::Exception
                }
            }
        };

        self.phase = Phase::Done(result);
        self.emit_step(StepEvent::Finished { step: name, result });
        Ok(result)
    }

    async fn delegate(&self, resolved: &ResolvedSource) -> Result<StepResult, Error> {
        let mut run = self.backend.run_vc(
            resolved.branch.as_deref(),
            resolved.revision.as_deref(),
            resolved.patch.as_ref(),
        );

        tokio::select! {
            outcome = &mut run => return outcome,
            () = self.interrupt.token.cancelled() => {}
        }

        let reason = self.interrupt.reason();
        self.emit_step(StepEvent::Interrupted {
            step: self.name.to_string(),
            reason: reason.clone(),
        });
        self.backend.interrupt(&reason).await;

        if let Ok(outcome) = tokio::time::timeout(self.interrupt_grace, run).await {
            outcome
        } else {
            tracing::warn!(
                step = %self.name,
                grace = ?self.interrupt_grace,
                "backend did not finish after interrupt"
            );
            Ok(StepResult::Cancelled)
        }
    }

    fn add_complete_log(&mut self, name: &str, text: String) {
        self.logs.push(StepLog {
            name: name.to_string(),
            text,
        });
    }

    fn ensure_configured(&self) -> Result<(), Error> {
        if self.phase == Phase::Configured {
            Ok(())
        } else {
            Err(StepError::AlreadyStarted {
                step: self.name.to_string(),
            }
            .into())
        }
    }
}

impl<B> EventEmitter for SourceStep<B> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }

    fn correlation_id(&self) -> Option<String> {
        Some(self.name.to_string())
    }
}

impl<B: VcsBackend> std::fmt::Debug for SourceStep<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceStep")
            .field("backend", &self.backend.name())
            .field("name", &self.name)
            .field("codebase", &self.codebase)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
