#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Source steps for cistep
//!
//! A source step retrieves one codebase's working tree for a build. This
//! crate holds everything the steps share regardless of version-control
//! system: resolving branch, revision and patch from the build's source
//! stamps, describing the step, rendering its name, and dispatching to
//! named backend variants through attribute groups.

pub mod attr_group;
pub mod backend;
pub mod context;
pub mod source;
pub mod template;

pub use attr_group::{AttrGroups, HasAttrGroups};
pub use backend::{backend_for, DryRunBackend, VcsBackend, BACKENDS};
pub use context::{BuildContext, InMemoryBuild};
pub use source::{InterruptHandle, Phase, SourceStep, StepLog};
pub use template::{Interpolate, StepName};

pub use cistep_events::SourcingPolicy;
