use crate::FailureContext;
use cistep_types::StepResult;
use serde::{Deserialize, Serialize};

/// Which sourcing policy a source step settled on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourcingPolicy {
    /// Step default branch, no revision, no patch
    Latest,
    /// Branch/revision/patch drawn from the build's source stamp
    Stamped,
}

impl SourcingPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Stamped => "stamped",
        }
    }
}

/// Build-step events for the event system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StepEvent {
    /// Step left the configured phase
    Started { step: String, codebase: String },

    /// No source stamp was recorded for the step's codebase
    SourceStampMissing { step: String, codebase: String },

    /// Branch/revision/patch resolved and about to be handed to the backend
    SourceResolved {
        step: String,
        codebase: String,
        policy: SourcingPolicy,
        branch: Option<String>,
        revision: Option<String>,
        patched: bool,
    },

    /// Advisory interrupt forwarded to the backend
    Interrupted { step: String, reason: String },

    /// Backend invocation returned an error
    BackendFailed {
        step: String,
        failure: FailureContext,
    },

    /// Step reached a terminal result
    Finished { step: String, result: StepResult },
}
