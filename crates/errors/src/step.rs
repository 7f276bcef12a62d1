//! Build step error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum StepError {
    #[error("no member '{member}' in attribute group '{group}'")]
    UnknownAttrGroupMember { group: String, member: String },

    #[error("{operation} is not implemented by backend {backend}")]
    NotImplemented { backend: String, operation: String },

    #[error("step {step} already started")]
    AlreadyStarted { step: String },

    #[error("failed to render template '{template}': {message}")]
    RenderFailed { template: String, message: String },

    #[error("checkout failed: {message}")]
    CheckoutFailed { message: String },
}

impl UserFacingError for StepError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownAttrGroupMember { .. } => {
                Some("Check the member name against the backend's registered variants.")
            }
            Self::NotImplemented { .. } => {
                Some("Use a backend that provides a checkout implementation.")
            }
            Self::RenderFailed { .. } => {
                Some("Make sure every property referenced by the step name is set on the build.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::CheckoutFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::UnknownAttrGroupMember { .. } => "step.unknown_attr_group_member",
            Self::NotImplemented { .. } => "step.not_implemented",
            Self::AlreadyStarted { .. } => "step.already_started",
            Self::RenderFailed { .. } => "step.render_failed",
            Self::CheckoutFailed { .. } => "step.checkout_failed",
        })
    }
}
