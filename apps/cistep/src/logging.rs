//! Structured logging integration for events
//!
//! Converts step and general events into tracing records with structured
//! fields, at the level carried in the event metadata.

use cistep_events::{AppEvent, EventMessage, GeneralEvent, StepEvent};
use tracing::{debug, error, info, warn, Level};

/// Log an event using the tracing infrastructure with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    let level = meta.tracing_level();

    match &message.event {
        AppEvent::Step(step_event) => match step_event {
            StepEvent::Started { step, codebase } => {
                info!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    step = %step,
                    codebase = %codebase,
                    "Step started"
                );
            }
            StepEvent::SourceStampMissing { step, codebase } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    step = %step,
                    codebase = %codebase,
                    "No source stamp for codebase, using latest"
                );
            }
            StepEvent::SourceResolved {
                step,
                codebase,
                policy,
                branch,
                revision,
                patched,
            } => {
                debug!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    step = %step,
                    codebase = %codebase,
                    policy = policy.as_str(),
                    branch = ?branch,
                    revision = ?revision,
                    patched = patched,
                    "Source resolved"
                );
            }
            StepEvent::Interrupted { step, reason } => {
                warn!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    step = %step,
                    reason = %reason,
                    "Step interrupted"
                );
            }
            StepEvent::BackendFailed { step, failure } => {
                error!(
                    source = meta.source.as_str(),
                    event_id = %meta.event_id,
                    step = %step,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    retryable = failure.retryable,
                    "Backend failed"
                );
            }
            StepEvent::Finished { step, result } => {
                if level == Level::ERROR {
                    error!(
                        source = meta.source.as_str(),
                        event_id = %meta.event_id,
                        step = %step,
                        result = result.as_str(),
                        "Step finished"
                    );
                } else {
                    info!(
                        source = meta.source.as_str(),
                        event_id = %meta.event_id,
                        step = %step,
                        result = result.as_str(),
                        "Step finished"
                    );
                }
            }
        },

        AppEvent::General(general_event) => match general_event {
            GeneralEvent::Warning { message } => {
                warn!(
                    source = meta.source.as_str(),
                    correlation = ?meta.correlation_id,
                    "{message}"
                );
            }
            GeneralEvent::OperationStarted { operation } => {
                info!(source = meta.source.as_str(), operation = %operation, "Operation started");
            }
            GeneralEvent::OperationCompleted { operation, success } => {
                info!(
                    source = meta.source.as_str(),
                    operation = %operation,
                    success = success,
                    "Operation completed"
                );
            }
            GeneralEvent::ConfigurationValidated { source, warnings } => {
                debug!(
                    config_source = %source,
                    warnings = warnings.len(),
                    "Configuration validated"
                );
                for warning in warnings {
                    warn!(config_source = %source, "{warning}");
                }
            }
        },
    }
}
