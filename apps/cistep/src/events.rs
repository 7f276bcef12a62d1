//! Event handling and user feedback

use crate::logging::log_event_with_tracing;
use cistep_events::{AppEvent, EventMessage, GeneralEvent, StepEvent};
use console::style;

/// Turns step events into log records and short status lines on stderr
pub struct EventHandler {
    colors_enabled: bool,
    quiet: bool,
}

impl EventHandler {
    pub fn new(colors_enabled: bool, quiet: bool) -> Self {
        Self {
            colors_enabled,
            quiet,
        }
    }

    pub fn handle_event(&mut self, message: EventMessage) {
        log_event_with_tracing(&message);
        if self.quiet {
            return;
        }

        // Warnings and errors already reach stderr through tracing
        match &message.event {
            AppEvent::Step(StepEvent::Started { step, codebase }) if codebase.is_empty() => {
                self.status("→", &format!("{step}: starting"));
            }
            AppEvent::Step(StepEvent::Started { step, codebase }) => {
                self.status("→", &format!("{step}: starting ({codebase})"));
            }
            AppEvent::Step(StepEvent::BackendFailed { failure, .. }) => {
                if let Some(hint) = &failure.hint {
                    self.status("hint:", hint);
                }
            }
            AppEvent::General(GeneralEvent::OperationCompleted { operation, success }) => {
                let marker = if *success { "✓" } else { "✗" };
                self.status(marker, operation);
            }
            _ => {}
        }
    }

    fn status(&self, marker: &str, text: &str) {
        if self.colors_enabled {
            eprintln!("{} {text}", style(marker).cyan());
        } else {
            eprintln!("{marker} {text}");
        }
    }
}
