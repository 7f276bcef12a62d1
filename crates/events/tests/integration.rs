//! Integration tests for events

#[cfg(test)]
mod tests {
    use cistep_events::*;
    use cistep_types::StepResult;

    #[tokio::test]
    async fn test_events_arrive_in_emission_order() {
        let (tx, mut rx) = channel();

        tx.emit_step(StepEvent::Started {
            step: "git".into(),
            codebase: String::new(),
        });
        tx.emit_warning("careful");
        tx.emit_step(StepEvent::Finished {
            step: "git".into(),
            result: StepResult::Cancelled,
        });
        drop(tx);

        let mut seen = Vec::new();
        while let Some(message) = rx.recv().await {
            seen.push(message);
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].meta.source, EventSource::STEP);
        assert_eq!(seen[1].meta.source, EventSource::GENERAL);
        // Cancelled counts as a failed step
        assert_eq!(seen[2].meta.level, EventLevel::Error);
    }

    #[test]
    fn test_step_event_serialization() {
        let event = AppEvent::Step(StepEvent::SourceResolved {
            step: "git".into(),
            codebase: String::new(),
            policy: SourcingPolicy::Stamped,
            branch: Some("main".into()),
            revision: None,
            patched: false,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["domain"], "step");
        assert_eq!(json["event"]["type"], "SourceResolved");
        assert_eq!(json["event"]["policy"], "stamped");
    }

    #[test]
    fn test_backend_failure_carries_error_details() {
        let err = cistep_errors::Error::from(cistep_errors::StepError::NotImplemented {
            backend: "Source".into(),
            operation: "run_vc".into(),
        });
        let failure = FailureContext::from_error(&err);
        assert_eq!(failure.code.as_deref(), Some("step.not_implemented"));
        assert!(failure.hint.is_some());
        assert!(!failure.retryable);
    }
}
