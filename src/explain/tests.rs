pub(crate) use super::*;
use crate::collaborators::{InMemoryTraceStore, TraceStore};
use crate::error::{Result, SizewiseError};
use std::sync::Arc;

struct OfflineStore;

impl TraceStore for OfflineStore {
    fn save(&self, _: &ExplanationTrace) -> Result<()> {
        Err(SizewiseError::unavailable("trace_store", "connection refused"))
    }

    fn load(&self, _: Uuid) -> Result<Option<ExplanationTrace>> {
        Err(SizewiseError::unavailable("trace_store", "connection refused"))
    }
}

fn sample_trace() -> ExplanationTrace {
    let mut trace = ExplanationTrace::new(DecisionType::Size, Some("session-7".into()));
    trace.push_step(ExplanationStep::new("model_selection").input("gender", "F").output("female"));
    trace.push_step(
        ExplanationStep::new("fit_adjustment")
            .input("from", "medium")
            .output("medium+")
            .impact(ConfidenceImpact::Factor(0.9)),
    );
    trace.finish("ensemble", 0.81);
    trace
}

#[test]
fn test_steps_keep_insertion_order() {
    let trace = sample_trace();
    let names: Vec<&str> = trace.steps().iter().map(ExplanationStep::step_name).collect();
    assert_eq!(names, vec!["model_selection", "fit_adjustment"]);
    assert_eq!(trace.method(), Some("ensemble"));
    assert_eq!(trace.session_id(), Some("session-7"));
}

#[test]
fn test_recorder_round_trip_through_store() {
    let store = Arc::new(InMemoryTraceStore::new());
    let recorder = ExplanationRecorder::with_store(store.clone());
    let trace = sample_trace();
    let id = recorder.record(trace.clone());

    assert_eq!(recorder.get(id).expect("recorded"), trace);
    assert_eq!(store.load(id).expect("store").expect("persisted"), trace);
}

#[test]
fn test_recorder_degrades_to_memory_when_store_fails() {
    let recorder = ExplanationRecorder::with_store(Arc::new(OfflineStore));
    let id = recorder.record(sample_trace());
    assert_eq!(recorder.len(), 1);
    assert_eq!(recorder.get(id).expect("in memory").steps().len(), 2);
}

#[test]
fn test_memory_is_capped_oldest_first() {
    let recorder = ExplanationRecorder::in_memory().with_capacity(3);
    let ids: Vec<Uuid> = (0..10).map(|_| recorder.record(sample_trace())).collect();

    assert_eq!(recorder.len(), 3);
    assert!(matches!(recorder.get(ids[6]), Err(SizewiseError::TraceNotFound { .. })));
    for id in &ids[7..] {
        assert!(recorder.get(*id).is_ok());
    }
}

#[test]
fn test_evicted_trace_is_served_from_store() {
    let recorder = ExplanationRecorder::with_store(Arc::new(InMemoryTraceStore::new())).with_capacity(1);
    let first = recorder.record(sample_trace());
    recorder.record(sample_trace());

    assert_eq!(recorder.len(), 1);
    assert_eq!(recorder.get(first).expect("persisted").decision_id(), first);
}

#[test]
fn test_unknown_decision_is_trace_not_found() {
    let recorder = ExplanationRecorder::in_memory();
    assert!(matches!(
        recorder.get(Uuid::new_v4()),
        Err(SizewiseError::TraceNotFound { .. })
    ));
}

#[test]
fn test_trace_serializes_with_tagged_impacts() {
    let json = serde_json::to_string(&sample_trace()).expect("json");
    assert!(json.contains("\"kind\":\"factor\""));
    let back: ExplanationTrace = serde_json::from_str(&json).expect("parse");
    assert_eq!(back.steps().len(), 2);
}
