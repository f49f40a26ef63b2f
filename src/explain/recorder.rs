use super::ExplanationTrace;
use crate::collaborators::TraceStore;
use crate::config::RecorderConfig;
use crate::error::{Result, SizewiseError};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Default)]
struct MemoryTraces {
    traces: HashMap<Uuid, ExplanationTrace>,
    order: VecDeque<Uuid>,
}

impl MemoryTraces {
    fn insert(&mut self, trace: ExplanationTrace, capacity: usize) {
        let id = trace.decision_id();
        if self.traces.insert(id, trace).is_none() {
            self.order.push_back(id);
        }
        while self.order.len() > capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.traces.remove(&oldest);
            }
        }
    }
}

/// Keeps the most recent finished traces in memory and forwards every
/// trace to a [`TraceStore`].
///
/// At most `capacity` traces stay in memory, oldest evicted first; evicted
/// traces remain reachable through the store. A failing store is logged
/// and otherwise ignored, so the in-memory copy still serves
/// [`ExplanationRecorder::get`].
pub struct ExplanationRecorder {
    store: Option<Arc<dyn TraceStore>>,
    capacity: usize,
    memory: RwLock<MemoryTraces>,
}

impl std::fmt::Debug for ExplanationRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplanationRecorder")
            .field("persistent", &self.store.is_some())
            .field("capacity", &self.capacity)
            .field("traces", &self.memory.read().traces.len())
            .finish()
    }
}

impl Default for ExplanationRecorder {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ExplanationRecorder {
    /// Recorder without persistence.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: None,
            capacity: RecorderConfig::default().max_in_memory_traces,
            memory: RwLock::new(MemoryTraces::default()),
        }
    }

    /// Recorder persisting to `store`.
    #[must_use]
    pub fn with_store(store: Arc<dyn TraceStore>) -> Self {
        Self {
            store: Some(store),
            ..Self::in_memory()
        }
    }

    /// Caps the in-memory traces at `capacity` (at least 1).
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Stores a finished trace and returns its decision id.
    pub fn record(&self, trace: ExplanationTrace) -> Uuid {
        let id = trace.decision_id();
        if let Some(store) = &self.store {
            if let Err(err) = store.save(&trace) {
                tracing::warn!(
                    decision_id = %id,
                    error = %err,
                    "trace persistence unavailable, keeping trace in memory only"
                );
            }
        }
        self.memory.write().insert(trace, self.capacity);
        id
    }

    /// Looks a trace up in memory, then in the store.
    ///
    /// # Errors
    ///
    /// `TraceNotFound` if neither has it. Store failures during lookup are
    /// logged and reported as not found.
    pub fn get(&self, decision_id: Uuid) -> Result<ExplanationTrace> {
        if let Some(trace) = self.memory.read().traces.get(&decision_id) {
            return Ok(trace.clone());
        }
        if let Some(store) = &self.store {
            match store.load(decision_id) {
                Ok(Some(trace)) => return Ok(trace),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(decision_id = %decision_id, error = %err, "trace lookup failed");
                }
            }
        }
        Err(SizewiseError::TraceNotFound {
            decision_id: decision_id.to_string(),
        })
    }

    /// Number of traces held in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.memory.read().traces.len()
    }

    /// True when no trace is held in memory.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.memory.read().traces.is_empty()
    }
}
