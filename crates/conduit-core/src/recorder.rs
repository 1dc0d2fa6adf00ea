//! An observer that keeps every notification it receives, in order.

use crate::observer::ProxyObserver;
use crate::value::{Returned, Value};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One observer notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "hook", rename_all = "snake_case")]
pub enum CallEvent {
    Before {
        operation: String,
        arguments: Vec<Value>,
    },
    After {
        operation: String,
        result: Returned,
    },
}

impl CallEvent {
    pub fn before(operation: impl Into<String>, arguments: Vec<Value>) -> Self {
        CallEvent::Before {
            operation: operation.into(),
            arguments,
        }
    }

    pub fn after(operation: impl Into<String>, result: impl Into<Returned>) -> Self {
        CallEvent::After {
            operation: operation.into(),
            result: result.into(),
        }
    }

    /// The operation this event is about.
    pub fn operation(&self) -> &str {
        match self {
            CallEvent::Before { operation, .. } | CallEvent::After { operation, .. } => operation,
        }
    }
}

/// Records [`CallEvent`]s. Clones share the same log, so one recorder can be
/// attached to several proxies and read from the test that created them.
#[derive(Debug, Clone, Default)]
pub struct CallRecorder {
    events: Arc<Mutex<Vec<CallEvent>>>,
}

impl CallRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn record(&self, event: CallEvent) {
        self.lock().push(event);
    }

    /// A snapshot of every event so far.
    pub fn events(&self) -> Vec<CallEvent> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// The log as a JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&*self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CallEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProxyObserver for CallRecorder {
    fn before_execute(&self, operation: &str, arguments: &[Value]) {
        self.record(CallEvent::before(operation, arguments.to_vec()));
    }

    fn after_execute(&self, operation: &str, result: &Returned) {
        self.record(CallEvent::after(operation, result.clone()));
    }
}
