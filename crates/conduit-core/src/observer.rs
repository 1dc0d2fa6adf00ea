use crate::value::{Returned, Value};
use std::sync::Arc;
use tracing::debug;

/// Trait for observing proxied calls (logging, auditing, tests).
///
/// Both hooks run synchronously on the calling thread, in line with the
/// forwarded call. Keep them short: they sit on the path of every call.
pub trait ProxyObserver: Send + Sync {
    /// Called just before the wrapped implementation is invoked.
    fn before_execute(&self, operation: &str, arguments: &[Value]);

    /// Called just after the wrapped implementation returned successfully.
    fn after_execute(&self, operation: &str, result: &Returned);
}

/// An observer shared between any number of proxies.
pub type SharedObserver = Arc<dyn ProxyObserver>;

/// Observer that reports every hook as a `tracing` event.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    label: String,
}

impl TracingObserver {
    /// Create an observer whose events carry `label` in their `proxy` field.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("proxy")
    }
}

impl ProxyObserver for TracingObserver {
    fn before_execute(&self, operation: &str, arguments: &[Value]) {
        debug!(proxy = %self.label, operation, ?arguments, "Before execute");
    }

    fn after_execute(&self, operation: &str, result: &Returned) {
        debug!(proxy = %self.label, operation, ?result, "After execute");
    }
}
