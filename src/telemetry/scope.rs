//! Request-scoped correlation handle.
//!
//! One `RequestScope` exists per in-flight request, created by the HTTP
//! middleware and passed through request extensions. Handlers use it to
//! open child spans, read and extend baggage, and emit correlated logs.
//! Propagation state lives here and nowhere else: concurrent requests
//! never observe each other's trace or baggage context.
//!
//! Cancellation is handled by the scope's drop guard: when the request
//! future is dropped before the scope is finished, the root span and any
//! still-open children are force-ended with cancelled status.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::telemetry::baggage::Baggage;
use crate::telemetry::context::TraceContext;
use crate::telemetry::logger::Severity;
use crate::telemetry::span::{Attributes, SpanKind, SpanStatus};
use crate::telemetry::tracer::{SpanHandle, Telemetry};

/// Cloneable request-scoped handle over the correlation fabric.
#[derive(Clone)]
pub struct RequestScope {
    shared: Arc<ScopeShared>,
}

struct ScopeShared {
    telemetry: Telemetry,
    root: SpanHandle,
    baggage: ArcSwap<Baggage>,
    children: Mutex<Vec<SpanHandle>>,
    finished: AtomicBool,
}

impl RequestScope {
    /// Open a scope around an already-started root span.
    pub fn new(telemetry: Telemetry, root: SpanHandle, baggage: Baggage) -> Self {
        Self {
            shared: Arc::new(ScopeShared {
                telemetry,
                root,
                baggage: ArcSwap::from_pointee(baggage),
                children: Mutex::new(Vec::new()),
                finished: AtomicBool::new(false),
            }),
        }
    }

    /// The span currently representing this request.
    pub fn current_span(&self) -> &SpanHandle {
        &self.shared.root
    }

    /// The request's trace context (what gets injected downstream).
    pub fn context(&self) -> TraceContext {
        self.shared.root.context()
    }

    /// Immutable snapshot of the current baggage.
    pub fn baggage(&self) -> Arc<Baggage> {
        self.shared.baggage.load_full()
    }

    pub fn baggage_value(&self, key: &str) -> Option<String> {
        self.shared.baggage.load().get(key).map(str::to_string)
    }

    /// Install a new baggage value for the remainder of the request and
    /// return a handle carrying it. The previous `Baggage` value itself is
    /// untouched; only this scope's current pointer moves.
    pub fn with_baggage(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let updated = self.shared.baggage.load().with(key, value);
        self.shared.baggage.store(Arc::new(updated));
        self.clone()
    }

    /// Merge externally discovered facts into the scope's baggage
    /// (last-writer-wins, caps enforced).
    pub fn merge_baggage(&self, other: &Baggage) {
        let merged = self.shared.baggage.load().merge(other);
        self.shared.baggage.store(Arc::new(merged));
    }

    /// Start a child span under this request's root. The scope keeps it
    /// registered so an aborted request force-cancels it.
    pub fn child_span(&self, name: impl Into<String>, attributes: Attributes) -> SpanHandle {
        let parent = self.shared.root.context();
        let child =
            self.shared
                .telemetry
                .start_span(name, Some(&parent), SpanKind::Internal, attributes);
        let mut children = self.shared.children.lock().unwrap();
        children.retain(|c| !c.is_ended());
        children.push(child.clone());
        child
    }

    /// Emit a log record correlated with this request's span and baggage.
    pub fn log(&self, severity: Severity, body: impl Into<String>, attributes: Attributes) {
        let context = self.shared.root.context();
        let baggage = self.shared.baggage.load_full();
        self.shared
            .telemetry
            .logger()
            .emit(severity, body, attributes, Some(&context), Some(&baggage));
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.shared.telemetry
    }

    /// Finish the request: force-cancel abandoned children, end the root
    /// span with `status`. Idempotent.
    pub fn finish(&self, status: SpanStatus) {
        if self.shared.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        let children = {
            let mut children = self.shared.children.lock().unwrap();
            std::mem::take(&mut *children)
        };
        for child in children {
            child.force_cancel();
        }
        self.shared.root.end(status);
    }
}

impl Drop for ScopeShared {
    fn drop(&mut self) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        // Request future dropped mid-flight (client went away, timeout).
        let children = std::mem::take(&mut *self.children.lock().unwrap());
        for child in children {
            child.force_cancel();
        }
        self.root.force_cancel();
    }
}
