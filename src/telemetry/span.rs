//! Span data model: a timed, named unit of work.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::telemetry::context::{SpanId, TraceFlags, TraceId};

/// Maximum attributes kept per span; later additions are counted, not kept.
pub const MAX_ATTRIBUTES: usize = 128;
/// Maximum events kept per span.
pub const MAX_EVENTS: usize = 128;

/// The role a span plays in the request chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    #[default]
    Internal,
    Client,
    Server,
}

/// Final disposition of a span.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error {
        message: String,
    },
    /// The owning request was aborted before the span could complete.
    Cancelled,
}

/// Closed scalar set for span, event and log attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<usize> for AttrValue {
    fn from(v: usize) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

/// Typed attribute map.
pub type Attributes = BTreeMap<String, AttrValue>;

/// A timestamped event recorded on a span.
#[derive(Debug, Clone, Serialize)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: SystemTime,
    pub attributes: Attributes,
}

impl SpanEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: SystemTime::now(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A span record. Lifecycle (start once, end once) is enforced by the
/// tracer's span handle; this struct is the data it manages.
#[derive(Debug, Clone, Serialize)]
pub struct Span {
    pub name: String,
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub flags: TraceFlags,
    pub kind: SpanKind,
    pub start_time: SystemTime,
    pub end_time: Option<SystemTime>,
    pub status: SpanStatus,
    pub attributes: Attributes,
    pub events: Vec<SpanEvent>,
    pub dropped_attributes: u32,
    pub dropped_events: u32,
}

impl Span {
    pub fn new(
        name: impl Into<String>,
        trace_id: TraceId,
        span_id: SpanId,
        parent_span_id: Option<SpanId>,
        flags: TraceFlags,
        kind: SpanKind,
    ) -> Self {
        Self {
            name: name.into(),
            trace_id,
            span_id,
            parent_span_id,
            flags,
            kind,
            start_time: SystemTime::now(),
            end_time: None,
            status: SpanStatus::Unset,
            attributes: Attributes::new(),
            events: Vec::new(),
            dropped_attributes: 0,
            dropped_events: 0,
        }
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        let key = key.into();
        if self.attributes.len() >= MAX_ATTRIBUTES && !self.attributes.contains_key(&key) {
            self.dropped_attributes += 1;
            return;
        }
        self.attributes.insert(key, value.into());
    }

    pub fn add_event(&mut self, event: SpanEvent) {
        if self.events.len() >= MAX_EVENTS {
            self.dropped_events += 1;
            return;
        }
        self.events.push(event);
    }

    /// Wall-clock duration, available once the span has ended.
    pub fn duration(&self) -> Option<Duration> {
        self.end_time?.duration_since(self.start_time).ok()
    }

    pub fn is_ended(&self) -> bool {
        self.end_time.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(name: &str) -> Span {
        Span::new(
            name,
            TraceId::mint(),
            SpanId::mint(),
            None,
            TraceFlags::NONE,
            SpanKind::Internal,
        )
    }

    #[test]
    fn test_attribute_cap() {
        let mut s = span("caps");
        for i in 0..MAX_ATTRIBUTES + 3 {
            s.set_attribute(format!("k{}", i), i);
        }
        assert_eq!(s.attributes.len(), MAX_ATTRIBUTES);
        assert_eq!(s.dropped_attributes, 3);

        // Updating an existing key is not a new attribute.
        s.set_attribute("k0", "updated");
        assert_eq!(s.dropped_attributes, 3);
        assert_eq!(s.attributes.get("k0"), Some(&AttrValue::Str("updated".into())));
    }

    #[test]
    fn test_event_cap() {
        let mut s = span("events");
        for _ in 0..MAX_EVENTS + 1 {
            s.add_event(SpanEvent::new("e"));
        }
        assert_eq!(s.events.len(), MAX_EVENTS);
        assert_eq!(s.dropped_events, 1);
    }

    #[test]
    fn test_duration_requires_end() {
        let mut s = span("timing");
        assert!(s.duration().is_none());
        s.end_time = Some(s.start_time + Duration::from_millis(5));
        assert_eq!(s.duration(), Some(Duration::from_millis(5)));
    }
}
