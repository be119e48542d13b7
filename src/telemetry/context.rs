//! Trace identity types and the propagated context.
//!
//! A trace is identified by a 128-bit id shared by every span in one logical
//! request chain; each span carries its own 64-bit id. Both render as
//! fixed-width lowercase hex, matching the wire format in `carrier.rs`.

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// 128-bit trace identifier. Valid ids are non-zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(u128);

impl TraceId {
    /// Length of the hex rendering.
    pub const HEX_LEN: usize = 32;

    /// Mint a fresh random trace id.
    pub fn mint() -> Self {
        loop {
            let id = rand::random::<u128>();
            if id != 0 {
                return Self(id);
            }
        }
    }

    /// Parse from exactly 32 hex characters. All-zero ids are rejected.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != Self::HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let id = u128::from_str_radix(s, 16).ok()?;
        if id == 0 {
            return None;
        }
        Some(Self(id))
    }

    pub fn to_hex(&self) -> String {
        format!("{:032x}", self.0)
    }

    /// Low 64 bits, used for deterministic ratio sampling.
    pub fn low64(&self) -> u64 {
        self.0 as u64
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// 64-bit span identifier, unique within a trace. Valid ids are non-zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId(u64);

impl SpanId {
    /// Length of the hex rendering.
    pub const HEX_LEN: usize = 16;

    /// Mint a fresh random span id.
    pub fn mint() -> Self {
        loop {
            let id = rand::random::<u64>();
            if id != 0 {
                return Self(id);
            }
        }
    }

    /// Parse from exactly 16 hex characters. All-zero ids are rejected.
    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != Self::HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let id = u64::from_str_radix(s, 16).ok()?;
        if id == 0 {
            return None;
        }
        Some(Self(id))
    }

    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Trace flags byte. Bit 0 is the sampled flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TraceFlags(pub u8);

impl TraceFlags {
    pub const NONE: Self = Self(0x00);
    pub const SAMPLED: Self = Self(0x01);

    pub fn is_sampled(&self) -> bool {
        self.0 & 0x01 != 0
    }

    pub fn with_sampled(mut self, sampled: bool) -> Self {
        if sampled {
            self.0 |= 0x01;
        } else {
            self.0 &= !0x01;
        }
        self
    }
}

/// The propagated trace context: immutable, shared by value.
///
/// An extracted remote context has `parent_span_id = None`; its `span_id`
/// becomes the parent of the first local span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub parent_span_id: Option<SpanId>,
    pub flags: TraceFlags,
}

impl TraceContext {
    pub fn new(trace_id: TraceId, span_id: SpanId, flags: TraceFlags) -> Self {
        Self {
            trace_id,
            span_id,
            parent_span_id: None,
            flags,
        }
    }

    /// Mint a fresh root context with no parent.
    pub fn root() -> Self {
        Self::new(TraceId::mint(), SpanId::mint(), TraceFlags::NONE)
    }

    /// Derive a child context: same trace id, fresh span id, this span as parent.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: SpanId::mint(),
            parent_span_id: Some(self.span_id),
            flags: self.flags,
        }
    }

    pub fn is_sampled(&self) -> bool {
        self.flags.is_sampled()
    }

    pub fn with_sampled(mut self, sampled: bool) -> Self {
        self.flags = self.flags.with_sampled(sampled);
        self
    }
}

impl Serialize for TraceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TraceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| de::Error::custom("invalid trace id"))
    }
}

impl Serialize for SpanId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SpanId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| de::Error::custom("invalid span id"))
    }
}
