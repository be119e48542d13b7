//! Baggage: propagated key/value session context.
//!
//! # Responsibilities
//! - Immutable key→value map carried across every hop of a trace
//! - Deterministic merge semantics (last-writer-wins per key)
//! - Entry-count and serialized-size caps with deterministic truncation
//! - Wire form: comma-separated, percent-encoded `key=value[;metadata]`
//!
//! # Design Decisions
//! - Every mutation returns a new `Baggage`; values are shared, never
//!   mutated in place
//! - Insertion order is preserved so truncation keeps the earliest entries
//! - Overflow truncates and warns, it is never an error

use std::fmt;

use crate::telemetry::error::TelemetryError;

/// Maximum number of baggage entries.
pub const MAX_ENTRIES: usize = 180;
/// Maximum serialized header length in bytes.
pub const MAX_ENCODED_LEN: usize = 8192;

mod codec {
    //! Percent encoding for baggage keys and values.

    pub fn encode(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for byte in s.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    out.push(byte as char);
                }
                _ => out.push_str(&format!("%{:02X}", byte)),
            }
        }
        out
    }

    pub fn decode(s: &str) -> Option<String> {
        let bytes = s.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'%' {
                let high = hex_val(*bytes.get(i + 1)?)?;
                let low = hex_val(*bytes.get(i + 2)?)?;
                out.push((high << 4) | low);
                i += 3;
            } else {
                out.push(bytes[i]);
                i += 1;
            }
        }
        String::from_utf8(out).ok()
    }

    fn hex_val(c: u8) -> Option<u8> {
        match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'f' => Some(c - b'a' + 10),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        }
    }
}

/// A single baggage value with optional propagated metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaggageEntry {
    pub value: String,
    pub metadata: Option<String>,
}

impl BaggageEntry {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(value: impl Into<String>, metadata: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            metadata: Some(metadata.into()),
        }
    }

    fn encoded_len(&self, key: &str) -> usize {
        // key=value plus ";metadata" when present
        let mut len = codec::encode(key).len() + 1 + codec::encode(&self.value).len();
        if let Some(meta) = &self.metadata {
            len += 1 + meta.len();
        }
        len
    }
}

/// An ordered, immutable mapping of unique keys to baggage entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baggage {
    entries: Vec<(String, BaggageEntry)>,
}

impl Baggage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entry(key).map(|e| e.value.as_str())
    }

    pub fn entry(&self, key: &str) -> Option<&BaggageEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BaggageEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    /// Pure add/override: returns a new baggage with `key` set to `value`.
    ///
    /// Overriding an existing key keeps its insertion position. An addition
    /// that would exceed the caps is dropped (warned, never an error).
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_entry(key, BaggageEntry::new(value))
    }

    /// As [`Baggage::with`], carrying entry metadata.
    pub fn with_entry(&self, key: impl Into<String>, entry: BaggageEntry) -> Self {
        let key = key.into();
        let mut next = self.clone();
        match next.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = entry,
            None => next.entries.push((key, entry)),
        }
        next.truncate_to_caps();
        next
    }

    /// Merge: every key of `self` not present in `other`, plus every key of
    /// `other` (last-writer-wins on collision). Caps are enforced on the
    /// result, keeping earliest-inserted entries.
    pub fn merge(&self, other: &Baggage) -> Self {
        let mut merged = self.clone();
        for (key, entry) in &other.entries {
            match merged.entries.iter_mut().find(|(k, _)| k == key) {
                Some((_, existing)) => *existing = entry.clone(),
                None => merged.entries.push((key.clone(), entry.clone())),
            }
        }
        merged.truncate_to_caps();
        merged
    }

    /// Serialized header length of the current entries.
    pub fn encoded_len(&self) -> usize {
        let mut len = 0;
        for (i, (key, entry)) in self.entries.iter().enumerate() {
            if i > 0 {
                len += 1; // comma
            }
            len += entry.encoded_len(key);
        }
        len
    }

    /// Render the canonical `baggage` header value. Empty baggage renders
    /// as an empty string (the carrier writes no header in that case).
    pub fn to_header_value(&self) -> String {
        let mut out = String::with_capacity(self.encoded_len());
        for (i, (key, entry)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&codec::encode(key));
            out.push('=');
            out.push_str(&codec::encode(&entry.value));
            if let Some(meta) = &entry.metadata {
                out.push(';');
                out.push_str(meta);
            }
        }
        out
    }

    /// Parse a `baggage` header value. Malformed pairs are skipped; the
    /// caps are applied keeping the earliest pairs.
    pub fn from_header_value(value: &str) -> Self {
        let mut entries: Vec<(String, BaggageEntry)> = Vec::new();
        for item in value.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let mut parts = item.splitn(2, ';');
            let pair = parts.next().unwrap_or("");
            let metadata = parts.next().map(|m| m.trim().to_string());

            let mut kv = pair.splitn(2, '=');
            let (raw_key, raw_value) = match (kv.next(), kv.next()) {
                (Some(k), Some(v)) => (k.trim(), v.trim()),
                _ => continue,
            };
            let key = match codec::decode(raw_key) {
                Some(k) if !k.is_empty() => k,
                _ => continue,
            };
            let value = match codec::decode(raw_value) {
                Some(v) => v,
                None => continue,
            };
            let entry = BaggageEntry { value, metadata };
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) => *existing = entry,
                None => entries.push((key, entry)),
            }
        }
        let mut baggage = Self { entries };
        baggage.truncate_to_caps();
        baggage
    }

    // Deterministic truncation: walk in insertion order, keep entries while
    // both caps hold, drop the rest.
    fn truncate_to_caps(&mut self) {
        if self.entries.len() <= MAX_ENTRIES && self.encoded_len() <= MAX_ENCODED_LEN {
            return;
        }
        let mut size = 0;
        let mut keep = 0;
        for (key, entry) in &self.entries {
            let item = entry.encoded_len(key) + usize::from(keep > 0);
            if keep >= MAX_ENTRIES || size + item > MAX_ENCODED_LEN {
                break;
            }
            size += item;
            keep += 1;
        }
        let dropped = self.entries.len() - keep;
        self.entries.truncate(keep);
        tracing::warn!(
            dropped,
            kept = keep,
            error = %TelemetryError::BaggageOverflow { dropped },
            "baggage truncated to caps"
        );
    }
}

impl fmt::Display for Baggage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_is_pure() {
        let a = Baggage::new().with("user.id", "42");
        let b = a.with("user.name", "ada");
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 2);
        assert_eq!(b.get("user.id"), Some("42"));
    }

    #[test]
    fn test_with_overrides_in_place() {
        let a = Baggage::new().with("k1", "v1").with("k2", "v2").with("k1", "v3");
        assert_eq!(a.get("k1"), Some("v3"));
        let keys: Vec<_> = a.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["k1", "k2"]);
    }

    #[test]
    fn test_merge_last_writer_wins() {
        let a = Baggage::new().with("shared", "from-a").with("only-a", "1");
        let b = Baggage::new().with("shared", "from-b").with("only-b", "2");
        let merged = a.merge(&b);

        assert_eq!(merged.get("shared"), Some("from-b"));
        assert_eq!(merged.get("only-a"), Some("1"));
        assert_eq!(merged.get("only-b"), Some("2"));
    }

    #[test]
    fn test_merge_contains_every_key_of_b() {
        let a = Baggage::new().with("x", "1");
        let b = Baggage::new().with("y", "2").with("z", "3");
        let merged = a.merge(&b);
        for (key, entry) in b.iter() {
            assert_eq!(merged.get(key), Some(entry.value.as_str()));
        }
    }

    #[test]
    fn test_entry_cap_keeps_earliest() {
        let mut baggage = Baggage::new();
        for i in 0..MAX_ENTRIES + 5 {
            baggage = baggage.with(format!("k{}", i), "v");
        }
        assert_eq!(baggage.len(), MAX_ENTRIES);
        assert_eq!(baggage.get("k0"), Some("v"));
        assert!(baggage.get(&format!("k{}", MAX_ENTRIES)).is_none());
    }

    #[test]
    fn test_size_cap_truncates_deterministically() {
        let big = "x".repeat(3000);
        let baggage = Baggage::new()
            .with("a", big.clone())
            .with("b", big.clone())
            .with("c", big.clone())
            .with("d", big);
        assert!(baggage.encoded_len() <= MAX_ENCODED_LEN);
        assert_eq!(baggage.len(), 2);
        assert!(baggage.get("a").is_some());
        assert!(baggage.get("b").is_some());
    }

    #[test]
    fn test_header_round_trip() {
        let baggage = Baggage::new()
            .with("user.id", "42")
            .with("user.name", "ada lovelace")
            .with_entry("session", BaggageEntry::with_metadata("abc=1,2", "props=x"));

        let header = baggage.to_header_value();
        let parsed = Baggage::from_header_value(&header);

        assert_eq!(parsed.get("user.id"), Some("42"));
        assert_eq!(parsed.get("user.name"), Some("ada lovelace"));
        assert_eq!(parsed.get("session"), Some("abc=1,2"));
        assert_eq!(
            parsed.entry("session").unwrap().metadata.as_deref(),
            Some("props=x")
        );
    }

    #[test]
    fn test_malformed_pairs_skipped() {
        let parsed = Baggage::from_header_value("ok=1,,novalue,=empty-key,%zz=bad,ok2=2");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get("ok"), Some("1"));
        assert_eq!(parsed.get("ok2"), Some("2"));
    }

    #[test]
    fn test_percent_encoding_of_delimiters() {
        let baggage = Baggage::new().with("key", "a,b=c;d e");
        let header = baggage.to_header_value();
        assert!(!header.contains(' '));
        assert_eq!(header.matches(',').count(), 0);
        let parsed = Baggage::from_header_value(&header);
        assert_eq!(parsed.get("key"), Some("a,b=c;d e"));
    }
}
