//! Wire-format extraction and injection of the propagated context.
//!
//! # Responsibilities
//! - Parse `traceparent` (`version-traceid-spanid-flags`) and `baggage`
//!   headers from inbound requests
//! - Write canonical serialized forms into outbound/response headers
//! - Degrade to an absent context on malformed input, never an error
//!
//! # Design Decisions
//! - Extraction failures log a warning and continue; the request path is
//!   never blocked by a bad propagation header
//! - `inject(extract(h))` reproduces the semantic content of `h` (hex
//!   casing and unknown flag bits normalized)

use axum::http::{HeaderMap, HeaderValue};

use crate::telemetry::baggage::Baggage;
use crate::telemetry::context::{SpanId, TraceContext, TraceFlags, TraceId};
use crate::telemetry::error::TelemetryError;

/// W3C trace context header name.
pub const TRACEPARENT: &str = "traceparent";
/// W3C baggage header name.
pub const BAGGAGE: &str = "baggage";

/// Parse the propagation headers from an inbound request.
///
/// A missing or malformed `traceparent` yields `None`; a missing or
/// malformed `baggage` yields empty baggage. Neither is an error.
pub fn extract(headers: &HeaderMap) -> (Option<TraceContext>, Baggage) {
    let context = headers
        .get(TRACEPARENT)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| match parse_traceparent(raw) {
            Ok(ctx) => Some(ctx),
            Err(err) => {
                tracing::warn!(header = raw, error = %err, "discarding malformed traceparent");
                None
            }
        });

    let baggage = headers
        .get(BAGGAGE)
        .and_then(|v| v.to_str().ok())
        .map(Baggage::from_header_value)
        .unwrap_or_default();

    (context, baggage)
}

/// Write the canonical forms of `context` and `baggage` into `headers`.
///
/// An absent context is a no-op; empty baggage writes no header.
pub fn inject(context: Option<&TraceContext>, baggage: &Baggage, headers: &mut HeaderMap) {
    if let Some(ctx) = context {
        // Rendered form is pure ASCII, from_str cannot fail here.
        if let Ok(value) = HeaderValue::from_str(&render_traceparent(ctx)) {
            headers.insert(TRACEPARENT, value);
        }
    }
    if !baggage.is_empty() {
        match HeaderValue::from_str(&baggage.to_header_value()) {
            Ok(value) => {
                headers.insert(BAGGAGE, value);
            }
            Err(_) => {
                tracing::warn!("baggage header rendered invalid characters, not injected");
            }
        }
    }
}

/// Parse a `traceparent` value: `version-traceid-spanid-flags` with exact
/// segment lengths 2, 32, 16 and 2 hex characters.
pub fn parse_traceparent(value: &str) -> Result<TraceContext, TelemetryError> {
    let malformed = |reason: &str| TelemetryError::MalformedHeader {
        header: TRACEPARENT,
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = value.trim().split('-').collect();
    if parts.len() < 4 {
        return Err(malformed("expected 4 segments"));
    }

    let version = parts[0];
    if version.len() != 2 || !version.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed("invalid version"));
    }
    if version.eq_ignore_ascii_case("ff") {
        return Err(malformed("forbidden version ff"));
    }
    // Version 00 defines exactly four segments; later versions may append.
    if version == "00" && parts.len() != 4 {
        return Err(malformed("trailing segments in version 00"));
    }

    let trace_id = TraceId::from_hex(parts[1]).ok_or_else(|| malformed("invalid trace id"))?;
    let span_id = SpanId::from_hex(parts[2]).ok_or_else(|| malformed("invalid span id"))?;

    let flags = parts[3];
    if flags.len() != 2 || !flags.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed("invalid flags"));
    }
    let flags = u8::from_str_radix(flags, 16).map_err(|_| malformed("invalid flags"))?;

    Ok(TraceContext::new(trace_id, span_id, TraceFlags(flags)))
}

/// Render the canonical `traceparent` value for `context`.
pub fn render_traceparent(context: &TraceContext) -> String {
    format!(
        "00-{}-{}-{:02x}",
        context.trace_id, context.span_id, context.flags.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_inject_round_trip() {
        let headers = headers_with(
            TRACEPARENT,
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",
        );
        let (ctx, baggage) = extract(&headers);
        let ctx = ctx.unwrap();
        assert!(ctx.is_sampled());

        let mut out = HeaderMap::new();
        inject(Some(&ctx), &baggage, &mut out);
        assert_eq!(
            out.get(TRACEPARENT).unwrap(),
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"
        );
        assert!(out.get(BAGGAGE).is_none());
    }

    #[test]
    fn test_uppercase_normalized_on_round_trip() {
        let (ctx, _) = extract(&headers_with(
            TRACEPARENT,
            "00-0AF7651916CD43DD8448EB211C80319C-B7AD6B7169203331-00",
        ));
        assert_eq!(
            render_traceparent(&ctx.unwrap()),
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-00"
        );
    }

    #[test]
    fn test_malformed_never_raises() {
        let cases = [
            "",
            "garbage",
            "00-abc-def-01",                                            // wrong lengths
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331",     // 3 segments
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01-x",// extra for v00
            "zz-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",  // bad version
            "ff-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01",  // forbidden
            "00-00000000000000000000000000000000-b7ad6b7169203331-01",  // zero trace id
            "00-0af7651916cd43dd8448eb211c80319c-0000000000000000-01",  // zero span id
            "00-0af7651916cd43dd8448eb211c80319g-b7ad6b7169203331-01",  // non-hex
        ];
        for case in cases {
            let (ctx, _) = extract(&headers_with(TRACEPARENT, case));
            assert!(ctx.is_none(), "accepted malformed header: {case:?}");
        }
    }

    #[test]
    fn test_future_version_with_extra_segments() {
        let (ctx, _) = extract(&headers_with(
            TRACEPARENT,
            "01-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01-future",
        ));
        assert!(ctx.is_some());
    }

    #[test]
    fn test_absent_headers_yield_empty() {
        let (ctx, baggage) = extract(&HeaderMap::new());
        assert!(ctx.is_none());
        assert!(baggage.is_empty());
    }

    #[test]
    fn test_inject_absent_context_is_noop() {
        let mut headers = HeaderMap::new();
        inject(None, &Baggage::new(), &mut headers);
        assert!(headers.is_empty());
    }

    #[test]
    fn test_baggage_round_trip_through_headers() {
        let headers = headers_with(BAGGAGE, "user.id=42,user.name=ada%20lovelace");
        let (_, baggage) = extract(&headers);
        assert_eq!(baggage.get("user.id"), Some("42"));
        assert_eq!(baggage.get("user.name"), Some("ada lovelace"));

        let mut out = HeaderMap::new();
        inject(None, &baggage, &mut out);
        let (_, reparsed) = extract(&out);
        assert_eq!(reparsed, baggage);
    }
}
