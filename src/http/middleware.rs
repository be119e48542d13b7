//! Correlation middleware for the HTTP pipeline.
//!
//! # Responsibilities
//! - Extract trace context + baggage from inbound headers
//! - Open the server root span and the request scope
//! - Inject the (possibly baggage-augmented) context into the response
//! - Record bounded-cardinality request metrics
//!
//! # Design Decisions
//! - The scope travels through request extensions; handlers never touch a
//!   global
//! - Metric dimensions use the matched route template, not the raw path,
//!   to keep the series count bounded

use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::http::server::AppState;
use crate::telemetry::{carrier, Attributes, RequestScope, SpanKind, SpanStatus};

/// Correlation id header, preserved when the caller supplies one.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Outermost per-request middleware: everything the request does runs
/// under the scope this opens.
pub async fn telemetry_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let (remote_context, baggage) = carrier::extract(request.headers());

    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().to_string();

    let mut attrs = Attributes::new();
    attrs.insert("http.method".into(), method.as_str().into());
    attrs.insert("http.route".into(), route.as_str().into());
    attrs.insert("http.target".into(), request.uri().path().into());
    attrs.insert("request.correlation_id".into(), request_id.as_str().into());

    let root = state.telemetry.start_span(
        format!("{} {}", method, route),
        remote_context.as_ref(),
        SpanKind::Server,
        attrs,
    );
    let scope = RequestScope::new(state.telemetry.clone(), root, baggage);
    request.extensions_mut().insert(scope.clone());

    let mut response = next.run(request).await;

    let status = response.status();
    let span = scope.current_span();
    span.set_attribute("http.status_code", status.as_u16() as i64);

    let context = scope.context();
    carrier::inject(Some(&context), &scope.baggage(), response.headers_mut());
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }

    let span_status = if status.is_server_error() {
        SpanStatus::Error {
            message: format!("HTTP {}", status.as_u16()),
        }
    } else {
        SpanStatus::Ok
    };
    scope.finish(span_status);

    let recorder = state.telemetry.recorder();
    let dims = vec![
        ("route".to_string(), route.clone()),
        ("method".to_string(), method),
        ("status".to_string(), status_class(status.as_u16())),
    ];
    recorder.incr("http_requests_total", dims, Some(&context));
    recorder.record(
        "http_request_duration_ms",
        start.elapsed().as_secs_f64() * 1000.0,
        vec![("route".to_string(), route)],
        Some(&context),
    );

    response
}

fn status_class(status: u16) -> String {
    format!("{}xx", status / 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_class_is_bounded() {
        assert_eq!(status_class(200), "2xx");
        assert_eq!(status_class(404), "4xx");
        assert_eq!(status_class(503), "5xx");
    }
}
