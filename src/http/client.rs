//! Outbound HTTP with automatic context injection.
//!
//! Every outbound call opens a client span under the supplied parent and
//! carries the current trace context and baggage in its headers, so a
//! downstream hop joins the same trace.

use axum::http::HeaderMap;

use crate::telemetry::{carrier, Attributes, Baggage, SpanKind, SpanStatus, Telemetry, TraceContext};

/// A reqwest wrapper that injects the propagation headers on every call.
#[derive(Clone)]
pub struct TracedClient {
    telemetry: Telemetry,
    http: reqwest::Client,
}

impl TracedClient {
    pub fn new(telemetry: Telemetry) -> Self {
        Self {
            telemetry,
            http: reqwest::Client::new(),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Send `request` inside a client span named `name`.
    ///
    /// With `parent = None` the call starts its own trace (e.g. a CLI
    /// invocation); otherwise it joins the parent's.
    pub async fn send(
        &self,
        name: impl Into<String>,
        parent: Option<&TraceContext>,
        baggage: &Baggage,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let span = self
            .telemetry
            .start_span(name, parent, SpanKind::Client, Attributes::new());

        let mut headers = HeaderMap::new();
        carrier::inject(Some(&span.context()), baggage, &mut headers);

        let result = request.headers(headers).send().await;
        match &result {
            Ok(response) => {
                let status = response.status();
                span.set_attribute("http.status_code", status.as_u16() as i64);
                if status.is_server_error() {
                    span.end(SpanStatus::Error {
                        message: format!("HTTP {}", status.as_u16()),
                    });
                } else {
                    span.end(SpanStatus::Ok);
                }
            }
            Err(error) => {
                span.record_error(error);
                span.end(SpanStatus::Unset);
            }
        }
        result
    }
}
