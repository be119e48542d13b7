//! Bearer-token authentication.
//!
//! # Responsibilities
//! - Reject unauthenticated requests to the todo routes
//! - Resolve the token to a user identity via the injectable verifier
//! - Merge the authenticated user's id and name into the request's baggage
//!   so every downstream emission carries the session
//!
//! Credential verification itself is a collaborator: the service only
//! consumes the `TokenVerifier` contract.

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::config::AuthConfig;
use crate::http::server::AppState;
use crate::telemetry::RequestScope;

/// The authenticated caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub id: String,
    pub name: String,
}

/// Token → identity resolution contract.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Option<UserIdentity>;
}

/// Verifier over a fixed token table from configuration.
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, UserIdentity>,
}

impl StaticTokenVerifier {
    pub fn from_config(config: &AuthConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|entry| {
                (
                    entry.token.clone(),
                    UserIdentity {
                        id: entry.user_id.clone(),
                        name: entry.user_name.clone(),
                    },
                )
            })
            .collect();
        Self { tokens }
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Option<UserIdentity> {
        self.tokens.get(token).cloned()
    }
}

/// Middleware guarding the todo routes.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let identity = match token.and_then(|t| state.verifier.verify(t)) {
        Some(identity) => identity,
        None => {
            if let Some(scope) = request.extensions().get::<RequestScope>() {
                scope
                    .current_span()
                    .set_attribute("auth.status", "unauthorized");
            }
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // Session facts become baggage for the rest of the request; every log
    // and outbound hop from here on carries them.
    if let Some(scope) = request.extensions().get::<RequestScope>() {
        scope
            .with_baggage("user.id", identity.id.clone())
            .with_baggage("user.name", identity.name.clone());
        let span = scope.current_span();
        span.set_attribute("user.id", identity.id.as_str());
        span.set_attribute("user.name", identity.name.as_str());
    }

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
