//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (timeout, correlation, auth)
//! - Serve with graceful shutdown
//!
//! # Design Decisions
//! - The correlation middleware is the outermost per-request layer: auth,
//!   handlers and timeouts all run inside the request scope
//! - `/health` sits outside the auth layer

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    middleware,
    routing::{get, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::{auth_middleware, TokenVerifier};
use crate::config::SharedConfig;
use crate::http::handlers;
use crate::http::middleware::telemetry_middleware;
use crate::scheduler::ReminderScheduler;
use crate::store::TodoStore;
use crate::telemetry::Telemetry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: SharedConfig,
    pub telemetry: Telemetry,
    pub store: Arc<dyn TodoStore>,
    pub scheduler: ReminderScheduler,
    pub verifier: Arc<dyn TokenVerifier>,
    pub started_at: Instant,
}

/// HTTP server for the todo service.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server over the given state.
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let request_timeout = state.config.load().timeouts.request_secs;

        let todo_routes = Router::new()
            .route(
                "/todos",
                get(handlers::list_todos).post(handlers::create_todo),
            )
            .route(
                "/todos/{id}",
                put(handlers::update_todo).delete(handlers::delete_todo),
            )
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ));

        Router::new()
            .merge(todo_routes)
            .route("/health", get(handlers::health))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(middleware::from_fn_with_state(
                        state.clone(),
                        telemetry_middleware,
                    ))
                    .layer(TimeoutLayer::new(Duration::from_secs(request_timeout))),
            )
            .with_state(state)
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
