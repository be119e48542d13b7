//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, routing)
//!     → middleware.rs (extract context, open request scope)
//!     → auth (verify bearer token, merge user facts into baggage)
//!     → handlers.rs (todo CRUD, health; child spans per operation)
//!     → middleware.rs (inject context into response, record metrics)
//!     → Send to client
//!
//! Outbound:
//!     client.rs (client span + header injection on every call)
//! ```

pub mod client;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use client::TracedClient;
pub use middleware::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
