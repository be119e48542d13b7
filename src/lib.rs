//! Todo service with end-to-end request correlation.
//!
//! Every unit of work belonging to one logical request — HTTP handling,
//! store lookups, deferred reminder jobs — is correlated through the
//! `telemetry` fabric so logs, metrics and spans can be attributed to the
//! same originating transaction and user session.

// Core subsystem
pub mod telemetry;

// Application
pub mod auth;
pub mod error;
pub mod http;
pub mod scheduler;
pub mod store;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use telemetry::{RequestScope, Telemetry};
