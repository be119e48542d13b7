//! Todo service binary.
//!
//! Startup order: config → telemetry fabric → store/scheduler → listener.
//! Shutdown order: stop accepting → cancel reminder timers → flush the
//! telemetry sink.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use todo_service::auth::StaticTokenVerifier;
use todo_service::config::{self, ConfigWatcher, ConfiguredRootSampler, ServiceConfig};
use todo_service::http::{AppState, HttpServer};
use todo_service::lifecycle::{spawn_signal_listener, Shutdown};
use todo_service::scheduler::ReminderScheduler;
use todo_service::store::MemoryStore;
use todo_service::telemetry::{recorder, Attributes, LogExporter, Telemetry, TelemetrySink};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "todo_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("todo-service v0.1.0 starting");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match &config_path {
        Some(path) => config::load_config(path)?,
        None => ServiceConfig::default(),
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        service_name = %config.telemetry.service_name,
        sampling_mode = ?config.telemetry.sampling.mode,
        sampling_ratio = config.telemetry.sampling.ratio,
        "Configuration loaded"
    );

    // Metrics endpoint
    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            recorder::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();
    spawn_signal_listener(&shutdown);

    let shared_config = config::shared(config.clone());

    // Telemetry fabric: sink worker flushes after everything else stopped.
    let sink = TelemetrySink::new(
        config.telemetry.export.buffer_capacity,
        config.telemetry.export.batch_size,
    );
    let sink_shutdown = Shutdown::new();
    let sink_worker = tokio::spawn(
        sink.clone()
            .run(Box::new(LogExporter), sink_shutdown.subscribe()),
    );

    let mut resource = Attributes::new();
    resource.insert(
        "deployment.environment".into(),
        config.telemetry.deployment_environment.as_str().into(),
    );
    resource.insert(
        "team.owner".into(),
        config.telemetry.team_owner.as_str().into(),
    );
    let telemetry = Telemetry::new(
        config.telemetry.service_name.clone(),
        resource,
        Arc::new(ConfiguredRootSampler::new(shared_config.clone())),
        sink.clone(),
    );

    let store = Arc::new(MemoryStore::new());
    let scheduler = ReminderScheduler::new(telemetry.clone(), store.clone());
    let verifier = Arc::new(StaticTokenVerifier::from_config(&config.auth));

    // Config hot reload (sampling changes apply without restart)
    let mut _watcher_handle = None;
    if let Some(path) = &config_path {
        let (watcher, mut updates) = ConfigWatcher::new(path);
        match watcher.run() {
            Ok(handle) => {
                _watcher_handle = Some(handle);
                let shared = shared_config.clone();
                tokio::spawn(async move {
                    while let Some(new_config) = updates.recv().await {
                        tracing::info!("Applying reloaded configuration");
                        shared.store(Arc::new(new_config));
                    }
                });
            }
            Err(error) => {
                tracing::error!(%error, "config watcher failed to start");
            }
        }
    }

    let state = AppState {
        config: shared_config,
        telemetry,
        store,
        scheduler: scheduler.clone(),
        verifier,
        started_at: Instant::now(),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        "Listening for connections"
    );

    let server = HttpServer::new(state);
    server.run(listener, shutdown.subscribe()).await?;

    // Ordered shutdown: server stopped; now timers, then the sink flush.
    scheduler.cancel_all();
    sink_shutdown.trigger();
    let _ = sink_worker.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
