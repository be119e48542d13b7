//! Shared harness for integration tests: a real server on an ephemeral
//! port with an in-memory exporter capturing everything the fabric ships.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::net::TcpListener;

use todo_service::auth::StaticTokenVerifier;
use todo_service::config::{self, ConfiguredRootSampler, SamplingMode, ServiceConfig, TokenEntry};
use todo_service::http::{AppState, HttpServer};
use todo_service::lifecycle::Shutdown;
use todo_service::scheduler::ReminderScheduler;
use todo_service::store::MemoryStore;
use todo_service::telemetry::{
    Attributes, InMemoryExporter, Span, Telemetry, TelemetrySink,
};

pub const ALICE_TOKEN: &str = "alice-token";
pub const BOB_TOKEN: &str = "bob-token";

pub struct TestService {
    pub addr: SocketAddr,
    pub exporter: InMemoryExporter,
    pub scheduler: ReminderScheduler,
    shutdown: Shutdown,
    sink_shutdown: Shutdown,
}

impl TestService {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        // Let the server drain before stopping the sink worker.
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.sink_shutdown.trigger();
    }
}

pub async fn spawn_service(mode: SamplingMode) -> TestService {
    let mut config = ServiceConfig::default();
    config.telemetry.sampling.mode = mode;
    config.auth.tokens = vec![
        TokenEntry {
            token: ALICE_TOKEN.into(),
            user_id: "user-alice".into(),
            user_name: "alice".into(),
        },
        TokenEntry {
            token: BOB_TOKEN.into(),
            user_id: "user-bob".into(),
            user_name: "bob".into(),
        },
    ];

    let shared_config = config::shared(config.clone());

    let sink = TelemetrySink::new(4096, 64);
    let exporter = InMemoryExporter::new();
    let sink_shutdown = Shutdown::new();
    tokio::spawn(
        sink.clone()
            .run(Box::new(exporter.clone()), sink_shutdown.subscribe()),
    );

    let telemetry = Telemetry::new(
        config.telemetry.service_name.clone(),
        Attributes::new(),
        Arc::new(ConfiguredRootSampler::new(shared_config.clone())),
        sink,
    );

    let store = Arc::new(MemoryStore::new());
    let scheduler = ReminderScheduler::new(telemetry.clone(), store.clone());
    let verifier = Arc::new(StaticTokenVerifier::from_config(&config.auth));

    let state = AppState {
        config: shared_config,
        telemetry,
        store: store.clone(),
        scheduler: scheduler.clone(),
        verifier,
        started_at: Instant::now(),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(state);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestService {
        addr,
        exporter,
        scheduler,
        shutdown,
        sink_shutdown,
    }
}

/// Poll the exporter until `predicate` matches at least `count` spans or
/// the timeout expires.
#[allow(dead_code)]
pub async fn wait_for_spans<F>(exporter: &InMemoryExporter, count: usize, predicate: F) -> Vec<Span>
where
    F: Fn(&Span) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let spans: Vec<Span> = exporter.spans().into_iter().filter(|s| predicate(s)).collect();
        if spans.len() >= count || Instant::now() > deadline {
            return spans;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
