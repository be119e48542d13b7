//! Exporter sink: the hand-off point between the correlation fabric and
//! whatever backend consumes finished telemetry.
//!
//! # Data Flow
//! ```text
//! span end / log emit / metric observation
//!     → TelemetrySink::submit (bounded ring, drop-oldest, never blocks)
//!     → background worker task
//!     → Exporter::export (batch, best-effort)
//! ```
//!
//! # Design Decisions
//! - The sink is the only shared mutable resource in the fabric; it applies
//!   backpressure internally (drop-oldest) instead of blocking callers
//! - Export failures are logged and dropped, never surfaced to the
//!   request path

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{broadcast, Notify};

use crate::telemetry::error::TelemetryError;
use crate::telemetry::logger::LogRecord;
use crate::telemetry::recorder::MetricObservation;
use crate::telemetry::span::Span;

/// A finished unit of telemetry handed to the exporter.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryItem {
    Span(Span),
    Log(LogRecord),
    Metric(MetricObservation),
}

/// Backend consumer of telemetry batches. Fire-and-forget: errors are the
/// worker's problem, never the emitting request's.
#[async_trait::async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, batch: Vec<TelemetryItem>) -> Result<(), TelemetryError>;
}

/// Writes each item as a JSON line through the process logger. The default
/// exporter for local development.
pub struct LogExporter;

#[async_trait::async_trait]
impl Exporter for LogExporter {
    async fn export(&self, batch: Vec<TelemetryItem>) -> Result<(), TelemetryError> {
        for item in batch {
            match serde_json::to_string(&item) {
                Ok(line) => tracing::debug!(target: "telemetry_export", "{line}"),
                Err(e) => {
                    return Err(TelemetryError::ExporterUnavailable(e.to_string()));
                }
            }
        }
        Ok(())
    }
}

/// Collects exported items in memory. Used by tests to assert on what the
/// fabric actually ships.
#[derive(Default, Clone)]
pub struct InMemoryExporter {
    items: Arc<Mutex<Vec<TelemetryItem>>>,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> Vec<TelemetryItem> {
        self.items.lock().unwrap().clone()
    }

    pub fn spans(&self) -> Vec<Span> {
        self.items()
            .into_iter()
            .filter_map(|item| match item {
                TelemetryItem::Span(span) => Some(span),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<LogRecord> {
        self.items()
            .into_iter()
            .filter_map(|item| match item {
                TelemetryItem::Log(record) => Some(record),
                _ => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Exporter for InMemoryExporter {
    async fn export(&self, batch: Vec<TelemetryItem>) -> Result<(), TelemetryError> {
        self.items.lock().unwrap().extend(batch);
        Ok(())
    }
}

/// Bounded drop-oldest buffer between request handling and the exporter.
pub struct TelemetrySink {
    buffer: Mutex<VecDeque<TelemetryItem>>,
    capacity: usize,
    batch_size: usize,
    notify: Notify,
    dropped: AtomicU64,
}

impl TelemetrySink {
    pub fn new(capacity: usize, batch_size: usize) -> Arc<Self> {
        Arc::new(Self {
            buffer: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            batch_size: batch_size.max(1),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
        })
    }

    /// Enqueue an item. Never blocks: when the buffer is full the oldest
    /// item is dropped to make room.
    pub fn submit(&self, item: TelemetryItem) {
        {
            let mut buffer = self.buffer.lock().unwrap();
            if buffer.len() >= self.capacity {
                buffer.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            buffer.push_back(item);
        }
        self.notify.notify_one();
    }

    /// Items discarded because the buffer was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn queued(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Vec<TelemetryItem> {
        self.buffer.lock().unwrap().iter().cloned().collect()
    }

    fn drain_batch(&self) -> Vec<TelemetryItem> {
        let mut buffer = self.buffer.lock().unwrap();
        let take = buffer.len().min(self.batch_size);
        buffer.drain(..take).collect()
    }

    /// Worker loop: drains batches into `exporter` until shutdown, then
    /// flushes whatever is left.
    pub async fn run(
        self: Arc<Self>,
        exporter: Box<dyn Exporter>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = self.notify.notified() => {
                    self.drain_to(exporter.as_ref()).await;
                }
                _ = shutdown.recv() => {
                    self.drain_to(exporter.as_ref()).await;
                    tracing::debug!(dropped = self.dropped(), "telemetry sink stopped");
                    return;
                }
            }
        }
    }

    async fn drain_to(&self, exporter: &dyn Exporter) {
        loop {
            let batch = self.drain_batch();
            if batch.is_empty() {
                return;
            }
            let size = batch.len();
            if let Err(error) = exporter.export(batch).await {
                // Batch is gone; the request path never sees this.
                tracing::warn!(%error, size, "export failed, batch dropped");
            }
        }
    }
}
