//! Reminder timers for todos with a reminder date.
//!
//! # Design Decisions
//! - At most one pending timer per todo id: rescheduling replaces the old
//!   timer, deleting the todo cancels it, shutdown cancels all of them
//! - A firing reminder starts its own trace (it is not part of any request
//!   scope); the root sampling policy applies
//! - Timers are independent of request cancellation: the request that
//!   scheduled a reminder may be long gone when it fires

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::store::{now_ms, TodoStore};
use crate::telemetry::{Attributes, Severity, SpanKind, SpanStatus, Telemetry};

/// Schedules and fires per-todo reminder timers.
#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    jobs: DashMap<Uuid, ReminderJob>,
    generation: AtomicU64,
    telemetry: Telemetry,
    store: Arc<dyn TodoStore>,
}

struct ReminderJob {
    generation: u64,
    fire_at_ms: u64,
    task: Option<JoinHandle<()>>,
}

impl ReminderScheduler {
    pub fn new(telemetry: Telemetry, store: Arc<dyn TodoStore>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                jobs: DashMap::new(),
                generation: AtomicU64::new(0),
                telemetry,
                store,
            }),
        }
    }

    /// Schedule (or replace) the reminder for `todo_id`. The latest call
    /// wins: any previously pending timer for the same todo is cancelled.
    pub fn schedule(&self, todo_id: Uuid, user_id: String, fire_at_ms: u64) {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;

        // Register before spawning so a zero-delay timer finds its own entry.
        let previous = self.inner.jobs.insert(
            todo_id,
            ReminderJob {
                generation,
                fire_at_ms,
                task: None,
            },
        );
        if let Some(job) = previous {
            if let Some(task) = job.task {
                task.abort();
            }
            tracing::debug!(%todo_id, fire_at_ms, "reminder rescheduled");
        }

        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            let delay = fire_at_ms.saturating_sub(now_ms());
            tokio::time::sleep(Duration::from_millis(delay)).await;
            inner.fire(todo_id, user_id, generation).await;
        });

        // The entry may already be gone if the timer fired immediately.
        if let Some(mut job) = self.inner.jobs.get_mut(&todo_id) {
            if job.generation == generation {
                job.task = Some(task);
            } else {
                task.abort();
            }
        }
    }

    /// Cancel the pending reminder for `todo_id`, if any.
    pub fn cancel(&self, todo_id: Uuid) {
        if let Some((_, job)) = self.inner.jobs.remove(&todo_id) {
            if let Some(task) = job.task {
                task.abort();
            }
            tracing::debug!(%todo_id, "reminder cancelled");
        }
    }

    /// Cancel every pending reminder. Called on shutdown.
    pub fn cancel_all(&self) {
        let ids: Vec<Uuid> = self.inner.jobs.iter().map(|j| *j.key()).collect();
        for id in ids {
            self.cancel(id);
        }
        tracing::info!("all pending reminders cancelled");
    }

    pub fn pending_count(&self) -> usize {
        self.inner.jobs.len()
    }

    /// Fire time of the pending reminder for `todo_id`, if one exists.
    pub fn pending_fire_time(&self, todo_id: Uuid) -> Option<u64> {
        self.inner.jobs.get(&todo_id).map(|job| job.fire_at_ms)
    }
}

impl SchedulerInner {
    async fn fire(&self, todo_id: Uuid, user_id: String, generation: u64) {
        // A replacement may have raced the abort; only the current timer fires.
        match self.jobs.get(&todo_id) {
            Some(job) if job.generation == generation => {}
            _ => return,
        }

        let mut attrs = Attributes::new();
        attrs.insert("todo.id".into(), todo_id.to_string().into());
        attrs.insert("user.id".into(), user_id.as_str().into());
        let span = self
            .telemetry
            .start_span("todo.reminder", None, SpanKind::Internal, attrs);

        match self.store.find(todo_id).await {
            Ok(Some(todo)) => {
                let mut attrs = Attributes::new();
                attrs.insert("todo.id".into(), todo_id.to_string().into());
                attrs.insert("todo.name".into(), todo.name.as_str().into());
                attrs.insert("user.id".into(), user_id.as_str().into());
                self.telemetry.logger().emit(
                    Severity::Info,
                    format!("Reminder: todo \"{}\" is due soon", todo.name),
                    attrs,
                    Some(&span.context()),
                    None,
                );
                span.end(SpanStatus::Ok);
            }
            Ok(None) => {
                // Deleted between scheduling and firing.
                span.end(SpanStatus::Ok);
            }
            Err(error) => {
                span.record_error(&error);
                span.end(SpanStatus::Unset);
            }
        }

        self.jobs
            .remove_if(&todo_id, |_, job| job.generation == generation);
    }
}
