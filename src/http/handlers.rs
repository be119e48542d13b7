//! Todo and health handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::UserIdentity;
use crate::error::ServiceError;
use crate::http::server::AppState;
use crate::store::{now_ms, Priority, Todo};
use crate::telemetry::{Attributes, RequestScope, Severity, SpanStatus};

#[derive(Debug, Deserialize)]
pub struct CreateTodo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub due_date_ms: Option<u64>,
    #[serde(default)]
    pub reminder_date_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateTodo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub due_date_ms: Option<u64>,
    #[serde(default)]
    pub reminder_date_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct TodoList {
    pub todos: Vec<Todo>,
    pub user: ListUser,
}

#[derive(Debug, Serialize)]
pub struct ListUser {
    pub username: String,
    pub user_id: String,
}

/// GET /todos
pub async fn list_todos(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<Json<TodoList>, ServiceError> {
    let mut attrs = Attributes::new();
    attrs.insert("user.id".into(), identity.id.as_str().into());
    let span = scope.child_span("todo.list", attrs);

    let todos = match state.store.find_by_user(&identity.id).await {
        Ok(todos) => todos,
        Err(error) => {
            span.record_error(&error);
            span.end(SpanStatus::Unset);
            return Err(error.into());
        }
    };

    span.set_attribute("todo.count", todos.len());
    span.end(SpanStatus::Ok);

    Ok(Json(TodoList {
        todos,
        user: ListUser {
            username: scope
                .baggage_value("user.name")
                .unwrap_or_else(|| identity.name.clone()),
            user_id: identity.id,
        },
    }))
}

/// POST /todos
pub async fn create_todo(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Extension(identity): Extension<UserIdentity>,
    Json(body): Json<CreateTodo>,
) -> Result<impl IntoResponse, ServiceError> {
    let span = scope.child_span("todo.create", Attributes::new());

    if body.name.trim().is_empty() {
        span.set_attribute("todo.create.error", "missing_name");
        span.end(SpanStatus::Unset);
        return Err(ServiceError::InvalidInput("Todo name is required".into()));
    }

    let todo = Todo {
        id: Uuid::new_v4(),
        user_id: identity.id.clone(),
        name: body.name,
        description: body.description,
        priority: body.priority.unwrap_or_default(),
        completed: false,
        due_date_ms: body.due_date_ms,
        reminder_date_ms: body.reminder_date_ms,
        created_at_ms: now_ms(),
    };
    state.store.save(todo.clone()).await?;

    if let Some(reminder_ms) = todo.reminder_date_ms {
        state
            .scheduler
            .schedule(todo.id, identity.id.clone(), reminder_ms);
    }

    span.set_attribute("todo.id", todo.id.to_string());
    span.set_attribute("todo.name", todo.name.as_str());
    span.set_attribute("user.id", identity.id.as_str());
    span.end(SpanStatus::Ok);

    let mut attrs = Attributes::new();
    attrs.insert("todo.id".into(), todo.id.to_string().into());
    scope.log(Severity::Info, "todo created", attrs);

    Ok((StatusCode::CREATED, Json(todo)))
}

/// PUT /todos/{id}
pub async fn update_todo(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Extension(identity): Extension<UserIdentity>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTodo>,
) -> Result<Json<Todo>, ServiceError> {
    let span = scope.child_span("todo.update", Attributes::new());

    let mut todo = match state.store.find(id).await? {
        Some(todo) if todo.user_id == identity.id => todo,
        _ => {
            span.set_attribute("todo.status", "not_found");
            span.end(SpanStatus::Unset);
            return Err(ServiceError::NotFound("todo"));
        }
    };

    if let Some(name) = body.name {
        todo.name = name;
    }
    if let Some(description) = body.description {
        todo.description = Some(description);
    }
    if let Some(priority) = body.priority {
        todo.priority = priority;
    }
    if let Some(completed) = body.completed {
        todo.completed = completed;
    }
    if let Some(due) = body.due_date_ms {
        todo.due_date_ms = Some(due);
    }
    if let Some(reminder_ms) = body.reminder_date_ms {
        todo.reminder_date_ms = Some(reminder_ms);
        state.scheduler.schedule(todo.id, identity.id.clone(), reminder_ms);
    }

    state.store.save(todo.clone()).await?;

    span.set_attribute("todo.id", todo.id.to_string());
    span.set_attribute("user.id", identity.id.as_str());
    span.end(SpanStatus::Ok);

    Ok(Json(todo))
}

/// DELETE /todos/{id}
pub async fn delete_todo(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
    Extension(identity): Extension<UserIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let span = scope.child_span("todo.delete", Attributes::new());

    match state.store.find(id).await? {
        Some(todo) if todo.user_id == identity.id => {
            state.store.delete(id).await?;
            state.scheduler.cancel(id);
        }
        _ => {
            span.set_attribute("todo.status", "not_found");
            span.end(SpanStatus::Unset);
            return Err(ServiceError::NotFound("todo"));
        }
    }

    span.set_attribute("todo.id", id.to_string());
    span.set_attribute("user.id", identity.id.as_str());
    span.end(SpanStatus::Ok);

    Ok(Json(serde_json::json!({ "message": "Todo deleted successfully" })))
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub store: &'static str,
    pub pending_reminders: usize,
    pub uptime_secs: u64,
}

/// GET /health — unauthenticated.
pub async fn health(
    State(state): State<AppState>,
    Extension(scope): Extension<RequestScope>,
) -> impl IntoResponse {
    let span = scope.child_span("health.check", Attributes::new());

    let store_up = state.store.ping().await;
    let health = HealthStatus {
        status: if store_up { "healthy" } else { "unhealthy" },
        store: if store_up { "connected" } else { "disconnected" },
        pending_reminders: state.scheduler.pending_count(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    };

    span.set_attribute("health.status", health.status);
    span.set_attribute("store.status", health.store);
    span.end(SpanStatus::Ok);

    let code = if store_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(health))
}
