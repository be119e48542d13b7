//! Todo persistence.
//!
//! # Responsibilities
//! - Define the `Todo` entity and the find/save/delete contract
//! - Provide the in-memory implementation used by the service and tests
//!
//! # Design Decisions
//! - The store is a collaborator: handlers consult it to read and update
//!   entities, it never participates in context propagation
//! - Timestamps are unix epoch milliseconds throughout the API

use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Current time as unix epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// A todo item owned by a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub due_date_ms: Option<u64>,
    #[serde(default)]
    pub reminder_date_ms: Option<u64>,
    pub created_at_ms: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence contract consumed by the handlers and the reminder
/// scheduler.
#[async_trait::async_trait]
pub trait TodoStore: Send + Sync {
    async fn find(&self, id: Uuid) -> Result<Option<Todo>, StoreError>;

    /// All todos for one user, newest first.
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Todo>, StoreError>;

    async fn save(&self, todo: Todo) -> Result<(), StoreError>;

    /// Remove and return the todo, if it existed.
    async fn delete(&self, id: Uuid) -> Result<Option<Todo>, StoreError>;

    /// Liveness probe for the health endpoint.
    async fn ping(&self) -> bool;
}

/// In-memory store backed by a concurrent map.
#[derive(Default)]
pub struct MemoryStore {
    todos: DashMap<Uuid, Todo>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TodoStore for MemoryStore {
    async fn find(&self, id: Uuid) -> Result<Option<Todo>, StoreError> {
        Ok(self.todos.get(&id).map(|t| t.value().clone()))
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Todo>, StoreError> {
        let mut todos: Vec<Todo> = self
            .todos
            .iter()
            .filter(|t| t.value().user_id == user_id)
            .map(|t| t.value().clone())
            .collect();
        todos.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        Ok(todos)
    }

    async fn save(&self, todo: Todo) -> Result<(), StoreError> {
        self.todos.insert(todo.id, todo);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Todo>, StoreError> {
        Ok(self.todos.remove(&id).map(|(_, todo)| todo))
    }

    async fn ping(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn todo(user: &str, name: &str, created_at_ms: u64) -> Todo {
        Todo {
            id: Uuid::new_v4(),
            user_id: user.to_string(),
            name: name.to_string(),
            description: None,
            priority: Priority::default(),
            completed: false,
            due_date_ms: None,
            reminder_date_ms: None,
            created_at_ms,
        }
    }

    #[tokio::test]
    async fn test_save_find_delete() {
        let store = MemoryStore::new();
        let t = todo("u1", "write tests", now_ms());
        store.save(t.clone()).await.unwrap();

        let found = store.find(t.id).await.unwrap().unwrap();
        assert_eq!(found.name, "write tests");

        let deleted = store.delete(t.id).await.unwrap();
        assert!(deleted.is_some());
        assert!(store.find(t.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_user_newest_first() {
        let store = MemoryStore::new();
        store.save(todo("u1", "older", 100)).await.unwrap();
        store.save(todo("u1", "newer", 200)).await.unwrap();
        store.save(todo("u2", "other user", 300)).await.unwrap();

        let todos = store.find_by_user("u1").await.unwrap();
        assert_eq!(todos.len(), 2);
        assert_eq!(todos[0].name, "newer");
        assert_eq!(todos[1].name, "older");
    }
}
