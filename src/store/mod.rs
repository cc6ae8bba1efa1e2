//! Persistence for todos and their time entries.
//!
//! Handlers only ever see `Arc<dyn Store>`; [`PgStore`] backs a real
//! deployment and [`MemoryStore`] is used when no database is configured.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::routes::times::{TimeEntry, TimeEntryDraft};
use crate::routes::todos::{Todo, TodoDraft};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found for primary key: \"{id}\"")]
    NotFound { entity: &'static str, id: i64 },
    /// A time entry referenced a todo that does not exist.
    #[error("Invalid pk \"{0}\" - object does not exist.")]
    MissingTodo(i64),
    #[error("stored row is invalid: {0}")]
    InvalidRow(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn todo_not_found(id: i64) -> Self {
        StoreError::NotFound { entity: "Todo", id }
    }

    pub fn time_entry_not_found(id: i64) -> Self {
        StoreError::NotFound {
            entity: "TimeEntry",
            id,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Record storage shared by every request.
///
/// Each method is atomic on its own. Updates replace the whole record.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short name of the backing storage, reported by the health check.
    fn backend(&self) -> &'static str;

    async fn list_todos(&self) -> StoreResult<Vec<Todo>>;

    async fn get_todo(&self, id: i64) -> StoreResult<Todo>;

    async fn insert_todo(&self, draft: TodoDraft) -> StoreResult<Todo>;

    async fn update_todo(&self, id: i64, draft: TodoDraft) -> StoreResult<Todo>;

    /// Removes the todo together with all of its time entries.
    async fn delete_todo(&self, id: i64) -> StoreResult<()>;

    /// Marks every undelivered todo with `notify_time <= threshold` as
    /// delivered and returns them. Concurrent callers never receive the same
    /// todo twice.
    async fn claim_due_notifications(&self, threshold: DateTime<Utc>) -> StoreResult<Vec<Todo>>;

    async fn list_time_entries(&self) -> StoreResult<Vec<TimeEntry>>;

    async fn get_time_entry(&self, id: i64) -> StoreResult<TimeEntry>;

    async fn insert_time_entry(&self, draft: TimeEntryDraft) -> StoreResult<TimeEntry>;

    async fn update_time_entry(&self, id: i64, draft: TimeEntryDraft) -> StoreResult<TimeEntry>;

    async fn delete_time_entry(&self, id: i64) -> StoreResult<()>;

    /// Entries logged against `todo_id`; fails with `NotFound` when the todo
    /// itself is absent.
    async fn time_entries_for_todo(&self, todo_id: i64) -> StoreResult<Vec<TimeEntry>>;

    /// Deletes every entry logged against `todo_id` and returns how many were
    /// removed; fails with `NotFound` when the todo itself is absent.
    async fn delete_time_entries_for_todo(&self, todo_id: i64) -> StoreResult<u64>;
}
