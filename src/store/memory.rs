use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{Store, StoreError, StoreResult};
use crate::routes::times::{TimeEntry, TimeEntryDraft};
use crate::routes::todos::{Todo, TodoDraft};

#[derive(Default)]
struct Tables {
    todos: BTreeMap<i64, Todo>,
    time_entries: BTreeMap<i64, TimeEntry>,
    last_todo_id: i64,
    last_time_entry_id: i64,
}

impl Tables {
    fn require_todo(&self, id: i64) -> StoreResult<()> {
        if self.todos.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::todo_not_found(id))
        }
    }
}

/// In-process store. Both tables sit behind a single lock, so every trait
/// method observes and leaves a consistent snapshot.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn list_todos(&self) -> StoreResult<Vec<Todo>> {
        let tables = self.tables.read().await;
        Ok(tables.todos.values().cloned().collect())
    }

    async fn get_todo(&self, id: i64) -> StoreResult<Todo> {
        let tables = self.tables.read().await;
        tables
            .todos
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::todo_not_found(id))
    }

    async fn insert_todo(&self, draft: TodoDraft) -> StoreResult<Todo> {
        let mut tables = self.tables.write().await;
        tables.last_todo_id += 1;
        let todo = draft.into_todo(tables.last_todo_id, Utc::now());
        tables.todos.insert(todo.id, todo.clone());
        Ok(todo)
    }

    async fn update_todo(&self, id: i64, draft: TodoDraft) -> StoreResult<Todo> {
        let mut tables = self.tables.write().await;
        let slot = tables
            .todos
            .get_mut(&id)
            .ok_or_else(|| StoreError::todo_not_found(id))?;
        *slot = draft.into_todo(id, slot.created_at);
        Ok(slot.clone())
    }

    async fn delete_todo(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .todos
            .remove(&id)
            .ok_or_else(|| StoreError::todo_not_found(id))?;
        tables.time_entries.retain(|_, entry| entry.todo != id);
        Ok(())
    }

    async fn claim_due_notifications(&self, threshold: DateTime<Utc>) -> StoreResult<Vec<Todo>> {
        let mut tables = self.tables.write().await;
        let mut due = Vec::new();
        for todo in tables.todos.values_mut() {
            if todo.is_due(threshold) {
                todo.delivered = true;
                due.push(todo.clone());
            }
        }
        Ok(due)
    }

    async fn list_time_entries(&self) -> StoreResult<Vec<TimeEntry>> {
        let tables = self.tables.read().await;
        Ok(tables.time_entries.values().cloned().collect())
    }

    async fn get_time_entry(&self, id: i64) -> StoreResult<TimeEntry> {
        let tables = self.tables.read().await;
        tables
            .time_entries
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::time_entry_not_found(id))
    }

    async fn insert_time_entry(&self, draft: TimeEntryDraft) -> StoreResult<TimeEntry> {
        let mut tables = self.tables.write().await;
        if !tables.todos.contains_key(&draft.todo) {
            return Err(StoreError::MissingTodo(draft.todo));
        }
        tables.last_time_entry_id += 1;
        let entry = draft.into_time_entry(tables.last_time_entry_id, Utc::now());
        tables.time_entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn update_time_entry(&self, id: i64, draft: TimeEntryDraft) -> StoreResult<TimeEntry> {
        let mut tables = self.tables.write().await;
        if !tables.time_entries.contains_key(&id) {
            return Err(StoreError::time_entry_not_found(id));
        }
        if !tables.todos.contains_key(&draft.todo) {
            return Err(StoreError::MissingTodo(draft.todo));
        }
        let slot = tables
            .time_entries
            .get_mut(&id)
            .ok_or_else(|| StoreError::time_entry_not_found(id))?;
        *slot = draft.into_time_entry(id, slot.created_at);
        Ok(slot.clone())
    }

    async fn delete_time_entry(&self, id: i64) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .time_entries
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::time_entry_not_found(id))
    }

    async fn time_entries_for_todo(&self, todo_id: i64) -> StoreResult<Vec<TimeEntry>> {
        let tables = self.tables.read().await;
        tables.require_todo(todo_id)?;
        Ok(tables
            .time_entries
            .values()
            .filter(|entry| entry.todo == todo_id)
            .cloned()
            .collect())
    }

    async fn delete_time_entries_for_todo(&self, todo_id: i64) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        tables.require_todo(todo_id)?;
        let before = tables.time_entries.len();
        tables.time_entries.retain(|_, entry| entry.todo != todo_id);
        Ok((before - tables.time_entries.len()) as u64)
    }
}
