use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use super::{Store, StoreError, StoreResult};
use crate::routes::times::{TimeEntry, TimeEntryDraft};
use crate::routes::todos::{RepeatDays, RepeatType, Todo, TodoDraft, TodoType};

const TODO_COLUMNS: &str = "id, todo_type, title, description, due_date, start_time, end_time, \
     completed, created_at, notify_time, delivered, repeat_type, repeat_frequency, repeat_days, \
     repeat_start_time, repeat_end_time";

const TIME_ENTRY_COLUMNS: &str = "id, todo_id, week_start_date, minutes_spent, created_at";

const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, sqlx::FromRow)]
struct TodoRow {
    id: i64,
    todo_type: String,
    title: String,
    description: String,
    due_date: NaiveDate,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
    completed: bool,
    created_at: DateTime<Utc>,
    notify_time: Option<DateTime<Utc>>,
    delivered: bool,
    repeat_type: String,
    repeat_frequency: i32,
    repeat_days: i16,
    repeat_start_time: Option<DateTime<Utc>>,
    repeat_end_time: Option<DateTime<Utc>>,
}

impl TryFrom<TodoRow> for Todo {
    type Error = StoreError;

    fn try_from(row: TodoRow) -> Result<Self, Self::Error> {
        let todo_type = TodoType::from_code(&row.todo_type).ok_or_else(|| {
            StoreError::InvalidRow(format!("todo {} has todo_type {:?}", row.id, row.todo_type))
        })?;
        let repeat_type = RepeatType::from_code(&row.repeat_type).ok_or_else(|| {
            StoreError::InvalidRow(format!(
                "todo {} has repeat_type {:?}",
                row.id, row.repeat_type
            ))
        })?;
        let repeat_frequency = u16::try_from(row.repeat_frequency).map_err(|_| {
            StoreError::InvalidRow(format!(
                "todo {} has repeat_frequency {}",
                row.id, row.repeat_frequency
            ))
        })?;
        let repeat_days = u8::try_from(row.repeat_days)
            .ok()
            .and_then(RepeatDays::from_bits)
            .ok_or_else(|| {
                StoreError::InvalidRow(format!(
                    "todo {} has repeat_days {}",
                    row.id, row.repeat_days
                ))
            })?;

        Ok(Todo {
            id: row.id,
            todo_type,
            title: row.title,
            description: row.description,
            due_date: row.due_date,
            start_time: row.start_time,
            end_time: row.end_time,
            completed: row.completed,
            created_at: row.created_at,
            notify_time: row.notify_time,
            delivered: row.delivered,
            repeat_type,
            repeat_frequency,
            repeat_days,
            repeat_start_time: row.repeat_start_time,
            repeat_end_time: row.repeat_end_time,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TimeEntryRow {
    id: i64,
    todo_id: i64,
    week_start_date: NaiveDate,
    minutes_spent: i32,
    created_at: DateTime<Utc>,
}

impl From<TimeEntryRow> for TimeEntry {
    fn from(row: TimeEntryRow) -> Self {
        TimeEntry {
            id: row.id,
            todo: row.todo_id,
            week_start_date: row.week_start_date,
            minutes_spent: row.minutes_spent,
            created_at: row.created_at,
        }
    }
}

fn into_todos(rows: Vec<TodoRow>) -> StoreResult<Vec<Todo>> {
    rows.into_iter().map(Todo::try_from).collect()
}

/// Turns a foreign key violation on `time_entries.todo_id` into
/// [`StoreError::MissingTodo`].
fn map_time_entry_write(err: sqlx::Error, todo_id: i64) -> StoreError {
    if let Some(db_error) = err.as_database_error() {
        if db_error.code() == Some(std::borrow::Cow::Borrowed(FOREIGN_KEY_VIOLATION)) {
            return StoreError::MissingTodo(todo_id);
        }
    }
    StoreError::Database(err)
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects and brings the schema up to date.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(sqlx::Error::from)?;

        Ok(Self::new(pool))
    }

    async fn todo_exists(&self, id: i64) -> StoreResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM todos WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn list_todos(&self) -> StoreResult<Vec<Todo>> {
        let rows = sqlx::query_as::<_, TodoRow>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        into_todos(rows)
    }

    async fn get_todo(&self, id: i64) -> StoreResult<Todo> {
        let row = sqlx::query_as::<_, TodoRow>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| StoreError::todo_not_found(id))?
            .try_into()
    }

    async fn insert_todo(&self, draft: TodoDraft) -> StoreResult<Todo> {
        let row = sqlx::query_as::<_, TodoRow>(&format!(
            r#"
            INSERT INTO todos (
                todo_type, title, description, due_date, start_time, end_time, completed,
                notify_time, delivered, repeat_type, repeat_frequency, repeat_days,
                repeat_start_time, repeat_end_time
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {TODO_COLUMNS}
            "#
        ))
        .bind(draft.todo_type.as_str())
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.due_date)
        .bind(draft.start_time)
        .bind(draft.end_time)
        .bind(draft.completed)
        .bind(draft.notify_time)
        .bind(draft.delivered)
        .bind(draft.repeat_type.as_str())
        .bind(i32::from(draft.repeat_frequency))
        .bind(i16::from(draft.repeat_days.bits()))
        .bind(draft.repeat_start_time)
        .bind(draft.repeat_end_time)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn update_todo(&self, id: i64, draft: TodoDraft) -> StoreResult<Todo> {
        let row = sqlx::query_as::<_, TodoRow>(&format!(
            r#"
            UPDATE todos
            SET
                todo_type = $2,
                title = $3,
                description = $4,
                due_date = $5,
                start_time = $6,
                end_time = $7,
                completed = $8,
                notify_time = $9,
                delivered = $10,
                repeat_type = $11,
                repeat_frequency = $12,
                repeat_days = $13,
                repeat_start_time = $14,
                repeat_end_time = $15
            WHERE id = $1
            RETURNING {TODO_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(draft.todo_type.as_str())
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.due_date)
        .bind(draft.start_time)
        .bind(draft.end_time)
        .bind(draft.completed)
        .bind(draft.notify_time)
        .bind(draft.delivered)
        .bind(draft.repeat_type.as_str())
        .bind(i32::from(draft.repeat_frequency))
        .bind(i16::from(draft.repeat_days.bits()))
        .bind(draft.repeat_start_time)
        .bind(draft.repeat_end_time)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or_else(|| StoreError::todo_not_found(id))?
            .try_into()
    }

    async fn delete_todo(&self, id: i64) -> StoreResult<()> {
        // time_entries go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::todo_not_found(id));
        }

        Ok(())
    }

    async fn claim_due_notifications(&self, threshold: DateTime<Utc>) -> StoreResult<Vec<Todo>> {
        let mut rows = sqlx::query_as::<_, TodoRow>(&format!(
            r#"
            UPDATE todos
            SET delivered = TRUE
            WHERE delivered = FALSE
              AND notify_time IS NOT NULL
              AND notify_time <= $1
            RETURNING {TODO_COLUMNS}
            "#
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        rows.sort_by_key(|row| row.id);
        into_todos(rows)
    }

    async fn list_time_entries(&self) -> StoreResult<Vec<TimeEntry>> {
        let rows = sqlx::query_as::<_, TimeEntryRow>(&format!(
            "SELECT {TIME_ENTRY_COLUMNS} FROM time_entries ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TimeEntry::from).collect())
    }

    async fn get_time_entry(&self, id: i64) -> StoreResult<TimeEntry> {
        let row = sqlx::query_as::<_, TimeEntryRow>(&format!(
            "SELECT {TIME_ENTRY_COLUMNS} FROM time_entries WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TimeEntry::from)
            .ok_or_else(|| StoreError::time_entry_not_found(id))
    }

    async fn insert_time_entry(&self, draft: TimeEntryDraft) -> StoreResult<TimeEntry> {
        let row = sqlx::query_as::<_, TimeEntryRow>(&format!(
            r#"
            INSERT INTO time_entries (todo_id, week_start_date, minutes_spent)
            VALUES ($1, $2, $3)
            RETURNING {TIME_ENTRY_COLUMNS}
            "#
        ))
        .bind(draft.todo)
        .bind(draft.week_start_date)
        .bind(draft.minutes_spent)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_time_entry_write(e, draft.todo))?;

        Ok(row.into())
    }

    async fn update_time_entry(&self, id: i64, draft: TimeEntryDraft) -> StoreResult<TimeEntry> {
        let row = sqlx::query_as::<_, TimeEntryRow>(&format!(
            r#"
            UPDATE time_entries
            SET todo_id = $2, week_start_date = $3, minutes_spent = $4
            WHERE id = $1
            RETURNING {TIME_ENTRY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(draft.todo)
        .bind(draft.week_start_date)
        .bind(draft.minutes_spent)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_time_entry_write(e, draft.todo))?;

        row.map(TimeEntry::from)
            .ok_or_else(|| StoreError::time_entry_not_found(id))
    }

    async fn delete_time_entry(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM time_entries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::time_entry_not_found(id));
        }

        Ok(())
    }

    async fn time_entries_for_todo(&self, todo_id: i64) -> StoreResult<Vec<TimeEntry>> {
        if !self.todo_exists(todo_id).await? {
            return Err(StoreError::todo_not_found(todo_id));
        }

        let rows = sqlx::query_as::<_, TimeEntryRow>(&format!(
            "SELECT {TIME_ENTRY_COLUMNS} FROM time_entries WHERE todo_id = $1 ORDER BY id"
        ))
        .bind(todo_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TimeEntry::from).collect())
    }

    async fn delete_time_entries_for_todo(&self, todo_id: i64) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;

        // Lock the todo so it cannot vanish between the check and the delete.
        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM todos WHERE id = $1 FOR UPDATE")
            .bind(todo_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StoreError::todo_not_found(todo_id));
        }

        let result = sqlx::query("DELETE FROM time_entries WHERE todo_id = $1")
            .bind(todo_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }
}
