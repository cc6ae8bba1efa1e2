pub mod decode;
pub mod routes;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

// MODELS

/// Minutes logged against a todo for one week. Owned by its todo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeEntry {
    pub id: i64,
    /// Id of the owning todo.
    pub todo: i64,
    pub week_start_date: NaiveDate,
    pub minutes_spent: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeEntryDraft {
    pub todo: i64,
    pub week_start_date: NaiveDate,
    pub minutes_spent: i32,
}

impl TimeEntryDraft {
    pub fn into_time_entry(self, id: i64, created_at: DateTime<Utc>) -> TimeEntry {
        TimeEntry {
            id,
            todo: self.todo,
            week_start_date: self.week_start_date,
            minutes_spent: self.minutes_spent,
            created_at,
        }
    }
}
