pub mod decode;
pub mod routes;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

// MODELS

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TodoType {
    #[default]
    #[serde(rename = "TODO")]
    Todo,
    #[serde(rename = "CLASS")]
    Class,
    #[serde(rename = "EVENT")]
    Event,
}

impl TodoType {
    pub const ALL: [TodoType; 3] = [TodoType::Todo, TodoType::Class, TodoType::Event];

    pub fn as_str(self) -> &'static str {
        match self {
            TodoType::Todo => "TODO",
            TodoType::Class => "CLASS",
            TodoType::Event => "EVENT",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == code)
    }
}

/// Recurrence unit. Serialized as its one-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RepeatType {
    #[default]
    #[serde(rename = "N")]
    Never,
    #[serde(rename = "W")]
    Weeks,
    #[serde(rename = "M")]
    Months,
    #[serde(rename = "Y")]
    Years,
}

impl RepeatType {
    pub const ALL: [RepeatType; 4] = [
        RepeatType::Never,
        RepeatType::Weeks,
        RepeatType::Months,
        RepeatType::Years,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RepeatType::Never => "N",
            RepeatType::Weeks => "W",
            RepeatType::Months => "M",
            RepeatType::Years => "Y",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == code)
    }
}

/// Weekdays a todo recurs on, one bit per day from Sunday (most significant)
/// to Saturday (least significant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct RepeatDays(u8);

impl RepeatDays {
    pub const SUN: u8 = 0b1000000;
    pub const MON: u8 = 0b0100000;
    pub const TUE: u8 = 0b0010000;
    pub const WED: u8 = 0b0001000;
    pub const THU: u8 = 0b0000100;
    pub const FRI: u8 = 0b0000010;
    pub const SAT: u8 = 0b0000001;
    pub const ALL: u8 = 0b1111111;

    pub const DAYS: [u8; 7] = [
        Self::SUN,
        Self::MON,
        Self::TUE,
        Self::WED,
        Self::THU,
        Self::FRI,
        Self::SAT,
    ];

    pub const fn empty() -> Self {
        RepeatDays(0)
    }

    /// Returns `None` for values with bits above the seventh set.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        if bits > Self::ALL {
            None
        } else {
            Some(RepeatDays(bits))
        }
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Flips the day bits in `mask`, leaving every other day untouched.
    pub fn toggle(&mut self, mask: u8) {
        self.0 = (self.0 ^ mask) & Self::ALL;
    }

    pub const fn contains(self, mask: u8) -> bool {
        self.0 & mask == mask
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Todo {
    pub id: i64,
    pub todo_type: TodoType,
    pub title: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub notify_time: Option<DateTime<Utc>>,
    pub delivered: bool,
    pub repeat_type: RepeatType,
    pub repeat_frequency: u16,
    pub repeat_days: RepeatDays,
    pub repeat_start_time: Option<DateTime<Utc>>,
    pub repeat_end_time: Option<DateTime<Utc>>,
}

/// Every client-writable todo field, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct TodoDraft {
    pub todo_type: TodoType,
    pub title: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub completed: bool,
    pub notify_time: Option<DateTime<Utc>>,
    pub delivered: bool,
    pub repeat_type: RepeatType,
    pub repeat_frequency: u16,
    pub repeat_days: RepeatDays,
    pub repeat_start_time: Option<DateTime<Utc>>,
    pub repeat_end_time: Option<DateTime<Utc>>,
}

impl TodoDraft {
    /// A draft with only the required fields set.
    pub fn new(title: impl Into<String>, due_date: NaiveDate) -> Self {
        Self {
            todo_type: TodoType::default(),
            title: title.into(),
            description: String::new(),
            due_date,
            start_time: None,
            end_time: None,
            completed: false,
            notify_time: None,
            delivered: false,
            repeat_type: RepeatType::default(),
            repeat_frequency: 1,
            repeat_days: RepeatDays::empty(),
            repeat_start_time: None,
            repeat_end_time: None,
        }
    }

    pub fn into_todo(self, id: i64, created_at: DateTime<Utc>) -> Todo {
        Todo {
            id,
            todo_type: self.todo_type,
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            start_time: self.start_time,
            end_time: self.end_time,
            completed: self.completed,
            created_at,
            notify_time: self.notify_time,
            delivered: self.delivered,
            repeat_type: self.repeat_type,
            repeat_frequency: self.repeat_frequency,
            repeat_days: self.repeat_days,
            repeat_start_time: self.repeat_start_time,
            repeat_end_time: self.repeat_end_time,
        }
    }
}

impl Todo {
    /// Whether a notification poll at `threshold` should surface this todo.
    pub fn is_due(&self, threshold: DateTime<Utc>) -> bool {
        !self.delivered && self.notify_time.is_some_and(|at| at <= threshold)
    }
}
