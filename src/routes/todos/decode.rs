use serde_json::{Map, Value};

use super::{RepeatDays, RepeatType, TodoDraft, TodoType};
use crate::error::ValidationError;
use crate::routes::fields::{self, FieldReader};

pub const TITLE_MAX_CHARS: usize = 200;
pub const REPEAT_FREQUENCY_MAX: i64 = i16::MAX as i64;

/// Decodes a create/replace body. `id` and `created_at` are ignored if sent;
/// omitted optional fields take their defaults.
pub fn decode_todo(body: &Map<String, Value>) -> Result<TodoDraft, ValidationError> {
    let mut reader = FieldReader::new(body);

    let todo_type = reader.with_default(
        "todo_type",
        TodoType::default(),
        fields::choice(TodoType::from_code),
    );
    let title = reader.required("title", fields::text(TITLE_MAX_CHARS));
    let description = reader.with_default("description", String::new(), fields::string);
    let due_date = reader.required("due_date", fields::date);
    let start_time = reader.nullable("start_time", fields::time);
    let end_time = reader.nullable("end_time", fields::time);
    let completed = reader.with_default("completed", false, fields::boolean);
    let notify_time = reader.nullable("notify_time", fields::timestamp);
    let delivered = reader.with_default("delivered", false, fields::boolean);
    let repeat_type = reader.with_default(
        "repeat_type",
        RepeatType::default(),
        fields::choice(RepeatType::from_code),
    );
    let repeat_frequency = reader.with_default(
        "repeat_frequency",
        1,
        fields::bounded::<u16>(1, REPEAT_FREQUENCY_MAX),
    );
    let repeat_days = reader.with_default("repeat_days", RepeatDays::empty(), parse_repeat_days);
    let repeat_start_time = reader.nullable("repeat_start_time", fields::timestamp);
    let repeat_end_time = reader.nullable("repeat_end_time", fields::timestamp);

    let (
        Some(todo_type),
        Some(title),
        Some(description),
        Some(due_date),
        Some(start_time),
        Some(end_time),
        Some(completed),
        Some(notify_time),
        Some(delivered),
        Some(repeat_type),
        Some(repeat_frequency),
        Some(repeat_days),
        Some(repeat_start_time),
        Some(repeat_end_time),
    ) = (
        todo_type,
        title,
        description,
        due_date,
        start_time,
        end_time,
        completed,
        notify_time,
        delivered,
        repeat_type,
        repeat_frequency,
        repeat_days,
        repeat_start_time,
        repeat_end_time,
    )
    else {
        return Err(reader.into_errors());
    };

    Ok(TodoDraft {
        todo_type,
        title,
        description,
        due_date,
        start_time,
        end_time,
        completed,
        notify_time,
        delivered,
        repeat_type,
        repeat_frequency,
        repeat_days,
        repeat_start_time,
        repeat_end_time,
    })
}

fn parse_repeat_days(value: &Value) -> Result<RepeatDays, String> {
    let bits = fields::bounded::<u8>(0, i64::from(RepeatDays::ALL))(value)?;
    RepeatDays::from_bits(bits).ok_or_else(|| {
        format!(
            "Ensure this value is less than or equal to {}.",
            RepeatDays::ALL
        )
    })
}
