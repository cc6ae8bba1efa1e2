use serde_json::{Map, Value};

use super::TimeEntryDraft;
use crate::error::ValidationError;
use crate::routes::fields::{self, FieldReader};

/// Decodes a create/replace body. Whether `todo` points at an existing todo
/// is checked by the store, not here.
pub fn decode_time_entry(body: &Map<String, Value>) -> Result<TimeEntryDraft, ValidationError> {
    let mut reader = FieldReader::new(body);

    let todo = reader.required("todo", todo_reference);
    let week_start_date = reader.required("week_start_date", fields::date);
    let minutes_spent = reader.required(
        "minutes_spent",
        fields::bounded::<i32>(i32::MIN.into(), i32::MAX.into()),
    );

    let (Some(todo), Some(week_start_date), Some(minutes_spent)) =
        (todo, week_start_date, minutes_spent)
    else {
        return Err(reader.into_errors());
    };

    Ok(TimeEntryDraft {
        todo,
        week_start_date,
        minutes_spent,
    })
}

fn todo_reference(value: &Value) -> Result<i64, String> {
    match value {
        Value::Number(_) | Value::String(_) => fields::integer(value)
            .map_err(|_| format!("Incorrect type. Expected pk value, received {}.", kind(value))),
        other => Err(format!(
            "Incorrect type. Expected pk value, received {}.",
            kind(other)
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "str",
        Value::Number(_) => "float",
        Value::Bool(_) => "bool",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
        Value::Null => "NoneType",
    }
}
