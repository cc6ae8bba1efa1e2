//! Field-by-field decoding of JSON request bodies.
//!
//! Each parser returns the human readable reason on failure; [`FieldReader`]
//! collects those reasons per field so a single response reports every
//! problem in the body.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Value};

use crate::error::ValidationError;

pub const REQUIRED: &str = "This field is required.";
pub const NOT_NULL: &str = "This field may not be null.";
pub const NOT_BLANK: &str = "This field may not be blank.";

/// Parses a request body that must be a JSON object.
pub fn parse_object(body: &[u8]) -> Result<Map<String, Value>, ValidationError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        ValidationError::single(ValidationError::NON_FIELD, format!("JSON parse error - {}", e))
    })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ValidationError::single(
            ValidationError::NON_FIELD,
            format!(
                "Invalid data. Expected a dictionary, but got {}.",
                json_kind(&other)
            ),
        )),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Reads fields out of a body object, recording a reason for every field that
/// fails. A getter returns `None` only after recording an error.
pub struct FieldReader<'a> {
    body: &'a Map<String, Value>,
    errors: ValidationError,
}

impl<'a> FieldReader<'a> {
    pub fn new(body: &'a Map<String, Value>) -> Self {
        Self {
            body,
            errors: ValidationError::new(),
        }
    }

    fn parse_present<T>(
        &mut self,
        name: &str,
        value: &Value,
        parse: impl FnOnce(&Value) -> Result<T, String>,
    ) -> Option<T> {
        match parse(value) {
            Ok(v) => Some(v),
            Err(reason) => {
                self.errors.add(name, reason);
                None
            }
        }
    }

    /// Field must be present and non-null.
    pub fn required<T>(
        &mut self,
        name: &str,
        parse: impl FnOnce(&Value) -> Result<T, String>,
    ) -> Option<T> {
        match self.body.get(name) {
            None => {
                self.errors.add(name, REQUIRED);
                None
            }
            Some(Value::Null) => {
                self.errors.add(name, NOT_NULL);
                None
            }
            Some(value) => self.parse_present(name, value, parse),
        }
    }

    /// Field may be omitted (taking `default`) but not null.
    pub fn with_default<T>(
        &mut self,
        name: &str,
        default: T,
        parse: impl FnOnce(&Value) -> Result<T, String>,
    ) -> Option<T> {
        match self.body.get(name) {
            None => Some(default),
            Some(Value::Null) => {
                self.errors.add(name, NOT_NULL);
                None
            }
            Some(value) => self.parse_present(name, value, parse),
        }
    }

    /// Field may be omitted or null, both meaning "no value".
    pub fn nullable<T>(
        &mut self,
        name: &str,
        parse: impl FnOnce(&Value) -> Result<T, String>,
    ) -> Option<Option<T>> {
        match self.body.get(name) {
            None | Some(Value::Null) => Some(None),
            Some(value) => self.parse_present(name, value, parse).map(Some),
        }
    }

    pub fn into_errors(self) -> ValidationError {
        self.errors
    }
}

// PARSERS

pub fn string(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.trim().to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err("Not a valid string.".to_string()),
    }
}

/// Non-blank text of at most `max_chars` characters.
pub fn text(max_chars: usize) -> impl Fn(&Value) -> Result<String, String> {
    move |value: &Value| {
        let s = string(value)?;
        if s.is_empty() {
            return Err(NOT_BLANK.to_string());
        }
        if s.chars().count() > max_chars {
            return Err(format!(
                "Ensure this field has no more than {} characters.",
                max_chars
            ));
        }
        Ok(s)
    }
}

pub fn boolean(value: &Value) -> Result<bool, String> {
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "true" | "True" | "TRUE" | "1" | "yes" | "on" => Some(true),
            "false" | "False" | "FALSE" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed.ok_or_else(|| "Must be a valid boolean.".to_string())
}

pub fn integer(value: &Value) -> Result<i64, String> {
    const INVALID: &str = "A valid integer is required.";
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
                    _ => Err(INVALID.to_string()),
                }
            }
        }
        Value::String(s) => s.trim().parse().map_err(|_| INVALID.to_string()),
        _ => Err(INVALID.to_string()),
    }
}

/// Integer within `min..=max`, converted to the field's storage type.
pub fn bounded<T: TryFrom<i64>>(min: i64, max: i64) -> impl Fn(&Value) -> Result<T, String> {
    move |value: &Value| {
        let i = integer(value)?;
        if i < min {
            return Err(format!(
                "Ensure this value is greater than or equal to {}.",
                min
            ));
        }
        if i > max {
            return Err(format!("Ensure this value is less than or equal to {}.", max));
        }
        T::try_from(i).map_err(|_| "A valid integer is required.".to_string())
    }
}

/// One of a fixed set of codes, mapped through `lookup`.
pub fn choice<T>(lookup: fn(&str) -> Option<T>) -> impl Fn(&Value) -> Result<T, String> {
    move |value: &Value| {
        let code = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        lookup(&code).ok_or_else(|| format!("\"{}\" is not a valid choice.", code))
    }
}

pub fn date(value: &Value) -> Result<NaiveDate, String> {
    value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        .ok_or_else(|| {
            "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.".to_string()
        })
}

pub fn time(value: &Value) -> Result<NaiveTime, String> {
    value
        .as_str()
        .and_then(|s| {
            let s = s.trim();
            NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .ok()
        })
        .ok_or_else(|| {
            "Time has wrong format. Use one of these formats instead: hh:mm[:ss[.uuuuuu]]."
                .to_string()
        })
}

/// ISO 8601 timestamp with `T` or space between date and time, optional
/// seconds and an optional `Z` or `+HH:MM` offset. No offset means UTC.
pub fn timestamp(value: &Value) -> Result<DateTime<Utc>, String> {
    value
        .as_str()
        .and_then(|s| parse_timestamp(s.trim()))
        .ok_or_else(|| {
            "Datetime has wrong format. Use one of these formats instead: YYYY-MM-DDThh:mm[:ss[.uuuuuu]][+HH:MM|-HH:MM|Z]."
                .to_string()
        })
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let mut s = s.to_string();
    if s.as_bytes().get(10) == Some(&b' ') {
        s.replace_range(10..11, "T");
    }
    if let Some(utc) = s.strip_suffix(|c| c == 'Z' || c == 'z') {
        s = format!("{}+00:00", utc);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M"))
        .map(|naive| naive.and_utc())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_object_rejects_non_objects() {
        let err = parse_object(b"[1, 2]").unwrap_err();
        assert_eq!(
            err.reasons(ValidationError::NON_FIELD).unwrap(),
            ["Invalid data. Expected a dictionary, but got list."]
        );

        let err = parse_object(b"{not json").unwrap_err();
        assert!(err.reasons(ValidationError::NON_FIELD).unwrap()[0]
            .starts_with("JSON parse error - "));
    }

    #[test]
    fn test_reader_distinguishes_missing_null_and_invalid() {
        let body = json!({"a": null, "b": "x"});
        let body = body.as_object().unwrap();
        let mut reader = FieldReader::new(body);

        assert_eq!(reader.required("missing", integer), None);
        assert_eq!(reader.required("a", integer), None);
        assert_eq!(reader.required("b", integer), None);
        assert_eq!(reader.with_default("c", 4, integer), Some(4));
        assert_eq!(reader.nullable("a", integer), Some(None));

        let errors = reader.into_errors();
        assert_eq!(errors.reasons("missing").unwrap(), [REQUIRED]);
        assert_eq!(errors.reasons("a").unwrap(), [NOT_NULL]);
        assert_eq!(errors.reasons("b").unwrap(), ["A valid integer is required."]);
        assert!(errors.reasons("c").is_none());
    }

    #[test]
    fn test_integer_accepts_numeric_strings_and_whole_floats() {
        assert_eq!(integer(&json!(30)), Ok(30));
        assert_eq!(integer(&json!("30")), Ok(30));
        assert_eq!(integer(&json!(30.0)), Ok(30));
        assert!(integer(&json!(30.5)).is_err());
        assert!(integer(&json!(true)).is_err());
    }

    #[test]
    fn test_bounded_reports_limits() {
        let parse = bounded::<i64>(1, 10);
        assert_eq!(
            parse(&json!(0)),
            Err("Ensure this value is greater than or equal to 1.".to_string())
        );
        assert_eq!(
            parse(&json!(11)),
            Err("Ensure this value is less than or equal to 10.".to_string())
        );
        assert_eq!(parse(&json!(5)), Ok(5));
    }

    #[test]
    fn test_text_trims_and_checks_length() {
        let parse = text(5);
        assert_eq!(parse(&json!("  hey ")), Ok("hey".to_string()));
        assert_eq!(parse(&json!("   ")), Err(NOT_BLANK.to_string()));
        assert!(parse(&json!("toolong")).is_err());
        assert!(parse(&json!(["x"])).is_err());
    }

    #[test]
    fn test_temporal_formats() {
        assert_eq!(
            date(&json!("2024-05-01")),
            Ok(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
        );
        assert!(date(&json!("05/01/2024")).is_err());
        assert!(date(&json!("2024-02-30")).is_err());

        assert_eq!(
            time(&json!("09:30")),
            Ok(NaiveTime::from_hms_opt(9, 30, 0).unwrap())
        );
        assert_eq!(
            time(&json!("09:30:15")),
            Ok(NaiveTime::from_hms_opt(9, 30, 15).unwrap())
        );
        assert!(time(&json!("25:00")).is_err());

        let expected = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            .and_utc();
        assert_eq!(timestamp(&json!("2024-05-01T12:00:00+02:00")), Ok(expected));
        assert_eq!(timestamp(&json!("2024-05-01T10:00:00Z")), Ok(expected));
        assert_eq!(timestamp(&json!("2024-05-01T10:00")), Ok(expected));
        assert_eq!(timestamp(&json!("2024-05-01T10:00Z")), Ok(expected));
        assert_eq!(timestamp(&json!("2024-05-01T12:00+02:00")), Ok(expected));
        assert_eq!(timestamp(&json!("2024-05-01T07:00-03:00")), Ok(expected));
        assert_eq!(timestamp(&json!("2024-05-01 10:00:00Z")), Ok(expected));
        assert_eq!(timestamp(&json!("2024-05-01 12:00:00.000+02:00")), Ok(expected));
        assert_eq!(timestamp(&json!("2024-05-01 10:00")), Ok(expected));
        assert!(timestamp(&json!("2024-05-01T10")).is_err());
        assert!(timestamp(&json!("2024-05-01T10:00+25:00")).is_err());
        assert!(timestamp(&json!("yesterday")).is_err());
    }

    #[test]
    fn test_boolean_variants() {
        assert_eq!(boolean(&json!(true)), Ok(true));
        assert_eq!(boolean(&json!("false")), Ok(false));
        assert_eq!(boolean(&json!(1)), Ok(true));
        assert!(boolean(&json!("maybe")).is_err());
    }
}
