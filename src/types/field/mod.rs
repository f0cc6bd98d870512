//! Field converters between wire payloads and typed attributes.
//!
//! A payload is the JSON object Discord sends (or expects) for an entity,
//! keyed by the vendor's wire field names. The parsers here pull one key out
//! of a payload and validate it; the putters write one attribute back.
//!
//! Parsers treat an absent key and an explicit `null` the same way: the
//! attribute's default. Whether an absent key should leave the live attribute
//! untouched is decided one layer up, by the cache's field table.

mod error;

pub use self::error::{FieldError, FieldErrorType};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::types::id::Id;

/// A JSON object exchanged with the API.
pub type Payload = Map<String, Value>;

/// Return the value under `key` unless it is absent or `null`.
fn present<'a>(data: &'a Payload, key: &str) -> Option<&'a Value> {
    data.get(key).filter(|value| !value.is_null())
}

/// Whether any of `keys` is in the payload, `null` included.
pub fn contains_any(data: &Payload, keys: &[&str]) -> bool {
    keys.iter().any(|key| data.contains_key(*key))
}

fn check_length(key: &'static str, value: &str, max: usize) -> Result<(), FieldError> {
    let len = value.chars().count();
    if len > max {
        return Err(FieldError::length(key, max, len));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Parse a single identifier value, given as a decimal string or an integer.
pub fn parse_id_value<T>(value: &Value, key: &'static str) -> Result<Id<T>, FieldError> {
    match value {
        Value::String(raw) => raw.parse::<Id<T>>().map_err(|source| {
            let numeric = !raw.is_empty() && raw.bytes().all(|byte| byte.is_ascii_digit());
            if numeric || raw.starts_with('-') {
                FieldError::range(key).with_source(source)
            } else {
                FieldError::type_mismatch(key, "a snowflake").with_source(source)
            }
        }),
        Value::Number(number) => match number.as_u64() {
            Some(raw) => Id::new_checked(raw).ok_or(FieldError::range(key)),
            None if number.is_i64() => Err(FieldError::range(key)),
            None => Err(FieldError::type_mismatch(key, "a snowflake")),
        },
        _ => Err(FieldError::type_mismatch(key, "a snowflake")),
    }
}

/// Parse an optional identifier.
pub fn parse_id<T>(data: &Payload, key: &'static str) -> Result<Option<Id<T>>, FieldError> {
    present(data, key)
        .map(|value| parse_id_value(value, key))
        .transpose()
}

/// Parse an array of identifiers into a sorted, deduplicated list.
pub fn parse_id_array<T>(data: &Payload, key: &'static str) -> Result<Vec<Id<T>>, FieldError> {
    let mut ids = parse_array(data, key)?
        .iter()
        .map(|value| parse_id_value(value, key))
        .collect::<Result<Vec<Id<T>>, _>>()?;

    ids.sort_unstable();
    ids.dedup();

    Ok(ids)
}

/// Parse an array of nested objects, keeping only their `id` keys.
///
/// The result is sorted and deduplicated.
pub fn parse_nested_ids<T>(data: &Payload, key: &'static str) -> Result<Vec<Id<T>>, FieldError> {
    let mut ids = Vec::new();

    for value in parse_array(data, key)? {
        let object = value
            .as_object()
            .ok_or(FieldError::type_mismatch(key, "an array of objects"))?;
        let id = parse_id(object, "id")?.ok_or(FieldError::missing("id"))?;
        ids.push(id);
    }

    ids.sort_unstable();
    ids.dedup();

    Ok(ids)
}

/// Write an optional identifier as a string, or `null` when defaults are
/// requested.
pub fn put_id<T>(data: &mut Payload, key: &str, id: Option<Id<T>>, defaults: bool) {
    match id {
        Some(id) => {
            data.insert(key.to_owned(), Value::String(id.to_string()));
        }
        None if defaults => {
            data.insert(key.to_owned(), Value::Null);
        }
        None => {}
    }
}

/// Write a list of identifiers. Always emitted, empty or not.
pub fn put_id_array<T>(data: &mut Payload, key: &str, ids: &[Id<T>]) {
    let values = ids
        .iter()
        .map(|id| Value::String(id.to_string()))
        .collect();

    data.insert(key.to_owned(), Value::Array(values));
}

/// Write a list of identifiers as `[{"id": ...}]` objects.
pub fn put_nested_ids<T>(data: &mut Payload, key: &str, ids: &[Id<T>]) {
    let values = ids
        .iter()
        .map(|id| {
            let mut object = Payload::new();
            object.insert("id".to_owned(), Value::String(id.to_string()));
            Value::Object(object)
        })
        .collect();

    data.insert(key.to_owned(), Value::Array(values));
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

/// Parse a boolean.
pub fn parse_bool(data: &Payload, key: &'static str, default: bool) -> Result<bool, FieldError> {
    match present(data, key) {
        None => Ok(default),
        Some(value) => value
            .as_bool()
            .ok_or(FieldError::type_mismatch(key, "a boolean")),
    }
}

/// Parse a string, defaulting to the empty string.
pub fn parse_str(data: &Payload, key: &'static str, max: usize) -> Result<String, FieldError> {
    Ok(parse_optional_str(data, key, max)?.unwrap_or_default())
}

/// Parse an optional string. An empty string is treated as absent.
pub fn parse_optional_str(
    data: &Payload,
    key: &'static str,
    max: usize,
) -> Result<Option<String>, FieldError> {
    let Some(value) = present(data, key) else {
        return Ok(None);
    };

    let value = value
        .as_str()
        .ok_or(FieldError::type_mismatch(key, "a string"))?;
    check_length(key, value, max)?;

    if value.is_empty() {
        Ok(None)
    } else {
        Ok(Some(value.to_owned()))
    }
}

/// Parse an integer into any numeric type, failing if it doesn't fit.
pub fn parse_integer<N>(data: &Payload, key: &'static str, default: N) -> Result<N, FieldError>
where
    N: TryFrom<u64> + TryFrom<i64>,
{
    let Some(value) = present(data, key) else {
        return Ok(default);
    };

    let Value::Number(number) = value else {
        return Err(FieldError::type_mismatch(key, "an integer"));
    };

    if let Some(unsigned) = number.as_u64() {
        <N as TryFrom<u64>>::try_from(unsigned).map_err(|_| FieldError::range(key))
    } else if let Some(signed) = number.as_i64() {
        <N as TryFrom<i64>>::try_from(signed).map_err(|_| FieldError::range(key))
    } else {
        Err(FieldError::type_mismatch(key, "an integer"))
    }
}

/// Parse an integer constrained to an inclusive range.
pub fn parse_bounded<N>(
    data: &Payload,
    key: &'static str,
    default: N,
    min: N,
    max: N,
) -> Result<N, FieldError>
where
    N: TryFrom<u64> + TryFrom<i64> + PartialOrd,
{
    let value = parse_integer(data, key, default)?;
    if value < min || value > max {
        return Err(FieldError::range(key));
    }

    Ok(value)
}

/// Parse a wire-integer enum. Unknown values map to the enum's fallback
/// variant through its `From<u8>` impl.
pub fn parse_preinstanced<E>(data: &Payload, key: &'static str, default: E) -> Result<E, FieldError>
where
    E: From<u8>,
{
    match present(data, key) {
        None => Ok(default),
        Some(_) => parse_integer::<u8>(data, key, 0).map(E::from),
    }
}

/// Write a value unless it equals its default and defaults aren't requested.
pub fn put_with_default<V>(data: &mut Payload, key: &str, value: V, default: V, defaults: bool)
where
    V: PartialEq + Into<Value>,
{
    if defaults || value != default {
        data.insert(key.to_owned(), value.into());
    }
}

/// Write an optional string, as `null` when absent and defaults are
/// requested.
pub fn put_optional_str(data: &mut Payload, key: &str, value: Option<&str>, defaults: bool) {
    match value {
        Some(value) => {
            data.insert(key.to_owned(), Value::String(value.to_owned()));
        }
        None if defaults => {
            data.insert(key.to_owned(), Value::Null);
        }
        None => {}
    }
}

// ---------------------------------------------------------------------------
// Nested values
// ---------------------------------------------------------------------------

/// Borrow an array, defaulting to empty.
pub fn parse_array<'a>(data: &'a Payload, key: &'static str) -> Result<&'a [Value], FieldError> {
    match present(data, key) {
        None => Ok(&[]),
        Some(Value::Array(values)) => Ok(values),
        Some(_) => Err(FieldError::type_mismatch(key, "an array")),
    }
}

/// Borrow a nested object.
pub fn parse_object<'a>(
    data: &'a Payload,
    key: &'static str,
) -> Result<Option<&'a Payload>, FieldError> {
    match present(data, key) {
        None => Ok(None),
        Some(Value::Object(object)) => Ok(Some(object)),
        Some(_) => Err(FieldError::type_mismatch(key, "an object")),
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Parse an optional ISO 8601 timestamp.
pub fn parse_timestamp(
    data: &Payload,
    key: &'static str,
) -> Result<Option<DateTime<Utc>>, FieldError> {
    let Some(value) = present(data, key) else {
        return Ok(None);
    };

    let raw = value
        .as_str()
        .ok_or(FieldError::type_mismatch(key, "an iso 8601 timestamp"))?;

    DateTime::parse_from_rfc3339(raw)
        .map(|datetime| Some(datetime.with_timezone(&Utc)))
        .map_err(|source| FieldError::format(key, source))
}

/// Format a timestamp the way Discord does, with microseconds and a `+00:00`
/// offset.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Write an optional timestamp.
pub fn put_timestamp(data: &mut Payload, key: &str, value: Option<&DateTime<Utc>>, defaults: bool) {
    match value {
        Some(value) => {
            data.insert(key.to_owned(), Value::String(format_timestamp(value)));
        }
        None if defaults => {
            data.insert(key.to_owned(), Value::Null);
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        id::marker::{ChannelMarker, UserMarker},
        util::test_payload as payload,
    };
    use serde_json::json;

    #[test]
    fn parse_id_accepts_strings_and_integers() {
        let data = payload(json!({"a": "202303150003", "b": 12, "c": null}));

        assert_eq!(
            parse_id::<ChannelMarker>(&data, "a").unwrap(),
            Some(Id::new(202_303_150_003))
        );
        assert_eq!(parse_id::<ChannelMarker>(&data, "b").unwrap(), Some(Id::new(12)));
        assert_eq!(parse_id::<ChannelMarker>(&data, "c").unwrap(), None);
        assert_eq!(parse_id::<ChannelMarker>(&data, "missing").unwrap(), None);
    }

    #[test]
    fn parse_id_rejects_malformed_values() {
        let data = payload(json!({
            "negative": -1,
            "zero": "0",
            "overflow": "18446744073709551616",
            "word": "owo",
            "float": 12.6,
            "bool": true,
        }));

        let kind = |key| *parse_id::<UserMarker>(&data, key).unwrap_err().kind();
        assert_eq!(kind("negative"), FieldErrorType::Range);
        assert_eq!(kind("zero"), FieldErrorType::Range);
        assert_eq!(kind("overflow"), FieldErrorType::Range);
        assert_eq!(kind("word"), FieldErrorType::Type { expected: "a snowflake" });
        assert_eq!(kind("float"), FieldErrorType::Type { expected: "a snowflake" });
        assert_eq!(kind("bool"), FieldErrorType::Type { expected: "a snowflake" });
    }

    #[test]
    fn parse_id_array_sorts_and_dedups() {
        let data = payload(json!({"ids": ["3", "1", "3", 2]}));

        assert_eq!(
            parse_id_array::<ChannelMarker>(&data, "ids").unwrap(),
            vec![Id::new(1), Id::new(2), Id::new(3)]
        );
        assert!(parse_id_array::<ChannelMarker>(&data, "missing")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn parse_nested_ids_reads_objects() {
        let data = payload(json!({"recipients": [{"id": "9", "username": "a"}, {"id": "4"}]}));

        assert_eq!(
            parse_nested_ids::<UserMarker>(&data, "recipients").unwrap(),
            vec![Id::new(4), Id::new(9)]
        );

        let bad = payload(json!({"recipients": ["4"]}));
        assert!(parse_nested_ids::<UserMarker>(&bad, "recipients").is_err());
    }

    #[test]
    fn parse_str_checks_length() {
        let data = payload(json!({"name": "hello", "empty": ""}));

        assert_eq!(parse_str(&data, "name", 10).unwrap(), "hello");
        assert_eq!(
            *parse_str(&data, "name", 4).unwrap_err().kind(),
            FieldErrorType::Length { max: 4, len: 5 }
        );
        assert_eq!(parse_optional_str(&data, "empty", 10).unwrap(), None);
        assert_eq!(parse_str(&data, "missing", 10).unwrap(), "");
    }

    #[test]
    fn parse_integer_checks_range() {
        let data = payload(json!({"small": 300, "negative": -2, "text": "1"}));

        assert_eq!(parse_integer::<u16>(&data, "small", 0).unwrap(), 300);
        assert_eq!(
            *parse_integer::<u8>(&data, "small", 0).unwrap_err().kind(),
            FieldErrorType::Range
        );
        assert_eq!(parse_integer::<i32>(&data, "negative", 0).unwrap(), -2);
        assert!(parse_integer::<i32>(&data, "text", 0).is_err());
        assert_eq!(parse_integer::<i32>(&data, "missing", 7).unwrap(), 7);
        assert_eq!(
            *parse_bounded::<u32>(&data, "small", 0, 0, 100)
                .unwrap_err()
                .kind(),
            FieldErrorType::Range
        );
    }

    #[test]
    fn put_with_default_respects_defaults() {
        let mut data = Payload::new();
        put_with_default(&mut data, "nsfw", false, false, false);
        assert!(data.is_empty());

        put_with_default(&mut data, "nsfw", false, false, true);
        assert_eq!(data.get("nsfw"), Some(&json!(false)));

        let mut data = Payload::new();
        put_with_default(&mut data, "nsfw", true, false, false);
        assert_eq!(data.get("nsfw"), Some(&json!(true)));
    }

    #[test]
    fn put_id_emits_null_only_with_defaults() {
        let mut data = Payload::new();
        put_id::<ChannelMarker>(&mut data, "parent_id", None, false);
        assert!(data.is_empty());

        put_id::<ChannelMarker>(&mut data, "parent_id", None, true);
        assert_eq!(data.get("parent_id"), Some(&Value::Null));

        put_id(&mut data, "parent_id", Some(Id::<ChannelMarker>::new(5)), false);
        assert_eq!(data.get("parent_id"), Some(&json!("5")));
    }

    #[test]
    fn timestamps_round_trip() {
        let data = payload(json!({"at": "2021-08-10T11:16:37.020000+00:00", "bad": "yesterday"}));

        let parsed = parse_timestamp(&data, "at").unwrap().unwrap();
        assert_eq!(parsed.timestamp(), 1_628_594_197);
        assert_eq!(format_timestamp(&parsed), "2021-08-10T11:16:37.020000+00:00");
        assert_eq!(
            *parse_timestamp(&data, "bad").unwrap_err().kind(),
            FieldErrorType::Format
        );
    }
}
