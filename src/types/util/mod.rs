//! Small helpers shared by the entity types and the cache.

use serde_json::Value;

/// Extension trait on [`serde_json::Value`] that provides
/// `.deserialize_into::<T>()`, used to read typed prior values back out of a
/// change-set.
///
/// # Example
///
/// ```
/// use discord_cache::types::util::ValueExt;
/// use serde_json::Value;
///
/// let v: Value = serde_json::json!(42u64);
/// let n: u64 = v.deserialize_into().unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait ValueExt: Sized {
    /// Consume this value and attempt to deserialize it into `T`.
    fn deserialize_into<T: serde::de::DeserializeOwned>(self) -> Result<T, serde_json::Error>;
}

impl ValueExt for Value {
    fn deserialize_into<T: serde::de::DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self)
    }
}

/// Build a payload from a `json!` literal; panics on non-objects.
#[cfg(test)]
pub(crate) fn test_payload(value: Value) -> crate::types::field::Payload {
    match value {
        Value::Object(payload) => payload,
        _ => panic!("test payload must be a JSON object"),
    }
}

#[cfg(test)]
mod tests {
    use super::{test_payload, ValueExt};
    use serde_json::json;

    #[test]
    fn deserialize_into_reads_typed_values() {
        let flag: bool = json!(false).deserialize_into().unwrap();
        assert!(!flag);

        let ids: Vec<String> = json!(["1", "2"]).deserialize_into().unwrap();
        assert_eq!(ids, vec!["1".to_owned(), "2".to_owned()]);
    }

    #[test]
    fn test_payload_unwraps_objects() {
        assert_eq!(test_payload(json!({"id": "1"})).get("id"), Some(&json!("1")));
    }

    #[test]
    #[should_panic(expected = "must be a JSON object")]
    fn test_payload_rejects_non_objects() {
        test_payload(json!([1]));
    }
}
