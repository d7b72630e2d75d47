//! Field readers applied once at the document boundary.
//!
//! Stored and imported documents are hand-edited often enough that string slots
//! carry numbers, booleans or `null`. Everything is normalised to the typed
//! shape here so computation sites never see a missing or mistyped field.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub(crate) fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(other) => other.to_string(),
    })
}

pub(crate) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(flag)) => flag,
        Some(Value::String(text)) => matches!(text.trim(), "true" | "1" | "yes"),
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    })
}

/// A list slot that holds anything but an array reads as empty. Items that are
/// not objects are dropped; an object item that still cannot be read becomes
/// the default row.
pub(crate) fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let Some(Value::Array(items)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .map(|item| serde_json::from_value(item).unwrap_or_default())
        .collect())
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Row {
        #[serde(default)]
        id: String,
        #[serde(default)]
        count: u32,
    }

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "super::string")]
        text: String,
        #[serde(default, deserialize_with = "super::flag")]
        flag: bool,
        #[serde(default, deserialize_with = "super::list")]
        rows: Vec<Row>,
    }

    fn read(json: &str) -> Sample {
        match serde_json::from_str(json) {
            Ok(value) => value,
            Err(err) => panic!("sample should deserialize: {err}"),
        }
    }

    #[test]
    fn numbers_and_null_become_strings() {
        assert_eq!(read(r#"{"text": 100000}"#).text, "100000");
        assert_eq!(read(r#"{"text": 12.5}"#).text, "12.5");
        assert_eq!(read(r#"{"text": null}"#).text, "");
        assert_eq!(read("{}").text, "");
    }

    #[test]
    fn flags_and_lists_default_when_missing_or_null() {
        let empty = read(r#"{"flag": null, "rows": null}"#);
        assert!(!empty.flag);
        assert!(empty.rows.is_empty());

        let set = read(r#"{"flag": "true", "rows": [{"id": "a", "count": 2}]}"#);
        assert!(set.flag);
        assert_eq!(set.rows.len(), 1);
        assert_eq!(set.rows[0].id, "a");
        assert_eq!(set.rows[0].count, 2);
    }

    #[test]
    fn mistyped_list_slots_read_as_empty() {
        assert!(read(r#"{"rows": "n/a"}"#).rows.is_empty());
        assert!(read(r#"{"rows": {}}"#).rows.is_empty());
        assert!(read(r#"{"rows": 3}"#).rows.is_empty());
    }

    #[test]
    fn non_object_items_are_dropped_and_unreadable_objects_default() {
        let sample = read(r#"{"rows": [null, 7, {"id": "keep"}, {"count": "many"}]}"#);
        let ids: Vec<&str> = sample.rows.iter().map(|row| row.id.as_str()).collect();
        assert_eq!(ids, ["keep", ""]);
        assert_eq!(sample.rows[0].count, 0);
        assert_eq!(sample.rows[1], Row::default());
    }
}
