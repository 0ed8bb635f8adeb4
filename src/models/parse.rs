//! String-grammar helpers shared by every `from_params` constructor.

use serde::de::{self, Deserialize, Deserializer};
use serde::Serialize;
use serde_json::Value;

use crate::error::ValidationError;

const TRUTHY: [&str; 4] = ["true", "1", "yes", "on"];

/// Splits on `,`, trims each token and drops empty ones.
pub fn split_list(raw: &str) -> Vec<String> {
    split_on(raw, ',')
}

pub fn split_on(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Comma list that treats an absent or all-blank input as "not supplied".
pub fn optional_list(raw: Option<&str>) -> Option<Vec<String>> {
    let items = split_list(raw?);
    if items.is_empty() { None } else { Some(items) }
}

/// Case-insensitive `true`/`1`/`yes`/`on`; anything else is false.
pub fn parse_flag(raw: Option<&str>, default: bool) -> bool {
    match raw.map(str::trim) {
        None | Some("") => default,
        Some(value) => TRUTHY
            .iter()
            .any(|truthy| value.eq_ignore_ascii_case(truthy)),
    }
}

pub fn parse_u32(field: &'static str, raw: &str) -> Result<u32, ValidationError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ValidationError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

pub fn parse_amount(field: &'static str, raw: &str) -> Result<Option<f64>, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(ValidationError::InvalidNumber {
            field,
            value: trimmed.to_string(),
        }),
    }
}

/// Returns the trimmed value, or `None` when it is absent or blank.
pub fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

/// Serializes a wire struct and strips `null` at every depth.
///
/// Only plain-data types with string keys reach this function, for which
/// serialization is infallible.
pub(crate) fn to_wire<T: Serialize>(value: &T) -> Value {
    let mut wire = serde_json::to_value(value).unwrap_or(Value::Null);
    drop_nulls(&mut wire);
    wire
}

pub fn drop_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, entry| !entry.is_null());
            for entry in map.values_mut() {
                drop_nulls(entry);
            }
        }
        Value::Array(items) => {
            for item in items {
                drop_nulls(item);
            }
        }
        _ => {}
    }
}

/// Deserializes a tool argument that should be a string but may arrive as a
/// number, boolean or list. Lists are joined with `,` so they flow through
/// the same comma-list grammar.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(value) => scalar_text(&value)
            .map_err(|kind| de::Error::custom(format!("expected a string, found {kind}"))),
    }
}

fn scalar_text(value: &Value) -> Result<Option<String>, &'static str> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.clone())),
        Value::Number(number) => Ok(Some(number.to_string())),
        Value::Bool(flag) => Ok(Some(flag.to_string())),
        Value::Array(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::Array(_) | Value::Object(_) => return Err("a nested list"),
                    other => {
                        if let Some(text) = scalar_text(other)? {
                            parts.push(text);
                        }
                    }
                }
            }
            Ok(Some(parts.join(",")))
        }
        Value::Object(_) => Err("an object"),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Wrapped {
        #[serde(default, deserialize_with = "lenient_string")]
        value: Option<String>,
    }

    #[test]
    fn split_list_trims_and_drops_empty_tokens() {
        assert_eq!(split_list(" A, B ,,C ,"), vec!["A", "B", "C"]);
        assert!(split_list(" , ").is_empty());
        assert_eq!(optional_list(Some(" , ")), None);
    }

    #[test]
    fn flags_accept_documented_truthy_spellings() {
        for raw in ["true", "TRUE", "1", "Yes", "on", " On "] {
            assert!(parse_flag(Some(raw), false), "{raw} should be true");
        }
        for raw in ["false", "0", "no", "off", "enabled", "y"] {
            assert!(!parse_flag(Some(raw), true), "{raw} should be false");
        }
        assert!(parse_flag(None, true));
        assert!(!parse_flag(Some(""), false));
    }

    #[test]
    fn amounts_reject_non_numeric_text() {
        assert_eq!(parse_amount("award_amounts", " 1000.5 "), Ok(Some(1000.5)));
        assert_eq!(parse_amount("award_amounts", ""), Ok(None));
        assert!(matches!(
            parse_amount("award_amounts", "lots"),
            Err(ValidationError::InvalidNumber { .. })
        ));
        assert!(parse_amount("award_amounts", "inf").is_err());
    }

    #[test]
    fn drop_nulls_reaches_nested_objects_and_arrays() {
        let mut value = json!({
            "a": null,
            "filters": {"x": null, "y": [{"z": null, "k": 1}]},
            "keep": false
        });
        drop_nulls(&mut value);
        assert_eq!(value, json!({"filters": {"y": [{"k": 1}]}, "keep": false}));
    }

    #[test]
    fn lenient_string_stringifies_scalars_and_lists() {
        let wrapped: Wrapped = serde_json::from_value(json!({"value": 25})).expect("number");
        assert_eq!(wrapped.value.as_deref(), Some("25"));

        let wrapped: Wrapped = serde_json::from_value(json!({"value": true})).expect("bool");
        assert_eq!(wrapped.value.as_deref(), Some("true"));

        let wrapped: Wrapped = serde_json::from_value(json!({"value": ["A", "B"]})).expect("list");
        assert_eq!(wrapped.value.as_deref(), Some("A,B"));

        let wrapped: Wrapped = serde_json::from_value(json!({})).expect("absent");
        assert!(wrapped.value.is_none());

        assert!(serde_json::from_value::<Wrapped>(json!({"value": {"a": 1}})).is_err());
    }
}
