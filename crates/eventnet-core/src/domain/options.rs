//! Typed accessors over an agent's JSON options object.

use eventnet_store::Payload;
use serde_json::Value;

use super::error::ConfigurationError;

/// Interpret a boolean-like option value.
///
/// `true`, `false`, `"true"` and `"false"` are boolean-like; anything else
/// (including `null`) is not.
pub fn boolify(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

/// Read a boolean-like option. Absent or `null` yields `None`.
pub fn bool_option(options: &Payload, key: &str) -> Result<Option<bool>, ConfigurationError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => boolify(value)
            .map(Some)
            .ok_or_else(|| ConfigurationError::NotBoolean {
                key: key.to_string(),
                found: value.to_string(),
            }),
    }
}

/// Read a string option, falling back to `default` when absent or `null`.
pub fn string_option(
    options: &Payload,
    key: &str,
    default: &str,
) -> Result<String, ConfigurationError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(default.to_string()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(ConfigurationError::InvalidOption {
            key: key.to_string(),
            reason: format!("must be a string, got {other}"),
        }),
    }
}

/// Read a non-negative integer option. Numeric strings are accepted.
pub fn usize_option(
    options: &Payload,
    key: &str,
    default: usize,
) -> Result<usize, ConfigurationError> {
    let invalid = |found: &Value| ConfigurationError::InvalidOption {
        key: key.to_string(),
        reason: format!("must be a non-negative integer, got {found}"),
    };
    let value = match options.get(key) {
        None | Some(Value::Null) => return Ok(default),
        Some(value) => value,
    };
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize).ok_or_else(|| invalid(value)),
        Value::String(s) => s.trim().parse().map_err(|_| invalid(value)),
        other => Err(invalid(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn boolify_accepts_strings_and_bools() {
        assert_eq!(boolify(&json!(true)), Some(true));
        assert_eq!(boolify(&json!("false")), Some(false));
        assert_eq!(boolify(&json!("yes")), None);
        assert_eq!(boolify(&json!(1)), None);
        assert_eq!(boolify(&Value::Null), None);
    }

    #[test]
    fn bool_option_reports_bad_values() {
        let options = opts(json!({"a": "true", "b": null, "c": "sometimes"}));
        assert_eq!(bool_option(&options, "a").unwrap(), Some(true));
        assert_eq!(bool_option(&options, "b").unwrap(), None);
        assert_eq!(bool_option(&options, "missing").unwrap(), None);
        assert!(matches!(
            bool_option(&options, "c"),
            Err(ConfigurationError::NotBoolean { .. })
        ));
    }

    #[test]
    fn usize_option_parses_numbers_and_numeric_strings() {
        let options = opts(json!({"n": 5, "s": " 12 ", "neg": -1, "word": "many"}));
        assert_eq!(usize_option(&options, "n", 0).unwrap(), 5);
        assert_eq!(usize_option(&options, "s", 0).unwrap(), 12);
        assert_eq!(usize_option(&options, "missing", 100).unwrap(), 100);
        assert!(usize_option(&options, "neg", 0).is_err());
        assert!(usize_option(&options, "word", 0).is_err());
    }

    #[test]
    fn string_option_rejects_non_strings() {
        let options = opts(json!({"s": "x", "n": 3}));
        assert_eq!(string_option(&options, "s", "d").unwrap(), "x");
        assert_eq!(string_option(&options, "missing", "d").unwrap(), "d");
        assert!(string_option(&options, "n", "d").is_err());
    }
}
