//! `events_order` parsing and validation.
//!
//! Accepted shape:
//!
//! ```text
//! null
//! ["{{date}}", ["{{score}}", "number", true], ["{{author}}"]]
//! ```
//!
//! Each entry is a bare expression or `[expression, type?, descending?]`.
//! Validation collects every problem instead of stopping at the first.

use serde_json::{json, Value};

use eventnet_store::{NewEvent, Payload};

use super::expression::{ExpressionRenderer, INDEX_VAR};
use super::sorter::{sort_tuples, SortTuple};
use super::typed_key::{parse_key_counted, TypedValue, ValueType};
use crate::domain::boolify;
use crate::metrics::{Metrics, METRICS};
use crate::obs;

/// Problems found in an `events_order` value. `index` is the entry position.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderSpecError {
    #[error("must be an array, got {found}")]
    NotAnArray { found: String },

    #[error("entry {index} must be a string or an array")]
    InvalidEntry { index: usize },

    #[error("entry {index} is an empty array")]
    EmptyTuple { index: usize },

    #[error("entry {index} has {len} elements, at most 3 are allowed")]
    TooManyElements { index: usize, len: usize },

    #[error("entry {index}: expression must be a string")]
    ExpressionNotString { index: usize },

    #[error("entry {index}: expression must not be empty")]
    EmptyExpression { index: usize },

    #[error("entry {index}: invalid template: {reason}")]
    InvalidTemplate { index: usize, reason: String },

    #[error("entry {index}: type must be one of string, number, time, got {found}")]
    InvalidType { index: usize, found: String },

    #[error("entry {index}: descending must be a boolean value, got {found}")]
    InvalidDescending { index: usize, found: String },
}

/// One sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub expression: String,
    pub value_type: ValueType,
    pub descending: bool,
}

impl OrderKey {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            value_type: ValueType::String,
            descending: false,
        }
    }

    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    /// Render and parse this key for one event. A key that fails to render
    /// compares as its literal template; either failure is counted once.
    fn evaluate(
        &self,
        renderer: &dyn ExpressionRenderer,
        context: &Payload,
        metrics: &Metrics,
    ) -> TypedValue {
        match renderer.render(&self.expression, context) {
            Ok(raw) => parse_key_counted(&raw, self.value_type, metrics),
            Err(err) => {
                obs::emit_render_fallback(&self.expression, &err);
                metrics.inc_key_fallbacks();
                TypedValue::String(self.expression.clone())
            }
        }
    }
}

/// Validated ordering configuration. Earlier keys take precedence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderSpec {
    pub keys: Vec<OrderKey>,
}

impl OrderSpec {
    pub fn new(keys: Vec<OrderKey>) -> Self {
        Self { keys }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn descending_flags(&self) -> Vec<bool> {
        self.keys.iter().map(|k| k.descending).collect()
    }

    /// Canonical JSON form: every entry as a full three-element array.
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.keys
                .iter()
                .map(|k| json!([k.expression, k.value_type.as_str(), k.descending]))
                .collect(),
        )
    }

    /// Validate a raw `events_order` option.
    ///
    /// Absent or `null` yields an empty spec. Templates are parsed with
    /// `renderer` but never rendered.
    pub fn validate(
        raw: Option<&Value>,
        renderer: &dyn ExpressionRenderer,
    ) -> Result<OrderSpec, Vec<OrderSpecError>> {
        let entries = match raw {
            None | Some(Value::Null) => return Ok(OrderSpec::default()),
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                return Err(vec![OrderSpecError::NotAnArray {
                    found: other.to_string(),
                }])
            }
        };

        let mut keys = Vec::with_capacity(entries.len());
        let mut errors = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            match validate_entry(index, entry, renderer) {
                Ok(key) => keys.push(key),
                Err(mut entry_errors) => errors.append(&mut entry_errors),
            }
        }

        if errors.is_empty() {
            Ok(OrderSpec { keys })
        } else {
            Err(errors)
        }
    }

    /// Sort a batch of new events.
    ///
    /// Each key is rendered against the event payload with [`INDEX_VAR`]
    /// bound to the event's zero-based position in `events`. Render and parse
    /// failures degrade that one key; the batch is always returned whole.
    pub fn sort_events(
        &self,
        renderer: &dyn ExpressionRenderer,
        events: Vec<NewEvent>,
    ) -> Vec<NewEvent> {
        if self.is_empty() || events.len() < 2 {
            return events;
        }

        let tuples = events
            .into_iter()
            .enumerate()
            .map(|(index, event)| {
                let context = key_context(&event.payload, index);
                let keys = self
                    .keys
                    .iter()
                    .map(|key| key.evaluate(renderer, &context, &METRICS))
                    .collect();
                SortTuple::new(keys, index, event)
            })
            .collect();

        METRICS.inc_batches_sorted();
        sort_tuples(tuples, &self.descending_flags())
            .into_iter()
            .map(|t| t.item)
            .collect()
    }
}

fn key_context(payload: &Payload, index: usize) -> Payload {
    let mut context = payload.clone();
    context.insert(INDEX_VAR.to_string(), json!(index));
    context
}

fn validate_expression(
    index: usize,
    value: &Value,
    renderer: &dyn ExpressionRenderer,
) -> Result<String, OrderSpecError> {
    let expression = value
        .as_str()
        .ok_or(OrderSpecError::ExpressionNotString { index })?;
    if expression.trim().is_empty() {
        return Err(OrderSpecError::EmptyExpression { index });
    }
    renderer
        .check(expression)
        .map_err(|e| OrderSpecError::InvalidTemplate {
            index,
            reason: e.reason,
        })?;
    Ok(expression.to_string())
}

fn validate_entry(
    index: usize,
    entry: &Value,
    renderer: &dyn ExpressionRenderer,
) -> Result<OrderKey, Vec<OrderSpecError>> {
    let parts: &[Value] = match entry {
        Value::String(_) => std::slice::from_ref(entry),
        Value::Array(parts) if parts.is_empty() => {
            return Err(vec![OrderSpecError::EmptyTuple { index }])
        }
        Value::Array(parts) if parts.len() > 3 => {
            return Err(vec![OrderSpecError::TooManyElements {
                index,
                len: parts.len(),
            }])
        }
        Value::Array(parts) => parts,
        _ => return Err(vec![OrderSpecError::InvalidEntry { index }]),
    };

    let mut errors = Vec::new();

    let expression = validate_expression(index, &parts[0], renderer)
        .map_err(|e| errors.push(e))
        .ok();

    let value_type = match parts.get(1) {
        None | Some(Value::Null) => Some(ValueType::String),
        Some(Value::String(s)) => match s.parse::<ValueType>() {
            Ok(t) => Some(t),
            Err(found) => {
                errors.push(OrderSpecError::InvalidType { index, found });
                None
            }
        },
        Some(other) => {
            errors.push(OrderSpecError::InvalidType {
                index,
                found: other.to_string(),
            });
            None
        }
    };

    let descending = match parts.get(2) {
        None | Some(Value::Null) => Some(false),
        Some(value) => {
            let parsed = boolify(value);
            if parsed.is_none() {
                errors.push(OrderSpecError::InvalidDescending {
                    index,
                    found: value.to_string(),
                });
            }
            parsed
        }
    };

    match (expression, value_type, descending) {
        (Some(expression), Some(value_type), Some(descending)) if errors.is_empty() => {
            Ok(OrderKey {
                expression,
                value_type,
                descending,
            })
        }
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordering::TeraRenderer;

    fn validate(raw: Value) -> Result<OrderSpec, Vec<OrderSpecError>> {
        OrderSpec::validate(Some(&raw), &TeraRenderer)
    }

    fn event(value: Value) -> NewEvent {
        NewEvent::new(value.as_object().cloned().unwrap())
    }

    #[test]
    fn absent_or_null_disables_ordering() {
        assert!(OrderSpec::validate(None, &TeraRenderer).unwrap().is_empty());
        assert!(validate(Value::Null).unwrap().is_empty());
        assert!(validate(json!([])).unwrap().is_empty());
    }

    #[test]
    fn bare_strings_and_tuples_get_defaults() {
        let spec = validate(json!([
            "{{a}}",
            ["{{b}}"],
            ["{{c}}", "number"],
            ["{{d}}", "time", "true"],
            ["{{e}}", null, null]
        ]))
        .unwrap();
        assert_eq!(
            spec.keys,
            vec![
                OrderKey::new("{{a}}"),
                OrderKey::new("{{b}}"),
                OrderKey::new("{{c}}").with_type(ValueType::Number),
                OrderKey::new("{{d}}").with_type(ValueType::Time).descending(),
                OrderKey::new("{{e}}"),
            ]
        );
        assert_eq!(spec.descending_flags(), vec![false, false, false, true, false]);
    }

    #[test]
    fn non_array_is_a_single_error() {
        let errors = validate(json!({"a": 1})).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], OrderSpecError::NotAnArray { .. }));
    }

    #[test]
    fn every_bad_entry_is_reported() {
        let errors = validate(json!([
            5,
            [],
            ["{{a}}", "string", false, "extra"],
            [7, "date", "maybe"],
            [""],
            ["{{ a "]
        ]))
        .unwrap_err();
        assert_eq!(
            errors[..6],
            [
                OrderSpecError::InvalidEntry { index: 0 },
                OrderSpecError::EmptyTuple { index: 1 },
                OrderSpecError::TooManyElements { index: 2, len: 4 },
                OrderSpecError::ExpressionNotString { index: 3 },
                OrderSpecError::InvalidType {
                    index: 3,
                    found: "date".into()
                },
                OrderSpecError::InvalidDescending {
                    index: 3,
                    found: "\"maybe\"".into()
                },
            ]
        );
        assert_eq!(errors[6], OrderSpecError::EmptyExpression { index: 4 });
        assert!(matches!(
            errors[7],
            OrderSpecError::InvalidTemplate { index: 5, .. }
        ));
        assert_eq!(errors.len(), 8);
    }

    #[test]
    fn canonical_value_round_trips() {
        let spec = validate(json!(["{{a}}", ["{{b}}", "number", true]])).unwrap();
        let canonical = spec.to_value();
        assert_eq!(
            canonical,
            json!([["{{a}}", "string", false], ["{{b}}", "number", true]])
        );
        assert_eq!(validate(canonical).unwrap(), spec);
    }

    #[test]
    fn sorts_by_date_then_author() {
        let spec = validate(json!([["{{date}}", "time", false], ["{{author}}", "string", false]]))
            .unwrap();
        let events = vec![
            event(json!({"date": "2020-01-02", "author": "b"})),
            event(json!({"date": "2020-01-01", "author": "z"})),
            event(json!({"date": "2020-01-01", "author": "a"})),
        ];
        let authors: Vec<_> = spec
            .sort_events(&TeraRenderer, events)
            .into_iter()
            .map(|e| e.payload["author"].clone())
            .collect();
        assert_eq!(authors, vec![json!("a"), json!("z"), json!("b")]);
    }

    #[test]
    fn unparseable_numbers_sort_after_numbers() {
        let spec = validate(json!([["{{v}}", "number", false]])).unwrap();
        let events = vec![
            event(json!({"v": "10"})),
            event(json!({"v": "abc"})),
            event(json!({"v": "2"})),
        ];
        let values: Vec<_> = spec
            .sort_events(&TeraRenderer, events)
            .into_iter()
            .map(|e| e.payload["v"].clone())
            .collect();
        assert_eq!(values, vec![json!("2"), json!("10"), json!("abc")]);
    }

    #[test]
    fn index_variable_reverses_creation_order() {
        let spec = validate(json!([["{{_index_}}", "number", true]])).unwrap();
        let events = (0..4).map(|i| event(json!({ "n": i }))).collect();
        let ns: Vec<_> = spec
            .sort_events(&TeraRenderer, events)
            .into_iter()
            .map(|e| e.payload["n"].clone())
            .collect();
        assert_eq!(ns, vec![json!(3), json!(2), json!(1), json!(0)]);
    }

    #[test]
    fn sorting_does_not_leak_index_into_payload() {
        let spec = validate(json!(["{{_index_}}"])).unwrap();
        let sorted = spec.sort_events(&TeraRenderer, vec![event(json!({"a": 1})), event(json!({"a": 2}))]);
        assert!(sorted.iter().all(|e| !e.payload.contains_key(INDEX_VAR)));
    }

    #[test]
    fn degraded_key_is_counted_once() {
        let metrics = Metrics::new();
        let key = OrderKey::new("{{ missing }}").with_type(ValueType::Number);
        let payload = json!({"v": 1}).as_object().cloned().unwrap();

        let value = key.evaluate(&TeraRenderer, &payload, &metrics);
        assert_eq!(value, TypedValue::String("{{ missing }}".into()));
        assert_eq!(metrics.key_fallbacks(), 1);

        let key = OrderKey::new("{{ v }}x").with_type(ValueType::Time);
        key.evaluate(&TeraRenderer, &payload, &metrics);
        assert_eq!(metrics.key_fallbacks(), 2);
    }
}
