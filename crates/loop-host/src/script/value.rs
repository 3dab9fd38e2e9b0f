//! Runtime values of `loopscript` programs.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use loop_core::errors::{ErrorInfo, LoopError};
use serde_json::{Number, Value as Json};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

pub(crate) fn runtime_error(message: impl Into<String>) -> LoopError {
    LoopError::Runtime(ErrorInfo::new("loop_host.runtime", message))
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "dict",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(value) => *value,
            Value::Int(value) => *value != 0,
            Value::Float(value) => *value != 0.0,
            Value::Str(value) => !value.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
        }
    }

    pub fn as_str(&self) -> Result<&str, LoopError> {
        match self {
            Value::Str(value) => Ok(value),
            other => Err(runtime_error(format!(
                "expected str, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_int(&self) -> Result<i64, LoopError> {
        match self {
            Value::Int(value) => Ok(*value),
            Value::Bool(value) => Ok(i64::from(*value)),
            other => Err(runtime_error(format!(
                "expected int, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_f64(&self) -> Result<f64, LoopError> {
        match self {
            Value::Int(value) => Ok(*value as f64),
            Value::Float(value) => Ok(*value),
            Value::Bool(value) => Ok(f64::from(u8::from(*value))),
            other => Err(runtime_error(format!(
                "expected a number, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Key used when a value indexes a map.
    pub fn map_key(&self) -> Result<String, LoopError> {
        match self {
            Value::Str(value) => Ok(value.clone()),
            Value::Int(_) | Value::Bool(_) | Value::Float(_) | Value::Null => Ok(self.to_string()),
            other => Err(runtime_error(format!(
                "unhashable type: '{}'",
                other.type_name()
            ))),
        }
    }

    /// Equality with numeric promotion, so `1 == 1.0`.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => *a as f64 == *b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.loose_eq(vb))
            }
            (a, b) => a == b,
        }
    }

    /// Ordering for `<`-style operators and `sorted`.
    pub fn compare(&self, other: &Value) -> Result<Ordering, LoopError> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (a, b) if a.is_number() && b.is_number() => a
                .as_f64()?
                .partial_cmp(&b.as_f64()?)
                .ok_or_else(|| runtime_error("cannot order NaN")),
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        unequal => return Ok(unequal),
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }
            (a, b) => Err(runtime_error(format!(
                "ordering not supported between '{}' and '{}'",
                a.type_name(),
                b.type_name()
            ))),
        }
    }

    /// Container nesting depth (scalars are 0), counted no further than
    /// `limit + 1` so the walk itself stays shallow.
    pub fn nesting_depth(&self, limit: u64) -> u64 {
        match self {
            Value::List(items) => 1 + deepest_child(items.iter(), limit),
            Value::Map(entries) => 1 + deepest_child(entries.values(), limit),
            _ => 0,
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(value) => Json::Bool(*value),
            Value::Int(value) => Json::Number(Number::from(*value)),
            Value::Float(value) => Number::from_f64(*value).map_or(Json::Null, Json::Number),
            Value::Str(value) => Json::String(value.clone()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(value) => Value::Bool(*value),
            Json::Number(number) => match number.as_i64() {
                Some(value) => Value::Int(value),
                None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(value) => Value::Str(value.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            Json::Object(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::from_json(value)))
                    .collect(),
            ),
        }
    }
}

fn deepest_child<'v>(children: impl Iterator<Item = &'v Value>, limit: u64) -> u64 {
    if limit == 0 {
        return 0;
    }
    let mut deepest = 0;
    for child in children {
        deepest = deepest.max(child.nesting_depth(limit - 1));
        if deepest >= limit {
            break;
        }
    }
    deepest
}

/// Stringification used by `str()` and for the program's return value:
/// strings verbatim, scalars in their literal form, collections as JSON.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Str(value) => f.write_str(value),
            Value::List(_) | Value::Map(_) => write!(f, "{}", self.to_json()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stringification_matches_output_contract() {
        assert_eq!(Value::Str("spam".into()).to_string(), "spam");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
        let list = Value::List(vec![Value::Int(1), Value::Str("a".into())]);
        assert_eq!(list.to_string(), r#"[1,"a"]"#);
    }

    #[test]
    fn nesting_depth_stops_past_the_limit() {
        let mut value = Value::Int(1);
        for _ in 0..10 {
            value = Value::List(vec![Value::Null, value]);
        }
        assert_eq!(value.nesting_depth(64), 10);
        assert_eq!(value.nesting_depth(4), 5);
        assert_eq!(Value::Str("x".into()).nesting_depth(0), 0);
        let map = Value::Map(BTreeMap::from([("k".to_string(), Value::List(Vec::new()))]));
        assert_eq!(map.nesting_depth(64), 2);
    }

    #[test]
    fn numeric_equality_promotes() {
        assert!(Value::Int(2).loose_eq(&Value::Float(2.0)));
        assert!(!Value::Int(2).loose_eq(&Value::Str("2".into())));
        assert_eq!(
            Value::Int(1).compare(&Value::Float(1.5)).expect("compare"),
            Ordering::Less
        );
        assert!(Value::Int(1).compare(&Value::Str("a".into())).is_err());
    }
}
