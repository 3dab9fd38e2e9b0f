//! Canonical JSON and YAML helpers shared by the store, dataset and config
//! layers.

use std::collections::BTreeMap;
use std::iter::FromIterator;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ErrorInfo, LoopError};

fn serde_error(code: &str, err: impl ToString) -> LoopError {
    LoopError::Serde(ErrorInfo::new(code, err.to_string()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Converts a serializable value into a canonical [`Value`] tree.
pub fn to_canonical_value<T: Serialize>(value: &T) -> Result<Value, LoopError> {
    let value =
        serde_json::to_value(value).map_err(|err| serde_error("loop_core.json_serialize", err))?;
    Ok(canonicalize(value))
}

/// Serializes a value into compact canonical JSON bytes with sorted keys.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, LoopError> {
    let canonical = to_canonical_value(value)?;
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonical)
        .map_err(|err| serde_error("loop_core.json_write", err))?;
    Ok(bytes)
}

/// Serializes a value into indented canonical JSON, for human-facing files.
pub fn to_canonical_json_pretty<T: Serialize>(value: &T) -> Result<Vec<u8>, LoopError> {
    let canonical = to_canonical_value(value)?;
    let mut bytes = Vec::new();
    serde_json::to_writer_pretty(&mut bytes, &canonical)
        .map_err(|err| serde_error("loop_core.json_write", err))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, LoopError> {
    serde_json::from_slice(data).map_err(|err| serde_error("loop_core.json_deserialize", err))
}

/// Deserializes a value from a JSON string.
pub fn from_json_str<T: DeserializeOwned>(data: &str) -> Result<T, LoopError> {
    from_json_slice(data.as_bytes())
}

/// Serializes a value into YAML.
pub fn to_yaml_string<T: Serialize>(value: &T) -> Result<String, LoopError> {
    serde_yaml::to_string(value).map_err(|err| serde_error("loop_core.yaml_serialize", err))
}

/// Deserializes a YAML payload into the requested type.
pub fn from_yaml_str<T: DeserializeOwned>(data: &str) -> Result<T, LoopError> {
    serde_yaml::from_str(data).map_err(|err| serde_error("loop_core.yaml_deserialize", err))
}
