//! Builtin functions reachable from programs through the allow-list.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use loop_core::errors::{ErrorInfo, LoopError};
use tracing::debug;

use super::value::{runtime_error, Value};
use crate::sandbox::{SandboxEvent, SandboxGuard};

pub(crate) fn check_arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), LoopError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        };
        return Err(runtime_error(format!(
            "{name}() takes {expected} arguments but {} were given",
            args.len()
        )));
    }
    Ok(())
}

/// Reports the size of a freshly built value to the guard.
pub(crate) fn sized(value: Value, guard: &mut SandboxGuard) -> Result<Value, LoopError> {
    match &value {
        Value::Str(text) => guard.check(SandboxEvent::StringLen(text.len() as u64))?,
        Value::List(items) => guard.check(SandboxEvent::CollectionLen(items.len() as u64))?,
        Value::Map(entries) => guard.check(SandboxEvent::CollectionLen(entries.len() as u64))?,
        _ => return Ok(value),
    }
    nested(&value, guard)?;
    Ok(value)
}

/// Reports the container nesting depth of `value` to the guard.
pub(crate) fn nested(value: &Value, guard: &mut SandboxGuard) -> Result<(), LoopError> {
    let depth = value.nesting_depth(guard.caps().max_value_depth);
    guard.check(SandboxEvent::ValueDepth(depth))
}

/// Checks the length of a string before it is built.
pub(crate) fn reserve_string(len: usize, guard: &mut SandboxGuard) -> Result<(), LoopError> {
    guard.check(SandboxEvent::StringLen(u64::try_from(len).unwrap_or(u64::MAX)))
}

/// Byte length of `text` with every `from` replaced by `to`.
pub(crate) fn replaced_len(text: &str, from: &str, to: &str) -> usize {
    let hits = text.matches(from).count();
    let grown = text.len().saturating_sub(hits.saturating_mul(from.len()));
    grown.saturating_add(hits.saturating_mul(to.len()))
}

fn list_arg<'a>(name: &str, value: &'a Value) -> Result<&'a [Value], LoopError> {
    match value {
        Value::List(items) => Ok(items),
        other => Err(runtime_error(format!(
            "{name}() expects a list, got {}",
            other.type_name()
        ))),
    }
}

fn map_arg<'a>(name: &str, value: &'a Value) -> Result<&'a BTreeMap<String, Value>, LoopError> {
    match value {
        Value::Map(entries) => Ok(entries),
        other => Err(runtime_error(format!(
            "{name}() expects a dict, got {}",
            other.type_name()
        ))),
    }
}

/// Iterable view: lists yield items, strings yield characters, maps yield keys.
pub(crate) fn iterate(value: &Value) -> Result<Vec<Value>, LoopError> {
    match value {
        Value::List(items) => Ok(items.clone()),
        Value::Str(text) => Ok(text.chars().map(|c| Value::Str(c.to_string())).collect()),
        Value::Map(entries) => Ok(entries.keys().cloned().map(Value::Str).collect()),
        other => Err(runtime_error(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
    }
}

/// Membership test shared by `in` and `contains`.
pub(crate) fn contains(haystack: &Value, needle: &Value) -> Result<bool, LoopError> {
    match haystack {
        Value::Str(text) => Ok(text.contains(needle.as_str()?)),
        Value::List(items) => Ok(items.iter().any(|item| item.loose_eq(needle))),
        Value::Map(entries) => Ok(entries.contains_key(&needle.map_key()?)),
        other => Err(runtime_error(format!(
            "argument of type '{}' does not support membership",
            other.type_name()
        ))),
    }
}

fn round_half_even(value: f64) -> f64 {
    let rounded = value.round();
    if (value - value.trunc()).abs() == 0.5 {
        2.0 * (value / 2.0).round()
    } else {
        rounded
    }
}

pub(crate) fn float_to_int(value: f64) -> Result<i64, LoopError> {
    if !value.is_finite() || value >= i64::MAX as f64 || value < i64::MIN as f64 {
        return Err(runtime_error(format!("cannot convert {value} to int")));
    }
    Ok(value.trunc() as i64)
}

/// Whether `name` is implemented by this module.
pub fn is_builtin(name: &str) -> bool {
    crate::allowlist::DEFAULT_BUILTINS.contains(&name)
}

/// Invokes builtin `name`. The caller has already checked the allow-list.
pub fn call(name: &str, args: Vec<Value>, guard: &mut SandboxGuard) -> Result<Value, LoopError> {
    let result = match name {
        "str" => {
            check_arity(name, &args, 0, 1)?;
            Value::Str(args.first().map(Value::to_string).unwrap_or_default())
        }
        "int" => {
            check_arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Int(value) => Value::Int(*value),
                Value::Bool(value) => Value::Int(i64::from(*value)),
                Value::Float(value) => Value::Int(float_to_int(*value)?),
                Value::Str(text) => Value::Int(text.trim().parse::<i64>().map_err(|_| {
                    runtime_error(format!("invalid literal for int(): '{text}'"))
                })?),
                other => {
                    return Err(runtime_error(format!(
                        "int() argument must be a string or a number, not '{}'",
                        other.type_name()
                    )))
                }
            }
        }
        "float" => {
            check_arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Str(text) => Value::Float(text.trim().parse::<f64>().map_err(|_| {
                    runtime_error(format!("could not convert string to float: '{text}'"))
                })?),
                other => Value::Float(other.as_f64()?),
            }
        }
        "bool" => {
            check_arity(name, &args, 1, 1)?;
            Value::Bool(args[0].truthy())
        }
        "len" => {
            check_arity(name, &args, 1, 1)?;
            let len = match &args[0] {
                Value::Str(text) => text.chars().count(),
                Value::List(items) => items.len(),
                Value::Map(entries) => entries.len(),
                other => {
                    return Err(runtime_error(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )))
                }
            };
            Value::Int(len as i64)
        }
        "lower" => {
            check_arity(name, &args, 1, 1)?;
            Value::Str(args[0].as_str()?.to_lowercase())
        }
        "upper" => {
            check_arity(name, &args, 1, 1)?;
            Value::Str(args[0].as_str()?.to_uppercase())
        }
        "strip" => {
            check_arity(name, &args, 1, 2)?;
            let text = args[0].as_str()?;
            match args.get(1) {
                Some(chars) => {
                    let chars = chars.as_str()?;
                    Value::Str(text.trim_matches(|c| chars.contains(c)).to_string())
                }
                None => Value::Str(text.trim().to_string()),
            }
        }
        "split" => {
            check_arity(name, &args, 1, 2)?;
            let text = args[0].as_str()?;
            let parts: Vec<Value> = match args.get(1) {
                None | Some(Value::Null) => text
                    .split_whitespace()
                    .map(|part| Value::Str(part.to_string()))
                    .collect(),
                Some(sep) => {
                    let sep = sep.as_str()?;
                    if sep.is_empty() {
                        return Err(runtime_error("empty separator"));
                    }
                    text.split(sep).map(|part| Value::Str(part.to_string())).collect()
                }
            };
            Value::List(parts)
        }
        "join" => {
            check_arity(name, &args, 2, 2)?;
            let sep = args[0].as_str()?;
            let parts = list_arg(name, &args[1])?
                .iter()
                .map(Value::as_str)
                .collect::<Result<Vec<_>, _>>()?;
            let total = parts
                .iter()
                .fold(0usize, |len, part| len.saturating_add(part.len()))
                .saturating_add(sep.len().saturating_mul(parts.len().saturating_sub(1)));
            reserve_string(total, guard)?;
            Value::Str(parts.join(sep))
        }
        "contains" => {
            check_arity(name, &args, 2, 2)?;
            Value::Bool(contains(&args[0], &args[1])?)
        }
        "starts_with" => {
            check_arity(name, &args, 2, 2)?;
            Value::Bool(args[0].as_str()?.starts_with(args[1].as_str()?))
        }
        "ends_with" => {
            check_arity(name, &args, 2, 2)?;
            Value::Bool(args[0].as_str()?.ends_with(args[1].as_str()?))
        }
        "replace" => {
            check_arity(name, &args, 3, 3)?;
            let from = args[1].as_str()?;
            if from.is_empty() {
                return Err(runtime_error("replace() pattern must not be empty"));
            }
            let (text, to) = (args[0].as_str()?, args[2].as_str()?);
            reserve_string(replaced_len(text, from, to), guard)?;
            Value::Str(text.replace(from, to))
        }
        "find" => {
            check_arity(name, &args, 2, 2)?;
            let text = args[0].as_str()?;
            let index = text
                .find(args[1].as_str()?)
                .map_or(-1, |byte| text[..byte].chars().count() as i64);
            Value::Int(index)
        }
        "count" => {
            check_arity(name, &args, 2, 2)?;
            let count = match &args[0] {
                Value::Str(text) => {
                    let needle = args[1].as_str()?;
                    if needle.is_empty() {
                        text.chars().count() + 1
                    } else {
                        text.matches(needle).count()
                    }
                }
                Value::List(items) => items.iter().filter(|item| item.loose_eq(&args[1])).count(),
                other => {
                    return Err(runtime_error(format!(
                        "count() expects a str or list, got {}",
                        other.type_name()
                    )))
                }
            };
            Value::Int(count as i64)
        }
        "isinstance" => {
            check_arity(name, &args, 2, 2)?;
            let wanted = match &args[1] {
                Value::List(names) => names
                    .iter()
                    .map(|name| name.as_str().map(str::to_string))
                    .collect::<Result<Vec<_>, _>>()?,
                other => vec![other.as_str()?.to_string()],
            };
            Value::Bool(wanted.iter().any(|type_name| type_name == args[0].type_name()))
        }
        "type" => {
            check_arity(name, &args, 1, 1)?;
            Value::Str(args[0].type_name().to_string())
        }
        "list" => {
            check_arity(name, &args, 0, 1)?;
            match args.first() {
                None => Value::List(Vec::new()),
                Some(value) => Value::List(iterate(value)?),
            }
        }
        "dict" => {
            check_arity(name, &args, 0, 1)?;
            match args.first() {
                None => Value::Map(BTreeMap::new()),
                Some(Value::Map(entries)) => Value::Map(entries.clone()),
                Some(Value::List(pairs)) => {
                    let mut map = BTreeMap::new();
                    for pair in pairs {
                        match pair {
                            Value::List(kv) if kv.len() == 2 => {
                                map.insert(kv[0].map_key()?, kv[1].clone());
                            }
                            _ => return Err(runtime_error("dict() expects [key, value] pairs")),
                        }
                    }
                    Value::Map(map)
                }
                Some(other) => {
                    return Err(runtime_error(format!(
                        "cannot convert '{}' to dict",
                        other.type_name()
                    )))
                }
            }
        }
        "set" => {
            check_arity(name, &args, 0, 1)?;
            let mut unique: Vec<Value> = Vec::new();
            if let Some(value) = args.first() {
                for item in iterate(value)? {
                    if !unique.iter().any(|seen| seen.loose_eq(&item)) {
                        unique.push(item);
                    }
                }
            }
            Value::List(unique)
        }
        "keys" => {
            check_arity(name, &args, 1, 1)?;
            Value::List(map_arg(name, &args[0])?.keys().cloned().map(Value::Str).collect())
        }
        "values" => {
            check_arity(name, &args, 1, 1)?;
            Value::List(map_arg(name, &args[0])?.values().cloned().collect())
        }
        "items" => {
            check_arity(name, &args, 1, 1)?;
            Value::List(
                map_arg(name, &args[0])?
                    .iter()
                    .map(|(key, value)| Value::List(vec![Value::Str(key.clone()), value.clone()]))
                    .collect(),
            )
        }
        "get" => {
            check_arity(name, &args, 2, 3)?;
            let fallback = args.get(2).cloned().unwrap_or(Value::Null);
            match &args[0] {
                Value::Map(entries) => entries
                    .get(&args[1].map_key()?)
                    .cloned()
                    .unwrap_or(fallback),
                Value::List(items) => {
                    let index = args[1].as_int()?;
                    let resolved = if index < 0 { items.len() as i64 + index } else { index };
                    usize::try_from(resolved)
                        .ok()
                        .and_then(|index| items.get(index).cloned())
                        .unwrap_or(fallback)
                }
                other => {
                    return Err(runtime_error(format!(
                        "get() expects a dict or list, got {}",
                        other.type_name()
                    )))
                }
            }
        }
        "append" => {
            check_arity(name, &args, 2, 2)?;
            let mut items = list_arg(name, &args[0])?.to_vec();
            items.push(args[1].clone());
            Value::List(items)
        }
        "sorted" => {
            check_arity(name, &args, 1, 2)?;
            let mut items = iterate(&args[0])?;
            let mut failure = None;
            items.sort_by(|a, b| {
                a.compare(b).unwrap_or_else(|err| {
                    failure.get_or_insert(err);
                    Ordering::Equal
                })
            });
            if let Some(err) = failure {
                return Err(err);
            }
            if args.get(1).map_or(false, Value::truthy) {
                items.reverse();
            }
            Value::List(items)
        }
        "reversed" => {
            check_arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Str(text) => Value::Str(text.chars().rev().collect()),
                other => {
                    let mut items = iterate(other)?;
                    items.reverse();
                    Value::List(items)
                }
            }
        }
        "min" | "max" => {
            let candidates = match args.as_slice() {
                [single] => iterate(single)?,
                _ => args.clone(),
            };
            let mut best: Option<Value> = None;
            for item in candidates {
                best = Some(match best {
                    None => item,
                    Some(current) => {
                        let ordering = item.compare(&current)?;
                        let better = if name == "min" {
                            ordering == Ordering::Less
                        } else {
                            ordering == Ordering::Greater
                        };
                        if better {
                            item
                        } else {
                            current
                        }
                    }
                });
            }
            best.ok_or_else(|| runtime_error(format!("{name}() arg is an empty sequence")))?
        }
        "sum" => {
            check_arity(name, &args, 1, 1)?;
            let items = list_arg(name, &args[0])?;
            if items.iter().all(|item| matches!(item, Value::Int(_))) {
                let mut total: i64 = 0;
                for item in items {
                    total = total
                        .checked_add(item.as_int()?)
                        .ok_or_else(|| runtime_error("integer overflow in sum()"))?;
                }
                Value::Int(total)
            } else {
                let mut total = 0.0;
                for item in items {
                    total += item.as_f64()?;
                }
                Value::Float(total)
            }
        }
        "abs" => {
            check_arity(name, &args, 1, 1)?;
            match &args[0] {
                Value::Int(value) => Value::Int(
                    value
                        .checked_abs()
                        .ok_or_else(|| runtime_error("integer overflow in abs()"))?,
                ),
                other => Value::Float(other.as_f64()?.abs()),
            }
        }
        "round" => {
            check_arity(name, &args, 1, 2)?;
            let value = args[0].as_f64()?;
            match args.get(1) {
                None => Value::Int(float_to_int(round_half_even(value))?),
                Some(digits) => {
                    let scale = 10f64.powi(digits.as_int()?.clamp(-300, 300) as i32);
                    Value::Float(round_half_even(value * scale) / scale)
                }
            }
        }
        "any" => {
            check_arity(name, &args, 1, 1)?;
            Value::Bool(iterate(&args[0])?.iter().any(Value::truthy))
        }
        "all" => {
            check_arity(name, &args, 1, 1)?;
            Value::Bool(iterate(&args[0])?.iter().all(Value::truthy))
        }
        "range" => {
            check_arity(name, &args, 1, 3)?;
            let (start, stop, step) = match args.as_slice() {
                [stop] => (0, stop.as_int()?, 1),
                [start, stop] => (start.as_int()?, stop.as_int()?, 1),
                [start, stop, step] => (start.as_int()?, stop.as_int()?, step.as_int()?),
                _ => return Err(runtime_error("range() takes 1 to 3 arguments")),
            };
            if step == 0 {
                return Err(runtime_error("range() step must not be zero"));
            }
            let span = if step > 0 {
                (i128::from(stop) - i128::from(start)).max(0)
            } else {
                (i128::from(start) - i128::from(stop)).max(0)
            };
            let len = (span + i128::from(step.unsigned_abs()) - 1) / i128::from(step.unsigned_abs());
            guard.check(SandboxEvent::CollectionLen(u64::try_from(len).unwrap_or(u64::MAX)))?;
            let mut items = Vec::with_capacity(len as usize);
            let mut current = start;
            for _ in 0..len {
                items.push(Value::Int(current));
                current = current.wrapping_add(step);
            }
            Value::List(items)
        }
        "enumerate" => {
            check_arity(name, &args, 1, 1)?;
            Value::List(
                iterate(&args[0])?
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| Value::List(vec![Value::Int(index as i64), item]))
                    .collect(),
            )
        }
        "zip" => {
            check_arity(name, &args, 2, 2)?;
            let left = iterate(&args[0])?;
            let right = iterate(&args[1])?;
            Value::List(
                left.into_iter()
                    .zip(right)
                    .map(|(a, b)| Value::List(vec![a, b]))
                    .collect(),
            )
        }
        "print" => {
            let line = args
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            debug!(output = %line, "program print");
            Value::Null
        }
        other => {
            return Err(LoopError::Capability(ErrorInfo::new(
                "loop_host.capability",
                format!("name '{other}' is not available"),
            )))
        }
    };
    sized(result, guard)
}
