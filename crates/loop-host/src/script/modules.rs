//! Standard modules importable with `use`.

use std::collections::{BTreeMap, HashMap};

use chrono::{SecondsFormat, Utc};
use loop_core::errors::{ErrorInfo, LoopError};
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};

use super::builtins::{check_arity, float_to_int, iterate, reserve_string, sized};
use super::value::{runtime_error, Value};
use crate::sandbox::SandboxGuard;

/// Modules this interpreter implements.
pub const AVAILABLE_MODULES: &[&str] = &["re", "json", "math", "string", "datetime", "collections"];

const REGEX_SIZE_LIMIT: usize = 1 << 20;
const REGEX_CACHE_CAPACITY: usize = 256;

/// Compiled patterns shared by every call of one prepared program.
#[derive(Debug, Default)]
pub struct RegexCache {
    inner: Mutex<HashMap<String, Regex>>,
}

impl RegexCache {
    pub fn get(&self, pattern: &str) -> Result<Regex, LoopError> {
        if let Some(regex) = self.inner.lock().get(pattern) {
            return Ok(regex.clone());
        }
        let regex = RegexBuilder::new(pattern)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|err| runtime_error(format!("invalid regular expression: {err}")))?;
        let mut inner = self.inner.lock();
        if inner.len() >= REGEX_CACHE_CAPACITY {
            inner.clear();
        }
        inner.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn is_available(module: &str) -> bool {
    AVAILABLE_MODULES.contains(&module)
}

/// Module-level constants such as `math.pi`.
pub fn constant(module: &str, name: &str) -> Option<Value> {
    Some(match (module, name) {
        ("math", "pi") => Value::Float(std::f64::consts::PI),
        ("math", "e") => Value::Float(std::f64::consts::E),
        ("string", "ascii_letters") => {
            Value::Str("abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ".into())
        }
        ("string", "ascii_lowercase") => Value::Str("abcdefghijklmnopqrstuvwxyz".into()),
        ("string", "ascii_uppercase") => Value::Str("ABCDEFGHIJKLMNOPQRSTUVWXYZ".into()),
        ("string", "digits") => Value::Str("0123456789".into()),
        ("string", "punctuation") => Value::Str("!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~".into()),
        _ => return None,
    })
}

fn unknown(module: &str, name: &str) -> LoopError {
    runtime_error(format!("module '{module}' has no attribute '{name}'"))
}

/// Calls `module.name(args)`. The module has already been imported.
pub fn call(
    module: &str,
    name: &str,
    args: Vec<Value>,
    guard: &mut SandboxGuard,
    regexes: &RegexCache,
) -> Result<Value, LoopError> {
    if let Some(value) = constant(module, name) {
        check_arity(name, &args, 0, 0)?;
        return Ok(value);
    }
    let result = match module {
        "re" => regex_call(name, &args, regexes, guard)?,
        "json" => json_call(name, &args)?,
        "math" => math_call(name, &args)?,
        "datetime" => match name {
            "today" => {
                check_arity(name, &args, 0, 0)?;
                Value::Str(Utc::now().date_naive().format("%Y-%m-%d").to_string())
            }
            "now" => {
                check_arity(name, &args, 0, 0)?;
                Value::Str(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            _ => return Err(unknown(module, name)),
        },
        "collections" => collections_call(name, &args)?,
        "string" => return Err(unknown(module, name)),
        other => {
            return Err(LoopError::Capability(ErrorInfo::new(
                "loop_host.capability",
                format!("module '{other}' is not available"),
            )))
        }
    };
    sized(result, guard)
}

/// Upper bound on the length of `regex.replace_all(text, template)`. Each
/// `$` reference in the template is charged the full length of its match.
fn regex_replaced_len(regex: &Regex, text: &str, template: &str) -> usize {
    let (hits, matched) = regex
        .find_iter(text)
        .fold((0usize, 0usize), |(hits, matched), found| {
            (hits + 1, matched + found.len())
        });
    let references = template.matches('$').count();
    text.len()
        .saturating_sub(matched)
        .saturating_add(hits.saturating_mul(template.len()))
        .saturating_add(references.saturating_mul(matched))
}

fn regex_call(
    name: &str,
    args: &[Value],
    regexes: &RegexCache,
    guard: &mut SandboxGuard,
) -> Result<Value, LoopError> {
    let arity = if name == "replace" { 3 } else { 2 };
    check_arity(name, args, arity, arity)?;
    let regex = regexes.get(args[0].as_str()?)?;
    let text = args[1].as_str()?;
    Ok(match name {
        "is_match" => Value::Bool(regex.is_match(text)),
        "find" => regex
            .find(text)
            .map_or(Value::Null, |found| Value::Str(found.as_str().to_string())),
        "find_all" => {
            // A single capture group yields the group, like most regex APIs.
            let group = usize::from(regex.captures_len() == 2);
            Value::List(
                regex
                    .captures_iter(text)
                    .map(|caps| {
                        Value::Str(
                            caps.get(group)
                                .map_or_else(String::new, |m| m.as_str().to_string()),
                        )
                    })
                    .collect(),
            )
        }
        "replace" => {
            let template = args[2].as_str()?;
            reserve_string(regex_replaced_len(&regex, text, template), guard)?;
            Value::Str(regex.replace_all(text, template).into_owned())
        }
        "split" => Value::List(
            regex
                .split(text)
                .map(|part| Value::Str(part.to_string()))
                .collect(),
        ),
        _ => return Err(unknown("re", name)),
    })
}

fn json_call(name: &str, args: &[Value]) -> Result<Value, LoopError> {
    check_arity(name, args, 1, 1)?;
    match name {
        "parse" => {
            let parsed: serde_json::Value = serde_json::from_str(args[0].as_str()?)
                .map_err(|err| runtime_error(format!("invalid JSON: {err}")))?;
            Ok(Value::from_json(&parsed))
        }
        "dumps" => Ok(Value::Str(args[0].to_json().to_string())),
        _ => Err(unknown("json", name)),
    }
}

fn math_call(name: &str, args: &[Value]) -> Result<Value, LoopError> {
    match name {
        "floor" | "ceil" => {
            check_arity(name, args, 1, 1)?;
            if let Value::Int(value) = args[0] {
                return Ok(Value::Int(value));
            }
            let value = args[0].as_f64()?;
            let rounded = if name == "floor" { value.floor() } else { value.ceil() };
            Ok(Value::Int(float_to_int(rounded)?))
        }
        "sqrt" => {
            check_arity(name, args, 1, 1)?;
            let value = args[0].as_f64()?;
            if value < 0.0 {
                return Err(runtime_error("math domain error"));
            }
            Ok(Value::Float(value.sqrt()))
        }
        "log" => {
            check_arity(name, args, 1, 2)?;
            let value = args[0].as_f64()?;
            if value <= 0.0 {
                return Err(runtime_error("math domain error"));
            }
            match args.get(1) {
                None => Ok(Value::Float(value.ln())),
                Some(base) => {
                    let base = base.as_f64()?;
                    if base <= 0.0 || base == 1.0 {
                        return Err(runtime_error("math domain error"));
                    }
                    Ok(Value::Float(value.ln() / base.ln()))
                }
            }
        }
        "pow" => {
            check_arity(name, args, 2, 2)?;
            Ok(Value::Float(args[0].as_f64()?.powf(args[1].as_f64()?)))
        }
        _ => Err(unknown("math", name)),
    }
}

fn collections_call(name: &str, args: &[Value]) -> Result<Value, LoopError> {
    match name {
        "counter" => {
            check_arity(name, args, 1, 1)?;
            let mut counts: BTreeMap<String, Value> = BTreeMap::new();
            for item in iterate(&args[0])? {
                let key = item.map_key()?;
                let next = match counts.get(&key) {
                    Some(Value::Int(count)) => count + 1,
                    _ => 1,
                };
                counts.insert(key, Value::Int(next));
            }
            Ok(Value::Map(counts))
        }
        "most_common" => {
            check_arity(name, args, 1, 2)?;
            let counts = match &args[0] {
                Value::Map(_) => args[0].clone(),
                other => collections_call("counter", std::slice::from_ref(other))?,
            };
            let Value::Map(entries) = counts else {
                return Err(runtime_error("most_common() expects a dict or list"));
            };
            let mut pairs = entries
                .into_iter()
                .map(|(key, count)| Ok((key, count.as_int()?)))
                .collect::<Result<Vec<_>, LoopError>>()?;
            pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            if let Some(limit) = args.get(1) {
                let limit = usize::try_from(limit.as_int()?.max(0)).unwrap_or(usize::MAX);
                pairs.truncate(limit);
            }
            Ok(Value::List(
                pairs
                    .into_iter()
                    .map(|(key, count)| Value::List(vec![Value::Str(key), Value::Int(count)]))
                    .collect(),
            ))
        }
        _ => Err(unknown("collections", name)),
    }
}
