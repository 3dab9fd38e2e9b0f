//! Tree-walking evaluator for `loopscript` under a [`SandboxGuard`].

use std::collections::{BTreeMap, HashMap, HashSet};

use loop_core::errors::{ErrorInfo, LoopError};

use super::ast::{BinaryOp, Expr, FnDef, LogicalOp, Program, Stmt, StmtKind, UnaryOp};
use super::builtins::{self, contains, iterate, sized};
use super::modules::{self, RegexCache};
use super::value::{runtime_error, Value};
use super::ENTRY_POINT;
use crate::allowlist::CapabilityAllowList;
use crate::sandbox::{SandboxCaps, SandboxEvent, SandboxGuard};

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

fn capability_error(message: String) -> LoopError {
    LoopError::Capability(ErrorInfo::new("loop_host.capability", message))
}

fn at_line(mut err: LoopError, line: u32) -> LoopError {
    err.info_mut()
        .context
        .entry("line".to_string())
        .or_insert_with(|| line.to_string());
    err
}

fn resolve_index(index: i64, len: usize) -> Result<usize, LoopError> {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = if index < 0 { index + len_i } else { index };
    if resolved < 0 || resolved >= len_i {
        return Err(runtime_error(format!("index {index} out of range")));
    }
    Ok(resolved as usize)
}

fn index_value(target: &Value, index: &Value) -> Result<Value, LoopError> {
    match target {
        Value::List(items) => Ok(items[resolve_index(index.as_int()?, items.len())?].clone()),
        Value::Str(text) => {
            let position = index.as_int()?;
            let len = text.chars().count();
            let resolved = resolve_index(position, len)?;
            Ok(Value::Str(
                text.chars()
                    .nth(resolved)
                    .map(String::from)
                    .unwrap_or_default(),
            ))
        }
        Value::Map(entries) => {
            let key = index.map_key()?;
            entries
                .get(&key)
                .cloned()
                .ok_or_else(|| runtime_error(format!("key '{key}' not found")))
        }
        other => Err(runtime_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn assign_path(target: &mut Value, path: &[Value], value: Value) -> Result<(), LoopError> {
    let Some((first, rest)) = path.split_first() else {
        *target = value;
        return Ok(());
    };
    let slot = match target {
        Value::List(items) => {
            let index = resolve_index(first.as_int()?, items.len())?;
            &mut items[index]
        }
        Value::Map(entries) => {
            let key = first.map_key()?;
            if rest.is_empty() {
                entries.insert(key, value);
                return Ok(());
            }
            entries
                .get_mut(&key)
                .ok_or_else(|| runtime_error(format!("key '{key}' not found")))?
        }
        other => {
            return Err(runtime_error(format!(
                "'{}' object does not support item assignment",
                other.type_name()
            )))
        }
    };
    assign_path(slot, rest, value)
}

fn python_rem_i64(a: i64, b: i64) -> Result<i64, LoopError> {
    if b == 0 {
        return Err(runtime_error("integer modulo by zero"));
    }
    let rem = a
        .checked_rem(b)
        .ok_or_else(|| runtime_error("integer overflow"))?;
    Ok(if rem != 0 && ((rem < 0) != (b < 0)) { rem + b } else { rem })
}

fn overflow() -> LoopError {
    runtime_error("integer overflow")
}

/// Runs one call of a prepared program: the top level, then the entry point
/// with `text` as its single argument.
pub(crate) fn run(
    program: &Program,
    allow: &CapabilityAllowList,
    regexes: &RegexCache,
    caps: SandboxCaps,
    text: &str,
) -> Result<Value, LoopError> {
    let entry = program.functions.get(ENTRY_POINT).ok_or_else(|| {
        LoopError::EntryPoint(
            ErrorInfo::new(
                "loop_host.entry_point",
                format!("program does not define a '{ENTRY_POINT}' function"),
            )
            .with_hint(format!("define `fn {ENTRY_POINT}(text) {{ ... }}`")),
        )
    })?;
    let mut interp = Interpreter {
        program,
        allow,
        regexes,
        guard: SandboxGuard::new(caps),
        globals: HashMap::new(),
        frames: Vec::new(),
        imports: HashSet::new(),
    };
    interp.exec_block(&program.body)?;
    let value = interp.call_function(entry, vec![Value::Str(text.to_string())])?;
    interp.guard.check_wall()?;
    Ok(value)
}

struct Interpreter<'a> {
    program: &'a Program,
    allow: &'a CapabilityAllowList,
    regexes: &'a RegexCache,
    guard: SandboxGuard,
    globals: HashMap<String, Value>,
    frames: Vec<HashMap<String, Value>>,
    imports: HashSet<String>,
}

impl<'a> Interpreter<'a> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames
            .last()
            .and_then(|frame| frame.get(name))
            .or_else(|| self.globals.get(name))
    }

    fn scope_mut(&mut self) -> &mut HashMap<String, Value> {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => &mut self.globals,
        }
    }

    fn variable_mut(&mut self, name: &str) -> Result<&mut Value, LoopError> {
        let in_frame = self
            .frames
            .last()
            .map_or(false, |frame| frame.contains_key(name));
        let slot = if in_frame {
            self.frames.last_mut().and_then(|frame| frame.get_mut(name))
        } else {
            self.globals.get_mut(name)
        };
        slot.ok_or_else(|| runtime_error(format!("name '{name}' is not defined")))
    }

    fn declare(&mut self, name: &str, value: Value) {
        self.scope_mut().insert(name.to_string(), value);
    }

    fn assign(&mut self, name: &str, value: Value) {
        match self.variable_mut(name) {
            Ok(slot) => *slot = value,
            Err(_) => self.declare(name, value),
        }
    }

    fn exec_block(&mut self, stmts: &'a [Stmt]) -> Result<Flow, LoopError> {
        for stmt in stmts {
            match self.exec(stmt).map_err(|err| at_line(err, stmt.line))? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &'a Stmt) -> Result<Flow, LoopError> {
        self.guard.tick()?;
        match &stmt.kind {
            StmtKind::Use(module) => {
                if !self.allow.allows_module(module) {
                    return Err(capability_error(format!(
                        "import of module '{module}' is not allowed"
                    )));
                }
                if !modules::is_available(module) {
                    return Err(capability_error(format!(
                        "module '{module}' is not available"
                    )));
                }
                self.imports.insert(module.clone());
            }
            StmtKind::Let(name, expr) => {
                let value = self.eval(expr)?;
                self.declare(name, value);
            }
            StmtKind::Assign(name, expr) => {
                let value = self.eval(expr)?;
                self.assign(name, value);
            }
            StmtKind::IndexAssign {
                name,
                indices,
                value,
            } => {
                let path = indices
                    .iter()
                    .map(|index| self.eval(index))
                    .collect::<Result<Vec<_>, _>>()?;
                let value = self.eval(value)?;
                let depth_limit = self.guard.caps().max_value_depth;
                let depth = (path.len() as u64)
                    .saturating_add(value.nesting_depth(depth_limit));
                let target = self.variable_mut(name)?;
                assign_path(target, &path, value)?;
                let len = match target {
                    Value::List(items) => items.len(),
                    Value::Map(entries) => entries.len(),
                    _ => 0,
                };
                self.guard.check(SandboxEvent::CollectionLen(len as u64))?;
                self.guard.check(SandboxEvent::ValueDepth(depth))?;
            }
            StmtKind::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.truthy() {
                        return self.exec_block(body);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_block(body);
                }
            }
            StmtKind::While { cond, body } => loop {
                self.guard.tick()?;
                if !self.eval(cond)?.truthy() {
                    break;
                }
                match self.exec_block(body)? {
                    Flow::Break => break,
                    Flow::Return(value) => return Ok(Flow::Return(value)),
                    Flow::Normal | Flow::Continue => {}
                }
            },
            StmtKind::For { var, iter, body } => {
                let items = iterate(&self.eval(iter)?)?;
                for item in items {
                    self.guard.tick()?;
                    self.declare(var, item);
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Expr(expr) => {
                let value = self.eval(expr)?;
                // `xs.append(v)` as a statement updates `xs` in place.
                if let Expr::MethodCall { receiver, name, .. } = expr {
                    if let Expr::Name(var) = receiver.as_ref() {
                        if name == "append" && self.lookup(var).is_some() {
                            self.assign(var, value);
                        }
                    }
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn call_function(&mut self, def: &'a FnDef, args: Vec<Value>) -> Result<Value, LoopError> {
        if args.len() != def.params.len() {
            return Err(runtime_error(format!(
                "{}() takes {} arguments but {} were given",
                def.name,
                def.params.len(),
                args.len()
            )));
        }
        self.guard
            .check(SandboxEvent::CallDepth(self.frames.len() as u64 + 1))?;
        let frame = def.params.iter().cloned().zip(args).collect();
        self.frames.push(frame);
        let result = self.exec_block(&def.body);
        self.frames.pop();
        match result? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Null),
        }
    }

    fn eval_args(&mut self, args: &'a [Expr]) -> Result<Vec<Value>, LoopError> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn eval(&mut self, expr: &'a Expr) -> Result<Value, LoopError> {
        match expr {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(value) => Ok(Value::Bool(*value)),
            Expr::Int(value) => Ok(Value::Int(*value)),
            Expr::Float(value) => Ok(Value::Float(*value)),
            Expr::Str(value) => Ok(Value::Str(value.clone())),
            Expr::List(items) => {
                let values = self.eval_args(items)?;
                sized(Value::List(values), &mut self.guard)
            }
            Expr::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    let key = self.eval(key)?.map_key()?;
                    let value = self.eval(value)?;
                    map.insert(key, value);
                }
                sized(Value::Map(map), &mut self.guard)
            }
            Expr::Name(name) => self
                .lookup(name)
                .cloned()
                .ok_or_else(|| runtime_error(format!("name '{name}' is not defined"))),
            Expr::Unary { op, expr } => {
                let value = self.eval(expr)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
                    UnaryOp::Neg => match value {
                        Value::Int(number) => number.checked_neg().map(Value::Int).ok_or_else(overflow),
                        Value::Float(number) => Ok(Value::Float(-number)),
                        other => Err(runtime_error(format!(
                            "bad operand type for unary -: '{}'",
                            other.type_name()
                        ))),
                    },
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                self.binary(*op, lhs, rhs)
            }
            Expr::Logical { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                match (op, lhs.truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(lhs),
                    _ => self.eval(rhs),
                }
            }
            Expr::Index { target, index } => {
                let index = self.eval(index)?;
                if let Expr::Name(name) = target.as_ref() {
                    let value = self
                        .lookup(name)
                        .ok_or_else(|| runtime_error(format!("name '{name}' is not defined")))?;
                    return index_value(value, &index);
                }
                let target = self.eval(target)?;
                index_value(&target, &index)
            }
            Expr::Call { name, args } => self.call(name, args),
            Expr::MethodCall {
                receiver,
                name,
                args,
            } => self.method_call(receiver, name, args),
            Expr::Attr { receiver, name } => {
                let module = self.module_receiver(receiver)?.ok_or_else(|| {
                    runtime_error(format!(
                        "attribute '{name}' can only be read from an imported module"
                    ))
                })?;
                modules::constant(module, name).ok_or_else(|| {
                    runtime_error(format!("module '{module}' has no attribute '{name}'"))
                })
            }
        }
    }

    fn call(&mut self, name: &str, args: &'a [Expr]) -> Result<Value, LoopError> {
        let program = self.program;
        if let Some(def) = program.functions.get(name) {
            let args = self.eval_args(args)?;
            return self.call_function(def, args);
        }
        if !self.allow.allows_builtin(name) {
            return Err(capability_error(format!("name '{name}' is not allowed")));
        }
        let args = self.eval_args(args)?;
        builtins::call(name, args, &mut self.guard)
    }

    /// Resolves `receiver` to a module name when it refers to one. Names
    /// bound as variables shadow modules.
    fn module_receiver(&self, receiver: &'a Expr) -> Result<Option<&'a str>, LoopError> {
        let Expr::Name(module) = receiver else {
            return Ok(None);
        };
        if self.lookup(module).is_some() {
            return Ok(None);
        }
        if self.imports.contains(module.as_str()) {
            return Ok(Some(module.as_str()));
        }
        if self.allow.allows_module(module) || modules::is_available(module) {
            return Err(capability_error(format!(
                "module '{module}' is used without `use {module}`"
            )));
        }
        Err(capability_error(format!("name '{module}' is not allowed")))
    }

    fn method_call(
        &mut self,
        receiver: &'a Expr,
        name: &str,
        args: &'a [Expr],
    ) -> Result<Value, LoopError> {
        if let Some(module) = self.module_receiver(receiver)? {
            let args = self.eval_args(args)?;
            return modules::call(module, name, args, &mut self.guard, self.regexes);
        }
        let program = self.program;
        let def = program.functions.get(name);
        if def.is_none() && !self.allow.allows_builtin(name) {
            return Err(capability_error(format!("name '{name}' is not allowed")));
        }
        let mut values = Vec::with_capacity(args.len() + 1);
        values.push(self.eval(receiver)?);
        values.extend(self.eval_args(args)?);
        match def {
            Some(def) => self.call_function(def, values),
            None => builtins::call(name, values, &mut self.guard),
        }
    }

    fn repeat_len(&mut self, unit: usize, times: i64) -> Result<usize, LoopError> {
        let times = usize::try_from(times.max(0)).unwrap_or(usize::MAX);
        let total = unit.saturating_mul(times);
        self.guard.check(SandboxEvent::StringLen(total as u64))?;
        Ok(times)
    }

    fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, LoopError> {
        let type_error = |lhs: &Value, rhs: &Value| {
            runtime_error(format!(
                "unsupported operand types for {}: '{}' and '{}'",
                op.symbol(),
                lhs.type_name(),
                rhs.type_name()
            ))
        };
        let result = match op {
            BinaryOp::Eq => Value::Bool(lhs.loose_eq(&rhs)),
            BinaryOp::Ne => Value::Bool(!lhs.loose_eq(&rhs)),
            BinaryOp::Lt => Value::Bool(lhs.compare(&rhs)?.is_lt()),
            BinaryOp::Le => Value::Bool(lhs.compare(&rhs)?.is_le()),
            BinaryOp::Gt => Value::Bool(lhs.compare(&rhs)?.is_gt()),
            BinaryOp::Ge => Value::Bool(lhs.compare(&rhs)?.is_ge()),
            BinaryOp::In => Value::Bool(contains(&rhs, &lhs)?),
            BinaryOp::NotIn => Value::Bool(!contains(&rhs, &lhs)?),
            BinaryOp::Add => match (lhs, rhs) {
                (Value::Int(a), Value::Int(b)) => Value::Int(a.checked_add(b).ok_or_else(overflow)?),
                (Value::Str(a), Value::Str(b)) => {
                    self.guard
                        .check(SandboxEvent::StringLen((a.len() + b.len()) as u64))?;
                    Value::Str(a + &b)
                }
                (Value::List(mut a), Value::List(b)) => {
                    a.extend(b);
                    Value::List(a)
                }
                (a, b) if a.is_number() && b.is_number() => Value::Float(a.as_f64()? + b.as_f64()?),
                (a, b) => return Err(type_error(&a, &b)),
            },
            BinaryOp::Sub => match (lhs, rhs) {
                (Value::Int(a), Value::Int(b)) => Value::Int(a.checked_sub(b).ok_or_else(overflow)?),
                (a, b) if a.is_number() && b.is_number() => Value::Float(a.as_f64()? - b.as_f64()?),
                (a, b) => return Err(type_error(&a, &b)),
            },
            BinaryOp::Mul => match (lhs, rhs) {
                (Value::Int(a), Value::Int(b)) => Value::Int(a.checked_mul(b).ok_or_else(overflow)?),
                (Value::Str(text), Value::Int(times)) | (Value::Int(times), Value::Str(text)) => {
                    let times = self.repeat_len(text.len(), times)?;
                    Value::Str(text.repeat(times))
                }
                (Value::List(items), Value::Int(times)) | (Value::Int(times), Value::List(items)) => {
                    let times = if items.is_empty() {
                        0
                    } else {
                        usize::try_from(times.max(0)).unwrap_or(usize::MAX)
                    };
                    self.guard.check(SandboxEvent::CollectionLen(
                        items.len().saturating_mul(times) as u64,
                    ))?;
                    let mut repeated = Vec::with_capacity(items.len().saturating_mul(times));
                    for _ in 0..times {
                        repeated.extend(items.iter().cloned());
                    }
                    Value::List(repeated)
                }
                (a, b) if a.is_number() && b.is_number() => Value::Float(a.as_f64()? * b.as_f64()?),
                (a, b) => return Err(type_error(&a, &b)),
            },
            BinaryOp::Div => {
                if !(lhs.is_number() && rhs.is_number()) {
                    return Err(type_error(&lhs, &rhs));
                }
                let divisor = rhs.as_f64()?;
                if divisor == 0.0 {
                    return Err(runtime_error("division by zero"));
                }
                Value::Float(lhs.as_f64()? / divisor)
            }
            BinaryOp::Rem => match (lhs, rhs) {
                (Value::Int(a), Value::Int(b)) => Value::Int(python_rem_i64(a, b)?),
                (a, b) if a.is_number() && b.is_number() => {
                    let (a, b) = (a.as_f64()?, b.as_f64()?);
                    if b == 0.0 {
                        return Err(runtime_error("float modulo by zero"));
                    }
                    let rem = a % b;
                    Value::Float(if rem != 0.0 && ((rem < 0.0) != (b < 0.0)) {
                        rem + b
                    } else {
                        rem
                    })
                }
                (a, b) => return Err(type_error(&a, &b)),
            },
        };
        sized(result, &mut self.guard)
    }
}
