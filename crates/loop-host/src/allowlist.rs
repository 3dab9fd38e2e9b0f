use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Builtins callable from programs when no override is configured.
pub const DEFAULT_BUILTINS: &[&str] = &[
    "str", "int", "float", "bool", "len", "lower", "upper", "strip", "split", "join", "contains",
    "starts_with", "ends_with", "replace", "find", "count", "isinstance", "type", "list", "dict",
    "set", "keys", "values", "items", "get", "append", "sorted", "reversed", "min", "max", "sum",
    "abs", "round", "any", "all", "range", "enumerate", "zip", "print",
];

/// Modules importable with `use` when no override is configured.
pub const DEFAULT_MODULES: &[&str] = &["re", "json", "math", "string", "datetime", "collections"];

/// Capabilities a program may reach: builtin names and importable modules.
///
/// Anything outside these sets fails the call with a capability error. The
/// list is plain data so deployments can narrow it from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityAllowList {
    #[serde(default = "default_builtins")]
    pub builtins: BTreeSet<String>,
    #[serde(default = "default_modules")]
    pub modules: BTreeSet<String>,
}

fn default_builtins() -> BTreeSet<String> {
    DEFAULT_BUILTINS.iter().map(|name| name.to_string()).collect()
}

fn default_modules() -> BTreeSet<String> {
    DEFAULT_MODULES.iter().map(|name| name.to_string()).collect()
}

impl Default for CapabilityAllowList {
    fn default() -> Self {
        Self {
            builtins: default_builtins(),
            modules: default_modules(),
        }
    }
}

impl CapabilityAllowList {
    pub fn allows_builtin(&self, name: &str) -> bool {
        self.builtins.contains(name)
    }

    pub fn allows_module(&self, name: &str) -> bool {
        self.modules.contains(name)
    }

    /// Removes a builtin from the list.
    pub fn without_builtin(mut self, name: &str) -> Self {
        self.builtins.remove(name);
        self
    }

    /// Removes a module from the list.
    pub fn without_module(mut self, name: &str) -> Self {
        self.modules.remove(name);
        self
    }
}
