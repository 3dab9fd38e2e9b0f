//! `loopscript`: the small dynamically-typed language generated programs are
//! written in.
//!
//! A program is a sequence of `use`, `let` and `fn` items plus ordinary
//! statements. Functions are hoisted; everything else runs on every call,
//! so globals never leak between executions. The entry point is
//! `fn classify(text)`:
//!
//! ```text
//! use re
//! let keywords = ["buy", "free", "winner"]
//!
//! fn classify(text) {
//!     let lowered = text.lower()
//!     for word in keywords {
//!         if word in lowered { return "spam" }
//!     }
//!     if re.is_match("\\$\\d+", text) { return "spam" }
//!     return "ham"
//! }
//! ```

mod ast;
mod builtins;
pub mod complexity;
mod interp;
pub mod lexer;
mod modules;
mod parser;
mod value;

use loop_core::errors::LoopError;

use crate::allowlist::CapabilityAllowList;
use crate::sandbox::{run_on_worker, SandboxCaps};

pub use modules::AVAILABLE_MODULES;
pub use value::Value;

/// Language token accepted in `ProgramArtifact::language`.
pub const LANGUAGE: &str = "loopscript";

/// Name of the function every program must define.
pub const ENTRY_POINT: &str = "classify";

/// A parsed program ready to run any number of times, from any thread.
#[derive(Debug)]
pub struct CompiledScript {
    program: ast::Program,
    regexes: modules::RegexCache,
}

impl CompiledScript {
    /// Parses `source` on a sandbox worker thread. Syntax errors are
    /// `Compilation` errors.
    pub fn compile(source: &str) -> Result<Self, LoopError> {
        let program = run_on_worker(|| parser::parse(source))?;
        Ok(Self {
            program,
            regexes: modules::RegexCache::default(),
        })
    }

    pub fn has_entry_point(&self) -> bool {
        self.program.functions.contains_key(ENTRY_POINT)
    }

    /// Names of the functions the program defines, sorted.
    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.program.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Runs the program on `text` on a sandbox worker thread and returns
    /// the raw result value.
    pub fn call(
        &self,
        allow: &CapabilityAllowList,
        caps: SandboxCaps,
        text: &str,
    ) -> Result<Value, LoopError> {
        run_on_worker(|| interp::run(&self.program, allow, &self.regexes, caps, text))
    }

    /// Runs the program on `text` and stringifies the result.
    pub fn run(
        &self,
        allow: &CapabilityAllowList,
        caps: SandboxCaps,
        text: &str,
    ) -> Result<String, LoopError> {
        run_on_worker(|| {
            interp::run(&self.program, allow, &self.regexes, caps, text).map(|value| value.to_string())
        })
    }
}
