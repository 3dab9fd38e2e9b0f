//! Sandboxed executor for generated Loopai programs.

mod allowlist;
mod backend;
mod cache;
mod executor;
mod sandbox;
pub mod script;

pub use allowlist::{CapabilityAllowList, DEFAULT_BUILTINS, DEFAULT_MODULES};
pub use backend::{SandboxBackend, ScriptBackend};
pub use cache::{CompiledCache, Prepared};
pub use executor::{extract_text, ProgramExecutor, FALLBACK_KEY, TEXT_KEY};
pub use sandbox::{
    run_on_worker, SandboxCaps, SandboxDecision, SandboxEvent, SandboxGuard, WORKER_STACK_BYTES,
};
pub use script::complexity::estimate as estimate_complexity;
