use loop_core::errors::{ErrorInfo, LoopError};

use crate::allowlist::CapabilityAllowList;
use crate::sandbox::SandboxCaps;
use crate::script::{CompiledScript, LANGUAGE};

/// Isolation mechanism that prepares program source once and runs the
/// prepared form many times.
///
/// Implementations must turn every program failure into a [`LoopError`]
/// of one of the execution families; they must not panic or block past
/// `caps.wall_ms`.
pub trait SandboxBackend: Send + Sync {
    /// Prepared form of a program, shared across threads.
    type Handle: Send + Sync;

    /// Language token this backend executes.
    fn language(&self) -> &str;

    /// Parses or compiles `source`.
    fn prepare(&self, source: &str) -> Result<Self::Handle, LoopError>;

    /// Runs the entry point of `handle` on `input`, returning the
    /// stringified result.
    fn run(&self, handle: &Self::Handle, input: &str, caps: &SandboxCaps)
        -> Result<String, LoopError>;
}

/// In-process `loopscript` interpreter behind a capability allow-list.
#[derive(Debug, Clone, Default)]
pub struct ScriptBackend {
    allow_list: CapabilityAllowList,
}

impl ScriptBackend {
    pub fn new(allow_list: CapabilityAllowList) -> Self {
        Self { allow_list }
    }

    pub fn allow_list(&self) -> &CapabilityAllowList {
        &self.allow_list
    }
}

impl SandboxBackend for ScriptBackend {
    type Handle = CompiledScript;

    fn language(&self) -> &str {
        LANGUAGE
    }

    fn prepare(&self, source: &str) -> Result<CompiledScript, LoopError> {
        if source.trim().is_empty() {
            return Err(LoopError::Compilation(ErrorInfo::new(
                "loop_host.empty_source",
                "program source is empty",
            )));
        }
        CompiledScript::compile(source)
    }

    fn run(
        &self,
        handle: &CompiledScript,
        input: &str,
        caps: &SandboxCaps,
    ) -> Result<String, LoopError> {
        handle.run(&self.allow_list, *caps, input)
    }
}
