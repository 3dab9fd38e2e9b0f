//! The sandboxed executor: runs one program artifact on one input and
//! captures every outcome in an [`ExecutionRecord`].

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use loop_core::errors::{ErrorInfo, LoopError};
use loop_core::ids::TaskId;
use loop_core::{ExecutionRecord, ProgramArtifact};
use serde_json::{Map, Value};
use tracing::debug;

use crate::allowlist::CapabilityAllowList;
use crate::backend::{SandboxBackend, ScriptBackend};
use crate::cache::{CompiledCache, Prepared};
use crate::sandbox::SandboxCaps;

/// Input key read first when extracting the program argument.
pub const TEXT_KEY: &str = "text";
/// Input key read when [`TEXT_KEY`] is absent.
pub const FALLBACK_KEY: &str = "input";

/// Extracts the program argument from an input payload.
///
/// Precedence: `input["text"]`, then `input["input"]`, then the whole map
/// as compact JSON. String values pass through verbatim; other JSON values
/// are passed as their compact JSON text.
pub fn extract_text(input: &Map<String, Value>) -> String {
    let selected = input.get(TEXT_KEY).or_else(|| input.get(FALLBACK_KEY));
    match selected {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => Value::Object(input.clone()).to_string(),
    }
}

/// Runs program artifacts through a [`SandboxBackend`], caching the prepared
/// form per program id.
///
/// `execute` never returns an error and never panics: preparation failures,
/// capability violations, runtime errors, timeouts and a missing entry point
/// all become terminal records without output.
pub struct ProgramExecutor<B: SandboxBackend = ScriptBackend> {
    backend: B,
    cache: CompiledCache<B::Handle>,
    caps: SandboxCaps,
}

impl<B: SandboxBackend> fmt::Debug for ProgramExecutor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramExecutor")
            .field("language", &self.backend.language())
            .field("cached_programs", &self.cache.len())
            .field("caps", &self.caps)
            .finish()
    }
}

impl ProgramExecutor<ScriptBackend> {
    /// `loopscript` executor with the default allow-list.
    pub fn new(caps: SandboxCaps) -> Self {
        Self::with_backend(ScriptBackend::default(), caps)
    }

    /// `loopscript` executor with a custom allow-list.
    pub fn with_allow_list(caps: SandboxCaps, allow_list: CapabilityAllowList) -> Self {
        Self::with_backend(ScriptBackend::new(allow_list), caps)
    }
}

impl<B: SandboxBackend> ProgramExecutor<B> {
    pub fn with_backend(backend: B, caps: SandboxCaps) -> Self {
        Self {
            backend,
            cache: CompiledCache::new(),
            caps,
        }
    }

    pub fn caps(&self) -> SandboxCaps {
        self.caps
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn cache(&self) -> &CompiledCache<B::Handle> {
        &self.cache
    }

    /// Prepares `program` (or returns the cached outcome).
    pub fn prepare(&self, program: &ProgramArtifact) -> Prepared<B::Handle> {
        self.cache.get_or_prepare(program.id, || {
            if !program.language.eq_ignore_ascii_case(self.backend.language()) {
                return Err(LoopError::Compilation(
                    ErrorInfo::new(
                        "loop_host.unsupported_language",
                        format!("unsupported language '{}'", program.language),
                    )
                    .with_context("program_id", program.id.to_string())
                    .with_hint(format!("this executor runs '{}'", self.backend.language())),
                ));
            }
            self.backend.prepare(&program.code).map_err(|mut err| {
                err.info_mut()
                    .context
                    .insert("program_id".to_string(), program.id.to_string());
                err
            })
        })
    }

    /// Runs `program` on `input` and returns the terminal record.
    pub fn execute(
        &self,
        program: &ProgramArtifact,
        input: &Map<String, Value>,
        task_id: TaskId,
    ) -> ExecutionRecord {
        let started = Instant::now();
        let text = extract_text(input);
        let prepared = self.prepare(program);
        let outcome = match prepared.as_ref() {
            Ok(handle) => self.run_isolated(handle, &text),
            Err(err) => Err(err.clone()),
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        match outcome {
            Ok(output) => {
                debug!(
                    program_id = %program.id,
                    version = program.version,
                    latency_ms,
                    "execution succeeded"
                );
                ExecutionRecord::success(program.id, task_id, input.clone(), output, latency_ms)
            }
            Err(err) => {
                debug!(
                    program_id = %program.id,
                    version = program.version,
                    family = err.family(),
                    error = %err,
                    latency_ms,
                    "execution failed"
                );
                ExecutionRecord::failure(program.id, task_id, input.clone(), &err, latency_ms)
            }
        }
    }

    fn run_isolated(&self, handle: &B::Handle, text: &str) -> Result<String, LoopError> {
        panic::catch_unwind(AssertUnwindSafe(|| {
            self.backend.run(handle, text, &self.caps)
        }))
        .unwrap_or_else(|_| {
            Err(LoopError::Runtime(ErrorInfo::new(
                "loop_host.panic",
                "program execution aborted unexpectedly",
            )))
        })
    }
}
