use std::thread;
use std::time::{Duration, Instant};

use loop_core::errors::{ErrorInfo, LoopError};
use serde::{Deserialize, Serialize};

/// Resource bounds enforced on one program call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxCaps {
    /// Wall-clock bound in milliseconds.
    pub wall_ms: u64,
    /// Interpreter steps (statements and loop iterations).
    pub max_steps: u64,
    /// Nested program function calls.
    pub max_call_depth: u64,
    /// Elements in a single list or map.
    pub max_collection_len: u64,
    /// Bytes in a single string.
    pub max_string_len: u64,
    /// Lists and maps nested inside one another.
    #[serde(default = "default_max_value_depth")]
    pub max_value_depth: u64,
}

fn default_max_value_depth() -> u64 {
    SandboxCaps::default().max_value_depth
}

/// Stack reserved for the thread a program is parsed or run on.
pub const WORKER_STACK_BYTES: usize = 32 * 1024 * 1024;

/// Runs `task` on a fresh thread with a [`WORKER_STACK_BYTES`] stack and
/// waits for it. A panic on the worker becomes a `Runtime` error.
pub fn run_on_worker<T, F>(task: F) -> Result<T, LoopError>
where
    T: Send,
    F: FnOnce() -> Result<T, LoopError> + Send,
{
    thread::scope(|scope| {
        let worker = thread::Builder::new()
            .name("loop-sandbox".to_string())
            .stack_size(WORKER_STACK_BYTES)
            .spawn_scoped(scope, task)
            .map_err(|err| {
                LoopError::Runtime(ErrorInfo::new("loop_host.worker_spawn", err.to_string()))
            })?;
        worker.join().unwrap_or_else(|_| {
            Err(LoopError::Runtime(ErrorInfo::new(
                "loop_host.panic",
                "program execution aborted unexpectedly",
            )))
        })
    })
}

impl SandboxCaps {
    /// Default caps with the given wall-clock bound.
    pub fn with_wall_ms(wall_ms: u64) -> Self {
        Self {
            wall_ms,
            ..Self::default()
        }
    }

    /// Generous caps for tooling that runs trusted fixtures.
    pub fn relaxed() -> Self {
        Self {
            wall_ms: 60_000,
            max_steps: 500_000_000,
            max_call_depth: 256,
            max_collection_len: 10_000_000,
            max_string_len: 100_000_000,
            max_value_depth: 256,
        }
    }
}

impl Default for SandboxCaps {
    fn default() -> Self {
        Self {
            wall_ms: 1_000,
            max_steps: 5_000_000,
            max_call_depth: 64,
            max_collection_len: 100_000,
            max_string_len: 1_000_000,
            max_value_depth: 64,
        }
    }
}

/// Observation reported by the interpreter to its guard.
#[derive(Debug, Clone, PartialEq)]
pub enum SandboxEvent {
    /// Total steps executed so far.
    Steps(u64),
    /// Current program call depth.
    CallDepth(u64),
    /// Length of a freshly built collection.
    CollectionLen(u64),
    /// Length of a freshly built string, or of one about to be built.
    StringLen(u64),
    /// Container nesting depth of a freshly built list or map.
    ValueDepth(u64),
    /// Elapsed wall time in milliseconds.
    WallMs(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SandboxDecision {
    Continue,
    Exceeded {
        resource: &'static str,
        limit: u64,
        observed: u64,
    },
}

/// How often (in steps) the guard samples the wall clock.
const WALL_CHECK_INTERVAL: u64 = 64;

/// Cooperative guard ticked by the interpreter.
#[derive(Debug)]
pub struct SandboxGuard {
    caps: SandboxCaps,
    start: Instant,
    steps: u64,
    last_decision: SandboxDecision,
}

impl SandboxGuard {
    pub fn new(caps: SandboxCaps) -> Self {
        Self {
            caps,
            start: Instant::now(),
            steps: 0,
            last_decision: SandboxDecision::Continue,
        }
    }

    pub fn caps(&self) -> SandboxCaps {
        self.caps
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn observe(&mut self, event: SandboxEvent) -> SandboxDecision {
        let decision = match event {
            SandboxEvent::Steps(value) if value > self.caps.max_steps => {
                SandboxDecision::Exceeded {
                    resource: "steps",
                    limit: self.caps.max_steps,
                    observed: value,
                }
            }
            SandboxEvent::CallDepth(value) if value > self.caps.max_call_depth => {
                SandboxDecision::Exceeded {
                    resource: "call_depth",
                    limit: self.caps.max_call_depth,
                    observed: value,
                }
            }
            SandboxEvent::CollectionLen(value) if value > self.caps.max_collection_len => {
                SandboxDecision::Exceeded {
                    resource: "collection_len",
                    limit: self.caps.max_collection_len,
                    observed: value,
                }
            }
            SandboxEvent::StringLen(value) if value > self.caps.max_string_len => {
                SandboxDecision::Exceeded {
                    resource: "string_len",
                    limit: self.caps.max_string_len,
                    observed: value,
                }
            }
            SandboxEvent::ValueDepth(value) if value > self.caps.max_value_depth => {
                SandboxDecision::Exceeded {
                    resource: "value_depth",
                    limit: self.caps.max_value_depth,
                    observed: value,
                }
            }
            SandboxEvent::WallMs(value) if value > self.caps.wall_ms => SandboxDecision::Exceeded {
                resource: "wall",
                limit: self.caps.wall_ms,
                observed: value,
            },
            _ => SandboxDecision::Continue,
        };
        self.last_decision = decision.clone();
        decision
    }

    pub fn last_decision(&self) -> &SandboxDecision {
        &self.last_decision
    }

    pub fn ensure_within(&self) -> Result<(), LoopError> {
        match &self.last_decision {
            SandboxDecision::Continue => Ok(()),
            SandboxDecision::Exceeded {
                resource: "wall",
                limit,
                observed,
            } => Err(LoopError::Timeout(
                ErrorInfo::new(
                    "loop_host.timeout",
                    format!("execution exceeded {limit} ms (observed {observed} ms)"),
                )
                .with_context("timeout_ms", limit.to_string()),
            )),
            SandboxDecision::Exceeded {
                resource,
                limit,
                observed,
            } => Err(LoopError::Runtime(
                ErrorInfo::new(
                    "loop_host.sandbox_limit",
                    format!("sandbox exceeded {resource} limit {limit} with observed {observed}"),
                )
                .with_context("resource", *resource),
            )),
        }
    }

    /// Counts one step; samples the wall clock every few steps.
    pub fn tick(&mut self) -> Result<(), LoopError> {
        self.steps += 1;
        self.check(SandboxEvent::Steps(self.steps))?;
        if self.steps % WALL_CHECK_INTERVAL == 0 {
            self.check_wall()?;
        }
        Ok(())
    }

    /// Checks the wall clock unconditionally.
    pub fn check_wall(&mut self) -> Result<(), LoopError> {
        let elapsed = u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.check(SandboxEvent::WallMs(elapsed))
    }

    /// Observes `event` and converts an exceeded cap into an error.
    pub fn check(&mut self, event: SandboxEvent) -> Result<(), LoopError> {
        match self.observe(event) {
            SandboxDecision::Continue => Ok(()),
            SandboxDecision::Exceeded { .. } => self.ensure_within(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
