use std::collections::HashMap;
use std::sync::Arc;

use loop_core::errors::LoopError;
use loop_core::ids::ProgramId;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

/// Outcome of preparing one program, shared by every execution of it.
pub type Prepared<H> = Arc<Result<H, LoopError>>;

/// Prepared programs keyed by program id, owned by one executor.
///
/// Reads are concurrent. A miss takes the compile lock and re-checks, so
/// each id is prepared at most once; failures are cached like successes and
/// never retried. There is no eviction: [`CompiledCache::clear`] is the
/// only way to drop entries.
#[derive(Debug)]
pub struct CompiledCache<H> {
    entries: RwLock<HashMap<ProgramId, Prepared<H>>>,
    compile_lock: Mutex<()>,
}

impl<H> Default for CompiledCache<H> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            compile_lock: Mutex::new(()),
        }
    }
}

impl<H> CompiledCache<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ProgramId) -> Option<Prepared<H>> {
        self.entries.read().get(id).cloned()
    }

    /// Returns the cached outcome for `id`, running `prepare` on a miss.
    pub fn get_or_prepare<F>(&self, id: ProgramId, prepare: F) -> Prepared<H>
    where
        F: FnOnce() -> Result<H, LoopError>,
    {
        if let Some(hit) = self.get(&id) {
            return hit;
        }
        let _guard = self.compile_lock.lock();
        if let Some(hit) = self.get(&id) {
            return hit;
        }
        let outcome = Arc::new(prepare());
        if let Err(err) = outcome.as_ref() {
            debug!(program_id = %id, error = %err, "caching preparation failure");
        }
        self.entries.write().insert(id, Arc::clone(&outcome));
        outcome
    }

    pub fn contains(&self, id: &ProgramId) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
