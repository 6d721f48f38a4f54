//! Process-wide runtime: owns one cached `Store` handle per
//! repo id behind a double-checked-locking protocol, so concurrent
//! callers never open the same repo's database twice.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{OmniError, OmniResult};
use crate::store::{SqliteStore, Store};

static RUNTIME: RwLock<Option<Arc<Runtime>>> = RwLock::new(None);

/// Process-wide cache of open `Store` handles, one per repo id.
pub struct Runtime {
    stores: Mutex<HashMap<String, Arc<dyn Store>>>,
    closed: AtomicBool,
}

impl Runtime {
    fn new() -> Self {
        Self {
            stores: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Get or open the `Store` for `repo_id`, whose database lives at
    /// `db_path`. Uses double-checked locking: look up under the lock,
    /// release it to open the store (a potentially slow I/O operation),
    /// then re-acquire and either install the new handle or -- if a
    /// racing caller already installed one -- discard the duplicate and
    /// use theirs.
    pub fn get_or_open_store(&self, repo_id: &str, db_path: &Path) -> OmniResult<Arc<dyn Store>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(OmniError::RuntimeClosed);
        }

        if let Some(store) = self.stores.lock().get(repo_id) {
            return Ok(Arc::clone(store));
        }

        let opened: Arc<dyn Store> = Arc::new(SqliteStore::open(db_path)?);

        if self.closed.load(Ordering::SeqCst) {
            return Err(OmniError::RuntimeClosed);
        }

        let mut stores = self.stores.lock();
        let winner = stores.entry(repo_id.to_string()).or_insert_with(|| opened);
        Ok(Arc::clone(winner))
    }

    /// Mark the runtime closed. Existing `Store` handles already cloned
    /// out by callers remain valid; only new `get_or_open_store` calls
    /// are rejected.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.stores.lock().clear();
    }

    /// Number of repos with a currently cached store handle.
    pub fn open_repo_count(&self) -> usize {
        self.stores.lock().len()
    }
}

/// Get the process-wide runtime, creating it on first call.
pub fn global() -> Arc<Runtime> {
    if let Some(runtime) = RUNTIME.read().as_ref() {
        return Arc::clone(runtime);
    }

    let mut guard = RUNTIME.write();
    if let Some(runtime) = guard.as_ref() {
        return Arc::clone(runtime);
    }
    let runtime = Arc::new(Runtime::new());
    *guard = Some(Arc::clone(&runtime));
    runtime
}

/// Reset the process-wide runtime. Test-only: production callers never
/// need to tear down and recreate the singleton.
#[cfg(test)]
pub fn reset_for_tests() {
    *RUNTIME.write() = None;
}
