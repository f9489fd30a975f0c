//! Registry trait and in-memory store

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{RegistryError, RegistryResult, RegistrySnapshot};

/// Durable home of the block state and driver history
pub trait BlockRegistry: Send {
    fn load(&self) -> RegistryResult<RegistrySnapshot>;

    /// Persist the whole snapshot; must be all-or-nothing
    fn save(&self, snapshot: &RegistrySnapshot) -> RegistryResult<()>;

    /// Move an unreadable record aside so the next save starts clean.
    /// Returns where it went, if anything was moved.
    fn quarantine(&self) -> RegistryResult<Option<PathBuf>> {
        Ok(None)
    }
}

impl<R: BlockRegistry + ?Sized> BlockRegistry for Box<R> {
    fn load(&self) -> RegistryResult<RegistrySnapshot> {
        (**self).load()
    }

    fn save(&self, snapshot: &RegistrySnapshot) -> RegistryResult<()> {
        (**self).save(snapshot)
    }

    fn quarantine(&self) -> RegistryResult<Option<PathBuf>> {
        (**self).quarantine()
    }
}

/// Registry held in memory. Clones share contents, so tests can inspect
/// what the runtime saved.
#[derive(Clone, Debug, Default)]
pub struct MemoryRegistry {
    snapshot: Arc<Mutex<RegistrySnapshot>>,
    fail_saves: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: RegistrySnapshot) -> Self {
        MemoryRegistry {
            snapshot: Arc::new(Mutex::new(snapshot)),
            ..Default::default()
        }
    }

    /// Make subsequent saves fail (or succeed again)
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> RegistrySnapshot {
        self.snapshot.lock().clone()
    }
}

impl BlockRegistry for MemoryRegistry {
    fn load(&self) -> RegistryResult<RegistrySnapshot> {
        Ok(self.current())
    }

    fn save(&self, snapshot: &RegistrySnapshot) -> RegistryResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RegistryError::Rejected("memory registry set to fail".into()));
        }
        *self.snapshot.lock() = snapshot.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
