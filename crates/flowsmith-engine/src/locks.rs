use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per artifact path, so rewrites of the same file are
/// serialized within the process
#[derive(Debug, Clone, Default)]
pub struct PathLocks {
    locks: Arc<Mutex<HashMap<Utf8PathBuf, Arc<AsyncMutex<()>>>>>,
}

impl PathLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `path`; released when the guard drops
    pub async fn lock(&self, path: &Utf8Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(path.to_path_buf()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
