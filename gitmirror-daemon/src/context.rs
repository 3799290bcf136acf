//! Per-mirror state shared by one detector and one watcher.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use gitmirror_core::{RepositoryMirror, SyncCredential, SyncSettings};

/// Everything a mirror's two tasks need; cheap to clone.
///
/// With `exclusive_sync` enabled both clones share one advisory lock, which the
/// detector holds across clone/pull and the watcher across its whole sync
/// sequence. Without it, [`MirrorContext::exclusive`] is a no-op.
#[derive(Debug, Clone)]
pub struct MirrorContext {
    pub mirror: Arc<RepositoryMirror>,
    pub settings: Arc<SyncSettings>,
    lock: Option<Arc<Mutex<()>>>,
}

impl MirrorContext {
    pub fn new(mirror: RepositoryMirror, settings: Arc<SyncSettings>) -> Self {
        let lock = settings.exclusive_sync.then(|| Arc::new(Mutex::new(())));
        Self {
            mirror: Arc::new(mirror),
            settings,
            lock,
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.mirror.local_path
    }

    pub fn credential(&self) -> Option<&SyncCredential> {
        self.settings.credential.as_ref()
    }

    /// Acquire the working-copy lock when exclusive sync is enabled.
    pub async fn exclusive(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::{mirror, settings};

    #[tokio::test]
    async fn lock_is_shared_between_clones_only_when_exclusive() {
        let shared = MirrorContext::new(
            mirror("/data/widgets", Duration::from_secs(60), Duration::from_secs(30)),
            Arc::new(settings(true, true)),
        );
        let other = shared.clone();
        let guard = shared.exclusive().await;
        assert!(guard.is_some());
        assert!(other.lock.as_ref().expect("lock").try_lock().is_err());
        drop(guard);
        assert!(other.lock.as_ref().expect("lock").try_lock().is_ok());

        let relaxed = MirrorContext::new(
            mirror("/data/widgets", Duration::from_secs(60), Duration::from_secs(30)),
            Arc::new(settings(true, false)),
        );
        assert!(relaxed.exclusive().await.is_none());
    }
}
