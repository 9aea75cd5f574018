use crate::sessions::store::SessionStore;
use crate::sessions::types::LastImage;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct PendingExpiry {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Reclaims transient media: each registered image gets a one-shot expiry
/// timer whose handle is kept alongside the registration, so replacement and
/// cancellation are explicit operations instead of dangling closures.
///
/// Per-user state machine: `NoImage -> PendingExpiry -> NoImage`, with
/// replacement re-entering `PendingExpiry`. At most one pending timer exists
/// per user; registering again aborts the old timer before arming the new one.
pub struct MediaLifecycleManager {
    store: Arc<dyn SessionStore>,
    pending: Mutex<HashMap<String, PendingExpiry>>,
    generations: AtomicU64,
}

impl MediaLifecycleManager {
    pub fn new(store: Arc<dyn SessionStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            pending: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
        })
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, PendingExpiry>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `path` as the user's current image and schedule its deletion
    /// after `ttl`. Any prior pending expiry for this user is aborted before
    /// the new timer is armed; the superseded file is left for its explicit
    /// removal paths (lazy policy: a cancelled timer never fires).
    pub fn register(self: &Arc<Self>, user_id: &str, path: impl Into<PathBuf>, ttl: Duration) {
        let path = path.into();
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;

        let mut pending = self.lock_pending();
        if let Some(prev) = pending.remove(user_id) {
            prev.handle.abort();
        }

        // Out-of-range TTLs saturate to the far future instead of panicking.
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);
        self.store.set_last_image(
            user_id,
            LastImage {
                path: path.clone(),
                expires_at,
            },
        );

        let manager = Arc::clone(self);
        let user = user_id.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            manager.expire(&user, generation);
        });
        pending.insert(user_id.to_string(), PendingExpiry { generation, handle });
    }

    /// Pure read: the path while a registration is pending, without extending
    /// its TTL. Never exposes an image whose deletion already triggered.
    pub fn query(&self, user_id: &str) -> Option<PathBuf> {
        self.store
            .last_image(user_id)
            .filter(|image| image.expires_at > Utc::now())
            .map(|image| image.path)
    }

    /// Cancel the pending timer, clear the registration and delete the file
    /// now. Idempotent: calling it with nothing pending is a no-op, and a
    /// file that is already gone is not a failure.
    pub fn cancel_and_delete(&self, user_id: &str) {
        // The pending lock is held across the take: a concurrent `register`
        // cannot slip a fresh image in between the cancel and the delete.
        let mut pending = self.lock_pending();
        if let Some(prev) = pending.remove(user_id) {
            prev.handle.abort();
        }
        if let Some(image) = self.store.take_last_image(user_id) {
            remove_file_best_effort(&image.path);
        }
    }

    /// Schedule deletion of a file with no session registration attached.
    /// Used for voice notes: transcribed immediately, never re-queried, so
    /// there is nothing to supersede or cancel.
    pub fn schedule_cleanup(&self, path: impl Into<PathBuf>, ttl: Duration) {
        let path = path.into();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            remove_file_best_effort(&path);
        });
    }

    /// Timer body. The generation check guards the cancel-then-fire race: a
    /// timer that was superseded or cancelled after scheduling is a silent
    /// no-op. Check, take and delete happen under the pending lock so a
    /// `register` racing the firing cannot arm a new image in between and
    /// have it destroyed (lock order pending -> store, same as `register`).
    fn expire(&self, user_id: &str, generation: u64) {
        let mut pending = self.lock_pending();
        match pending.get(user_id) {
            Some(entry) if entry.generation == generation => {
                pending.remove(user_id);
            }
            _ => return,
        }

        let Some(image) = self.store.take_last_image(user_id) else {
            return;
        };
        debug!(user = user_id, path = %image.path.display(), "image TTL expired");
        remove_file_best_effort(&image.path);
    }
}

/// Deletion failures are logged and absorbed: a missing file on delete is not
/// a failure condition, and nothing here is worth surfacing to the user.
fn remove_file_best_effort(path: &Path) {
    if let Err(error) = std::fs::remove_file(path) {
        warn!(path = %path.display(), %error, "could not delete media file");
    }
}

#[cfg(test)]
mod tests {
    use super::MediaLifecycleManager;
    use crate::sessions::store::{MemorySessionStore, SessionStore};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<MemorySessionStore>, Arc<MediaLifecycleManager>) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemorySessionStore::new(50));
        let manager = MediaLifecycleManager::new(store.clone());
        (dir, store, manager)
    }

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"fake media").unwrap();
        path
    }

    async fn settle() {
        // Let spawned expiry tasks run after virtual time advances.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_clears_session_and_deletes_file() {
        let (dir, store, manager) = setup();
        let path = touch(&dir, "a.jpg");

        manager.register("u1", &path, Duration::from_secs(5));
        assert_eq!(manager.query("u1"), Some(path.clone()));

        tokio::time::sleep(Duration::from_secs(6)).await;
        settle().await;

        assert!(manager.query("u1").is_none());
        assert!(store.last_image("u1").is_none());
        assert!(!path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn replacement_cancels_prior_timer() {
        let (dir, _store, manager) = setup();
        let a = touch(&dir, "a.jpg");
        let b = touch(&dir, "b.jpg");

        // A at t=0 with TTL 5, queried at t=3, superseded by B at t=4.
        manager.register("u1", &a, Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(manager.query("u1"), Some(a.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        manager.register("u1", &b, Duration::from_secs(5));

        // t=6: A's original deadline passed, but its timer was cancelled.
        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(manager.query("u1"), Some(b.clone()));
        assert!(a.exists(), "superseded file must not be deleted lazily");

        // t=9: B expires five units after its own registration.
        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;
        assert!(manager.query("u1").is_none());
        assert!(!b.exists());
        assert!(a.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_and_delete_is_idempotent() {
        let (dir, _store, manager) = setup();
        let path = touch(&dir, "a.jpg");

        manager.register("u1", &path, Duration::from_secs(300));
        manager.cancel_and_delete("u1");
        assert!(!path.exists());
        assert!(manager.query("u1").is_none());

        // Second call: nothing pending, nothing to delete, no panic.
        manager.cancel_and_delete("u1");

        // The cancelled timer never fires.
        tokio::time::sleep(Duration::from_secs(301)).await;
        settle().await;
        assert!(manager.query("u1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_missing_file_is_not_an_error() {
        let (dir, _store, manager) = setup();
        let path = dir.path().join("never-created.jpg");

        manager.register("u1", &path, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;

        assert!(manager.query("u1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_body_never_touches_a_newer_registration() {
        let (dir, _store, manager) = setup();
        let a = touch(&dir, "a.jpg");
        let b = touch(&dir, "b.jpg");

        manager.register("u1", &a, Duration::from_secs(5));
        manager.register("u1", &b, Duration::from_secs(5));

        // A timer body firing for the superseded registration must be a
        // no-op even though its own pending entry is already gone.
        manager.expire("u1", 1);
        assert_eq!(manager.query("u1"), Some(b.clone()));
        assert!(b.exists());

        // Only the current generation may clear and delete.
        manager.expire("u1", 2);
        assert!(manager.query("u1").is_none());
        assert!(!b.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_ttl_saturates_instead_of_panicking() {
        let (dir, _store, manager) = setup();
        let path = touch(&dir, "a.jpg");

        manager.register("u1", &path, Duration::from_secs(u64::MAX));

        assert_eq!(manager.query("u1"), Some(path.clone()));
        assert!(path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn registrations_are_independent_per_user() {
        let (dir, _store, manager) = setup();
        let a = touch(&dir, "a.jpg");
        let b = touch(&dir, "b.jpg");

        manager.register("u1", &a, Duration::from_secs(1));
        manager.register("u2", &b, Duration::from_secs(300));

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;

        assert!(manager.query("u1").is_none());
        assert_eq!(manager.query("u2"), Some(b.clone()));
        assert!(!a.exists());
        assert!(b.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_cleanup_removes_untracked_file() {
        let (dir, _store, manager) = setup();
        let path = touch(&dir, "voice.ogg");

        manager.schedule_cleanup(&path, Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(61)).await;
        settle().await;

        assert!(!path.exists());
    }
}
