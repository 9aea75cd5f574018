use super::store::{MemorySessionStore, SessionStore};
use super::types::{Role, Turn};
use crate::media::MediaLifecycleManager;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Facade over the session store and the media lifecycle manager.
///
/// Constructed once at startup and passed by handle into every flow; there is
/// no ambient global session table.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    media: Arc<MediaLifecycleManager>,
}

impl SessionManager {
    #[must_use]
    pub fn new(max_history_size: usize) -> Self {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(max_history_size));
        let media = MediaLifecycleManager::new(store.clone());
        Self { store, media }
    }

    // ── Config operations ────────────────────────────────────────

    pub fn is_chat_enabled(&self, user_id: &str) -> bool {
        self.store.is_chat_enabled(user_id)
    }

    pub fn set_chat_enabled(&self, user_id: &str, enabled: bool) {
        self.store.set_chat_enabled(user_id, enabled);
    }

    pub fn system_prompt(&self, user_id: &str) -> Option<String> {
        self.store.system_prompt(user_id)
    }

    pub fn set_system_prompt(&self, user_id: &str, prompt: &str) {
        self.store.set_system_prompt(user_id, prompt);
    }

    /// Clears history and any pending image (cancelling its timer and
    /// deleting the file). The prompt override and enabled flag survive.
    pub fn reset_chat(&self, user_id: &str) {
        self.media.cancel_and_delete(user_id);
        self.store.clear_history(user_id);
    }

    // ── History ──────────────────────────────────────────────────

    pub fn add_message(&self, user_id: &str, role: Role, content: &str) {
        self.store.add_message(user_id, role, content);
    }

    /// Record one exchange, user turn before assistant turn.
    pub fn record_turn(&self, user_id: &str, user_message: &str, assistant_response: &str) {
        self.store.add_message(user_id, Role::User, user_message);
        self.store
            .add_message(user_id, Role::Assistant, assistant_response);
    }

    pub fn history(&self, user_id: &str, window: usize) -> Vec<Turn> {
        self.store.history(user_id, window)
    }

    // ── Transient media ──────────────────────────────────────────

    pub fn set_last_image(&self, user_id: &str, path: impl Into<PathBuf>, ttl: Duration) {
        self.media.register(user_id, path, ttl);
    }

    pub fn last_image(&self, user_id: &str) -> Option<PathBuf> {
        self.media.query(user_id)
    }

    pub fn remove_last_image(&self, user_id: &str) {
        self.media.cancel_and_delete(user_id);
    }

    /// Fire-and-forget reclamation for files with no follow-up window.
    pub fn schedule_media_cleanup(&self, path: &Path, ttl: Duration) {
        self.media.schedule_cleanup(path, ttl);
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::SessionManager;
    use crate::sessions::types::Role;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn record_turn_appends_user_then_assistant() {
        let manager = SessionManager::new(50);

        manager.record_turn("u1", "hola", "buenas");

        let history = manager.history("u1", 10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "hola");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "buenas");
    }

    #[tokio::test(start_paused = true)]
    async fn reset_chat_clears_history_and_image_but_not_config() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("a.jpg");
        fs::write(&image, b"img").unwrap();

        let manager = SessionManager::new(50);
        manager.set_chat_enabled("u1", false);
        manager.set_system_prompt("u1", "custom");
        manager.record_turn("u1", "hola", "buenas");
        manager.set_last_image("u1", &image, Duration::from_secs(300));

        manager.reset_chat("u1");

        assert!(manager.history("u1", 10).is_empty());
        assert!(manager.last_image("u1").is_none());
        assert!(!image.exists());
        assert!(!manager.is_chat_enabled("u1"));
        assert_eq!(manager.system_prompt("u1").as_deref(), Some("custom"));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_last_image_is_idempotent() {
        let manager = SessionManager::new(50);
        manager.remove_last_image("u1");
        manager.remove_last_image("u1");
        assert!(manager.last_image("u1").is_none());
    }
}
