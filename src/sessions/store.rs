use super::history::HistoryWindow;
use super::types::{LastImage, Role, Turn, UserSession};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Per-user conversation state. All operations are total: an unknown user is
/// not an error, it reads as the default state and is materialized lazily by
/// the mutation paths.
///
/// The last-image accessors here are raw state plumbing; timer scheduling and
/// file reclamation live in [`crate::media::MediaLifecycleManager`], and the
/// combined contract is exposed by [`crate::sessions::SessionManager`].
pub trait SessionStore: Send + Sync {
    fn get_or_create(&self, user_id: &str) -> UserSession;

    fn is_chat_enabled(&self, user_id: &str) -> bool;
    fn set_chat_enabled(&self, user_id: &str, enabled: bool);

    fn system_prompt(&self, user_id: &str) -> Option<String>;
    /// Overwrites. Blank prompts are rejected upstream by command parsing.
    fn set_system_prompt(&self, user_id: &str, prompt: &str);

    fn add_message(&self, user_id: &str, role: Role, content: &str);
    fn history(&self, user_id: &str, window: usize) -> Vec<Turn>;
    fn clear_history(&self, user_id: &str);

    fn set_last_image(&self, user_id: &str, image: LastImage);
    fn last_image(&self, user_id: &str) -> Option<LastImage>;
    /// Clears and returns the pending image, if any.
    fn take_last_image(&self, user_id: &str) -> Option<LastImage>;
}

/// In-memory store behind a coarse lock. Contention is low: handlers spend
/// their time awaiting model and transport I/O, never inside the store.
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, UserSession>>,
    window: HistoryWindow,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(max_history_size: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            window: HistoryWindow::new(max_history_size),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, UserSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_session<T>(&self, user_id: &str, f: impl FnOnce(&mut UserSession) -> T) -> T {
        let mut sessions = self.lock();
        let session = sessions
            .entry(user_id.to_string())
            .or_insert_with(|| UserSession::new(user_id));
        f(session)
    }
}

impl SessionStore for MemorySessionStore {
    fn get_or_create(&self, user_id: &str) -> UserSession {
        self.with_session(user_id, |session| session.clone())
    }

    fn is_chat_enabled(&self, user_id: &str) -> bool {
        // Unknown users read as the default without materializing a session.
        self.lock().get(user_id).is_none_or(|s| s.chat_enabled)
    }

    fn set_chat_enabled(&self, user_id: &str, enabled: bool) {
        self.with_session(user_id, |session| session.chat_enabled = enabled);
    }

    fn system_prompt(&self, user_id: &str) -> Option<String> {
        self.lock().get(user_id).and_then(|s| s.system_prompt.clone())
    }

    fn set_system_prompt(&self, user_id: &str, prompt: &str) {
        self.with_session(user_id, |session| {
            session.system_prompt = Some(prompt.to_string());
        });
    }

    fn add_message(&self, user_id: &str, role: Role, content: &str) {
        let window = self.window;
        self.with_session(user_id, |session| {
            window.append(&mut session.history, Turn::new(role, content));
        });
    }

    fn history(&self, user_id: &str, window: usize) -> Vec<Turn> {
        self.lock()
            .get(user_id)
            .map(|s| HistoryWindow::windowed_read(&s.history, window))
            .unwrap_or_default()
    }

    fn clear_history(&self, user_id: &str) {
        if let Some(session) = self.lock().get_mut(user_id) {
            session.history.clear();
        }
    }

    fn set_last_image(&self, user_id: &str, image: LastImage) {
        self.with_session(user_id, |session| session.last_image = Some(image));
    }

    fn last_image(&self, user_id: &str) -> Option<LastImage> {
        self.lock().get(user_id).and_then(|s| s.last_image.clone())
    }

    fn take_last_image(&self, user_id: &str) -> Option<LastImage> {
        self.lock()
            .get_mut(user_id)
            .and_then(|s| s.last_image.take())
    }
}
