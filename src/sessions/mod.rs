pub mod history;
pub mod manager;
pub mod store;
pub mod types;

pub use history::HistoryWindow;
pub use manager::SessionManager;
pub use store::{MemorySessionStore, SessionStore};
pub use types::{LastImage, Role, Turn, UserSession};
