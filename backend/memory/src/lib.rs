pub mod history;
pub mod sqlite_store;
pub mod store;

pub use history::{history_key, HistoryStore, DEFAULT_CHAT_WINDOW, MAX_HISTORY_ENTRIES};
pub use sqlite_store::SqliteStore;
pub use store::InMemoryStore;
