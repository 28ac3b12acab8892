//! Bounded per-character conversation history.
//!
//! Each character key owns one ordered log persisted as a JSON array under
//! `chatHistory_{key}`. Logs are cached after the first read; every append
//! rewrites the persisted array before returning.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, error, warn};

use focusmate_core::{ChatMessage, CompanionError, KeyValueStore, Role};

/// Oldest entries are evicted beyond this many messages.
pub const MAX_HISTORY_ENTRIES: usize = 50;

/// Number of recent messages sent along with a chat turn.
pub const DEFAULT_CHAT_WINDOW: usize = 10;

const HISTORY_KEY_PREFIX: &str = "chatHistory_";

/// Storage key for a character's history log.
pub fn history_key(character_key: &str) -> String {
    format!("{HISTORY_KEY_PREFIX}{character_key}")
}

pub struct HistoryStore {
    storage: Arc<dyn KeyValueStore>,
    cache: Mutex<HashMap<String, Vec<ChatMessage>>>,
    max_entries: usize,
}

impl HistoryStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_capacity(storage, MAX_HISTORY_ENTRIES)
    }

    /// A store evicting beyond `max_entries` (at least one).
    pub fn with_capacity(storage: Arc<dyn KeyValueStore>, max_entries: usize) -> Self {
        Self {
            storage,
            cache: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<String, Vec<ChatMessage>>> {
        // The cache is rebuilt from storage on demand, so a poisoned guard is still usable.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a message stamped with the current time.
    pub fn append(
        &self,
        character_key: &str,
        role: Role,
        content: &str,
    ) -> Result<ChatMessage, CompanionError> {
        self.append_at(character_key, role, content, Utc::now().timestamp_millis())
    }

    /// Append a message with an explicit millisecond timestamp.
    ///
    /// The entry stays in the in-memory log even when persisting fails; the
    /// storage error is returned so the caller can decide whether it matters.
    pub fn append_at(
        &self,
        character_key: &str,
        role: Role,
        content: &str,
        timestamp_ms: i64,
    ) -> Result<ChatMessage, CompanionError> {
        let message = ChatMessage::new(role, content, timestamp_ms);

        let mut cache = self.cache();
        let log = cache
            .entry(character_key.to_string())
            .or_insert_with(|| self.read_persisted(character_key));
        log.push(message.clone());
        if log.len() > self.max_entries {
            let overflow = log.len() - self.max_entries;
            log.drain(..overflow);
            debug!(character = %character_key, evicted = overflow, "History trimmed");
        }

        self.persist(character_key, log.as_slice())?;
        Ok(message)
    }

    /// Full log for a character, oldest first. Unreadable data yields an empty log.
    ///
    /// Only non-empty logs are cached, so reading an unknown key leaves no entry.
    pub fn load(&self, character_key: &str) -> Vec<ChatMessage> {
        let mut cache = self.cache();
        if let Some(log) = cache.get(character_key) {
            return log.clone();
        }
        let log = self.read_persisted(character_key);
        if !log.is_empty() {
            cache.insert(character_key.to_string(), log.clone());
        }
        log
    }

    /// The last `n` messages, oldest first.
    pub fn recent_window(&self, character_key: &str, n: usize) -> Vec<ChatMessage> {
        let log = self.load(character_key);
        let start = log.len().saturating_sub(n);
        log[start..].to_vec()
    }

    /// Empty the log for one character, in memory and in storage.
    ///
    /// The cached log is kept when storage refuses the removal.
    pub fn clear(&self, character_key: &str) -> Result<(), CompanionError> {
        let mut cache = self.cache();
        self.storage
            .remove(&history_key(character_key))
            .map_err(|e| CompanionError::Storage(e.to_string()))?;
        cache.remove(character_key);
        debug!(character = %character_key, "History cleared");
        Ok(())
    }

    #[cfg(test)]
    fn is_cached(&self, character_key: &str) -> bool {
        self.cache().contains_key(character_key)
    }

    fn read_persisted(&self, character_key: &str) -> Vec<ChatMessage> {
        let raw = match self.storage.get(&history_key(character_key)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!(character = %character_key, error = %e, "Failed to read history, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<ChatMessage>>(&raw) {
            Ok(mut log) => {
                if log.len() > self.max_entries {
                    let overflow = log.len() - self.max_entries;
                    log.drain(..overflow);
                }
                log
            }
            Err(e) => {
                error!(character = %character_key, error = %e, "Corrupt history data, starting empty");
                Vec::new()
            }
        }
    }

    fn persist(&self, character_key: &str, log: &[ChatMessage]) -> Result<(), CompanionError> {
        let raw = serde_json::to_string(log).map_err(|e| CompanionError::Storage(e.to_string()))?;
        self.storage
            .set(&history_key(character_key), &raw)
            .map_err(|e| {
                warn!(character = %character_key, error = %e, "Failed to persist history");
                CompanionError::Storage(e.to_string())
            })
    }
}
