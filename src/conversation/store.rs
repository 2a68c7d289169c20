//! Conversation history storage
//!
//! Histories live for the life of the process. There is no eviction and no
//! size cap; each active user grows their own history without bound.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use super::ChatMessage;

/// Backing store for per-user conversation histories
///
/// Every history starts with the store's system message. Implementations
/// must keep that message first and never insert it twice.
pub trait ConversationStore: Send + Sync {
    /// Create the seeded history for `user_id` if absent
    ///
    /// Returns true when a new history was created.
    fn ensure(&self, user_id: &str) -> bool;

    /// Append a message, seeding the history first if needed
    fn append(&self, user_id: &str, message: ChatMessage);

    /// Snapshot of the user's history (empty if unknown)
    fn history(&self, user_id: &str) -> Vec<ChatMessage>;

    /// Number of messages stored for the user
    fn len(&self, user_id: &str) -> usize {
        self.history(user_id).len()
    }
}

/// In-memory conversation store
#[derive(Debug)]
pub struct MemoryStore {
    system_prompt: String,
    histories: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl MemoryStore {
    /// Create an empty store seeding new histories with `system_prompt`
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            histories: RwLock::new(HashMap::new()),
        }
    }

    /// Number of users with a history
    pub fn user_count(&self) -> usize {
        self.histories.read().len()
    }

    fn seed(&self) -> Vec<ChatMessage> {
        vec![ChatMessage::system(&self.system_prompt)]
    }
}

impl ConversationStore for MemoryStore {
    fn ensure(&self, user_id: &str) -> bool {
        let mut histories = self.histories.write();
        if histories.contains_key(user_id) {
            return false;
        }
        debug!("Creating conversation history for user {}", user_id);
        histories.insert(user_id.to_string(), self.seed());
        true
    }

    fn append(&self, user_id: &str, message: ChatMessage) {
        let mut histories = self.histories.write();
        histories
            .entry(user_id.to_string())
            .or_insert_with(|| self.seed())
            .push(message);
    }

    fn history(&self, user_id: &str) -> Vec<ChatMessage> {
        self.histories
            .read()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    fn len(&self, user_id: &str) -> usize {
        self.histories.read().get(user_id).map_or(0, Vec::len)
    }
}
