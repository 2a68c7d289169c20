//! Per-user conversation history
//!
//! Provides:
//! - Role-tagged chat messages
//! - A pluggable history store (in-memory by default)
//! - Per-user locks serialising history mutation

mod locks;
mod message;
mod store;

pub use locks::UserLocks;
pub use message::{ChatMessage, Role};
pub use store::{ConversationStore, MemoryStore};
