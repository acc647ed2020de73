//! Per-user conversation sessions.
//!
//! Each user gets an ordered history of system/user/assistant entries,
//! created lazily on their first non-keyword message and kept for the
//! lifetime of the process. History is bounded per session (newest 50
//! entries); the set of tracked users is not bounded.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Maximum entries kept per session. Once exceeded, the oldest entries
/// are dropped — including, eventually, the system seed.
pub const MAX_ENTRIES: usize = 50;

/// Role of a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System persona/instructions
    System,
    /// User message
    User,
    /// Assistant (AI) response
    Assistant,
}

impl Role {
    /// Wire representation used by chat-completion APIs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single entry in a conversation session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub role: Role,
    pub text: String,
}

impl Entry {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// Ordered conversation history for one user.
#[derive(Debug, Clone)]
pub struct Session {
    entries: Vec<Entry>,
}

impl Session {
    /// Create a session seeded with a single system persona entry.
    fn seeded(persona: &str) -> Self {
        Self {
            entries: vec![Entry::new(Role::System, persona)],
        }
    }

    /// Append a user entry.
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.entries.push(Entry::new(Role::User, text));
    }

    /// Append an assistant entry, then truncate to the newest
    /// [`MAX_ENTRIES`] entries.
    ///
    /// Only called after a successful completion; a failed call leaves
    /// the session with the dangling user entry so the next turn still
    /// carries the unanswered message.
    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.entries.push(Entry::new(Role::Assistant, text));
        if self.entries.len() > MAX_ENTRIES {
            let excess = self.entries.len() - MAX_ENTRIES;
            self.entries.drain(..excess);
        }
    }

    /// The ordered history.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Process-wide store of per-user sessions.
///
/// Owned by the dispatcher state and injected where needed; constructed
/// at startup and dropped at shutdown. Each session sits behind its own
/// async mutex: the dispatcher holds a user's lock for the whole turn,
/// so two messages from the same user serialize instead of racing on
/// the history, while distinct users proceed in parallel.
pub struct SessionStore {
    sessions: DashMap<String, Arc<Mutex<Session>>>,
    persona: String,
}

impl SessionStore {
    /// Create an empty store; `persona` seeds every new session.
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            sessions: DashMap::new(),
            persona: persona.into(),
        }
    }

    /// Get the session for `user_id`, creating and seeding it if absent.
    pub fn session(&self, user_id: &str) -> Arc<Mutex<Session>> {
        self.sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::seeded(&self.persona))))
            .clone()
    }

    /// Whether a session exists for `user_id` (without creating one).
    pub fn contains(&self, user_id: &str) -> bool {
        self.sessions.contains_key(user_id)
    }

    /// Number of tracked users.
    pub fn user_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_as_str() {
        assert_eq!(Role::System.as_str(), "system");
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }

    #[tokio::test]
    async fn test_session_seeded_with_system_entry() {
        let store = SessionStore::new("persona text");
        let session = store.session("user-1");
        let session = session.lock().await;

        assert_eq!(session.len(), 1);
        assert_eq!(session.entries()[0].role, Role::System);
        assert_eq!(session.entries()[0].text, "persona text");
    }

    #[tokio::test]
    async fn test_session_reused_for_same_user() {
        let store = SessionStore::new("p");
        {
            let session = store.session("user-1");
            session.lock().await.push_user("hello");
        }
        let session = store.session("user-1");
        let session = session.lock().await;
        assert_eq!(session.len(), 2);
        assert_eq!(store.user_count(), 1);
    }

    #[tokio::test]
    async fn test_sessions_isolated_between_users() {
        let store = SessionStore::new("p");
        store.session("alice").lock().await.push_user("from alice");
        store.session("bob").lock().await.push_user("from bob");

        let alice = store.session("alice");
        let alice = alice.lock().await;
        assert_eq!(alice.len(), 2);
        assert_eq!(alice.entries()[1].text, "from alice");
        assert_eq!(store.user_count(), 2);
    }

    #[tokio::test]
    async fn test_cap_keeps_newest_entries() {
        let store = SessionStore::new("p");
        let session = store.session("user-1");
        let mut session = session.lock().await;

        // 1 system seed + 26 turns of 2 entries = 53 appended in total
        for i in 0..26 {
            session.push_user(format!("q{i}"));
            session.push_assistant(format!("a{i}"));
        }

        assert_eq!(session.len(), MAX_ENTRIES);
        // System seed evicted once total appended entries exceed the cap
        assert_ne!(session.entries()[0].role, Role::System);
        // Newest entries survive
        let last = session.entries().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.text, "a25");
    }

    #[tokio::test]
    async fn test_truncation_only_on_assistant_append() {
        let store = SessionStore::new("p");
        let session = store.session("user-1");
        let mut session = session.lock().await;

        for i in 0..60 {
            session.push_user(format!("unanswered {i}"));
        }
        // User appends alone never truncate
        assert_eq!(session.len(), 61);

        session.push_assistant("finally");
        assert_eq!(session.len(), MAX_ENTRIES);
        assert_eq!(session.entries().last().unwrap().text, "finally");
    }

    #[test]
    fn test_contains_does_not_create() {
        let store = SessionStore::new("p");
        assert!(!store.contains("user-1"));
        assert_eq!(store.user_count(), 0);
    }
}
