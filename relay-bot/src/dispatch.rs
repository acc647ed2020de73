//! Message dispatch: canned reply vs. LLM path.
//!
//! Order of effects is fixed: the reply table is checked before any
//! session mutation or network call, so keyword hits never incur
//! completion cost or latency and never enter conversation memory.

use crate::provider::{ChatMessage, CompletionProvider};
use crate::replies::ReplyTable;
use crate::session::SessionStore;
use std::sync::Arc;

/// Decides the response path for each inbound message and drives the
/// session store around the completion call.
pub struct Dispatcher {
    replies: ReplyTable,
    sessions: SessionStore,
    provider: Arc<dyn CompletionProvider>,
    fallback: String,
}

impl Dispatcher {
    pub fn new(
        replies: ReplyTable,
        sessions: SessionStore,
        provider: Arc<dyn CompletionProvider>,
        fallback: impl Into<String>,
    ) -> Self {
        Self {
            replies,
            sessions,
            provider,
            fallback: fallback.into(),
        }
    }

    /// Produce the reply text for one inbound message.
    ///
    /// Keyword matches return the canned reply with no other effect.
    /// Otherwise the user's session is extended with the message and the
    /// full history goes to the completion provider; on success the
    /// trimmed response is recorded and returned, on any failure the
    /// fixed fallback text is returned and the session keeps the
    /// unanswered user entry.
    ///
    /// The session lock is held across the completion call, so two
    /// in-flight messages from the same user serialize rather than
    /// interleaving their history updates.
    pub async fn dispatch(&self, user_id: &str, text: &str) -> String {
        if let Some(reply) = self.replies.lookup(text) {
            tracing::debug!(user = %user_id, "Keyword match, returning canned reply");
            return reply.to_string();
        }

        let session = self.sessions.session(user_id);
        let mut session = session.lock().await;
        session.push_user(text);

        let history: Vec<ChatMessage> = session
            .entries()
            .iter()
            .map(|e| ChatMessage::new(e.role.as_str(), e.text.clone()))
            .collect();

        match self.provider.complete(&history).await {
            Ok(content) => {
                let reply = content.trim().to_string();
                session.push_assistant(reply.clone());
                tracing::info!(
                    user = %user_id,
                    history_len = session.len(),
                    "Completion reply sent"
                );
                reply
            }
            Err(e) => {
                tracing::error!(
                    user = %user_id,
                    error = %e,
                    "Completion call failed, sending fallback"
                );
                self.fallback.clone()
            }
        }
    }

    /// The session store (for inspection in tests and diagnostics).
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::CompletionError;
    use crate::session::{Role, MAX_ENTRIES};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted provider: pops queued results and records every call's
    /// message history.
    struct ScriptedProvider {
        script: Mutex<Vec<Result<String, CompletionError>>>,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<String, CompletionError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn last_call(&self) -> Vec<ChatMessage> {
            self.calls.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            self.script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(CompletionError::Empty))
        }
    }

    fn dispatcher(provider: Arc<ScriptedProvider>) -> Dispatcher {
        let replies = ReplyTable::from_json(
            r#"{"價格": "方案價格請參考官網。", "營業時間": "週一至週五 9:00-18:00。"}"#,
        )
        .unwrap();
        Dispatcher::new(
            replies,
            SessionStore::new("你是一個親切的 AI 助理。"),
            provider,
            "抱歉，我現在無法回覆。",
        )
    }

    #[tokio::test]
    async fn test_keyword_match_returns_canned_reply() {
        let provider = ScriptedProvider::new(vec![]);
        let d = dispatcher(provider.clone());

        let reply = d.dispatch("user-1", "價格").await;
        assert_eq!(reply, "方案價格請參考官網。");
        // No completion call, no session created
        assert_eq!(provider.call_count(), 0);
        assert!(!d.sessions().contains("user-1"));
    }

    #[tokio::test]
    async fn test_keyword_path_is_idempotent() {
        let provider = ScriptedProvider::new(vec![]);
        let d = dispatcher(provider.clone());

        let first = d.dispatch("user-1", "請問營業時間？").await;
        let second = d.dispatch("user-1", "請問營業時間？").await;
        assert_eq!(first, second);
        assert_eq!(provider.call_count(), 0);
        assert!(!d.sessions().contains("user-1"));
    }

    #[tokio::test]
    async fn test_new_user_llm_turn() {
        let provider = ScriptedProvider::new(vec![Ok("我很好，謝謝！".into())]);
        let d = dispatcher(provider.clone());

        let reply = d.dispatch("user-1", "你好嗎").await;
        assert_eq!(reply, "我很好，謝謝！");
        assert_eq!(provider.call_count(), 1);

        // Context sent: exactly one system entry, then the user message
        let sent = provider.last_call();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].role, "system");
        assert_eq!(sent[1].role, "user");
        assert_eq!(sent[1].content, "你好嗎");

        // Session ends with system, user, assistant
        let session = d.sessions().session("user-1");
        let session = session.lock().await;
        assert_eq!(session.len(), 3);
        assert_eq!(session.entries()[2].role, Role::Assistant);
        assert_eq!(session.entries()[2].text, "我很好，謝謝！");
    }

    #[tokio::test]
    async fn test_follow_up_carries_history() {
        let provider =
            ScriptedProvider::new(vec![Ok("second".into()), Ok("first".into())]);
        let d = dispatcher(provider.clone());

        d.dispatch("user-1", "question one").await;
        d.dispatch("user-1", "question two").await;

        let sent = provider.last_call();
        // system, user, assistant, user — ends with the current message
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0].role, "system");
        assert_eq!(sent[2].content, "first");
        assert_eq!(sent[3].content, "question two");
    }

    #[tokio::test]
    async fn test_response_is_trimmed() {
        let provider = ScriptedProvider::new(vec![Ok("  spaced out \n".into())]);
        let d = dispatcher(provider.clone());

        let reply = d.dispatch("user-1", "hello").await;
        assert_eq!(reply, "spaced out");

        let session = d.sessions().session("user-1");
        let session = session.lock().await;
        assert_eq!(session.entries().last().unwrap().text, "spaced out");
    }

    #[tokio::test]
    async fn test_failure_returns_fallback_and_keeps_user_entry() {
        let provider = ScriptedProvider::new(vec![Err(CompletionError::Timeout)]);
        let d = dispatcher(provider.clone());

        let reply = d.dispatch("user-1", "你好嗎").await;
        assert_eq!(reply, "抱歉，我現在無法回覆。");

        // Session keeps the dangling user entry, no assistant entry
        let session = d.sessions().session("user-1");
        let session = session.lock().await;
        assert_eq!(session.len(), 2);
        assert_eq!(session.entries()[1].role, Role::User);
        assert_eq!(session.entries()[1].text, "你好嗎");
    }

    #[tokio::test]
    async fn test_failed_turn_resent_in_next_context() {
        let provider = ScriptedProvider::new(vec![
            Ok("recovered".into()),
            Err(CompletionError::Request("connection refused".into())),
        ]);
        let d = dispatcher(provider.clone());

        d.dispatch("user-1", "lost question").await;
        d.dispatch("user-1", "next question").await;

        // The unanswered user entry stays in context for the retry turn
        let sent = provider.last_call();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1].content, "lost question");
        assert_eq!(sent[2].content, "next question");
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let provider = ScriptedProvider::new(vec![
            Ok("for bob".into()),
            Ok("for alice".into()),
        ]);
        let d = dispatcher(provider.clone());

        d.dispatch("alice", "alice speaking").await;
        d.dispatch("bob", "bob speaking").await;

        let sent = provider.last_call();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].content, "bob speaking");
        assert!(!sent.iter().any(|m| m.content.contains("alice")));
    }

    #[tokio::test]
    async fn test_session_capped_after_many_turns() {
        let script: Vec<Result<String, CompletionError>> =
            (0..26).map(|i| Ok(format!("answer {i}"))).collect();
        let provider = ScriptedProvider::new(script);
        let d = dispatcher(provider.clone());

        for i in 0..26 {
            d.dispatch("user-1", &format!("question {i}")).await;
        }

        let session = d.sessions().session("user-1");
        let session = session.lock().await;
        assert_eq!(session.len(), MAX_ENTRIES);
        // 53 total entries appended: the system seed is gone
        assert_ne!(session.entries()[0].role, Role::System);
        // Later calls see no system entry either
        let sent = provider.last_call();
        assert!(sent.iter().filter(|m| m.role == "system").count() <= 1);
    }
}
