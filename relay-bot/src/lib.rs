//! Relay Bot - LINE webhook relay with keyword auto-replies and LLM fallthrough.
//!
//! Each inbound text message is answered either from a static keyword
//! table or by an OpenAI-compatible completion call with per-user
//! bounded conversation history.
//!
//! ```text
//! LINE webhook → /callback → Dispatcher ──keyword──→ canned reply
//!                                │
//!                                └─no match─→ SessionStore + completion API
//!                                             (fallback text on failure)
//! User ←────────── Reply API ←── reply text
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod dispatch;
pub mod line;
pub mod provider;
pub mod replies;
pub mod routes;
pub mod session;

// Re-export commonly used types
pub use dispatch::Dispatcher;
pub use line::{LineClient, WebhookEvent, WebhookPayload};
pub use provider::{ChatMessage, CompletionError, CompletionProvider, OpenAiProvider};
pub use replies::ReplyTable;
pub use routes::{build_router, AppState};
pub use session::{Entry, Role, Session, SessionStore, MAX_ENTRIES};

use relay_common::Config;
use std::net::SocketAddr;
use std::sync::Arc;

/// Build the application state from configuration.
pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let replies = ReplyTable::from_path(&config.bot.replies_path)?;
    tracing::info!(
        keywords = replies.len(),
        path = %config.bot.replies_path.display(),
        "Loaded static reply table"
    );

    let provider = Arc::new(OpenAiProvider::new(&config.openai));
    let dispatcher = Dispatcher::new(
        replies,
        SessionStore::new(config.bot.persona.clone()),
        provider,
        config.bot.fallback.clone(),
    );

    let line = LineClient::new(
        config.line.channel_access_token.clone(),
        config.line.api_base.clone(),
    );

    Ok(Arc::new(AppState {
        dispatcher,
        line,
        channel_secret: config.line.channel_secret.clone(),
    }))
}

/// Start the HTTP server.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from((
        config.server.bind.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let state = build_state(config)?;
    let router = build_router(state);

    tracing::info!("Starting relay-bot on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
