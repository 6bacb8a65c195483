//! Conversation history applicator.
//!
//! Runs last: it consumes the status lines every prior stage produced. When
//! the target namespace already holds a live conversation, the payload's
//! messages are NOT used — revisiting a link must never clobber work in
//! progress; the applicator defers to a reload of the local conversation
//! instead. On a fresh namespace the imported conversation is composed as:
//! welcome message, then the status lines as synthetic system messages,
//! then the payload's real messages.

use async_trait::async_trait;

use super::ApplyContext;
use crate::payload::{ChatMessage, SharedPayload};
use crate::store::{get_typed, keys, set_typed, KvStore, StoreError};

/// Decides whether the current namespace already holds a live conversation.
#[async_trait]
pub trait NamespaceResolver: Send + Sync {
    async fn has_live_conversation(&self) -> Result<bool, StoreError>;
}

/// Default resolver: a conversation is live when the stored transcript has
/// at least one non-system message.
pub struct StoreNamespaceResolver {
    store: std::sync::Arc<dyn KvStore>,
}

impl StoreNamespaceResolver {
    pub fn new(store: std::sync::Arc<dyn KvStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NamespaceResolver for StoreNamespaceResolver {
    async fn has_live_conversation(&self) -> Result<bool, StoreError> {
        let messages: Vec<ChatMessage> = get_typed(&*self.store, keys::CONVERSATION)
            .await?
            .unwrap_or_default();
        Ok(messages.iter().any(|m| !m.is_system()))
    }
}

/// What the history stage did, reported for the caller's conversation view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationOutcome {
    /// Nothing to import and nothing local to protect.
    Untouched,
    /// A live local conversation takes precedence; reload it from the store.
    ReloadedLocal,
    /// The payload's conversation was written.
    Imported { message_count: usize },
}

pub async fn apply(
    ctx: &mut ApplyContext<'_>,
    payload: &SharedPayload,
    resolver: &dyn NamespaceResolver,
    status_lines: &[String],
) -> Result<ConversationOutcome, StoreError> {
    let staged_welcome = if ctx.options.display_welcome_message {
        payload.welcome_message.clone()
    } else {
        None
    };

    if payload.messages.is_empty() && staged_welcome.is_none() && status_lines.is_empty() {
        return Ok(ConversationOutcome::Untouched);
    }

    if resolver.has_live_conversation().await? {
        tracing::info!("Local conversation takes precedence; skipping imported history");
        return Ok(ConversationOutcome::ReloadedLocal);
    }

    let mut conversation: Vec<ChatMessage> = Vec::new();
    if let Some(welcome) = staged_welcome {
        conversation.push(ChatMessage::system(welcome));
    }
    conversation.extend(status_lines.iter().map(|line| ChatMessage::system(line.as_str())));
    conversation.extend(payload.messages.iter().cloned());

    set_typed(ctx.store, keys::CONVERSATION, &conversation).await?;
    tracing::info!(count = conversation.len(), "Imported conversation history");

    Ok(ConversationOutcome::Imported {
        message_count: conversation.len(),
    })
}
