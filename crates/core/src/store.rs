//! In-memory conversation store.
//!
//! Maps each `ConversationId` to one `ConversationHistory`. The map itself sits
//! behind a read/write lock and every history has its own mutex, so turns on
//! different conversations never wait on each other. There is no delete: an id
//! resolves to the same history for the life of the store.
//!
//! A whole exchange (read history, call, append) runs under `lock`, so two
//! turns on one conversation are serialized and the second sees the first.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use crate::error::ConversationError;
use crate::message::{ConversationHistory, ConversationId, Message, SerializedHistory};

type Slot = Arc<Mutex<ConversationHistory>>;

/// Exclusive hold on one conversation. Other operations on the same id wait
/// until it is dropped.
pub type ConversationGuard = OwnedMutexGuard<ConversationHistory>;

#[derive(Debug, Default)]
pub struct ConversationStore {
    histories: RwLock<HashMap<ConversationId, Slot>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id with an empty history.
    pub async fn create_conversation(&self, preamble: Option<String>) -> ConversationId {
        self.create_conversation_with(preamble, Vec::new()).await
    }

    /// Allocate a fresh id seeded with existing messages.
    pub async fn create_conversation_with(
        &self,
        preamble: Option<String>,
        messages: Vec<Message>,
    ) -> ConversationId {
        let mut histories = self.histories.write().await;
        let mut id = ConversationId::new();
        while histories.contains_key(&id) {
            id = ConversationId::new();
        }
        debug!(conversation = %id, seeded = messages.len(), "Created conversation");
        histories.insert(
            id.clone(),
            Arc::new(Mutex::new(ConversationHistory::new(preamble, messages))),
        );
        id
    }

    async fn slot(&self, id: &ConversationId) -> Result<Slot, ConversationError> {
        self.histories
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ConversationError::NotFound(id.clone()))
    }

    pub async fn contains(&self, id: &ConversationId) -> bool {
        self.histories.read().await.contains_key(id)
    }

    /// Take the conversation's lock for as long as the guard lives.
    pub async fn lock(&self, id: &ConversationId) -> Result<ConversationGuard, ConversationError> {
        let slot = self.slot(id).await?;
        Ok(slot.lock_owned().await)
    }

    pub async fn len(&self) -> usize {
        self.histories.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.histories.read().await.is_empty()
    }

    pub async fn append_message(
        &self,
        id: &ConversationId,
        message: Message,
    ) -> Result<(), ConversationError> {
        let slot = self.slot(id).await?;
        slot.lock().await.push(message);
        Ok(())
    }

    /// Append several messages under one lock so they land adjacent.
    pub async fn append_messages(
        &self,
        id: &ConversationId,
        messages: impl IntoIterator<Item = Message>,
    ) -> Result<(), ConversationError> {
        let slot = self.slot(id).await?;
        let mut history = slot.lock().await;
        for message in messages {
            history.push(message);
        }
        Ok(())
    }

    /// Replace the whole message list. The preamble changes only when
    /// `update_preamble` is true.
    pub async fn replace_history(
        &self,
        id: &ConversationId,
        messages: Vec<Message>,
        preamble: Option<String>,
        update_preamble: bool,
    ) -> Result<(), ConversationError> {
        let slot = self.slot(id).await?;
        slot.lock().await.replace(messages, preamble, update_preamble);
        Ok(())
    }

    pub async fn update_preamble(
        &self,
        id: &ConversationId,
        preamble: Option<String>,
    ) -> Result<(), ConversationError> {
        let slot = self.slot(id).await?;
        slot.lock().await.set_preamble(preamble);
        Ok(())
    }

    pub async fn get_messages(
        &self,
        id: &ConversationId,
        include_preamble: bool,
    ) -> Result<Vec<Message>, ConversationError> {
        let slot = self.slot(id).await?;
        let history = slot.lock().await;
        Ok(history.all_messages(include_preamble))
    }

    /// `chat_history` only if there are messages; `preamble` only if
    /// `include_preamble` and the preamble is non-empty.
    pub async fn get_serialized_history(
        &self,
        id: &ConversationId,
        include_preamble: bool,
    ) -> Result<SerializedHistory, ConversationError> {
        let slot = self.slot(id).await?;
        let history = slot.lock().await;
        Ok(history.serialized(include_preamble))
    }

    /// A point-in-time copy of the whole history.
    pub async fn history(&self, id: &ConversationId) -> Result<ConversationHistory, ConversationError> {
        let slot = self.slot(id).await?;
        let history = slot.lock().await;
        Ok(history.clone())
    }
}
