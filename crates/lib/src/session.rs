//! Client-side session state: which chat is current, which model is selected, and the
//! title → id lookup built from the last chat list.
//!
//! At most one chat and one model are current at a time.

use crate::backend::{ChatId, ChatSummary};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct SessionState {
    current_chat_id: Option<ChatId>,
    selected_model: Option<String>,
    titles: HashMap<String, ChatId>,
}

/// Single source of truth for the current chat id and selected model.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<SessionState>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionState::default())),
        }
    }

    pub async fn current_chat_id(&self) -> Option<ChatId> {
        self.inner.read().await.current_chat_id.clone()
    }

    pub async fn selected_model(&self) -> Option<String> {
        self.inner.read().await.selected_model.clone()
    }

    /// Overwrite both the current chat and the selected model.
    pub async fn set_current(&self, id: impl Into<ChatId>, model: impl Into<String>) {
        let mut g = self.inner.write().await;
        g.current_chat_id = Some(id.into());
        g.selected_model = Some(model.into()).filter(|m: &String| !m.trim().is_empty());
    }

    pub async fn set_selected_model(&self, model: impl Into<String>) {
        let model = model.into();
        self.inner.write().await.selected_model = Some(model).filter(|m| !m.trim().is_empty());
    }

    /// Select `model` only if nothing is selected yet; returns the model now selected.
    pub async fn select_model_if_unset(&self, model: &str) -> Option<String> {
        let mut g = self.inner.write().await;
        if g.selected_model.is_none() && !model.trim().is_empty() {
            g.selected_model = Some(model.to_string());
        }
        g.selected_model.clone()
    }

    /// Unset both current chat and selected model (after the current chat is deleted).
    pub async fn clear(&self) {
        let mut g = self.inner.write().await;
        g.current_chat_id = None;
        g.selected_model = None;
    }

    /// The backend renamed `old_id` to `new_id`. Returns true if `old_id` was current.
    pub async fn rename(&self, old_id: &str, new_id: impl Into<ChatId>) -> bool {
        let new_id = new_id.into();
        let mut g = self.inner.write().await;
        for id in g.titles.values_mut() {
            if id == old_id {
                *id = new_id.clone();
            }
        }
        if g.current_chat_id.as_deref() == Some(old_id) {
            g.current_chat_id = Some(new_id);
            true
        } else {
            false
        }
    }

    /// Replace the title → id lookup from a freshly fetched chat list.
    pub async fn record_chats(&self, chats: &[ChatSummary]) {
        let mut g = self.inner.write().await;
        g.titles = chats
            .iter()
            .map(|c| (c.title.clone(), c.id.clone()))
            .collect();
    }

    /// Drop lookup entries for a deleted chat.
    pub async fn forget(&self, id: &str) {
        self.inner.write().await.titles.retain(|_, v| v != id);
    }

    /// Resolve a chat reference typed by the user: a known title maps to its id, anything else
    /// is taken as an id.
    pub async fn resolve(&self, id_or_title: &str) -> ChatId {
        self.inner
            .read()
            .await
            .titles
            .get(id_or_title)
            .cloned()
            .unwrap_or_else(|| id_or_title.to_string())
    }
}
