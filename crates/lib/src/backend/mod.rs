//! Chat backend: the HTTP API this client drives, and its reqwest implementation.
//!
//! [`ChatBackend`] is the seam the controller talks to. Every response is normalized into the
//! canonical types in [`types`] before it crosses this boundary.

mod client;
mod types;

use async_trait::async_trait;

use crate::attachments::LocalFile;
use crate::router::RoutedMessage;

pub use client::BackendClient;
pub use types::{
    ChatId, ChatSession, ChatSummary, LongContextOptions, Message, MessageReply, Role,
    UrlContextReply,
};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend api error: {status} {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("backend response is missing `{0}`")]
    MissingField(&'static str),
    #[error("invalid backend base url: {0}")]
    InvalidBaseUrl(String),
}

/// Operations offered by the chat backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// GET /models
    async fn list_models(&self) -> Result<Vec<String>, BackendError>;

    /// GET /chats
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, BackendError>;

    /// POST /chats; returns the new chat's id.
    async fn create_chat(&self, title: &str, model: &str) -> Result<ChatId, BackendError>;

    /// GET /chats/{id}
    async fn get_chat(&self, id: &str) -> Result<ChatSession, BackendError>;

    /// DELETE /chats/{id}; returns the backend's status message, if any.
    async fn delete_chat(&self, id: &str) -> Result<Option<String>, BackendError>;

    /// POST to the routed endpoint (`/messages`, `/rag` or `/chat/long-context`).
    async fn send_message(&self, routed: &RoutedMessage) -> Result<MessageReply, BackendError>;

    /// POST /chats/{id}/context/url
    async fn add_url_context(
        &self,
        id: &str,
        url: &str,
        max_depth: u32,
    ) -> Result<UrlContextReply, BackendError>;

    /// POST /chats/{id}/context/files; returns the backend's status message, if any.
    async fn upload_context_files(
        &self,
        id: &str,
        files: &[LocalFile],
    ) -> Result<Option<String>, BackendError>;

    /// GET /long-context-options
    async fn long_context_options(&self) -> Result<LongContextOptions, BackendError>;

    /// PUT /chats/{id}/model
    async fn set_chat_model(&self, id: &str, model: &str) -> Result<(), BackendError>;

    /// GET /chats/{id}/files
    async fn list_chat_files(&self, id: &str) -> Result<Vec<String>, BackendError>;

    /// POST /chats/{id}/context/file
    async fn use_context_file(&self, id: &str, filename: &str) -> Result<(), BackendError>;
}
