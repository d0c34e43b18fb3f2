//! Wire shapes for the chat backend and their canonical forms.
//!
//! The backend has drifted across revisions (`id` vs `title` vs `chat_id`, chat lists as plain
//! strings or as objects). Raw shapes are decoded leniently here and normalized into one record
//! type before anything reaches the controller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::BackendError;

/// Canonical chat identifier. Titles are display labels only.
pub type ChatId = String;

/// Role of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Role {
    User,
    Assistant,
    System,
    Error,
    Sources,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Error => "error",
            Role::Sources => "sources",
        }
    }
}

/// Unknown roles from older backends are shown as system lines rather than failing the load.
impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "error" => Role::Error,
            "sources" => Role::Sources,
            _ => Role::System,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single transcript message. Never edited once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Role::Error, content)
    }

    pub fn sources(content: impl Into<String>) -> Self {
        Self::new(Role::Sources, content)
    }
}

/// One entry of the chat list, after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: ChatId,
    pub title: String,
}

/// A fully loaded chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub id: ChatId,
    pub title: String,
    pub model: String,
    pub messages: Vec<Message>,
    pub context_files: Vec<String>,
}

/// `GET /chats` entry: either a bare name or an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawChatListEntry {
    Name(String),
    Record {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        chat_id: Option<String>,
        #[serde(default)]
        title: Option<String>,
    },
}

impl RawChatListEntry {
    pub(crate) fn normalize(self) -> Result<ChatSummary, BackendError> {
        match self {
            RawChatListEntry::Name(name) => Ok(ChatSummary {
                id: name.clone(),
                title: name,
            }),
            RawChatListEntry::Record { id, chat_id, title } => {
                let id = pick_id(&[id, chat_id, title.clone()]).ok_or(BackendError::MissingField("id"))?;
                Ok(ChatSummary {
                    title: title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| id.clone()),
                    id,
                })
            }
        }
    }
}

/// `POST /chats` response. Revisions answer with `chat_id`, `id` or only `title`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawCreatedChat {
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl RawCreatedChat {
    pub(crate) fn chat_id(self) -> Result<ChatId, BackendError> {
        pick_id(&[self.chat_id, self.id, self.title]).ok_or(BackendError::MissingField("chat_id"))
    }
}

/// `GET /chats/{id}` response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawChatDetail {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub context_files: Vec<String>,
}

impl RawChatDetail {
    /// Falls back to the id that was requested when the body carries neither `id` nor `title`.
    pub(crate) fn normalize(self, requested: &str) -> ChatSession {
        let id = pick_id(&[self.id, self.title.clone()]).unwrap_or_else(|| requested.to_string());
        ChatSession {
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| id.clone()),
            id,
            model: self.model.unwrap_or_default(),
            messages: self.messages,
            context_files: self.context_files,
        }
    }
}

/// Reply to a message sent through `/messages`, `/rag` or `/chat/long-context`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageReply {
    pub response: String,
    pub selected_model: Option<String>,
    pub context_length: Option<u64>,
    pub estimated_tokens: Option<u64>,
    /// Set when the backend renamed the chat (auto-titling) or created one for a stateless call.
    pub new_chat_id: Option<ChatId>,
    pub title: Option<String>,
    pub sources: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawMessageReply {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub selected_model: Option<String>,
    #[serde(default)]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub estimated_tokens: Option<u64>,
    #[serde(default)]
    pub new_chat_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

impl RawMessageReply {
    pub(crate) fn normalize(self) -> Result<MessageReply, BackendError> {
        let response = self.response.ok_or(BackendError::MissingField("response"))?;
        Ok(MessageReply {
            response,
            selected_model: non_empty(self.selected_model),
            context_length: self.context_length,
            estimated_tokens: self.estimated_tokens,
            new_chat_id: non_empty(self.new_chat_id),
            title: non_empty(self.title),
            sources: self.sources,
        })
    }
}

/// Reply to `POST /chats/{id}/context/url`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UrlContextReply {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub context_file: Option<String>,
    #[serde(default)]
    pub filenames: Vec<String>,
}

impl UrlContextReply {
    /// The backend file the scrape produced: `context_file`, else the first of `filenames`.
    pub fn stored_file(&self) -> Option<&str> {
        self.context_file
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .or_else(|| self.filenames.iter().map(String::as_str).find(|f| !f.trim().is_empty()))
    }
}

/// `{message}` bodies returned by delete and upload.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawStatus {
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET /chats/{id}/files` response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawFileList {
    #[serde(default)]
    pub files: Vec<String>,
}

/// Named pre-built corpora from `GET /long-context-options`: name → file paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct LongContextOptions(pub BTreeMap<String, Vec<String>>);

impl LongContextOptions {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Extension (leading dot, case kept) of the first file listed for `name`.
    /// Outer `None`: unknown name. Inner `None`: listed without files or first file has no extension.
    pub fn resolved_extension(&self, name: &str) -> Option<Option<String>> {
        let paths = self.0.get(name)?;
        Some(paths.first().and_then(|p| file_extension(p)))
    }
}

fn file_extension(path: &str) -> Option<String> {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let dot = file_name.rfind('.')?;
    if dot == 0 || dot + 1 == file_name.len() {
        return None;
    }
    Some(file_name[dot..].to_string())
}

fn pick_id(candidates: &[Option<String>]) -> Option<String> {
    candidates
        .iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
