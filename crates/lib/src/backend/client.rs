//! Chat backend client over HTTP (http://localhost:8000 by default).
//! JSON for plain calls, multipart for messages, uploads and URL scrapes.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::types::{
    RawChatDetail, RawChatListEntry, RawCreatedChat, RawFileList, RawMessageReply, RawStatus,
};
use super::{
    BackendError, ChatBackend, ChatId, ChatSession, ChatSummary, LongContextOptions, MessageReply,
    UrlContextReply,
};
use crate::attachments::LocalFile;
use crate::router::{Endpoint, RoutedMessage};

/// Client for the chat backend HTTP API.
#[derive(Clone)]
pub struct BackendClient {
    base_url: Url,
    client: reqwest::Client,
}

impl BackendClient {
    /// `base_url` may carry a path prefix (e.g. `https://host/api`); a trailing slash is ignored.
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(trimmed)
            .map_err(|e| BackendError::InvalidBaseUrl(format!("{}: {}", trimmed, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidBaseUrl(trimmed.to_string()));
        }
        Ok(Self {
            base_url,
            client: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Base URL plus percent-encoded path segments (chat ids may contain spaces or slashes).
    fn endpoint<S: AsRef<str>>(&self, segments: &[S]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            for segment in segments {
                path.push(segment.as_ref());
            }
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, BackendError> {
        let res = self.client.get(url).send().await?;
        Ok(check(res).await?.json().await?)
    }
}

/// Turn a non-2xx response into `BackendError::Api` carrying status and body.
async fn check(res: Response) -> Result<Response, BackendError> {
    if !res.status().is_success() {
        let status = res.status();
        let url = res.url().clone();
        let body = res.text().await.unwrap_or_default();
        log::warn!("backend: {} -> {} {}", url, status, body);
        return Err(BackendError::Api { status, body });
    }
    Ok(res)
}

fn file_part(file: &LocalFile) -> Part {
    Part::bytes(file.bytes.clone()).file_name(file.name.clone())
}

/// Multipart body of a routed message. The one-shot endpoint takes `preferred_model` and no
/// selection; the chat-scoped endpoints take `model` and `long_context_selection`.
fn message_form(routed: &RoutedMessage) -> Form {
    let body = &routed.body;
    let mut form = Form::new().text("message", body.message.clone());
    match routed.endpoint {
        Endpoint::LongContext => {
            if !body.model.trim().is_empty() {
                form = form.text("preferred_model", body.model.clone());
            }
        }
        Endpoint::Messages(_) | Endpoint::Rag(_) => {
            form = form.text("model", body.model.clone());
            if let Some(ref selection) = body.long_context_selection {
                form = form.text("long_context_selection", selection.clone());
            }
        }
    }
    for file in &body.files {
        form = form.part("files", file_part(file));
    }
    for name in &body.backend_files {
        form = form.text("backend_files", name.clone());
    }
    form
}

#[async_trait]
impl ChatBackend for BackendClient {
    async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        self.get_json(self.endpoint(&["models"])).await
    }

    async fn list_chats(&self) -> Result<Vec<ChatSummary>, BackendError> {
        let raw: Vec<RawChatListEntry> = self.get_json(self.endpoint(&["chats"])).await?;
        raw.into_iter().map(RawChatListEntry::normalize).collect()
    }

    async fn create_chat(&self, title: &str, model: &str) -> Result<ChatId, BackendError> {
        let res = self
            .client
            .post(self.endpoint(&["chats"]))
            .json(&json!({ "title": title, "model": model }))
            .send()
            .await?;
        let raw: RawCreatedChat = check(res).await?.json().await?;
        raw.chat_id()
    }

    async fn get_chat(&self, id: &str) -> Result<ChatSession, BackendError> {
        let raw: RawChatDetail = self.get_json(self.endpoint(&["chats", id])).await?;
        Ok(raw.normalize(id))
    }

    async fn delete_chat(&self, id: &str) -> Result<Option<String>, BackendError> {
        let res = self.client.delete(self.endpoint(&["chats", id])).send().await?;
        let status: RawStatus = check(res).await?.json().await.unwrap_or_default();
        Ok(status.message)
    }

    async fn send_message(&self, routed: &RoutedMessage) -> Result<MessageReply, BackendError> {
        let url = self.endpoint(&routed.endpoint.segments());
        log::debug!(
            "backend: POST {} ({} files, {} backend files)",
            routed.endpoint,
            routed.body.files.len(),
            routed.body.backend_files.len()
        );
        let res = self
            .client
            .post(url)
            .multipart(message_form(routed))
            .send()
            .await?;
        let raw: RawMessageReply = check(res).await?.json().await?;
        raw.normalize()
    }

    async fn add_url_context(
        &self,
        id: &str,
        url: &str,
        max_depth: u32,
    ) -> Result<UrlContextReply, BackendError> {
        let form = Form::new()
            .text("url", url.to_string())
            .text("max_depth", max_depth.to_string());
        let res = self
            .client
            .post(self.endpoint(&["chats", id, "context", "url"]))
            .multipart(form)
            .send()
            .await?;
        Ok(check(res).await?.json().await?)
    }

    async fn upload_context_files(
        &self,
        id: &str,
        files: &[LocalFile],
    ) -> Result<Option<String>, BackendError> {
        let form = files
            .iter()
            .enumerate()
            .fold(Form::new(), |form, (i, file)| {
                form.part(format!("file{}", i + 1), file_part(file))
            });
        let res = self
            .client
            .post(self.endpoint(&["chats", id, "context", "files"]))
            .multipart(form)
            .send()
            .await?;
        let status: RawStatus = check(res).await?.json().await.unwrap_or_default();
        Ok(status.message)
    }

    async fn long_context_options(&self) -> Result<LongContextOptions, BackendError> {
        self.get_json(self.endpoint(&["long-context-options"])).await
    }

    async fn set_chat_model(&self, id: &str, model: &str) -> Result<(), BackendError> {
        let res = self
            .client
            .put(self.endpoint(&["chats", id, "model"]))
            .json(&json!({ "model": model }))
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }

    async fn list_chat_files(&self, id: &str) -> Result<Vec<String>, BackendError> {
        let raw: RawFileList = self.get_json(self.endpoint(&["chats", id, "files"])).await?;
        Ok(raw.files)
    }

    async fn use_context_file(&self, id: &str, filename: &str) -> Result<(), BackendError> {
        let res = self
            .client
            .post(self.endpoint(&["chats", id, "context", "file"]))
            .json(&json!({ "filename": filename }))
            .send()
            .await?;
        check(res).await?;
        Ok(())
    }
}
