//! Chat controller: the operations a UI triggers (new chat, send, delete, switch, attach URL or
//! files, change model), orchestrated over a [`ChatBackend`] and the [`SessionStore`].
//!
//! Every user-triggered operation holds an [`OperationGuard`] for its duration, so a second
//! trigger of the same operation is rejected with [`ChatError::Busy`] until the first finishes.
//! Failures are terminal: nothing is retried. Send failures are shown as an `error` message in
//! the transcript; other failures go to [`ChatView::notify`].
//!
//! [`OperationGuard`]: crate::guard::OperationGuard

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::attachments::{AttachedFile, AttachmentSlots, LocalFile, MAX_ATTACHMENTS};
use crate::backend::{
    BackendError, ChatBackend, ChatId, ChatSession, ChatSummary, LongContextOptions, Message,
    MessageReply,
};
use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::guard::{Operation, OperationGuard, OperationLocks};
use crate::links;
use crate::router::{MessageRouter, OutgoingMessage};
use crate::session::SessionStore;
use crate::view::{model_info_line, ChatView, Notice};

/// Chat selector value that means "create a new chat".
pub const NEW_CHAT: &str = "new";

const SCRAPE_PLACEHOLDER: &str = "Scraping URL...";
const SCRAPE_DONE: &str = "URL scraped and stored as context";

/// What the client currently shows. Never locked across a backend call.
#[derive(Default)]
struct ClientState {
    transcript: Vec<Message>,
    placeholder: Option<String>,
    chats: Vec<ChatSummary>,
    models: Vec<String>,
    context_files: Vec<String>,
    attachments: AttachmentSlots,
    long_context_selection: Option<String>,
}

pub struct ChatController<B> {
    backend: B,
    store: SessionStore,
    router: MessageRouter,
    config: ChatConfig,
    view: Arc<dyn ChatView>,
    locks: OperationLocks,
    state: Mutex<ClientState>,
}

impl<B: ChatBackend> ChatController<B> {
    pub fn new(backend: B, config: ChatConfig, view: Arc<dyn ChatView>) -> Self {
        Self::with_store(backend, SessionStore::new(), config, view)
    }

    pub fn with_store(
        backend: B,
        store: SessionStore,
        config: ChatConfig,
        view: Arc<dyn ChatView>,
    ) -> Self {
        Self {
            backend,
            store,
            router: MessageRouter::new(config.attachment_policy),
            config,
            view,
            locks: OperationLocks::new(),
            state: Mutex::new(ClientState::default()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn is_busy(&self, op: Operation) -> bool {
        self.locks.is_busy(op)
    }

    pub async fn current_chat_id(&self) -> Option<ChatId> {
        self.store.current_chat_id().await
    }

    pub async fn selected_model(&self) -> Option<String> {
        self.store.selected_model().await
    }

    pub async fn transcript(&self) -> Vec<Message> {
        self.state.lock().await.transcript.clone()
    }

    pub async fn placeholder(&self) -> Option<String> {
        self.state.lock().await.placeholder.clone()
    }

    pub async fn chats(&self) -> Vec<ChatSummary> {
        self.state.lock().await.chats.clone()
    }

    pub async fn models(&self) -> Vec<String> {
        self.state.lock().await.models.clone()
    }

    pub async fn context_files(&self) -> Vec<String> {
        self.state.lock().await.context_files.clone()
    }

    pub async fn attachments(&self) -> Vec<AttachedFile> {
        self.state.lock().await.attachments.iter().cloned().collect()
    }

    pub async fn long_context_selection(&self) -> Option<String> {
        self.state.lock().await.long_context_selection.clone()
    }

    /// Initial load: models first (the first one becomes the selection if none is set), then chats.
    pub async fn load(&self) -> Result<(), ChatError> {
        self.refresh_models().await?;
        self.refresh_chats().await?;
        Ok(())
    }

    /// GET /models; selects the first model when nothing is selected yet.
    pub async fn refresh_models(&self) -> Result<Vec<String>, ChatError> {
        let models = self.backend.list_models().await.map_err(|e| {
            log::error!("chat: listing models failed: {}", e);
            ChatError::from(e)
        })?;
        let selected = match models.first() {
            Some(first) => self.store.select_model_if_unset(first).await,
            None => self.store.selected_model().await,
        };
        self.state.lock().await.models = models.clone();
        self.view.show_models(&models, selected.as_deref());
        Ok(models)
    }

    /// GET /chats; rebuilds the title → id lookup.
    pub async fn refresh_chats(&self) -> Result<Vec<ChatSummary>, ChatError> {
        let chats = self.backend.list_chats().await.map_err(|e| {
            log::error!("chat: listing chats failed: {}", e);
            ChatError::from(e)
        })?;
        self.store.record_chats(&chats).await;
        self.state.lock().await.chats = chats.clone();
        let current = self.store.current_chat_id().await;
        self.view.show_chats(&chats, current.as_deref());
        Ok(chats)
    }

    /// Create a chat with `model` (or the selected/default model) and make it current.
    pub async fn create_chat(&self, model: Option<&str>) -> Result<ChatId, ChatError> {
        let _guard = self.guard(Operation::NewChat)?;
        match self.create_chat_inner(model).await {
            Ok(id) => {
                self.state.lock().await.attachments.clear();
                Ok(id)
            }
            Err(e) => Err(self.notify_failure("Could not create chat", e)),
        }
    }

    /// Send `text` in the current chat, creating one first when routing needs it.
    pub async fn send_message(&self, text: &str) -> Result<MessageReply, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let _guard = self.guard(Operation::Send)?;
        self.send_inner(text).await
    }

    /// Delete a chat by id (or title). When it was the current chat, the first remaining chat is
    /// loaded, or a new one is created when none remain.
    pub async fn delete_chat(&self, id_or_title: &str) -> Result<(), ChatError> {
        let _guard = self.guard(Operation::Delete)?;
        let id = self.store.resolve(id_or_title.trim()).await;
        match self.backend.delete_chat(&id).await {
            Ok(message) => {
                if let Some(message) = message {
                    self.view.notify(&Notice::Info(message));
                }
            }
            Err(e) => return Err(self.notify_failure("Could not delete chat", e.into())),
        }
        log::info!("chat: deleted {}", id);
        self.store.forget(&id).await;

        let current = self.store.current_chat_id().await;
        let replace = current.is_none() || current.as_deref() == Some(id.as_str());
        if replace {
            self.store.clear().await;
            self.reset_client_state().await;
        }

        let chats = match self.refresh_chats().await {
            Ok(chats) => chats,
            Err(_) => {
                let mut st = self.state.lock().await;
                st.chats.retain(|c| c.id != id);
                st.chats.clone()
            }
        };
        if !replace {
            return Ok(());
        }

        let outcome = match chats.iter().find(|c| c.id != id) {
            Some(next) => self.load_chat_inner(&next.id).await.map(|_| ()),
            None => self.create_chat_inner(None).await.map(|_| ()),
        };
        outcome.map_err(|e| self.notify_failure("Could not open another chat", e))
    }

    /// Switch to an existing chat by id (or title), or create one when given [`NEW_CHAT`].
    pub async fn switch_chat(&self, selection: &str) -> Result<ChatId, ChatError> {
        let _guard = self.guard(Operation::Switch)?;
        let selection = selection.trim();
        if selection == NEW_CHAT {
            return match self.create_chat_inner(None).await {
                Ok(id) => {
                    self.state.lock().await.attachments.clear();
                    Ok(id)
                }
                Err(e) => Err(self.notify_failure("Could not create chat", e)),
            };
        }
        let id = self.store.resolve(selection).await;
        match self.load_chat_inner(&id).await {
            Ok(chat) => Ok(chat.id),
            Err(e) => Err(self.notify_failure("Could not load chat", e)),
        }
    }

    /// Scrape `url` into the current chat's backend context and attach the stored file by name.
    /// Creates a chat first when none is current. Returns the stored filename.
    pub async fn attach_url(&self, url: &str) -> Result<String, ChatError> {
        let input = url.trim();
        if input.is_empty() || !links::is_valid_url(input) {
            let err = ChatError::InvalidUrl(input.to_string());
            self.view.notify(&Notice::Error(err.to_string()));
            return Err(err);
        }
        // The stored filename is only known after the scrape, so a free slot is required up front.
        if self.state.lock().await.attachments.is_full() {
            let err = ChatError::AttachmentLimit(MAX_ATTACHMENTS);
            self.view.notify(&Notice::Error(err.to_string()));
            return Err(err);
        }
        let _guard = self.guard(Operation::Scrape)?;
        let chat_id = match self.store.current_chat_id().await {
            Some(id) => id,
            None => self
                .create_chat_inner(None)
                .await
                .map_err(|e| self.notify_failure("Could not create chat", e))?,
        };
        let url = links::normalize_url(input);
        log::info!("chat: scraping {} into {}", url, chat_id);

        self.show_placeholder(SCRAPE_PLACEHOLDER).await;
        let stored = match self.scrape(&chat_id, &url).await {
            Ok(stored) => stored,
            Err(e) => {
                self.clear_placeholder().await;
                self.push(Message::error(e.to_string())).await;
                return Err(e);
            }
        };
        self.clear_placeholder().await;
        self.push(Message::system(SCRAPE_DONE)).await;
        self.refresh_context_files(&chat_id).await;

        if let Some(prompt) = self.config.scrape_summary_prompt.clone() {
            if !prompt.trim().is_empty() {
                match self.guard(Operation::Send) {
                    Ok(_send) => {
                        if let Err(e) = self.send_inner(prompt.trim()).await {
                            log::warn!("chat: summary after scrape failed: {}", e);
                        }
                    }
                    Err(_) => log::warn!("chat: summary after scrape skipped, a send is running"),
                }
            }
        }
        Ok(stored)
    }

    /// Upload files to the current chat's backend context and mark them attached for the next
    /// message. Does not send anything. Creates a chat first when none is current.
    pub async fn attach_files(&self, files: Vec<LocalFile>) -> Result<(), ChatError> {
        if files.is_empty() {
            return Err(ChatError::NoFiles);
        }
        let mut slots = self.state.lock().await.attachments.clone();
        for file in &files {
            if let Err(e) = slots.attach(AttachedFile::Local(file.clone())) {
                let err = ChatError::from(e);
                self.view.notify(&Notice::Error(err.to_string()));
                return Err(err);
            }
        }

        let _guard = self.guard(Operation::Upload)?;
        let chat_id = match self.store.current_chat_id().await {
            Some(id) => id,
            None => self
                .create_chat_inner(None)
                .await
                .map_err(|e| self.notify_failure("Could not create chat", e))?,
        };
        let message = self
            .backend
            .upload_context_files(&chat_id, &files)
            .await
            .map_err(|e| self.notify_failure("Could not upload files", e.into()))?;
        log::info!("chat: uploaded {} files to {}", files.len(), chat_id);

        let mut st = self.state.lock().await;
        for file in files {
            st.attachments.attach(AttachedFile::Local(file))?;
        }
        drop(st);
        self.view.notify(&Notice::Info(
            message.unwrap_or_else(|| "Files uploaded".to_string()),
        ));
        self.refresh_context_files(&chat_id).await;
        Ok(())
    }

    /// Mark local files attached for the next message without uploading them first.
    pub async fn stage_files(&self, files: Vec<LocalFile>) -> Result<(), ChatError> {
        if files.is_empty() {
            return Err(ChatError::NoFiles);
        }
        let mut st = self.state.lock().await;
        let mut slots = st.attachments.clone();
        for file in files {
            slots.attach(AttachedFile::Local(file))?;
        }
        st.attachments = slots;
        Ok(())
    }

    /// Attach a file the backend already has, by name. No network call.
    pub async fn attach_backend_file(&self, filename: &str) -> Result<(), ChatError> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(ChatError::NoFiles);
        }
        self.state
            .lock()
            .await
            .attachments
            .attach(AttachedFile::BackendRef(filename.to_string()))?;
        Ok(())
    }

    /// Remove an attachment slot by name; returns whether one was removed.
    pub async fn detach(&self, name: &str) -> bool {
        self.state.lock().await.attachments.detach(name.trim())
    }

    /// Change the model. With no current chat only the local selection changes; otherwise the
    /// backend is told first and the previous model stays selected if that fails.
    pub async fn change_model(&self, model: &str) -> Result<(), ChatError> {
        let model = model.trim();
        if model.is_empty() {
            return Ok(());
        }
        let Some(chat_id) = self.store.current_chat_id().await else {
            self.store.set_selected_model(model).await;
            self.show_models().await;
            return Ok(());
        };
        let _guard = self.guard(Operation::ChangeModel)?;
        if let Err(e) = self.backend.set_chat_model(&chat_id, model).await {
            self.show_models().await;
            return Err(self.notify_failure("Could not change model", e.into()));
        }
        log::info!("chat: model for {} set to {}", chat_id, model);
        self.store.set_selected_model(model).await;
        self.show_models().await;
        Ok(())
    }

    /// GET /chats/{id}/files for the current chat.
    pub async fn list_context_files(&self) -> Result<Vec<String>, ChatError> {
        let chat_id = self
            .store
            .current_chat_id()
            .await
            .ok_or(ChatError::NoActiveChat)?;
        let files = self.backend.list_chat_files(&chat_id).await?;
        self.state.lock().await.context_files = files.clone();
        self.view.show_context_files(&files);
        Ok(files)
    }

    /// Make a backend file the active context of the current chat and attach it by name.
    pub async fn use_file_as_context(&self, filename: &str) -> Result<(), ChatError> {
        let filename = filename.trim();
        let chat_id = self
            .store
            .current_chat_id()
            .await
            .ok_or(ChatError::NoActiveChat)?;
        let mut slots = self.state.lock().await.attachments.clone();
        if let Err(e) = slots.attach(AttachedFile::BackendRef(filename.to_string())) {
            let err = ChatError::from(e);
            self.view.notify(&Notice::Error(err.to_string()));
            return Err(err);
        }
        if let Err(e) = self.backend.use_context_file(&chat_id, filename).await {
            self.push(Message::error(format!("Could not set context: {}", e))).await;
            return Err(e.into());
        }
        self.state
            .lock()
            .await
            .attachments
            .attach(AttachedFile::BackendRef(filename.to_string()))?;
        let basename = filename.rsplit('/').next().unwrap_or(filename);
        self.push(Message::system(format!("Set {} as active context", basename)))
            .await;
        Ok(())
    }

    /// GET /long-context-options
    pub async fn long_context_options(&self) -> Result<LongContextOptions, ChatError> {
        Ok(self.backend.long_context_options().await?)
    }

    /// Select a named long-context corpus for following messages, or clear the selection.
    pub async fn select_long_context(&self, name: Option<&str>) -> Result<(), ChatError> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        if let Some(name) = name {
            let options = self.backend.long_context_options().await?;
            if !options.contains(name) {
                return Err(ChatError::UnknownLongContext(name.to_string()));
            }
        }
        self.state.lock().await.long_context_selection = name.map(str::to_string);
        Ok(())
    }

    fn guard(&self, op: Operation) -> Result<OperationGuard<'_>, ChatError> {
        self.locks.try_acquire(op, self.view.as_ref()).ok_or_else(|| {
            log::warn!("chat: {} already in progress, ignoring", op);
            ChatError::Busy(op)
        })
    }

    fn notify_failure(&self, what: &str, e: ChatError) -> ChatError {
        log::error!("chat: {}: {}", what, e);
        self.view.notify(&Notice::Error(format!("{}: {}", what, e)));
        e
    }

    /// Model to send with: the selection, else the first known model, else the configured default.
    async fn default_model(&self) -> String {
        if let Some(model) = self.store.selected_model().await {
            return model;
        }
        self.state
            .lock()
            .await
            .models
            .first()
            .cloned()
            .unwrap_or_else(|| self.config.default_model.clone())
    }

    async fn create_chat_inner(&self, model: Option<&str>) -> Result<ChatId, ChatError> {
        let model = match model.map(str::trim).filter(|m| !m.is_empty()) {
            Some(m) => m.to_string(),
            None => self.default_model().await,
        };
        let id = self
            .backend
            .create_chat(&self.config.new_chat_title, &model)
            .await?;
        log::info!("chat: created {} with model {}", id, model);
        self.store.set_current(id.clone(), model).await;
        {
            let mut st = self.state.lock().await;
            st.transcript.clear();
            st.placeholder = None;
            st.context_files.clear();
        }
        self.view.render_transcript(&[]);
        self.show_models().await;
        if let Err(e) = self.refresh_chats().await {
            log::warn!("chat: chat list not refreshed after create: {}", e);
        }
        Ok(id)
    }

    async fn load_chat_inner(&self, id: &str) -> Result<ChatSession, ChatError> {
        let chat = self.backend.get_chat(id).await?;
        let model = if chat.model.trim().is_empty() {
            self.default_model().await
        } else {
            chat.model.clone()
        };
        self.store.set_current(chat.id.clone(), model).await;
        {
            let mut st = self.state.lock().await;
            st.transcript = chat.messages.clone();
            st.placeholder = None;
            st.context_files = chat.context_files.clone();
            st.attachments.clear();
        }
        log::info!("chat: loaded {} ({} messages)", chat.id, chat.messages.len());
        self.view.render_transcript(&chat.messages);
        self.view.show_context_files(&chat.context_files);
        self.show_models().await;
        Ok(chat)
    }

    async fn send_inner(&self, text: &str) -> Result<MessageReply, ChatError> {
        let mut outgoing = {
            let st = self.state.lock().await;
            OutgoingMessage {
                message: text.to_string(),
                model: String::new(),
                local_files: st.attachments.local_files(),
                backend_files: st.attachments.backend_refs(),
                long_context_selection: st.long_context_selection.clone(),
            }
        };

        let chat_id = match self.store.current_chat_id().await {
            Some(id) => Some(id),
            None if self.router.needs_session(&outgoing) => {
                let selected = self.store.selected_model().await;
                match self.create_chat_inner(selected.as_deref()).await {
                    Ok(id) => Some(id),
                    Err(e) => {
                        self.push(Message::error(e.to_string())).await;
                        return Err(e);
                    }
                }
            }
            None => None,
        };
        outgoing.model = self.default_model().await;

        self.push(Message::user(text)).await;
        self.show_placeholder(&self.config.placeholder_text).await;
        match self.dispatch(chat_id.as_deref(), outgoing).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                log::error!("chat: send failed: {}", e);
                self.clear_placeholder().await;
                self.push(Message::error(e.to_string())).await;
                Err(e)
            }
        }
    }

    async fn dispatch(
        &self,
        chat_id: Option<&str>,
        outgoing: OutgoingMessage,
    ) -> Result<MessageReply, ChatError> {
        let options = match outgoing.long_context_selection {
            Some(_) => Some(self.backend.long_context_options().await?),
            None => None,
        };
        let model = outgoing.model.clone();
        let routed = self.router.route(chat_id, outgoing, options.as_ref())?;
        log::info!("chat: sending message to {}", routed.endpoint);
        let reply = self.backend.send_message(&routed).await?;

        self.clear_placeholder().await;
        if let Some(ref selected) = reply.selected_model {
            let info = model_info_line(selected, reply.context_length, reply.estimated_tokens);
            self.push(Message::system(info)).await;
        }
        self.push(Message::assistant(reply.response.clone())).await;
        if !reply.sources.is_empty() {
            self.push(Message::sources(reply.sources.join("\n"))).await;
        }
        self.apply_rename(chat_id, &model, &reply).await;
        Ok(reply)
    }

    /// Follow a server-side rename (or adopt the chat a one-shot call created).
    async fn apply_rename(&self, sent_to: Option<&str>, model: &str, reply: &MessageReply) {
        let Some(old_id) = sent_to else {
            if let Some(ref new_id) = reply.new_chat_id {
                let model = reply.selected_model.as_deref().unwrap_or(model);
                log::info!("chat: adopting {} created by long-context call", new_id);
                self.store.set_current(new_id.clone(), model).await;
                if let Err(e) = self.refresh_chats().await {
                    log::warn!("chat: chat list not refreshed after long-context call: {}", e);
                }
            }
            return;
        };

        // Without a cached entry there is no evidence that titles double as ids.
        let title_is_id = {
            let st = self.state.lock().await;
            st.chats
                .iter()
                .find(|c| c.id == old_id)
                .is_some_and(|c| c.id == c.title)
        };
        let new_id = reply
            .new_chat_id
            .clone()
            .or_else(|| reply.title.clone().filter(|_| title_is_id));
        match new_id {
            Some(new_id) if new_id != old_id => {
                log::info!("chat: {} renamed to {}", old_id, new_id);
                self.store.rename(old_id, new_id).await;
                if let Err(e) = self.refresh_chats().await {
                    log::warn!("chat: chat list not refreshed after rename: {}", e);
                }
            }
            _ => {
                if reply.title.is_some() && !title_is_id {
                    if let Err(e) = self.refresh_chats().await {
                        log::warn!("chat: chat list not refreshed after retitle: {}", e);
                    }
                }
            }
        }
    }

    async fn scrape(&self, chat_id: &str, url: &str) -> Result<String, ChatError> {
        let reply = self
            .backend
            .add_url_context(chat_id, url, self.config.scrape_max_depth)
            .await?;
        let stored = reply
            .stored_file()
            .ok_or(BackendError::MissingField("context_file"))?
            .to_string();
        self.state
            .lock()
            .await
            .attachments
            .attach(AttachedFile::BackendRef(stored.clone()))?;
        if let Some(message) = reply.message {
            log::info!("chat: scrape: {}", message);
        }
        Ok(stored)
    }

    async fn refresh_context_files(&self, chat_id: &str) {
        match self.backend.list_chat_files(chat_id).await {
            Ok(files) => {
                self.state.lock().await.context_files = files.clone();
                self.view.show_context_files(&files);
            }
            Err(e) => log::warn!("chat: context files not refreshed: {}", e),
        }
    }

    async fn reset_client_state(&self) {
        {
            let mut st = self.state.lock().await;
            st.transcript.clear();
            st.placeholder = None;
            st.context_files.clear();
            st.attachments.clear();
        }
        self.view.render_transcript(&[]);
    }

    async fn show_models(&self) {
        let models = self.state.lock().await.models.clone();
        let selected = self.store.selected_model().await;
        self.view.show_models(&models, selected.as_deref());
    }

    async fn push(&self, message: Message) {
        self.state.lock().await.transcript.push(message.clone());
        self.view.append_message(&message);
    }

    async fn show_placeholder(&self, text: &str) {
        self.state.lock().await.placeholder = Some(text.to_string());
        self.view.show_placeholder(text);
    }

    async fn clear_placeholder(&self) {
        let had = self.state.lock().await.placeholder.take().is_some();
        if had {
            self.view.clear_placeholder();
        }
    }
}
