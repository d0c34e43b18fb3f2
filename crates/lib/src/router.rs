//! Message routing: which endpoint an outgoing message goes to and what the body carries.
//!
//! - A long-context selection whose first file ends in `.pkl` goes to `/chats/{id}/rag`;
//!   any other selection goes to `/chats/{id}/messages`.
//! - Under [`AttachmentPolicy::Stateless`], local files with no chat and no selection go to the
//!   one-shot `/chat/long-context` endpoint.
//! - Everything else goes to `/chats/{id}/messages`.

use crate::attachments::LocalFile;
use crate::backend::{ChatId, LongContextOptions};
use crate::config::AttachmentPolicy;
use crate::error::ChatError;

/// Extension that marks a pre-indexed corpus served by the RAG endpoint.
pub const RAG_EXTENSION: &str = ".pkl";

/// Target endpoint of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `POST /chats/{id}/messages`
    Messages(ChatId),
    /// `POST /chats/{id}/rag`
    Rag(ChatId),
    /// `POST /chat/long-context` (no session required)
    LongContext,
}

impl Endpoint {
    /// Path segments relative to the backend base URL (unencoded).
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Endpoint::Messages(id) => vec!["chats", id.as_str(), "messages"],
            Endpoint::Rag(id) => vec!["chats", id.as_str(), "rag"],
            Endpoint::LongContext => vec!["chat", "long-context"],
        }
    }

    pub fn chat_id(&self) -> Option<&str> {
        match self {
            Endpoint::Messages(id) | Endpoint::Rag(id) => Some(id),
            Endpoint::LongContext => None,
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.segments().join("/"))
    }
}

/// What the user is sending, before routing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub message: String,
    pub model: String,
    pub local_files: Vec<LocalFile>,
    pub backend_files: Vec<String>,
    pub long_context_selection: Option<String>,
}

/// Body of a routed message. Encoded as multipart by the backend client:
/// `message`, `model` (or `preferred_model` for the one-shot endpoint),
/// `long_context_selection`, repeated `files` and repeated `backend_files`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageBody {
    pub message: String,
    pub model: String,
    pub long_context_selection: Option<String>,
    pub files: Vec<LocalFile>,
    pub backend_files: Vec<String>,
}

/// A routing decision: endpoint plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedMessage {
    pub endpoint: Endpoint,
    pub body: MessageBody,
}

/// Routing decisions for outgoing messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageRouter {
    policy: AttachmentPolicy,
}

impl MessageRouter {
    pub fn new(policy: AttachmentPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AttachmentPolicy {
        self.policy
    }

    /// Whether a chat must exist before this message can be routed.
    pub fn needs_session(&self, message: &OutgoingMessage) -> bool {
        !self.is_stateless(message)
    }

    fn is_stateless(&self, message: &OutgoingMessage) -> bool {
        self.policy == AttachmentPolicy::Stateless
            && message.long_context_selection.is_none()
            && !message.local_files.is_empty()
    }

    /// Decide endpoint and body. `options` must be supplied when the message carries a
    /// long-context selection; `chat_id` must be set whenever [`needs_session`] is true.
    ///
    /// [`needs_session`]: MessageRouter::needs_session
    pub fn route(
        &self,
        chat_id: Option<&str>,
        message: OutgoingMessage,
        options: Option<&LongContextOptions>,
    ) -> Result<RoutedMessage, ChatError> {
        let endpoint = match message.long_context_selection.as_deref() {
            Some(selection) => {
                let extension = options
                    .and_then(|o| o.resolved_extension(selection))
                    .ok_or_else(|| ChatError::UnknownLongContext(selection.to_string()))?;
                let id = chat_id.ok_or(ChatError::NoActiveChat)?.to_string();
                if extension.as_deref() == Some(RAG_EXTENSION) {
                    Endpoint::Rag(id)
                } else {
                    Endpoint::Messages(id)
                }
            }
            None => match chat_id {
                Some(id) => Endpoint::Messages(id.to_string()),
                None if self.is_stateless(&message) => Endpoint::LongContext,
                None => return Err(ChatError::NoActiveChat),
            },
        };
        log::debug!("router: routed message to {}", endpoint);
        Ok(RoutedMessage {
            endpoint,
            body: MessageBody {
                message: message.message,
                model: message.model,
                long_context_selection: message.long_context_selection,
                files: message.local_files,
                backend_files: message.backend_files,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn options() -> LongContextOptions {
        let mut map = BTreeMap::new();
        map.insert("handbook".to_string(), vec!["idx/handbook.pkl".to_string()]);
        map.insert("laws".to_string(), vec!["docs/laws.txt".to_string()]);
        map.insert("upper".to_string(), vec!["idx/upper.PKL".to_string()]);
        LongContextOptions(map)
    }

    fn msg(selection: Option<&str>, files: usize) -> OutgoingMessage {
        OutgoingMessage {
            message: "hello".into(),
            model: "gpt-4o".into(),
            local_files: (0..files)
                .map(|i| LocalFile::new(format!("f{}.txt", i), vec![b'x']))
                .collect(),
            backend_files: vec![],
            long_context_selection: selection.map(str::to_string),
        }
    }

    #[test]
    fn pkl_selection_routes_to_rag() {
        let router = MessageRouter::default();
        let routed = router.route(Some("c1"), msg(Some("handbook"), 0), Some(&options())).unwrap();
        assert_eq!(routed.endpoint, Endpoint::Rag("c1".into()));
        assert_eq!(routed.body.long_context_selection.as_deref(), Some("handbook"));
    }

    #[test]
    fn other_extensions_route_to_messages() {
        let router = MessageRouter::default();
        for selection in ["laws", "upper"] {
            let routed = router.route(Some("c1"), msg(Some(selection), 0), Some(&options())).unwrap();
            assert_eq!(routed.endpoint, Endpoint::Messages("c1".into()), "{}", selection);
        }
    }

    #[test]
    fn no_selection_routes_to_messages() {
        let router = MessageRouter::default();
        let routed = router.route(Some("c1"), msg(None, 2), None).unwrap();
        assert_eq!(routed.endpoint, Endpoint::Messages("c1".into()));
        assert_eq!(routed.body.files.len(), 2);
    }

    #[test]
    fn unknown_selection_is_rejected() {
        let router = MessageRouter::default();
        let err = router.route(Some("c1"), msg(Some("nope"), 0), Some(&options())).unwrap_err();
        assert!(matches!(err, ChatError::UnknownLongContext(ref s) if s == "nope"));
    }

    #[test]
    fn stateless_policy_uses_long_context_endpoint_only_without_chat() {
        let router = MessageRouter::new(AttachmentPolicy::Stateless);
        assert!(!router.needs_session(&msg(None, 1)));
        assert!(router.needs_session(&msg(None, 0)));
        assert!(router.needs_session(&msg(Some("laws"), 1)));

        let routed = router.route(None, msg(None, 1), None).unwrap();
        assert_eq!(routed.endpoint, Endpoint::LongContext);
        let routed = router.route(Some("c1"), msg(None, 1), None).unwrap();
        assert_eq!(routed.endpoint, Endpoint::Messages("c1".into()));
    }

    #[test]
    fn session_scoped_policy_requires_chat() {
        let router = MessageRouter::default();
        assert!(router.needs_session(&msg(None, 1)));
        assert!(matches!(
            router.route(None, msg(None, 1), None),
            Err(ChatError::NoActiveChat)
        ));
    }

    #[test]
    fn endpoint_display_joins_segments() {
        assert_eq!(Endpoint::Rag("abc".into()).to_string(), "/chats/abc/rag");
        assert_eq!(Endpoint::LongContext.to_string(), "/chat/long-context");
    }
}
