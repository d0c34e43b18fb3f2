//! Errors surfaced by chat operations.

use crate::backend::BackendError;
use crate::guard::Operation;

/// Failure of a user-triggered chat operation. Every failure is terminal for that action.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("{0} is already in progress")]
    Busy(Operation),
    #[error("message is empty")]
    EmptyMessage,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("no files selected")]
    NoFiles,
    #[error("at most {0} attachments are allowed")]
    AttachmentLimit(usize),
    #[error("no active chat")]
    NoActiveChat,
    #[error("unknown long-context option: {0}")]
    UnknownLongContext(String),
}

impl From<crate::attachments::SlotsFull> for ChatError {
    fn from(e: crate::attachments::SlotsFull) -> Self {
        ChatError::AttachmentLimit(e.0)
    }
}
