//! Lytchat core library: session bookkeeping, message routing and the chat controller that
//! drives the chat-completion backend, shared by the CLI and any other front end.

pub mod attachments;
pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod guard;
pub mod init;
pub mod links;
pub mod router;
pub mod session;
pub mod view;

pub use controller::{ChatController, NEW_CHAT};
pub use error::ChatError;
