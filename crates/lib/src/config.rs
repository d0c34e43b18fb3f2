//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.lytchat/config.json`) and environment.
//! Every key is optional; a missing file yields the defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Backend location.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Chat behaviour (models, titles, routing policy).
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Where the chat backend lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL of the backend (default "http://localhost:8000"). Overridden by LYTCHAT_API_BASE_URL env.
    pub base_url: Option<String>,
}

/// How local file attachments are sent when no chat exists yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttachmentPolicy {
    /// Always send through the chat-scoped endpoint, creating a chat first when needed.
    #[default]
    SessionScoped,
    /// With files attached and no chat, send to the one-shot /chat/long-context endpoint.
    Stateless,
}

/// Chat defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    /// Model used when the backend has not offered any (default "gpt-4o").
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Title sent when creating a chat.
    #[serde(default = "default_new_chat_title")]
    pub new_chat_title: String,

    /// Crawl depth sent with URL scrapes.
    #[serde(default = "default_scrape_max_depth")]
    pub scrape_max_depth: u32,

    #[serde(default)]
    pub attachment_policy: AttachmentPolicy,

    /// Prompt sent right after a URL has been scraped successfully. `null` or "" disables it.
    #[serde(default = "default_scrape_summary_prompt")]
    pub scrape_summary_prompt: Option<String>,

    /// Text shown while waiting for a reply.
    #[serde(default = "default_placeholder_text")]
    pub placeholder_text: String,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_new_chat_title() -> String {
    "New chat".to_string()
}

fn default_scrape_max_depth() -> u32 {
    1
}

fn default_scrape_summary_prompt() -> Option<String> {
    Some(
        "Write a short description of the website's content in 3 to 4 paragraphs. \
         Include contact details and any company information it contains."
            .to_string(),
    )
}

fn default_placeholder_text() -> String {
    "Generating response...".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            new_chat_title: default_new_chat_title(),
            scrape_max_depth: default_scrape_max_depth(),
            attachment_policy: AttachmentPolicy::default(),
            scrape_summary_prompt: default_scrape_summary_prompt(),
            placeholder_text: default_placeholder_text(),
        }
    }
}

/// Resolve the backend base URL: env LYTCHAT_API_BASE_URL overrides config; falls back to localhost:8000.
pub fn resolve_base_url(config: &Config) -> String {
    std::env::var("LYTCHAT_API_BASE_URL")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            config
                .backend
                .base_url
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("LYTCHAT_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".lytchat").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, or the default path (or LYTCHAT_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
