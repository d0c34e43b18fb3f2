//! Validation and normalization of URLs typed by the user for scraping.
//!
//! Accepted shapes: `cpm.no`, `www.cpm.no`, `http(s)://cpm.no`, `http(s)://www.cpm.no`.
//! Paths, ports and subdomains other than `www.` are not accepted.

use regex::Regex;
use std::sync::OnceLock;

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:https?://)?(?:www\.)?[a-zA-Z0-9][a-zA-Z0-9-]{1,61}[a-zA-Z0-9]\.[a-zA-Z]{2,}$")
            .expect("static url pattern compiles")
    })
}

/// True if `input` is a bare domain, a `www.` domain or an http(s) URL of that shape.
pub fn is_valid_url(input: &str) -> bool {
    url_pattern().is_match(input.trim())
}

/// Bring accepted input to `https://...`: bare domains get `https://www.`, `www.` domains get
/// `https://`, and `http://` is upgraded.
pub fn normalize_url(input: &str) -> String {
    let url = input.trim();
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("https://") {
        return url.to_string();
    }
    if lower.starts_with("http://") {
        return format!("https://{}", &url["http://".len()..]);
    }
    if lower.starts_with("www.") {
        format!("https://{}", url)
    } else {
        format!("https://www.{}", url)
    }
}
