//! Link marker files.
//!
//! A folder may contain small text files named like `link_<Title>.txt` whose
//! content is a URL rather than deliverable data. They are sent as a text
//! message (`<Title>\n<url>`) and never delivered as documents.

use std::sync::LazyLock;

use protocol::RemoteEntry;
use regex::Regex;

/// Shown in place of the URL when a marker file yields none.
pub const LINK_NOT_FOUND: &str = "(link not found)";

/// `URL=<url>` on a line of its own, as in `.url` shortcut files.
static KEY_VALUE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^URL\s*=\s*(https?://\S+)\s*$").expect("valid URL line pattern")
});

/// Any bare http(s) URL.
static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid bare URL pattern"));

/// Naming convention identifying marker files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerRule {
    prefix: String,
    suffix: String,
}

impl MarkerRule {
    /// Create a rule; matching is case-insensitive.
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().to_lowercase(),
            suffix: suffix.into().to_lowercase(),
        }
    }

    /// Whether a file name follows the marker convention.
    pub fn is_marker(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        lower.len() >= self.prefix.len() + self.suffix.len()
            && lower.starts_with(&self.prefix)
            && lower.ends_with(&self.suffix)
    }

    /// Display title: the file name without suffix and prefix.
    pub fn title(&self, name: &str) -> String {
        let base = strip_suffix_ci(name, &self.suffix).unwrap_or(name);
        strip_prefix_ci(base, &self.prefix)
            .unwrap_or(base)
            .to_string()
    }

    /// Split a file listing into marker files and deliverable files.
    pub fn partition(&self, files: Vec<RemoteEntry>) -> (Vec<RemoteEntry>, Vec<RemoteEntry>) {
        files.into_iter().partition(|file| self.is_marker(&file.name))
    }
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let cut = s.len().checked_sub(suffix.len())?;
    if !s.is_char_boundary(cut) {
        return None;
    }
    let (head, tail) = s.split_at(cut);
    (tail.to_lowercase() == suffix).then_some(head)
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() < prefix.len() || !s.is_char_boundary(prefix.len()) {
        return None;
    }
    let (head, tail) = s.split_at(prefix.len());
    (head.to_lowercase() == prefix).then_some(tail)
}

/// Find the URL a marker file points at.
///
/// A `URL=` line wins; otherwise the first bare URL anywhere in the text.
pub fn extract_url(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    if let Some(caps) = KEY_VALUE_URL.captures(text) {
        return caps.get(1).map(|m| m.as_str().trim().to_string());
    }
    BARE_URL.find(text).map(|m| m.as_str().trim().to_string())
}

/// Text message announcing a link.
pub fn link_message(title: &str, url: Option<&str>) -> String {
    match url {
        Some(url) => format!("{title}\n{url}"),
        None => format!("{title}\n{LINK_NOT_FOUND}"),
    }
}
