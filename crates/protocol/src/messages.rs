//! Transport-neutral message definitions for DiskNav.
//!
//! Inbound events from the chat front-end are normalised into an
//! [`Interaction`]; outbound menus are described by a [`Keyboard`]. Button
//! payloads use the small text codec implemented by [`CallbackPayload`].

use serde::{Deserialize, Serialize};

/// Prefix of a navigation callback payload (`nav:<token>`).
pub const NAV_PREFIX: &str = "nav:";

/// The end-user initiating an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable numeric user id.
    pub id: i64,
    /// Optional public handle (without a leading `@`).
    pub username: Option<String>,
}

impl Principal {
    /// Create a principal without a handle.
    pub fn new(id: i64) -> Self {
        Self { id, username: None }
    }

    /// Attach a public handle.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Kind of chat an interaction happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextKind {
    /// One-to-one chat with the bot.
    Private,
    /// Basic group.
    Group,
    /// Supergroup.
    Supergroup,
    /// Broadcast channel.
    Channel,
    /// Anything the transport could not classify.
    #[serde(other)]
    Other,
}

impl ContextKind {
    /// Whether this is a shared (multi-user) space.
    pub fn is_shared(&self) -> bool {
        matches!(self, ContextKind::Group | ContextKind::Supergroup)
    }
}

/// The chat in which an interaction occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    /// Chat identifier.
    pub id: i64,
    /// Chat kind.
    pub kind: ContextKind,
}

impl ChatContext {
    /// Private chat with the given id.
    pub fn private(id: i64) -> Self {
        Self {
            id,
            kind: ContextKind::Private,
        }
    }

    /// Supergroup with the given id.
    pub fn group(id: i64) -> Self {
        Self {
            id,
            kind: ContextKind::Supergroup,
        }
    }
}

/// What the principal did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InteractionKind {
    /// A slash command such as `/go`.
    Command {
        /// Command name without the slash or bot mention.
        name: String,
        /// Remaining text after the command.
        args: String,
    },
    /// A button press on a previously rendered menu.
    Callback {
        /// Transport id used to acknowledge the press.
        callback_id: String,
        /// Message carrying the pressed menu, if still known.
        message_id: Option<i64>,
        /// Raw button payload.
        payload: String,
    },
    /// Free text.
    Text {
        /// The message text.
        text: String,
    },
}

/// A single inbound event from the messaging transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Who acted.
    pub principal: Principal,
    /// Where they acted.
    pub context: ChatContext,
    /// What they did.
    pub kind: InteractionKind,
}

impl Interaction {
    /// Build a command interaction.
    pub fn command(principal: Principal, context: ChatContext, name: &str, args: &str) -> Self {
        Self {
            principal,
            context,
            kind: InteractionKind::Command {
                name: name.to_string(),
                args: args.to_string(),
            },
        }
    }

    /// Build a callback interaction.
    pub fn callback(
        principal: Principal,
        context: ChatContext,
        callback_id: &str,
        message_id: Option<i64>,
        payload: &str,
    ) -> Self {
        Self {
            principal,
            context,
            kind: InteractionKind::Callback {
                callback_id: callback_id.to_string(),
                message_id,
                payload: payload.to_string(),
            },
        }
    }

    /// Build a free-text interaction.
    pub fn text(principal: Principal, context: ChatContext, text: &str) -> Self {
        Self {
            principal,
            context,
            kind: InteractionKind::Text {
                text: text.to_string(),
            },
        }
    }
}

/// Decoded button payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackPayload {
    /// Navigate to the path stored under this token.
    Navigate(String),
    /// A payload this bot did not produce.
    Unknown(String),
}

impl CallbackPayload {
    /// Decode a raw payload string.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some(("nav", key)) => CallbackPayload::Navigate(key.to_string()),
            _ => CallbackPayload::Unknown(raw.to_string()),
        }
    }

    /// Encode a navigation payload for a token key.
    pub fn navigate(key: &str) -> String {
        format!("{NAV_PREFIX}{key}")
    }
}

/// One interactive button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Visible label.
    pub label: String,
    /// Opaque payload returned on press.
    pub payload: String,
}

impl Button {
    /// Create a button.
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Rows of buttons attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    /// Button rows, rendered top to bottom.
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    /// Create an empty keyboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row holding a single button.
    pub fn push(&mut self, button: Button) {
        self.rows.push(vec![button]);
    }

    /// Whether the keyboard has no buttons.
    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.is_empty())
    }

    /// Iterate all buttons in display order.
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.rows.iter().flatten()
    }
}

/// Kind of a remote storage entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A folder.
    Dir,
    /// A regular file.
    File,
}

/// A remote storage entry, as listed by the storage service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Entry name (last path segment).
    pub name: String,
    /// Full remote path.
    pub path: String,
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl RemoteEntry {
    /// Create a directory entry.
    pub fn dir(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: EntryKind::Dir,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: EntryKind::File,
        }
    }

    /// Whether this entry is a folder.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_navigate_payload() {
        assert_eq!(
            CallbackPayload::parse("nav:0123456789abcdef"),
            CallbackPayload::Navigate("0123456789abcdef".to_string())
        );
    }

    #[test]
    fn test_parse_navigate_keeps_extra_colons() {
        assert_eq!(
            CallbackPayload::parse("nav:a:b"),
            CallbackPayload::Navigate("a:b".to_string())
        );
    }

    #[test]
    fn test_parse_unknown_payload() {
        assert_eq!(
            CallbackPayload::parse("vote:1"),
            CallbackPayload::Unknown("vote:1".to_string())
        );
        assert_eq!(
            CallbackPayload::parse("nav"),
            CallbackPayload::Unknown("nav".to_string())
        );
    }

    #[test]
    fn test_navigate_encoding_fits_button_limit() {
        let payload = CallbackPayload::navigate("0123456789abcdef");
        assert_eq!(payload, "nav:0123456789abcdef");
        // Telegram caps callback data at 64 bytes.
        assert!(payload.len() <= 64);
    }

    #[test]
    fn test_context_kind_shared() {
        assert!(ContextKind::Group.is_shared());
        assert!(ContextKind::Supergroup.is_shared());
        assert!(!ContextKind::Private.is_shared());
        assert!(!ContextKind::Channel.is_shared());
        assert!(!ContextKind::Other.is_shared());
    }

    #[test]
    fn test_context_kind_deserialize_unknown() {
        let kind: ContextKind = serde_json::from_str("\"forum\"").unwrap();
        assert_eq!(kind, ContextKind::Other);
        let kind: ContextKind = serde_json::from_str("\"supergroup\"").unwrap();
        assert_eq!(kind, ContextKind::Supergroup);
    }

    #[test]
    fn test_keyboard_push_and_iterate() {
        let mut keyboard = Keyboard::new();
        assert!(keyboard.is_empty());

        keyboard.push(Button::new("A", "nav:1"));
        keyboard.push(Button::new("B", "nav:2"));

        assert!(!keyboard.is_empty());
        assert_eq!(keyboard.rows.len(), 2);
        let labels: Vec<&str> = keyboard.buttons().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B"]);
    }

    #[test]
    fn test_remote_entry_deserialize() {
        let json = r#"{"name":"Docs","path":"/materials/Docs","type":"dir"}"#;
        let entry: RemoteEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry, RemoteEntry::dir("Docs", "/materials/Docs"));
        assert!(entry.is_dir());
    }

    #[test]
    fn test_interaction_constructors() {
        let principal = Principal::new(7).with_username("alice");
        let ctx = ChatContext::private(7);

        let cmd = Interaction::command(principal.clone(), ctx, "go", "");
        assert!(matches!(cmd.kind, InteractionKind::Command { ref name, .. } if name == "go"));

        let cb = Interaction::callback(principal, ctx, "cb1", Some(10), "nav:abc");
        match cb.kind {
            InteractionKind::Callback {
                callback_id,
                message_id,
                payload,
            } => {
                assert_eq!(callback_id, "cb1");
                assert_eq!(message_id, Some(10));
                assert_eq!(payload, "nav:abc");
            }
            _ => panic!("Expected callback interaction"),
        }
    }
}
