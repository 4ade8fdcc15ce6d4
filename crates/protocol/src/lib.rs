//! # DiskNav Protocol Library
//!
//! This crate provides the transport-neutral vocabulary shared by the DiskNav
//! daemon and its collaborators.
//!
//! ## Overview
//!
//! - **Interactions**: normalised inbound events (commands, button presses, text)
//!   tagged with the acting principal and the chat context
//! - **Menus**: keyboards of buttons whose payloads are short opaque tokens
//! - **Storage entries**: folders and files as listed by the remote storage
//! - **Errors**: the interaction-level error taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{Button, CallbackPayload, Keyboard};
//!
//! let mut keyboard = Keyboard::new();
//! keyboard.push(Button::new("Docs", CallbackPayload::navigate("0123456789abcdef")));
//!
//! let pressed = &keyboard.rows[0][0].payload;
//! assert_eq!(
//!     CallbackPayload::parse(pressed),
//!     CallbackPayload::Navigate("0123456789abcdef".to_string())
//! );
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Interaction, keyboard and storage entry definitions
//! - [`error`]: Error types

pub mod error;
pub mod messages;

pub use error::{BotError, Result, Upstream};
pub use messages::{
    Button, CallbackPayload, ChatContext, ContextKind, EntryKind, Interaction, InteractionKind,
    Keyboard, Principal, RemoteEntry, NAV_PREFIX,
};
