//! Messaging transport.
//!
//! The navigator and dispatcher talk to the chat front-end only through
//! [`Notifier`]; the orchestrator pulls inbound events through
//! [`UpdateSource`]. [`TelegramBot`] implements both over the Bot API.

pub mod telegram;

use std::future::Future;

use protocol::{BotError, Interaction, Keyboard, Upstream};
use thiserror::Error;

pub use telegram::TelegramBot;

/// Errors raised by the messaging transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// An edit would leave the message unchanged.
    #[error("message is not modified")]
    NotModified,

    /// The target message can no longer be edited.
    #[error("message cannot be edited: {0}")]
    NotEditable(String),

    /// The bot is not allowed to act in the chat.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The API rejected the call.
    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    /// The request never got an API answer.
    #[error("request failed: {0}")]
    Http(String),
}

impl NotifyError {
    /// Classify an API error answer.
    pub fn from_api(code: i64, description: impl Into<String>) -> Self {
        let description = description.into();
        let lower = description.to_lowercase();
        if lower.contains("message is not modified") {
            NotifyError::NotModified
        } else if lower.contains("message can't be edited") || lower.contains("message to edit not found") {
            NotifyError::NotEditable(description)
        } else if code == 403 {
            NotifyError::Forbidden(description)
        } else {
            NotifyError::Api { code, description }
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL embeds the bot token.
        NotifyError::Http(err.without_url().to_string())
    }
}

impl From<NotifyError> for BotError {
    fn from(err: NotifyError) -> Self {
        BotError::upstream(Upstream::Transport, err.to_string())
    }
}

/// Outbound half of the messaging transport.
pub trait Notifier: Send + Sync {
    /// Send a plain text message.
    fn send_text(
        &self,
        chat_id: i64,
        text: &str,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;

    /// Send a message carrying a button menu.
    fn send_menu(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: &Keyboard,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;

    /// Replace the text and buttons of an earlier menu message.
    fn edit_menu(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: &Keyboard,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;

    /// Send the file behind `url` as a document named `filename`.
    fn send_document(
        &self,
        chat_id: i64,
        url: &str,
        filename: &str,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;

    /// Acknowledge a button press, optionally with a toast or alert.
    fn ack_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Inbound half of the messaging transport.
pub trait UpdateSource: Send + Sync {
    /// Wait for the next batch of interactions.
    ///
    /// Returning a batch acknowledges it; it will not be delivered again.
    fn next_batch(&self) -> impl Future<Output = Result<Vec<Interaction>, NotifyError>> + Send;
}
