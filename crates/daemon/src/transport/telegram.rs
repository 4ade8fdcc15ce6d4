//! Telegram Bot API transport.
//!
//! Long-polls `getUpdates`, normalises updates into [`Interaction`]s, and
//! implements [`Notifier`] plus [`MembershipOracle`] over the same HTTP
//! client.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use protocol::{ChatContext, ContextKind, Interaction, Keyboard, Principal};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{NotifyError, Notifier, UpdateSource};
use crate::access::{MemberStatus, MembershipOracle, OracleError};
use crate::config::TelegramConfig;

/// Extra time allowed on top of the long-poll timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
const READ_TIMEOUT: Duration = Duration::from_secs(900);

/// Bot API client.
#[derive(Clone)]
pub struct TelegramBot {
    client: Client,
    base: String,
    poll_timeout: Duration,
    offset: std::sync::Arc<AtomicI64>,
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("poll_timeout", &self.poll_timeout)
            .field("offset", &self.offset.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    from: Option<User>,
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    #[serde(rename = "type")]
    kind: ContextKind,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    message: Option<Message>,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMember {
    status: String,
}

#[derive(Debug, Serialize)]
struct InlineButton<'a> {
    text: &'a str,
    callback_data: &'a str,
}

/// `{"inline_keyboard": [[{text, callback_data}], ...]}`
fn reply_markup(keyboard: &Keyboard) -> serde_json::Value {
    let rows: Vec<Vec<InlineButton<'_>>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|button| InlineButton {
                    text: &button.label,
                    callback_data: &button.payload,
                })
                .collect()
        })
        .collect();
    json!({ "inline_keyboard": rows })
}

impl User {
    fn principal(&self) -> Principal {
        Principal {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

impl Chat {
    fn context(&self) -> ChatContext {
        ChatContext {
            id: self.id,
            kind: self.kind,
        }
    }
}

/// Split `/name@bot args` into `("name", "args")`.
fn parse_command(text: &str) -> Option<(String, &str)> {
    let rest = text.strip_prefix('/')?;
    let (head, args) = rest
        .split_once(char::is_whitespace)
        .unwrap_or((rest, ""));
    let name = head.split('@').next().unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    Some((name.to_lowercase(), args.trim()))
}

/// Normalise one update; updates the bot does not handle yield `None`.
fn into_interaction(update: Update) -> Option<Interaction> {
    if let Some(query) = update.callback_query {
        // Callbacks from inline-mode messages carry no chat and are not ours.
        let message = query.message?;
        return Some(Interaction::callback(
            query.from.principal(),
            message.chat.context(),
            &query.id,
            Some(message.message_id),
            query.data.as_deref().unwrap_or_default(),
        ));
    }

    let message = update.message?;
    let principal = message.from.as_ref()?.principal();
    let context = message.chat.context();
    let text = message.text?;
    match parse_command(&text) {
        Some((name, args)) => Some(Interaction::command(principal, context, &name, args)),
        None => Some(Interaction::text(principal, context, &text)),
    }
}

impl TelegramBot {
    /// Build a client from the transport configuration.
    pub fn new(config: &TelegramConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base: format!("{}/bot{}", config.api_base.trim_end_matches('/'), config.bot_token),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
            offset: std::sync::Arc::new(AtomicI64::new(0)),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, NotifyError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    /// Download `url` as a stream and upload it as a document.
    async fn upload_document(&self, chat_id: i64, url: &str, filename: &str) -> Result<(), NotifyError> {
        let download = self.client.get(url).send().await?;
        let status = download.status();
        if !status.is_success() {
            return Err(NotifyError::Http(format!("download failed with HTTP {}", status.as_u16())));
        }

        let part = Part::stream(Body::wrap_stream(download.bytes_stream())).file_name(filename.to_string());
        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);
        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        decode::<IgnoredAny>(response).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, NotifyError> {
    let status = response.status().as_u16();
    let envelope: ApiResponse<T> = response
        .json()
        .await
        .map_err(|e| NotifyError::Http(format!("unreadable API answer (HTTP {status}): {}", e.without_url())))?;
    if envelope.ok {
        return envelope.result.ok_or_else(|| NotifyError::Api {
            code: i64::from(status),
            description: "missing result".to_string(),
        });
    }
    Err(NotifyError::from_api(
        envelope.error_code.unwrap_or(i64::from(status)),
        envelope.description.unwrap_or_default(),
    ))
}

impl UpdateSource for TelegramBot {
    async fn next_batch(&self) -> Result<Vec<Interaction>, NotifyError> {
        let body = json!({
            "offset": self.offset.load(Ordering::SeqCst),
            "timeout": self.poll_timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(self.poll_timeout + POLL_GRACE)
            .json(&body)
            .send()
            .await?;
        let updates: Vec<Update> = decode(response).await?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset.store(last + 1, Ordering::SeqCst);
        }
        let received = updates.len();
        let interactions: Vec<Interaction> = updates.into_iter().filter_map(into_interaction).collect();
        if received > 0 {
            tracing::debug!(received, handled = interactions.len(), "Polled updates");
        }
        Ok(interactions)
    }
}

impl Notifier for TelegramBot {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        let body = json!({ "chat_id": chat_id, "text": text });
        self.call::<IgnoredAny>("sendMessage", &body).await?;
        Ok(())
    }

    async fn send_menu(&self, chat_id: i64, text: &str, keyboard: &Keyboard) -> Result<(), NotifyError> {
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "reply_markup": reply_markup(keyboard),
        });
        self.call::<IgnoredAny>("sendMessage", &body).await?;
        Ok(())
    }

    async fn edit_menu(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), NotifyError> {
        let body = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "reply_markup": reply_markup(keyboard),
        });
        self.call::<IgnoredAny>("editMessageText", &body).await?;
        Ok(())
    }

    async fn send_document(&self, chat_id: i64, url: &str, filename: &str) -> Result<(), NotifyError> {
        self.upload_document(chat_id, url, filename).await
    }

    async fn ack_callback(&self, callback_id: &str, text: Option<&str>, alert: bool) -> Result<(), NotifyError> {
        let mut body = json!({ "callback_query_id": callback_id, "show_alert": alert });
        if let Some(text) = text {
            body["text"] = json!(text);
        }
        self.call::<IgnoredAny>("answerCallbackQuery", &body).await?;
        Ok(())
    }
}

impl MembershipOracle for TelegramBot {
    async fn member_status(&self, group_id: i64, principal_id: i64) -> Result<MemberStatus, OracleError> {
        let body = json!({ "chat_id": group_id, "user_id": principal_id });
        let member: ChatMember = match self.call("getChatMember", &body).await {
            Ok(member) => member,
            Err(NotifyError::Forbidden(_)) => return Err(OracleError::NoVisibility(group_id)),
            Err(NotifyError::Api { code: 400, .. }) => return Err(OracleError::NoVisibility(group_id)),
            Err(e) => return Err(OracleError::Other(e.to_string())),
        };
        MemberStatus::parse(&member.status)
            .ok_or_else(|| OracleError::Other(format!("unknown member status {:?}", member.status)))
    }
}
