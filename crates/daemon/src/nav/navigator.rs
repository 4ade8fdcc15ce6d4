//! One browse step, from button press (or `/go`) to delivered files.
//!
//! A step runs Authorize → Resolve → List → ExtractLinks → Filter → Render →
//! Deliver. Listing and authorization failures end the step; link, probe
//! and per-file failures are isolated. A render failure does not stop
//! delivery but is reported as the step result.

use std::sync::Arc;
use std::time::Duration;

use protocol::{BotError, Button, CallbackPayload, ChatContext, Keyboard, Principal, RemoteEntry};

use super::links::{extract_url, link_message, MarkerRule};
use super::paths;
use super::tokens::TokenStore;
use crate::access::{AccessPolicy, MembershipOracle};
use crate::config::Config;
use crate::storage::{DirectoryClient, RemoteStorage, SubtreeFilter};
use crate::transport::{Notifier, NotifyError};

/// Label of the button leading to the parent folder.
pub const BACK_LABEL: &str = "⬅️ Back";
/// Reply to principals failing the access rule.
pub const ACCESS_DENIED: &str = "Access denied.";
/// Callback toast shown while a step is running.
pub const LOADING: &str = "Loading…";
/// Announcement preceding document delivery.
pub const SENDING_FILES: &str = "Sending files…";

/// What a completed step did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Folder the step displayed.
    pub path: String,
    /// Marker files announced as links.
    pub links: usize,
    /// Folders offered as buttons.
    pub folders: usize,
    /// Documents dispatched.
    pub delivered: usize,
    /// Documents that could not be dispatched.
    pub failed: usize,
}

/// How the step was triggered.
#[derive(Debug, Clone, Copy)]
enum Origin<'a> {
    Command,
    Callback {
        callback_id: &'a str,
        message_id: Option<i64>,
    },
}

/// Step settings taken from configuration.
#[derive(Debug, Clone)]
pub struct NavSettings {
    pub root: String,
    pub root_title: String,
    pub marker: MarkerRule,
    pub marker_max_bytes: usize,
    pub delivery_pause: Duration,
}

impl NavSettings {
    pub fn from_config(config: &Config) -> Self {
        let storage = &config.storage;
        Self {
            root: storage.root_path.clone(),
            root_title: storage.root_title.clone(),
            marker: MarkerRule::new(&storage.marker_prefix, &storage.marker_suffix),
            marker_max_bytes: storage.marker_max_bytes,
            delivery_pause: storage.delivery_pause(),
        }
    }
}

/// Folder navigation controller.
pub struct Navigator<S, N, O> {
    client: DirectoryClient<S>,
    filter: SubtreeFilter,
    tokens: TokenStore,
    policy: Arc<AccessPolicy<O>>,
    notifier: Arc<N>,
    settings: NavSettings,
}

impl<S, N, O> Navigator<S, N, O>
where
    S: RemoteStorage,
    N: Notifier,
    O: MembershipOracle,
{
    /// Create a navigator over `storage`.
    pub fn new(storage: S, notifier: Arc<N>, policy: Arc<AccessPolicy<O>>, config: &Config) -> Self {
        let settings = NavSettings::from_config(config);
        Self {
            client: DirectoryClient::new(storage),
            filter: SubtreeFilter::new(config.storage.probe_concurrency),
            tokens: TokenStore::new(settings.root.clone(), config.tokens.capacity),
            policy,
            notifier,
            settings,
        }
    }

    /// The token store backing button payloads.
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// The access rule applied before every step.
    pub fn policy(&self) -> &AccessPolicy<O> {
        &self.policy
    }

    /// The outbound transport.
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Show the root folder in reply to a command.
    pub async fn open(&self, principal: &Principal, context: &ChatContext) -> Result<StepReport, BotError> {
        if !self.policy.permits(principal, context).await {
            self.deny(context, Origin::Command).await;
            return Err(BotError::AccessDenied);
        }
        let root = self.settings.root.clone();
        self.browse(context, root, Origin::Command).await
    }

    /// Handle a button press on an earlier menu.
    pub async fn navigate(
        &self,
        principal: &Principal,
        context: &ChatContext,
        callback_id: &str,
        message_id: Option<i64>,
        payload: &str,
    ) -> Result<StepReport, BotError> {
        let origin = Origin::Callback {
            callback_id,
            message_id,
        };
        if !self.policy.permits(principal, context).await {
            self.deny(context, origin).await;
            return Err(BotError::AccessDenied);
        }

        let path = match CallbackPayload::parse(payload) {
            CallbackPayload::Navigate(key) => self.tokens.get(&key),
            CallbackPayload::Unknown(raw) => {
                self.ack(callback_id, None, false).await;
                return Err(BotError::NotFound(format!("callback payload {raw:?}")));
            }
        };

        // Answer before the slow part or the client shows a spinner until timeout.
        self.ack(callback_id, Some(LOADING), false).await;
        self.browse(context, path, origin).await
    }

    async fn browse(&self, context: &ChatContext, path: String, origin: Origin<'_>) -> Result<StepReport, BotError> {
        let chat = context.id;
        tracing::debug!(chat, path = %path, "Browse step");

        let listing = match self.client.list(&path).await {
            Ok(listing) => listing,
            Err(e) => {
                tracing::warn!(chat, path = %path, error = %e, "Listing failed");
                self.say(chat, &format!("Storage error: {e}")).await;
                return Err(e.into());
            }
        };

        let (markers, files) = self.settings.marker.partition(listing.files);
        let links = self.send_links(chat, &markers).await;

        let dirs = self.filter.filter_nonempty(&self.client, listing.dirs).await;
        let folders = dirs.len();
        let rendered = self.render(chat, &path, &dirs, origin).await;

        let (delivered, failed) = self.deliver(chat, &files).await;

        let report = StepReport {
            path,
            links,
            folders,
            delivered,
            failed,
        };
        match rendered {
            Ok(()) => Ok(report),
            Err(reason) => Err(BotError::RenderFallbackExhausted(reason)),
        }
    }

    /// Announce each marker file as a link message.
    async fn send_links(&self, chat: i64, markers: &[RemoteEntry]) -> usize {
        for marker in markers {
            let title = self.settings.marker.title(&marker.name);
            let url = match self.client.read_text(&marker.path, self.settings.marker_max_bytes).await {
                Ok(text) => extract_url(&text),
                Err(e) => {
                    tracing::warn!(path = %marker.path, error = %e, "Could not read link file");
                    None
                }
            };
            self.say(chat, &link_message(&title, url.as_deref())).await;
        }
        markers.len()
    }

    fn keyboard(&self, path: &str, dirs: &[RemoteEntry]) -> Keyboard {
        let mut keyboard = Keyboard::new();
        if !paths::is_root(path, &self.settings.root) {
            let parent = paths::parent(path, &self.settings.root);
            let key = self.tokens.put(&parent);
            keyboard.push(Button::new(BACK_LABEL, CallbackPayload::navigate(&key)));
        }
        for dir in dirs {
            let key = self.tokens.put(&dir.path);
            keyboard.push(Button::new(dir.name.clone(), CallbackPayload::navigate(&key)));
        }
        keyboard
    }

    fn title<'a>(&'a self, path: &'a str) -> &'a str {
        if paths::is_root(path, &self.settings.root) {
            &self.settings.root_title
        } else {
            paths::last_segment(path)
        }
    }

    /// Show the folder menu. `Err` carries the reason both attempts failed.
    async fn render(&self, chat: i64, path: &str, dirs: &[RemoteEntry], origin: Origin<'_>) -> Result<(), String> {
        let at_root = paths::is_root(path, &self.settings.root);
        if dirs.is_empty() && at_root {
            let notice = format!("No folders in {}", self.settings.root_title);
            self.say(chat, &notice).await;
            return Ok(());
        }

        let keyboard = self.keyboard(path, dirs);
        let text = format!("{}:", self.title(path));

        let edit_error = match origin {
            Origin::Callback {
                message_id: Some(message_id),
                ..
            } => match self.notifier.edit_menu(chat, message_id, &text, &keyboard).await {
                Ok(()) | Err(NotifyError::NotModified) => return Ok(()),
                Err(e) => {
                    tracing::debug!(chat, message_id, error = %e, "Menu edit failed, sending a new menu");
                    Some(e)
                }
            },
            _ => None,
        };

        match self.notifier.send_menu(chat, &text, &keyboard).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let reason = match edit_error {
                    Some(edit) => format!("edit failed: {edit}; send failed: {e}"),
                    None => format!("send failed: {e}"),
                };
                tracing::warn!(chat, path, %reason, "Menu could not be rendered");
                Err(reason)
            }
        }
    }

    /// Send each file as a document, pausing between dispatches.
    async fn deliver(&self, chat: i64, files: &[RemoteEntry]) -> (usize, usize) {
        if files.is_empty() {
            return (0, 0);
        }
        self.say(chat, SENDING_FILES).await;

        let (mut delivered, mut failed) = (0, 0);
        for (index, file) in files.iter().enumerate() {
            if index > 0 && !self.settings.delivery_pause.is_zero() {
                tokio::time::sleep(self.settings.delivery_pause).await;
            }
            match self.send_file(chat, file).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(chat, file = %file.name, error = %e, "Delivery failed");
                    self.say(chat, &format!("Could not send {}: {e}", file.name)).await;
                }
            }
        }
        tracing::info!(chat, delivered, failed, "Delivered files");
        (delivered, failed)
    }

    async fn send_file(&self, chat: i64, file: &RemoteEntry) -> Result<(), BotError> {
        let url = self.client.download_url(&file.path).await?;
        self.notifier.send_document(chat, &url, &file.name).await?;
        Ok(())
    }

    async fn deny(&self, context: &ChatContext, origin: Origin<'_>) {
        tracing::info!(chat = context.id, "Access denied");
        match origin {
            Origin::Callback { callback_id, .. } => self.ack(callback_id, Some(ACCESS_DENIED), true).await,
            Origin::Command => self.say(context.id, ACCESS_DENIED).await,
        }
    }

    async fn ack(&self, callback_id: &str, text: Option<&str>, alert: bool) {
        if let Err(e) = self.notifier.ack_callback(callback_id, text, alert).await {
            tracing::debug!(callback_id, error = %e, "Callback acknowledgement failed");
        }
    }

    /// Send a text message; failures are logged and swallowed.
    async fn say(&self, chat: i64, text: &str) {
        if let Err(e) = self.notifier.send_text(chat, text).await {
            tracing::warn!(chat, error = %e, "Could not send message");
        }
    }
}
