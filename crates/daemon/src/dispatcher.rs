//! Interaction dispatcher.
//!
//! Receives normalised [`Interaction`]s and routes them to the navigator, the
//! lookup index or the `/id` handler based on interaction kind.

use protocol::{BotError, ChatContext, ContextKind, Interaction, InteractionKind, Principal};
use tracing::{debug, error, info, warn};

use crate::access::MembershipOracle;
use crate::lookup::{lookup_reply, LookupIndex, TabularSource};
use crate::nav::navigator::ACCESS_DENIED;
use crate::nav::{Navigator, StepReport};
use crate::orchestrator::InteractionHandler;
use crate::storage::RemoteStorage;
use crate::transport::Notifier;

/// Result type for dispatch operations.
pub type DispatchResult = Result<Handled, BotError>;

/// Reply when `/code` is sent without a query.
pub const CODE_USAGE: &str = "Usage: /code <code>";
/// Reply when lookups are switched off.
pub const LOOKUP_DISABLED: &str = "Lookup is not configured.";

/// What the dispatcher did with an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// A browse step ran.
    Browsed(StepReport),
    /// The chat id was echoed back.
    ChatId(i64),
    /// A code lookup ran.
    Lookup { query: String, value: Option<String> },
    /// The interaction is not handled by this bot.
    Ignored,
}

/// Routes interactions to their handlers.
pub struct Dispatcher<S, N, O, T> {
    navigator: Navigator<S, N, O>,
    lookup: Option<LookupIndex<T>>,
}

impl<S, N, O, T> Dispatcher<S, N, O, T>
where
    S: RemoteStorage,
    N: Notifier,
    O: MembershipOracle,
    T: TabularSource,
{
    /// Create a dispatcher; `lookup` is `None` when lookups are disabled.
    pub fn new(navigator: Navigator<S, N, O>, lookup: Option<LookupIndex<T>>) -> Self {
        Self { navigator, lookup }
    }

    /// The navigator handling browse steps.
    pub fn navigator(&self) -> &Navigator<S, N, O> {
        &self.navigator
    }

    /// Route one interaction.
    pub async fn dispatch(&self, interaction: &Interaction) -> DispatchResult {
        let Interaction {
            principal,
            context,
            kind,
        } = interaction;
        debug!(principal = principal.id, chat = context.id, ?kind, "Dispatching interaction");

        match kind {
            InteractionKind::Command { name, args } => match name.as_str() {
                "start" | "go" => self.navigator.open(principal, context).await.map(Handled::Browsed),
                "id" => self.handle_id(context).await,
                "code" => self.handle_lookup(principal, context, args, true).await,
                other => {
                    debug!(command = other, "Ignoring unknown command");
                    Ok(Handled::Ignored)
                }
            },
            InteractionKind::Callback {
                callback_id,
                message_id,
                payload,
            } => self
                .navigator
                .navigate(principal, context, callback_id, *message_id, payload)
                .await
                .map(Handled::Browsed),
            InteractionKind::Text { text } if context.kind == ContextKind::Private => {
                if self.lookup.is_none() {
                    return Ok(Handled::Ignored);
                }
                self.handle_lookup(principal, context, text, false).await
            }
            InteractionKind::Text { .. } => Ok(Handled::Ignored),
        }
    }

    /// Route one interaction and log its outcome.
    pub async fn handle(&self, interaction: &Interaction) {
        let chat = interaction.context.id;
        match self.dispatch(interaction).await {
            Ok(Handled::Ignored) => {}
            Ok(handled) => debug!(chat, ?handled, "Interaction handled"),
            Err(BotError::RenderFallbackExhausted(reason)) => {
                error!(chat, %reason, "Interaction failed: menu could not be rendered");
            }
            Err(BotError::AccessDenied) => info!(chat, principal = interaction.principal.id, "Interaction denied"),
            Err(BotError::NotFound(what)) => debug!(chat, %what, "Interaction referenced nothing"),
            Err(e @ BotError::UpstreamUnavailable { .. }) => warn!(chat, error = %e, "Interaction aborted"),
        }
    }

    /// Echo the chat id; needs no authorization.
    async fn handle_id(&self, context: &ChatContext) -> DispatchResult {
        self.navigator
            .notifier()
            .send_text(context.id, &context.id.to_string())
            .await?;
        Ok(Handled::ChatId(context.id))
    }

    async fn handle_lookup(
        &self,
        principal: &Principal,
        context: &ChatContext,
        query: &str,
        explicit: bool,
    ) -> DispatchResult {
        let notifier = self.navigator.notifier();
        if !self.navigator.policy().permits(principal, context).await {
            notifier.send_text(context.id, ACCESS_DENIED).await?;
            return Err(BotError::AccessDenied);
        }

        let Some(index) = &self.lookup else {
            notifier.send_text(context.id, LOOKUP_DISABLED).await?;
            return Ok(Handled::Ignored);
        };

        let query = query.trim();
        if query.is_empty() {
            if explicit {
                notifier.send_text(context.id, CODE_USAGE).await?;
            }
            return Ok(Handled::Ignored);
        }

        let value = match index.resolve(query).await {
            Ok(value) => value,
            Err(e) => {
                warn!(chat = context.id, error = %e, "Lookup source failed");
                notifier.send_text(context.id, &format!("Lookup error: {e}")).await?;
                return Err(e.into());
            }
        };
        info!(chat = context.id, query, found = value.is_some(), "Lookup");
        notifier
            .send_text(context.id, &lookup_reply(query, value.as_deref()))
            .await?;
        Ok(Handled::Lookup {
            query: query.to_string(),
            value,
        })
    }
}

impl<S, N, O, T> InteractionHandler for Dispatcher<S, N, O, T>
where
    S: RemoteStorage + 'static,
    N: Notifier + 'static,
    O: MembershipOracle + 'static,
    T: TabularSource + 'static,
{
    async fn handle(&self, interaction: &Interaction) {
        Dispatcher::handle(self, interaction).await;
    }
}
