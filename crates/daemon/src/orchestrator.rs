//! Bot orchestrator wiring the update source to the dispatcher.
//!
//! This module provides the [`Orchestrator`] that owns the long-poll loop:
//! every polled interaction is handled on its own task, polling failures
//! are retried after a fixed pause, and shutdown is signalled through a
//! cancellation token.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use protocol::Interaction;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::access::{AccessPolicy, MembershipGate};
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::lookup::{GoogleSheets, LookupIndex};
use crate::nav::Navigator;
use crate::storage::YandexDisk;
use crate::transport::{TelegramBot, UpdateSource};

/// Pause before polling again after a failed poll.
pub const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Initial state, not started.
    Stopped,
    /// Starting up.
    Starting,
    /// Polling for interactions.
    Running,
    /// Shutting down gracefully.
    ShuttingDown,
}

/// Events emitted by the orchestrator.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// Orchestrator state changed.
    StateChanged(OrchestratorState),
    /// A batch of interactions was received.
    Polled { count: usize },
    /// Polling failed and will be retried.
    PollFailed { message: String },
}

/// Something that can take care of one interaction.
pub trait InteractionHandler: Send + Sync + 'static {
    /// Handle the interaction; failures are the handler's to report.
    fn handle(&self, interaction: &Interaction) -> impl Future<Output = ()> + Send;
}

/// Orchestrator owning the polling loop.
pub struct Orchestrator<U, H> {
    /// Inbound interactions.
    source: Arc<U>,
    /// Per-interaction handler.
    handler: Arc<H>,
    /// Current state.
    state: Arc<RwLock<OrchestratorState>>,
    /// Pause after a failed poll.
    retry_delay: Duration,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
    /// Polling loop task.
    poll_task: Mutex<Option<JoinHandle<()>>>,
    /// Event sender.
    event_tx: broadcast::Sender<OrchestratorEvent>,
}

/// The production wiring: Telegram in front, Yandex.Disk and Sheets behind.
pub type BotDispatcher = Dispatcher<YandexDisk, TelegramBot, TelegramBot, GoogleSheets>;

impl Orchestrator<TelegramBot, BotDispatcher> {
    /// Build every component from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let bot = Arc::new(TelegramBot::new(&config.telegram).context("Failed to build Telegram client")?);
        let storage = YandexDisk::new(&config.storage).context("Failed to build storage client")?;

        let gate = MembershipGate::new(TelegramBot::clone(&bot), &config.access);
        let policy = Arc::new(AccessPolicy::new(gate));
        let navigator = Navigator::new(storage, Arc::clone(&bot), policy, config);

        let lookup = if config.lookup.enabled {
            let sheets = GoogleSheets::new(&config.lookup).context("Failed to build Sheets client")?;
            Some(LookupIndex::new(sheets, &config.lookup))
        } else {
            None
        };

        info!(
            root = %config.storage.root_path,
            groups = config.access.allowed_group_ids.len(),
            lookup = config.lookup.enabled,
            "Components initialized"
        );
        Ok(Self::new(bot, Arc::new(Dispatcher::new(navigator, lookup))))
    }
}

impl<U, H> Orchestrator<U, H>
where
    U: UpdateSource + 'static,
    H: InteractionHandler,
{
    /// Creates a new orchestrator.
    pub fn new(source: Arc<U>, handler: Arc<H>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            source,
            handler,
            state: Arc::new(RwLock::new(OrchestratorState::Stopped)),
            retry_delay: POLL_RETRY_DELAY,
            shutdown_token: CancellationToken::new(),
            poll_task: Mutex::new(None),
            event_tx,
        }
    }

    /// Sets the pause after a failed poll.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Returns the current state.
    pub async fn state(&self) -> OrchestratorState {
        *self.state.read().await
    }

    /// Returns a receiver for orchestrator events.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.event_tx.subscribe()
    }

    /// Returns the handler.
    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Starts the polling loop.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != OrchestratorState::Stopped {
                anyhow::bail!("Orchestrator is already running");
            }
            if self.shutdown_token.is_cancelled() {
                anyhow::bail!("Orchestrator cannot be restarted after shutdown");
            }
            *state = OrchestratorState::Starting;
        }
        self.emit_event(OrchestratorEvent::StateChanged(OrchestratorState::Starting));

        info!("Starting orchestrator...");

        let source = Arc::clone(&self.source);
        let handler = Arc::clone(&self.handler);
        let shutdown_token = self.shutdown_token.clone();
        let event_tx = self.event_tx.clone();
        let retry_delay = self.retry_delay;

        let task = tokio::spawn(async move {
            Self::poll_loop(source, handler, shutdown_token, event_tx, retry_delay).await;
        });
        *self.poll_task.lock().await = Some(task);

        {
            let mut state = self.state.write().await;
            *state = OrchestratorState::Running;
        }
        self.emit_event(OrchestratorEvent::StateChanged(OrchestratorState::Running));

        info!("Orchestrator started, polling for updates");
        Ok(())
    }

    /// Polls until cancelled, spawning one task per interaction.
    async fn poll_loop(
        source: Arc<U>,
        handler: Arc<H>,
        shutdown_token: CancellationToken,
        event_tx: broadcast::Sender<OrchestratorEvent>,
        retry_delay: Duration,
    ) {
        loop {
            let batch = tokio::select! {
                _ = shutdown_token.cancelled() => break,
                batch = source.next_batch() => batch,
            };

            match batch {
                Ok(interactions) => {
                    if interactions.is_empty() {
                        continue;
                    }
                    debug!(count = interactions.len(), "Received interactions");
                    let _ = event_tx.send(OrchestratorEvent::Polled {
                        count: interactions.len(),
                    });
                    for interaction in interactions {
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            handler.handle(&interaction).await;
                        });
                    }
                }
                Err(e) => {
                    warn!(error = %e, retry_in = ?retry_delay, "Polling failed");
                    let _ = event_tx.send(OrchestratorEvent::PollFailed {
                        message: e.to_string(),
                    });
                    tokio::select! {
                        _ = shutdown_token.cancelled() => break,
                        _ = tokio::time::sleep(retry_delay) => {}
                    }
                }
            }
        }
        debug!("Polling loop exited");
    }

    /// Stops the polling loop. In-flight interactions are left to finish.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == OrchestratorState::Stopped {
                return Ok(());
            }
            if *state == OrchestratorState::ShuttingDown {
                anyhow::bail!("Orchestrator is already shutting down");
            }
            *state = OrchestratorState::ShuttingDown;
        }
        self.emit_event(OrchestratorEvent::StateChanged(OrchestratorState::ShuttingDown));

        info!("Stopping orchestrator...");
        self.shutdown_token.cancel();

        let task = self.poll_task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Polling task ended abnormally");
            }
        }

        {
            let mut state = self.state.write().await;
            *state = OrchestratorState::Stopped;
        }
        self.emit_event(OrchestratorEvent::StateChanged(OrchestratorState::Stopped));

        info!("Orchestrator stopped");
        Ok(())
    }

    /// Emits an orchestrator event.
    fn emit_event(&self, event: OrchestratorEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Returns the shutdown token for external tasks to observe shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::NotifyError;
    use protocol::{ChatContext, Principal};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    /// Source replaying scripted poll results, then idling.
    #[derive(Default)]
    struct ScriptedSource {
        script: StdMutex<VecDeque<Result<Vec<Interaction>, NotifyError>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Vec<Interaction>, NotifyError>>) -> Self {
            Self {
                script: StdMutex::new(script.into()),
            }
        }
    }

    impl UpdateSource for ScriptedSource {
        async fn next_batch(&self) -> Result<Vec<Interaction>, NotifyError> {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(result) => result,
                None => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    /// Handler forwarding every interaction to a channel.
    struct ChannelHandler {
        tx: tokio::sync::mpsc::UnboundedSender<Interaction>,
    }

    impl InteractionHandler for ChannelHandler {
        async fn handle(&self, interaction: &Interaction) {
            let _ = self.tx.send(interaction.clone());
        }
    }

    fn command(id: i64) -> Interaction {
        Interaction::command(Principal::new(id), ChatContext::private(id), "go", "")
    }

    #[tokio::test]
    async fn test_orchestrator_creation() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let orchestrator = Orchestrator::new(Arc::new(ScriptedSource::default()), Arc::new(ChannelHandler { tx }));
        assert_eq!(orchestrator.state().await, OrchestratorState::Stopped);
    }

    #[tokio::test]
    async fn test_interactions_are_handled() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let source = ScriptedSource::new(vec![Ok(vec![command(1), command(2)]), Ok(vec![command(3)])]);
        let orchestrator = Orchestrator::new(Arc::new(source), Arc::new(ChannelHandler { tx }));

        orchestrator.start().await.unwrap();
        assert_eq!(orchestrator.state().await, OrchestratorState::Running);

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(rx.recv().await.unwrap().principal.id);
        }
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);

        orchestrator.stop().await.unwrap();
        assert_eq!(orchestrator.state().await, OrchestratorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_is_retried() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let source = ScriptedSource::new(vec![
            Err(NotifyError::Http("connection reset".to_string())),
            Ok(vec![command(9)]),
        ]);
        let orchestrator =
            Orchestrator::new(Arc::new(source), Arc::new(ChannelHandler { tx })).with_retry_delay(Duration::from_secs(5));
        let mut events = orchestrator.subscribe();

        orchestrator.start().await.unwrap();
        let started = tokio::time::Instant::now();
        assert_eq!(rx.recv().await.unwrap().principal.id, 9);
        assert!(started.elapsed() >= Duration::from_secs(5));

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, OrchestratorEvent::PollFailed { .. }) {
                saw_failure = true;
            }
        }
        assert!(saw_failure);

        orchestrator.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let orchestrator = Orchestrator::new(Arc::new(ScriptedSource::default()), Arc::new(ChannelHandler { tx }));

        orchestrator.start().await.unwrap();
        assert!(orchestrator.start().await.is_err());
        orchestrator.stop().await.unwrap();
        assert!(orchestrator.shutdown_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let orchestrator = Orchestrator::new(Arc::new(ScriptedSource::default()), Arc::new(ChannelHandler { tx }));
        orchestrator.stop().await.unwrap();
        assert_eq!(orchestrator.state().await, OrchestratorState::Stopped);
    }

    #[tokio::test]
    async fn test_event_subscription() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let orchestrator = Orchestrator::new(Arc::new(ScriptedSource::default()), Arc::new(ChannelHandler { tx }));
        let mut events = orchestrator.subscribe();

        orchestrator.start().await.unwrap();
        orchestrator.stop().await.unwrap();

        let mut states = Vec::new();
        while let Ok(OrchestratorEvent::StateChanged(state)) = events.try_recv() {
            states.push(state);
        }
        assert_eq!(
            states,
            vec![
                OrchestratorState::Starting,
                OrchestratorState::Running,
                OrchestratorState::ShuttingDown,
                OrchestratorState::Stopped,
            ]
        );
    }
}
