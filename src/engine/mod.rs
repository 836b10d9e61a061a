//! Connection lifecycle for one live chat.
//!
//! [`ChatEngine`] initializes a [`Session`] once (credentials, then feed
//! resolution), runs the polling loop as a tokio task while connected, and
//! routes outbound messages through the session's gateway.
//!
//! State transitions:
//! - `connect()`: `Disconnected → Connecting → Connected`, or back to
//!   `Disconnected` on failure or when there is no live chat
//! - `disconnect()`: `Connected → Disconnecting → Disconnected`
//! - a crashed loop moves the engine to `Disconnected` by itself and
//!   publishes [`ChatEvent::PollingFailed`]

pub mod events;
pub mod poller;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, OnceCell};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PollingConfig;
use crate::credentials::CredentialProvider;
use crate::feed::{resolve_feed_id, ChatGateway, GatewayError};
use crate::youtube::types::LiveChatMessage;

pub use events::{ChatEvent, EventBus};
pub use poller::{run_poll_loop, Pacing, PollCursor, PollSettings};
pub use retry::{RetryDecision, RetryPolicy, RetryState};

/// Default bound on how long `disconnect()` waits for the loop to exit.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Credential acquisition or feed resolution failed. Safe to retry `connect()`.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// Transient fetch failures exceeded the retry budget.
    #[error("giving up after {failures} consecutive transient failures: {source}")]
    RetriesExhausted {
        /// Consecutive failures, including the one that escalated.
        failures: u32,
        /// The last failure.
        source: GatewayError,
    },

    /// A fetch failed in a way that is not retried.
    #[error("fatal fetch failure: {0}")]
    Fatal(GatewayError),

    /// Posting a message failed.
    #[error("failed to send message: {0}")]
    Send(GatewayError),

    /// The polling task did not exit within the shutdown timeout and was aborted.
    #[error("polling loop did not stop within {0:?}")]
    ShutdownTimeout(Duration),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Connection state as seen by hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No polling loop is running.
    Disconnected,
    /// `connect()` is initializing or starting the loop.
    Connecting,
    /// The polling loop is running.
    Connected,
    /// `disconnect()` is waiting for the loop to exit.
    Disconnecting,
}

/// Result of the one-time initialization.
pub struct Session {
    /// Authorized client, shared by the polling loop and `send_message`.
    pub gateway: Arc<dyn ChatGateway>,
    /// Live chat to poll; `None` when nothing was live at initialization.
    pub feed_id: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("feed_id", &self.feed_id)
            .finish_non_exhaustive()
    }
}

/// Engine tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Polling loop settings.
    pub poll: PollSettings,
    /// Upper bound on `disconnect()`.
    pub shutdown_timeout: Duration,
    /// Event bus capacity per subscriber.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll: PollSettings::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            event_capacity: events::DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl From<&PollingConfig> for EngineConfig {
    fn from(polling: &PollingConfig) -> Self {
        Self {
            poll: PollSettings {
                default_interval: Duration::from_millis(polling.default_interval_ms),
                retry: RetryPolicy {
                    max_retries: polling.max_retries,
                    step: Duration::from_millis(polling.retry_step_ms),
                },
                pacing: polling.pacing,
            },
            shutdown_timeout: Duration::from_secs(polling.shutdown_timeout_secs),
            event_capacity: polling.event_capacity,
        }
    }
}

struct PollerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Polls one live chat and sends messages to it.
pub struct ChatEngine {
    provider: Arc<dyn CredentialProvider>,
    config: EngineConfig,
    session: OnceCell<Session>,
    state: Arc<watch::Sender<ConnectionState>>,
    events: EventBus,
    poller: Mutex<Option<PollerHandle>>,
}

impl ChatEngine {
    /// Create a disconnected, uninitialized engine.
    pub fn new(provider: Arc<dyn CredentialProvider>, config: EngineConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            provider,
            config,
            session: OnceCell::new(),
            state: Arc::new(state),
            events: EventBus::new(config.event_capacity),
            poller: Mutex::new(None),
        }
    }

    /// Initialize if needed, then start polling the live chat.
    ///
    /// Completes without connecting when no live chat exists. A no-op while
    /// already connected.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Initialization`] when credentials or feed
    /// resolution fail. The engine stays uninitialized and `Disconnected`.
    pub async fn connect(&self) -> Result<(), EngineError> {
        let mut poller = self.poller.lock().await;

        if poller.is_some() && self.state() == ConnectionState::Connected {
            debug!("connect requested while already connected");
            return Ok(());
        }
        // A crashed loop marks the engine Disconnected before its task ends.
        if let Some(stale) = poller.take() {
            debug!("reaping finished polling task");
            if let Err(err) = stale.task.await {
                warn!(error = %err, "previous polling task ended abnormally");
            }
        }

        self.set_state(ConnectionState::Connecting);

        let session = match self.session.get_or_try_init(|| self.initialize()).await {
            Ok(session) => session,
            Err(err) => {
                error!(error = %err, "chat initialization failed");
                self.set_state(ConnectionState::Disconnected);
                return Err(err);
            }
        };

        let Some(feed_id) = session.feed_id.clone() else {
            info!("no live chat to join, staying disconnected");
            self.set_state(ConnectionState::Disconnected);
            return Ok(());
        };

        let (stop_tx, stop_rx) = watch::channel(false);
        self.set_state(ConnectionState::Connected);
        self.events.publish(ChatEvent::Connected);

        let task = tokio::spawn(supervise_poll_loop(
            Arc::clone(&session.gateway),
            feed_id.clone(),
            self.config.poll,
            self.events.clone(),
            Arc::clone(&self.state),
            stop_rx,
        ));
        *poller = Some(PollerHandle { stop_tx, task });

        info!(feed_id = %feed_id, "connected to live chat");
        Ok(())
    }

    /// Stop the polling loop and wait for it to exit.
    ///
    /// A no-op when no loop is running. Publishes
    /// [`ChatEvent::Disconnected`] when the engine was connected.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ShutdownTimeout`] when the loop does not exit
    /// within the configured timeout. The task is aborted and the engine is
    /// still left `Disconnected`.
    pub async fn disconnect(&self) -> Result<(), EngineError> {
        let mut poller = self.poller.lock().await;
        let Some(PollerHandle { stop_tx, mut task }) = poller.take() else {
            debug!("disconnect requested with no polling loop running");
            return Ok(());
        };

        let was_connected = self.state() == ConnectionState::Connected;
        if was_connected {
            self.set_state(ConnectionState::Disconnecting);
        }

        stop_tx.send_replace(true);
        let timeout = self.config.shutdown_timeout;
        let result = match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                warn!(error = %err, "polling task ended abnormally");
                Ok(())
            }
            Err(_) => {
                task.abort();
                error!(
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "polling loop did not stop in time, aborted"
                );
                Err(EngineError::ShutdownTimeout(timeout))
            }
        };

        self.set_state(ConnectionState::Disconnected);
        if was_connected {
            self.events.publish(ChatEvent::Disconnected);
            info!("disconnected from live chat");
        }
        result
    }

    /// Post `text` to the live chat.
    ///
    /// Returns `Ok(None)` without any request when the session has no live
    /// chat (not yet initialized, or nothing was live).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Send`] when the single post request fails.
    pub async fn send_message(&self, text: &str) -> Result<Option<LiveChatMessage>, EngineError> {
        let Some((gateway, feed_id)) = self.session.get().and_then(|session| {
            session
                .feed_id
                .as_deref()
                .map(|feed_id| (&session.gateway, feed_id))
        }) else {
            debug!("no live chat to send to, message not sent");
            return Ok(None);
        };

        let message = gateway
            .post_message(feed_id, text)
            .await
            .map_err(EngineError::Send)?;
        debug!(message_id = %message.id, "message sent");
        Ok(Some(message))
    }

    /// Subscribe to engine notifications.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// The engine's event bus.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Whether the polling loop is running.
    ///
    /// Stays `true` while `disconnect()` waits for the loop to exit, since an
    /// in-flight fetch can still publish a batch until then.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Connected | ConnectionState::Disconnecting
        )
    }

    /// Whether the one-time initialization has completed.
    pub fn is_initialized(&self) -> bool {
        self.session.initialized()
    }

    /// The resolved live chat id, once initialized.
    pub fn feed_id(&self) -> Option<&str> {
        self.session.get().and_then(|session| session.feed_id.as_deref())
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "connection state changed");
        }
    }

    async fn initialize(&self) -> Result<Session, EngineError> {
        info!("initializing chat session");
        let gateway = self
            .provider
            .authorized_client()
            .await
            .map_err(|e| EngineError::Initialization(format!("credential acquisition: {e}")))?;
        let feed_id = resolve_feed_id(gateway.as_ref())
            .await
            .map_err(|e| EngineError::Initialization(format!("feed resolution: {e}")))?;
        Ok(Session { gateway, feed_id })
    }
}

impl Drop for ChatEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.poller.get_mut().take() {
            debug!("engine dropped while polling, signalling the loop to stop");
            handle.stop_tx.send_replace(true);
        }
    }
}

/// Run the loop and turn an abnormal exit into an implicit disconnect.
async fn supervise_poll_loop(
    gateway: Arc<dyn ChatGateway>,
    feed_id: String,
    settings: PollSettings,
    events: EventBus,
    state: Arc<watch::Sender<ConnectionState>>,
    stop_rx: watch::Receiver<bool>,
) {
    match run_poll_loop(gateway, feed_id, settings, events.clone(), stop_rx).await {
        Ok(cursor) => {
            debug!(page_token = %cursor.next_page_token, "polling task finished");
        }
        Err(err) => {
            error!(error = %err, "polling loop terminated");
            state.send_replace(ConnectionState::Disconnected);
            events.publish(ChatEvent::PollingFailed {
                error: err.to_string(),
            });
        }
    }
}
