//! The background polling loop.
//!
//! One run of [`run_poll_loop`] owns a fresh [`PollCursor`] and
//! [`RetryState`]. It exits when the stop signal flips to `true` (or its
//! sender is dropped), or with an error when a fetch fails fatally.
//!
//! Pacing per iteration:
//! - success: wait the suggested interval
//! - transient failure: wait `attempt * retry step`
//! - then, under [`Pacing::Compatible`], wait the suggested interval again
//!
//! Waits are interrupted by the stop signal. In-flight fetches are not.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::events::{ChatEvent, EventBus};
use super::retry::{RetryDecision, RetryPolicy, RetryState};
use super::EngineError;
use crate::feed::{ChatGateway, MessageBatch};

/// Interval used until the server suggests one, and whenever it omits it.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(1000);

/// How many interval waits each iteration performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// Wait inside the success/retry branch, then once more at the end of
    /// the iteration. Matches the pacing existing deployments rely on.
    #[default]
    Compatible,
    /// Exactly one wait per iteration.
    Single,
}

/// Tunables for one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Interval used when the server gives none.
    pub default_interval: Duration,
    /// Retry budget for transient failures.
    pub retry: RetryPolicy,
    /// Wait strategy.
    pub pacing: Pacing,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            default_interval: DEFAULT_POLLING_INTERVAL,
            retry: RetryPolicy::default(),
            pacing: Pacing::default(),
        }
    }
}

/// Position in the feed plus the current poll delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollCursor {
    /// Token for the next fetch; empty means the start of the feed.
    pub next_page_token: String,
    /// Delay between polls.
    pub polling_interval: Duration,
}

impl PollCursor {
    /// A cursor at the start of the feed.
    pub fn new(default_interval: Duration) -> Self {
        Self {
            next_page_token: String::new(),
            polling_interval: default_interval,
        }
    }

    /// Move past `batch`, adopting its token and suggested interval.
    pub fn advance(&mut self, batch: &MessageBatch, default_interval: Duration) {
        self.next_page_token.clone_from(&batch.next_page_token);
        self.polling_interval = batch.polling_interval.unwrap_or(default_interval);
    }
}

/// Poll `feed_id` until stopped, publishing each batch after the first.
///
/// Returns the final cursor on a clean stop.
///
/// # Errors
///
/// Returns [`EngineError::RetriesExhausted`] when transient failures exceed
/// the retry budget, and [`EngineError::Fatal`] on any non-transient fetch
/// failure.
pub async fn run_poll_loop(
    gateway: Arc<dyn ChatGateway>,
    feed_id: String,
    settings: PollSettings,
    events: EventBus,
    mut stop_rx: watch::Receiver<bool>,
) -> Result<PollCursor, EngineError> {
    let mut cursor = PollCursor::new(settings.default_interval);
    let mut retry = RetryState::new(settings.retry);
    let mut first_fetch = true;

    info!(feed_id = %feed_id, pacing = ?settings.pacing, "polling loop started");

    while !stop_requested(&stop_rx) {
        match gateway
            .fetch_batch(&feed_id, &cursor.next_page_token)
            .await
        {
            Ok(batch) => {
                cursor.advance(&batch, settings.default_interval);
                retry.record_success();

                if first_fetch {
                    first_fetch = false;
                    debug!(
                        skipped = batch.messages.len(),
                        "initial batch consumed to position cursor"
                    );
                } else {
                    debug!(
                        count = batch.messages.len(),
                        interval_ms = duration_ms(cursor.polling_interval),
                        "message batch received"
                    );
                    events.publish(ChatEvent::MessagesReceived(batch));
                }

                if pause(cursor.polling_interval, &mut stop_rx).await {
                    break;
                }
            }
            Err(err) if err.is_transient() => match retry.record_failure() {
                RetryDecision::Retry { attempt, delay } => {
                    warn!(
                        error = %err,
                        attempt,
                        delay_ms = duration_ms(delay),
                        "transient fetch failure, retrying"
                    );
                    if pause(delay, &mut stop_rx).await {
                        break;
                    }
                }
                RetryDecision::Escalate { failures } => {
                    return Err(EngineError::RetriesExhausted {
                        failures,
                        source: err,
                    });
                }
            },
            Err(err) => return Err(EngineError::Fatal(err)),
        }

        if settings.pacing == Pacing::Compatible
            && pause(cursor.polling_interval, &mut stop_rx).await
        {
            break;
        }
    }

    info!(page_token = %cursor.next_page_token, "polling loop stopped");
    Ok(cursor)
}

/// Sleep for `duration` unless a stop arrives first. Returns `true` to stop.
async fn pause(duration: Duration, stop_rx: &mut watch::Receiver<bool>) -> bool {
    if duration.is_zero() {
        return stop_requested(stop_rx);
    }

    tokio::select! {
        () = tokio::time::sleep(duration) => false,
        _ = stop_rx.wait_for(|stop| *stop) => true,
    }
}

/// A stop is requested explicitly, or implied by the sender being dropped.
fn stop_requested(stop_rx: &watch::Receiver<bool>) -> bool {
    let stop = *stop_rx.borrow();
    stop || stop_rx.has_changed().is_err()
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
