//! Connection lifecycle management
//!
//! Owns at most one live upstream session and one live log subscription,
//! recreating both after any failure. Reconnection uses exponential
//! backoff with a deterministic jitter and a maximum-delay cap, and
//! retries indefinitely — a long-running ingester must outlast transient
//! network partitions. The attempt counter is logged on every retry so a
//! stuck loop is visible to operators.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::RawLogRecord;
use crate::transport::{LogFilter, Transport, TransportSession};

/// Backoff growth factor per attempt.
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Lifecycle of the single upstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Subscribing,
    Subscribed,
    ShuttingDown,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Subscribing => "subscribing",
            ConnectionState::Subscribed => "subscribed",
            ConnectionState::ShuttingDown => "shutting_down",
        };
        f.write_str(s)
    }
}

/// Reconnection backoff: exponential with cap and deterministic jitter,
/// no retry limit.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    jitter: bool,
    attempt: u32,
    current_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, jitter: bool) -> Self {
        Self {
            initial_delay,
            max_delay,
            jitter,
            attempt: 0,
            current_delay: initial_delay,
        }
    }

    /// Number of consecutive failed attempts since the last success.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Reset after a successful connect + subscribe.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.current_delay = self.initial_delay;
    }

    /// The delay to wait before the next attempt, advancing the backoff.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn next_delay(&mut self) -> Duration {
        self.attempt += 1;

        let delay = self.current_delay;

        // Deterministic jitter: ±25% of the delay, derived from the attempt
        // number so paused-clock tests stay reproducible.
        let delay = if self.jitter {
            let jitter_range = delay.as_millis() as f64 * 0.25;
            let jitter_offset =
                (f64::from(self.attempt) * 7.0 % jitter_range.max(1.0)) - (jitter_range / 2.0);
            let jittered_ms = (delay.as_millis() as f64 + jitter_offset).max(1.0);
            Duration::from_millis(jittered_ms as u64)
        } else {
            delay
        };

        let next_ms = (self.current_delay.as_millis() as f64 * BACKOFF_MULTIPLIER) as u64;
        self.current_delay = Duration::from_millis(next_ms).min(self.max_delay);

        delay
    }
}

/// Drives the connect → subscribe → read cycle against a [`Transport`],
/// forwarding every raw record into the bounded pipeline channel.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    url: String,
    policy: ReconnectPolicy,
    state: ConnectionState,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            transport,
            url: url.into(),
            policy,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn set_state(&mut self, next: ConnectionState) {
        debug!(from = %self.state, to = %next, "connection state change");
        self.state = next;
    }

    /// Run until cancelled. Every failure path funnels into the backoff
    /// sleep; a full send into `tx` blocks the read loop, which is the
    /// pipeline's backpressure.
    pub async fn run(
        mut self,
        filter: LogFilter,
        tx: mpsc::Sender<RawLogRecord>,
        shutdown: CancellationToken,
    ) {
        loop {
            if shutdown.is_cancelled() {
                self.set_state(ConnectionState::ShuttingDown);
                return;
            }

            self.set_state(ConnectionState::Connecting);
            match self.transport.connect(&self.url).await {
                Ok(mut session) => {
                    self.set_state(ConnectionState::Connected);
                    info!(url = %self.url, "upstream connection established");

                    self.set_state(ConnectionState::Subscribing);
                    match session.subscribe(&filter).await {
                        Ok(subscription_id) => {
                            self.set_state(ConnectionState::Subscribed);
                            self.policy.reset();
                            info!(subscription = %subscription_id, "log subscription established");

                            if Self::read_records(&mut session, &tx, &shutdown)
                                .await
                                .is_break()
                            {
                                session.close().await;
                                self.set_state(ConnectionState::ShuttingDown);
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to establish subscription");
                        }
                    }

                    // The old session is never reused; tear it down before
                    // the replacement is built so the socket is not leaked.
                    session.close().await;
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "upstream connection failed");
                }
            }

            self.set_state(ConnectionState::Disconnected);
            let delay = self.policy.next_delay();
            warn!(
                attempt = self.policy.attempt(),
                delay_ms = delay.as_millis() as u64,
                "scheduling reconnection"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = shutdown.cancelled() => {
                    self.set_state(ConnectionState::ShuttingDown);
                    return;
                }
            }
        }
    }

    /// Forward records until the session ends. `Break` means shutdown,
    /// `Continue` means the session died and a reconnect is due.
    async fn read_records(
        session: &mut T::Session,
        tx: &mpsc::Sender<RawLogRecord>,
        shutdown: &CancellationToken,
    ) -> std::ops::ControlFlow<()> {
        loop {
            let record = tokio::select! {
                record = session.next_record() => record,
                () = shutdown.cancelled() => return std::ops::ControlFlow::Break(()),
            };

            match record {
                Some(Ok(record)) => {
                    // A full channel blocks here — that is the pipeline's
                    // backpressure — but shutdown must still win.
                    tokio::select! {
                        sent = tx.send(record) => {
                            if sent.is_err() {
                                // Processing side is gone; nothing left to feed.
                                return std::ops::ControlFlow::Break(());
                            }
                        }
                        () = shutdown.cancelled() => {
                            return std::ops::ControlFlow::Break(());
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "subscription error, reconnecting");
                    return std::ops::ControlFlow::Continue(());
                }
                None => {
                    info!("upstream ended the stream, reconnecting");
                    return std::ops::ControlFlow::Continue(());
                }
            }
        }
    }
}
