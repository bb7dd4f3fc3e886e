//! Live vote event stream with automatic reconnect
//!
//! One task owns the HTTP subscription for a voting and forwards decoded
//! events over a bounded channel. Connection failures are retried with a
//! capped backoff table; an expired session is not.

use std::time::Duration;

use asamblea_core::config::StreamConfig;
use asamblea_core::{VoteCastEvent, VoteDeletedEvent, VoteEvent};
use futures::StreamExt;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::api::{ApiClient, VotingScope};
use crate::error::{Error, ErrorKind, Result};
use crate::protocol::StreamMessage;
use crate::sse::SseDecoder;

/// Connection state of the live stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Error,
    Closed,
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "live",
            ConnectionState::Error => "connection error",
            ConnectionState::Closed => "closed",
        }
    }
}

/// Event delivered by the stream task
#[derive(Debug, Clone)]
pub enum StreamEvent {
    StateChanged(ConnectionState),
    VoteCast(VoteCastEvent),
    VoteDeleted(VoteDeletedEvent),
    /// Connected again after a drop; the caller should reload its snapshot
    Reconnected,
    /// The current connection failed. `retry_in` is `None` when the task
    /// gives up.
    Failure {
        kind: ErrorKind,
        reason: String,
        retry_in: Option<Duration>,
    },
}

impl From<VoteEvent> for StreamEvent {
    fn from(event: VoteEvent) -> Self {
        match event {
            VoteEvent::Cast(cast) => StreamEvent::VoteCast(cast),
            VoteEvent::Deleted(deleted) => StreamEvent::VoteDeleted(deleted),
        }
    }
}

enum StreamCommand {
    Close,
}

/// Handle to a running subscription
pub struct EventStream {
    events: mpsc::Receiver<StreamEvent>,
    cmd_tx: Option<mpsc::Sender<StreamCommand>>,
    task: Option<JoinHandle<()>>,
}

impl EventStream {
    /// Subscribe to a voting's events. Must be called inside a tokio runtime.
    pub fn connect(api: ApiClient, scope: VotingScope, config: &StreamConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (cmd_tx, cmd_rx) = mpsc::channel(4);

        let backoff = Backoff {
            delays_ms: config.reconnect_delays_ms.clone(),
            jitter_ratio: config.jitter_ratio,
        };
        let task = tokio::spawn(connection_task(api, scope, backoff, event_tx, cmd_rx));

        Self {
            events: event_rx,
            cmd_tx: Some(cmd_tx),
            task: Some(task),
        }
    }

    /// Wrap an externally fed channel (offline replay, tests)
    pub fn from_receiver(events: mpsc::Receiver<StreamEvent>) -> Self {
        Self {
            events,
            cmd_tx: None,
            task: None,
        }
    }

    /// Next event, `None` once the stream is finished
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Stop the connection task and wait for it to release the connection
    pub async fn close(mut self) {
        self.events.close();
        if let Some(cmd_tx) = self.cmd_tx.take() {
            let _ = cmd_tx.send(StreamCommand::Close).await;
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Reconnect delay table; the last entry repeats
#[derive(Debug, Clone)]
struct Backoff {
    delays_ms: Vec<u64>,
    jitter_ratio: f64,
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based), never shorter than
    /// the server's `retry` hint
    fn delay(&self, attempt: usize, server_hint: Option<Duration>) -> Duration {
        let sample = rand::thread_rng().gen::<f64>();
        let delay = backoff_delay(attempt, &self.delays_ms, self.jitter_ratio, sample);
        match server_hint {
            Some(hint) if hint > delay => hint,
            _ => delay,
        }
    }
}

/// Base delay from the table plus `jitter_ratio * sample` of it, where
/// `sample` is in `[0, 1)`
fn backoff_delay(attempt: usize, delays_ms: &[u64], jitter_ratio: f64, sample: f64) -> Duration {
    let Some(last) = delays_ms.len().checked_sub(1) else {
        return Duration::ZERO;
    };
    let base = delays_ms[attempt.min(last)];
    let jitter = (base as f64 * jitter_ratio.clamp(0.0, 1.0) * sample.clamp(0.0, 1.0)) as u64;
    Duration::from_millis(base + jitter)
}

/// Bookkeeping carried across reconnects
#[derive(Debug, Default)]
struct LinkState {
    attempt: usize,
    connected_once: bool,
    retry_hint: Option<Duration>,
}

/// How a single connection ended without a transport error
enum Ended {
    /// The event receiver was dropped
    ConsumerGone,
    /// The server finished the response body
    ServerClosed,
}

/// Main connection task
async fn connection_task(
    api: ApiClient,
    scope: VotingScope,
    backoff: Backoff,
    event_tx: mpsc::Sender<StreamEvent>,
    mut cmd_rx: mpsc::Receiver<StreamCommand>,
) {
    let mut link = LinkState::default();

    loop {
        if event_tx
            .send(StreamEvent::StateChanged(ConnectionState::Connecting))
            .await
            .is_err()
        {
            return;
        }
        info!(voting_id = %scope.voting_id, attempt = link.attempt, "Connecting to event stream");

        let result = tokio::select! {
            result = stream_once(&api, &scope, &event_tx, &mut link) => result,
            _ = cmd_rx.recv() => {
                debug!("Event stream close requested");
                break;
            }
        };

        let error = match result {
            Ok(Ended::ConsumerGone) => return,
            Ok(Ended::ServerClosed) => Error::ConnectionClosed,
            Err(e) => e,
        };

        let _ = event_tx
            .send(StreamEvent::StateChanged(ConnectionState::Error))
            .await;

        if error.kind() == ErrorKind::Auth {
            warn!(error = %error, "Event stream rejected, not reconnecting");
            let _ = event_tx
                .send(StreamEvent::Failure {
                    kind: error.kind(),
                    reason: error.to_string(),
                    retry_in: None,
                })
                .await;
            break;
        }

        let delay = backoff.delay(link.attempt, link.retry_hint);
        warn!(error = %error, delay_ms = delay.as_millis() as u64, "Event stream lost, reconnecting");
        if event_tx
            .send(StreamEvent::Failure {
                kind: error.kind(),
                reason: error.to_string(),
                retry_in: Some(delay),
            })
            .await
            .is_err()
        {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cmd_rx.recv() => {
                debug!("Event stream close requested during backoff");
                break;
            }
        }
        link.attempt += 1;
    }

    let _ = event_tx
        .send(StreamEvent::StateChanged(ConnectionState::Closed))
        .await;
    info!(voting_id = %scope.voting_id, "Event stream closed");
}

/// Open one connection and pump its frames until it ends
async fn stream_once(
    api: &ApiClient,
    scope: &VotingScope,
    event_tx: &mpsc::Sender<StreamEvent>,
    link: &mut LinkState,
) -> Result<Ended> {
    let response = api.open_event_stream(scope).await?;

    link.attempt = 0;
    if event_tx
        .send(StreamEvent::StateChanged(ConnectionState::Connected))
        .await
        .is_err()
    {
        return Ok(Ended::ConsumerGone);
    }
    if link.connected_once {
        info!("Event stream reconnected");
        if event_tx.send(StreamEvent::Reconnected).await.is_err() {
            return Ok(Ended::ConsumerGone);
        }
    }
    link.connected_once = true;

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for frame in decoder.push(&chunk)? {
            if let Some(ms) = frame.retry {
                link.retry_hint = Some(Duration::from_millis(ms));
            }

            let event = match StreamMessage::from_frame(&frame) {
                Ok(StreamMessage::Vote(vote)) => StreamEvent::from(vote),
                Ok(StreamMessage::Ignored) => {
                    trace!(event = %frame.event, "Ignoring stream frame");
                    continue;
                }
                Err(e) => {
                    warn!(event = %frame.event, error = %e, "Dropping malformed stream event");
                    continue;
                }
            };
            if event_tx.send(event).await.is_err() {
                return Ok(Ended::ConsumerGone);
            }
        }
    }

    Ok(Ended::ServerClosed)
}
