//! Live voting session
//!
//! A single task owns the reconciliation engine. It folds stream events into
//! it, reloads the snapshot when the stream reconnects or the operator
//! resumes, and publishes fresh statistics after every change.

use std::future::Future;
use std::sync::Arc;

use asamblea_core::{
    compute_statistics, CastOutcome, ConfigurationError, DeleteOutcome, ReconciliationEngine,
    Voting, VotingOption, VotingSnapshot, VotingStatistics,
};
use asamblea_net::{ConnectionState, ErrorKind, EventStream, StreamEvent, VotingApi, VotingScope};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// Events from the session to the front end
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Stream connection state changed
    StreamState(ConnectionState),
    /// Stream connection dropped; `retry_in` is `None` when it gave up
    StreamFailure {
        kind: ErrorKind,
        reason: String,
        retry_in: Option<std::time::Duration>,
    },
    /// A snapshot became the new baseline
    SnapshotLoaded {
        title: String,
        total_units: usize,
        fetched_at: DateTime<Utc>,
    },
    /// Snapshot fetch failed; the previous baseline (if any) is kept
    LoadFailed { kind: ErrorKind, message: String },
    Statistics(VotingStatistics),
    /// Options cannot be rendered; no statistics until fixed
    ConfigurationError(ConfigurationError),
    Paused,
    Resumed,
    Closed,
}

enum SessionCommand {
    Pause,
    Resume,
    Reload,
    Shutdown,
}

/// Session tuning
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub event_log_capacity: usize,
    pub channel_capacity: usize,
}

/// Handle to a running session
pub struct LiveSession {
    event_rx: mpsc::Receiver<SessionEvent>,
    cmd_tx: mpsc::Sender<SessionCommand>,
    task: JoinHandle<()>,
}

impl LiveSession {
    /// Start the session task; the first snapshot load begins immediately
    pub fn spawn<A: VotingApi>(
        api: Arc<A>,
        scope: VotingScope,
        stream: EventStream,
        options: SessionOptions,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(options.channel_capacity.max(1));
        let (cmd_tx, cmd_rx) = mpsc::channel(16);

        let actor = SessionActor {
            api,
            scope,
            engine: ReconciliationEngine::with_log_capacity(options.event_log_capacity),
            voting: None,
            options: Vec::new(),
            paused: false,
            buffered: Vec::new(),
            event_tx,
        };
        let task = tokio::spawn(actor.run(stream, cmd_rx));

        Self {
            event_rx,
            cmd_tx,
            task,
        }
    }

    /// Get the next session event
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.event_rx.recv().await
    }

    /// Stop applying stream events until `resume`
    pub async fn pause(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Pause).await;
    }

    /// Apply events again, starting from a fresh snapshot
    pub async fn resume(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Resume).await;
    }

    /// Re-fetch the snapshot (manual retry)
    pub async fn reload(&self) {
        let _ = self.cmd_tx.send(SessionCommand::Reload).await;
    }

    /// Cancel any in-flight load, close the stream and wait for the task
    pub async fn shutdown(mut self) {
        let _ = self.cmd_tx.send(SessionCommand::Shutdown).await;
        // Keep draining so the task is never blocked publishing
        while self.event_rx.recv().await.is_some() {}
        let _ = self.task.await;
    }
}

type LoadHandle = JoinHandle<asamblea_net::Result<VotingSnapshot>>;

struct SessionActor<A> {
    api: Arc<A>,
    scope: VotingScope,
    engine: ReconciliationEngine,
    voting: Option<Voting>,
    options: Vec<VotingOption>,
    paused: bool,
    /// Vote events received while a snapshot load is in flight
    buffered: Vec<StreamEvent>,
    event_tx: mpsc::Sender<SessionEvent>,
}

impl<A: VotingApi> SessionActor<A> {
    async fn run(mut self, mut stream: EventStream, mut cmd_rx: mpsc::Receiver<SessionCommand>) {
        let mut load = Some(self.start_load());
        let mut stream_open = true;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(SessionCommand::Pause) => {
                        if !self.paused {
                            self.paused = true;
                            info!("Session paused");
                            self.emit(SessionEvent::Paused).await;
                        }
                    }
                    Some(SessionCommand::Resume) => {
                        if self.paused {
                            self.paused = false;
                            info!("Session resumed");
                            self.emit(SessionEvent::Resumed).await;
                            self.restart_load(&mut load);
                        }
                    }
                    Some(SessionCommand::Reload) => self.restart_load(&mut load),
                    Some(SessionCommand::Shutdown) | None => break,
                },

                event = stream.next_event(), if stream_open => match event {
                    Some(event) => self.handle_stream_event(event, &mut load).await,
                    None => {
                        debug!("Event stream finished");
                        stream_open = false;
                    }
                },

                result = join_load(&mut load) => {
                    load = None;
                    self.handle_load_result(result).await;
                }
            }
        }

        if let Some(handle) = load.take() {
            debug!("Cancelling in-flight snapshot load");
            handle.abort();
        }
        stream.close().await;
        self.emit(SessionEvent::Closed).await;
        info!(voting_id = %self.scope.voting_id, "Session closed");
    }

    fn start_load(&self) -> LoadHandle {
        let api = self.api.clone();
        let scope = self.scope;
        debug!(voting_id = %scope.voting_id, "Loading snapshot");
        tokio::spawn(async move { api.load_snapshot(&scope).await })
    }

    fn restart_load(&self, load: &mut Option<LoadHandle>) {
        if let Some(previous) = load.take() {
            previous.abort();
        }
        *load = Some(self.start_load());
    }

    async fn handle_stream_event(&mut self, event: StreamEvent, load: &mut Option<LoadHandle>) {
        match event {
            StreamEvent::StateChanged(state) => self.emit(SessionEvent::StreamState(state)).await,
            StreamEvent::Failure {
                kind,
                reason,
                retry_in,
            } => {
                self.emit(SessionEvent::StreamFailure {
                    kind,
                    reason,
                    retry_in,
                })
                .await
            }
            StreamEvent::Reconnected => {
                if self.paused {
                    debug!("Reconnected while paused, reload deferred to resume");
                } else {
                    self.restart_load(load);
                }
            }
            vote @ (StreamEvent::VoteCast(_) | StreamEvent::VoteDeleted(_)) => {
                if self.paused {
                    debug!("Paused, discarding stream event");
                } else if load.is_some() {
                    self.buffered.push(vote);
                } else if self.apply(&vote) {
                    self.publish_statistics().await;
                }
            }
        }
    }

    async fn handle_load_result(
        &mut self,
        result: Result<asamblea_net::Result<VotingSnapshot>, JoinError>,
    ) {
        let snapshot = match result {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                warn!(error = %e, "Snapshot load failed");
                self.load_failed(e.kind(), e.to_string()).await;
                return;
            }
            Err(e) => {
                warn!(error = %e, "Snapshot load task ended abnormally");
                self.load_failed(ErrorKind::Transport, e.to_string()).await;
                return;
            }
        };

        self.engine.load_snapshot(&snapshot);
        self.options = snapshot.options;
        let title = snapshot.voting.title.clone();
        self.voting = Some(snapshot.voting);

        self.emit(SessionEvent::SnapshotLoaded {
            title,
            total_units: self.engine.counters().total_units,
            fetched_at: snapshot.fetched_at,
        })
        .await;

        self.apply_buffered();
        self.publish_statistics().await;
    }

    /// A failed load keeps the previous baseline, so buffered events still
    /// apply to it. Without a baseline there is nothing to apply them to.
    async fn load_failed(&mut self, kind: ErrorKind, message: String) {
        self.emit(SessionEvent::LoadFailed { kind, message }).await;

        if !self.engine.has_baseline() {
            if !self.buffered.is_empty() {
                warn!(
                    count = self.buffered.len(),
                    "No baseline, dropping events received during load"
                );
            }
            self.buffered.clear();
            return;
        }
        if self.apply_buffered() {
            self.publish_statistics().await;
        }
    }

    /// Apply events held back during a load; true when any changed state
    fn apply_buffered(&mut self) -> bool {
        let buffered = std::mem::take(&mut self.buffered);
        if !buffered.is_empty() {
            debug!(count = buffered.len(), "Applying events received during load");
        }
        let mut changed = false;
        for event in &buffered {
            changed |= self.apply(event);
        }
        changed
    }

    /// Fold a vote event into the engine; true when state changed
    fn apply(&mut self, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::VoteCast(cast) => match self.engine.apply_cast_event(cast) {
                CastOutcome::Applied => true,
                outcome => {
                    debug!(event_id = %cast.id, ?outcome, "Cast event not applied");
                    false
                }
            },
            StreamEvent::VoteDeleted(deleted) => match self.engine.apply_delete_event(deleted) {
                DeleteOutcome::Applied => true,
                outcome => {
                    debug!(event_id = %deleted.id, ?outcome, "Delete event not applied");
                    false
                }
            },
            _ => false,
        }
    }

    async fn publish_statistics(&self) {
        let Some(voting) = &self.voting else {
            return;
        };

        let event = match compute_statistics(self.engine.units(), voting, &self.options) {
            Ok(stats) => SessionEvent::Statistics(stats),
            Err(e) => {
                warn!(error = %e, "Statistics unavailable");
                SessionEvent::ConfigurationError(e)
            }
        };
        self.emit(event).await;
    }

    async fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event).await;
    }
}

/// Resolve the in-flight load, or never when there is none
fn join_load(
    load: &mut Option<LoadHandle>,
) -> impl Future<Output = Result<asamblea_net::Result<VotingSnapshot>, JoinError>> + '_ {
    async move {
        match load {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    }
}
