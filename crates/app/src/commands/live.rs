//! `asamblea live`: follow a voting as votes arrive

use std::sync::Arc;

use anyhow::bail;
use asamblea_core::Config;
use asamblea_net::{ErrorKind, EventStream};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use uuid::Uuid;

use crate::render;
use crate::session::{LiveSession, SessionEvent, SessionOptions};

/// What the operator typed on stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Pause,
    Resume,
    Reload,
    Quit,
}

fn parse_key(line: &str) -> Option<Key> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" => Some(Key::Pause),
        "r" | "resume" => Some(Key::Resume),
        "l" | "reload" | "retry" => Some(Key::Reload),
        "q" | "quit" | "exit" => Some(Key::Quit),
        _ => None,
    }
}

pub async fn run(config: &Config, group: Uuid, voting: Uuid, json: bool) -> anyhow::Result<()> {
    let api = super::api(config)?;
    let scope = api.scope(group, voting);
    info!(voting_id = %voting, "Starting live session");

    let stream = EventStream::connect(api.clone(), scope, &config.stream);
    let mut session = LiveSession::spawn(
        Arc::new(api),
        scope,
        stream,
        SessionOptions {
            event_log_capacity: config.reconcile.event_log_capacity,
            channel_capacity: config.stream.channel_capacity,
        },
    );

    if !json {
        eprintln!("commands: p pause, r resume, l reload, q quit");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut outcome = Ok(());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = session.next_event() => {
                let Some(event) = event else { break };
                match show(event, json) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        outcome = Err(e);
                        break;
                    }
                }
            }

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match parse_key(&line) {
                    Some(Key::Pause) => session.pause().await,
                    Some(Key::Resume) => session.resume().await,
                    Some(Key::Reload) => session.reload().await,
                    Some(Key::Quit) => break,
                    None => eprintln!("unknown command: {}", line.trim()),
                },
                _ => stdin_open = false,
            },

            _ = &mut ctrl_c => break,
        }
    }

    session.shutdown().await;
    outcome
}

/// Print one session event. `Ok(false)` ends the session.
fn show(event: SessionEvent, json: bool) -> anyhow::Result<bool> {
    match event {
        SessionEvent::Statistics(stats) if json => println!("{}", serde_json::to_string(&stats)?),
        SessionEvent::Statistics(stats) => {
            println!("{}\n", render::statistics("Live results", &stats))
        }
        SessionEvent::ConfigurationError(error) if json => {
            println!("{}", serde_json::json!({ "configuration_error": error }))
        }
        SessionEvent::ConfigurationError(error) => {
            println!("{}\n", render::configuration_error(&error))
        }
        SessionEvent::SnapshotLoaded {
            title,
            total_units,
            fetched_at,
        } => eprintln!("{}", render::snapshot_loaded(&title, total_units, fetched_at)),
        SessionEvent::StreamState(state) => eprintln!("{}", render::stream_state(state)),
        SessionEvent::StreamFailure {
            kind: ErrorKind::Auth,
            ..
        } => bail!(render::error_banner(ErrorKind::Auth, "")),
        SessionEvent::StreamFailure {
            kind,
            reason,
            retry_in,
        } => match retry_in {
            Some(delay) => eprintln!(
                "{} (reconnecting in {:.1}s)",
                render::error_banner(kind, &reason),
                delay.as_secs_f64()
            ),
            None => eprintln!("{}", render::error_banner(kind, &reason)),
        },
        SessionEvent::LoadFailed {
            kind: ErrorKind::Auth,
            ..
        } => bail!(render::error_banner(ErrorKind::Auth, "")),
        SessionEvent::LoadFailed { kind, message } => {
            eprintln!("{}", render::error_banner(kind, &message))
        }
        SessionEvent::Paused => eprintln!("paused; events are ignored until resume"),
        SessionEvent::Resumed => eprintln!("resumed; reloading snapshot"),
        SessionEvent::Closed => return Ok(false),
    }
    Ok(true)
}
