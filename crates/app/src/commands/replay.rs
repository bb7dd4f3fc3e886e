//! `asamblea replay`: reconcile a recorded event capture offline
//!
//! The snapshot file is a saved `details` response (wrapped or bare); the
//! events file is a raw `text/event-stream` capture of the same voting.

use std::path::Path;

use anyhow::Context;
use asamblea_core::{
    compute_statistics, CastOutcome, Config, DeleteOutcome, ReconciliationEngine, VoteEvent,
    VotingSnapshot,
};
use asamblea_net::protocol::{decode_body, StreamMessage, VotingDetailsResponse};
use asamblea_net::sse::SseDecoder;
use serde::Serialize;
use tracing::{info, warn};

use crate::render;

/// What happened to each replayed event
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub frames: usize,
    pub applied: usize,
    pub duplicate: usize,
    pub invalid: usize,
    pub already_voted: usize,
    pub wrong_voting: usize,
    pub unknown_unit: usize,
    pub stale: usize,
    pub malformed: usize,
    pub ignored: usize,
}

impl ReplayReport {
    fn record_cast(&mut self, outcome: CastOutcome) {
        match outcome {
            CastOutcome::Applied => self.applied += 1,
            CastOutcome::Duplicate => self.duplicate += 1,
            CastOutcome::Invalid => self.invalid += 1,
            CastOutcome::AlreadyVoted => self.already_voted += 1,
            CastOutcome::WrongVoting => self.wrong_voting += 1,
            CastOutcome::UnknownUnit => self.unknown_unit += 1,
        }
    }

    fn record_delete(&mut self, outcome: DeleteOutcome) {
        match outcome {
            DeleteOutcome::Applied => self.applied += 1,
            DeleteOutcome::Duplicate => self.duplicate += 1,
            DeleteOutcome::Stale => self.stale += 1,
            DeleteOutcome::UnknownUnit => self.unknown_unit += 1,
        }
    }
}

fn load_snapshot(bytes: &[u8]) -> anyhow::Result<VotingSnapshot> {
    let details: VotingDetailsResponse =
        decode_body(bytes).context("snapshot file is not a voting details response")?;
    Ok(details.into_snapshot())
}

/// Fold a capture into an engine seeded with `snapshot`
fn replay(
    snapshot: &VotingSnapshot,
    capture: &[u8],
    log_capacity: usize,
) -> anyhow::Result<(ReconciliationEngine, ReplayReport)> {
    let mut engine = ReconciliationEngine::with_log_capacity(log_capacity);
    engine.load_snapshot(snapshot);

    let mut decoder = SseDecoder::new();
    let mut frames = decoder.push(capture).context("event capture is not a valid stream")?;
    // A capture may end without the final blank line
    frames.extend(decoder.push(b"\n\n")?);

    let mut report = ReplayReport::default();
    for frame in frames {
        report.frames += 1;
        match StreamMessage::from_frame(&frame) {
            Ok(StreamMessage::Vote(VoteEvent::Cast(cast))) => {
                report.record_cast(engine.apply_cast_event(&cast))
            }
            Ok(StreamMessage::Vote(VoteEvent::Deleted(deleted))) => {
                report.record_delete(engine.apply_delete_event(&deleted))
            }
            Ok(StreamMessage::Ignored) => report.ignored += 1,
            Err(e) => {
                warn!(event = %frame.event, error = %e, "Malformed event in capture");
                report.malformed += 1;
            }
        }
    }
    Ok((engine, report))
}

pub fn run(config: &Config, snapshot_path: &Path, events_path: &Path, json: bool) -> anyhow::Result<()> {
    let snapshot_bytes = std::fs::read(snapshot_path)
        .with_context(|| format!("reading {}", snapshot_path.display()))?;
    let capture = std::fs::read(events_path)
        .with_context(|| format!("reading {}", events_path.display()))?;

    let snapshot = load_snapshot(&snapshot_bytes)?;
    let (engine, report) = replay(&snapshot, &capture, config.reconcile.event_log_capacity)?;
    info!(frames = report.frames, applied = report.applied, "Replay finished");

    let stats = compute_statistics(engine.units(), &snapshot.voting, &snapshot.options);

    if json {
        let stats = match &stats {
            Ok(stats) => serde_json::to_value(stats)?,
            Err(e) => serde_json::json!({ "configuration_error": e }),
        };
        println!("{}", serde_json::json!({ "report": report, "statistics": stats }));
        return Ok(());
    }

    println!(
        "{} frames: {} applied, {} duplicate, {} invalid, {} already voted, {} stale, {} unknown unit, {} other voting, {} malformed, {} ignored\n",
        report.frames,
        report.applied,
        report.duplicate,
        report.invalid,
        report.already_voted,
        report.stale,
        report.unknown_unit,
        report.wrong_voting,
        report.malformed,
        report.ignored,
    );
    match stats {
        Ok(stats) => println!("{}", render::statistics(&snapshot.voting.title, &stats)),
        Err(e) => println!("{}", render::configuration_error(&e)),
    }
    Ok(())
}
