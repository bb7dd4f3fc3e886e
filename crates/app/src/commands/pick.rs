//! `asamblea pick`: search pending units as you type
//!
//! Each stdin line is a new unit-number filter; only the last one typed
//! within the debounce window is queried. `:N` selects the N-th listed unit
//! and prints its id. Votes seen on the live stream are hidden right away,
//! before the backend catches up.

use std::collections::HashSet;
use std::sync::Arc;

use asamblea_core::unvoted::{exclude_voted, matches_filter, record_streamed_vote};
use asamblea_core::{Config, UnvotedUnit, VoteEvent};
use asamblea_net::{EventStream, StreamEvent, VotingApi};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::debounce::Debouncer;
use crate::render;

/// A parsed input line
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Search(&'a str),
    Select(usize),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    match line.strip_prefix(':').and_then(|n| n.trim().parse::<usize>().ok()) {
        Some(n) => Input::Select(n),
        None => Input::Search(line),
    }
}

/// Apply streamed votes and the current filter to a backend result
fn visible(units: Vec<UnvotedUnit>, voted: &HashSet<Uuid>, filter: &str) -> Vec<UnvotedUnit> {
    exclude_voted(units, voted)
        .into_iter()
        .filter(|u| matches_filter(&u.unit_number, Some(filter)))
        .collect()
}

pub async fn run(config: &Config, group: Uuid, voting: Uuid) -> anyhow::Result<()> {
    let api = super::api(config)?;
    let scope = api.scope(group, voting);
    let mut stream = EventStream::connect(api.clone(), scope, &config.stream);
    let api = Arc::new(api);

    let (result_tx, mut result_rx) =
        mpsc::channel::<(String, asamblea_net::Result<Vec<UnvotedUnit>>)>(8);
    let mut debouncer = Debouncer::new(config.query.debounce());
    let mut voted = HashSet::new();
    let mut listed: Vec<UnvotedUnit> = Vec::new();
    let mut filter = String::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("type a unit number to search, :N to pick");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else {
                    // Input ended: answer the last query before leaving
                    if debouncer.is_pending() {
                        debouncer.flush().await;
                        if let Ok((_, result)) = result_rx.try_recv() {
                            let units = result.map_err(super::surface)?;
                            println!("{}", render::unvoted(&visible(units, &voted, &filter)));
                        }
                    }
                    break;
                };
                match parse_input(&line) {
                    Input::Select(n) => match n.checked_sub(1).and_then(|i| listed.get(i)) {
                        Some(unit) => {
                            println!("{}", unit.property_unit_id);
                            break;
                        }
                        None => eprintln!("no unit #{}", n),
                    },
                    Input::Search(query) => {
                        filter = query.to_string();
                        let api = api.clone();
                        let tx = result_tx.clone();
                        let query = filter.clone();
                        debouncer.schedule(async move {
                            let filter = (!query.is_empty()).then_some(query.as_str());
                            let result = api.unvoted_units(&scope, filter).await;
                            let _ = tx.send((query, result)).await;
                        });
                    }
                }
            }

            Some((query, result)) = result_rx.recv() => match result {
                Ok(units) if query == filter => {
                    listed = visible(units, &voted, &filter);
                    println!("{}", render::unvoted(&listed));
                }
                Ok(_) => debug!(query = %query, "Discarding results for a stale query"),
                Err(e) => eprintln!("{}", super::surface(e)),
            },

            Some(event) = stream.next_event() => {
                let vote = match event {
                    StreamEvent::VoteCast(cast) => VoteEvent::Cast(cast),
                    StreamEvent::VoteDeleted(deleted) => VoteEvent::Deleted(deleted),
                    _ => continue,
                };
                record_streamed_vote(&mut voted, &vote);
                listed.retain(|u| !voted.contains(&u.property_unit_id));
            }
        }
    }

    debouncer.cancel();
    stream.close().await;
    Ok(())
}
