//! Asamblea - live voting console for condominium assemblies
//!
//! Follows a voting as units cast their votes, shows coefficient-weighted
//! results and quorum, and helps operators cast votes on behalf of units.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use asamblea_core::Config;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

mod commands;
mod debounce;
mod platform;
mod render;
mod session;

#[derive(Debug, Parser)]
#[command(name = "asamblea", version, about = "Live condominium assembly voting")]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Follow a voting live
    Live {
        group: Uuid,
        voting: Uuid,
        /// Print statistics as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// List units that have not voted
    Unvoted {
        group: Uuid,
        voting: Uuid,
        /// Unit number substring
        #[arg(long)]
        filter: Option<String>,
    },
    /// Search pending units interactively and print the chosen id
    Pick { group: Uuid, voting: Uuid },
    /// Cast a vote for a unit
    Cast {
        group: Uuid,
        voting: Uuid,
        #[arg(long)]
        unit: Uuid,
        /// Option code, e.g. SI
        #[arg(long)]
        option: String,
    },
    /// Retract a vote
    Retract { vote_id: Uuid },
    /// Get a time-limited public voting link
    PublicUrl {
        group: Uuid,
        voting: Uuid,
        /// Validity in hours (default from config)
        #[arg(long)]
        hours: Option<u32>,
        /// Copy the link to the clipboard
        #[arg(long)]
        copy: bool,
    },
    /// Results of every voting in a group
    Summary { group: Uuid },
    /// Reconcile a recorded event capture against a saved snapshot
    Replay {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        events: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for command output
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    tracing::debug!(command = ?cli.command, "Starting asamblea");

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;

    let runtime = tokio::runtime::Runtime::new().context("creating tokio runtime")?;
    runtime.block_on(dispatch(cli.command, &config))
}

async fn dispatch(command: Command, config: &Config) -> anyhow::Result<()> {
    match command {
        Command::Live {
            group,
            voting,
            json,
        } => commands::live::run(config, group, voting, json).await,
        Command::Unvoted {
            group,
            voting,
            filter,
        } => commands::unvoted::run(config, group, voting, filter.as_deref()).await,
        Command::Pick { group, voting } => commands::pick::run(config, group, voting).await,
        Command::Cast {
            group,
            voting,
            unit,
            option,
        } => commands::votes::cast(config, group, voting, unit, &option).await,
        Command::Retract { vote_id } => commands::votes::retract(config, vote_id).await,
        Command::PublicUrl {
            group,
            voting,
            hours,
            copy,
        } => commands::public_url::run(config, group, voting, hours, copy).await,
        Command::Summary { group } => commands::summary::run(config, group).await,
        Command::Replay {
            snapshot,
            events,
            json,
        } => commands::replay::run(config, &snapshot, &events, json),
    }
}
