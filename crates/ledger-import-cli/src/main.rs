//! `ledger-import` — import a time-tracking export into a JSON ledger.
//!
//! Records starting on the current local day are held back, malformed ones
//! are reported, and the whole batch is refused if any record overlaps time
//! already in the ledger.

mod snapshot;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use ledger_engine::{
    admit, admit_and_write, boundaries_for, filter_batch, parse_instant, AdmissionOptions,
    DayBoundary, FilterOutcome, GuardError, Instant, LocalOffset, OverlapRecord, Rejection,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ledger-import", version, about = "Import time-tracking exports without duplicates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate an export against the ledger without writing anything
    Check(ImportArgs),
    /// Validate an export and append it to the ledger if nothing overlaps
    Import(ImportArgs),
    /// Print the UTC range covered by a local calendar day
    Day(DayArgs),
}

#[derive(Args)]
struct ImportArgs {
    /// JSON array of exported records
    #[arg(long)]
    export: PathBuf,

    /// JSON ledger file (created on first import)
    #[arg(long, env = "LEDGER_STORE")]
    store: PathBuf,

    /// Fixed UTC offset of the local calendar, e.g. +08:00 or +480
    #[arg(long, env = "LEDGER_OFFSET", default_value = "+00:00", allow_hyphen_values = true)]
    offset: LocalOffset,

    /// Override the current time (RFC 3339)
    #[arg(long, value_parser = parse_now)]
    now: Option<Instant>,

    /// Earliest local date a record may fall on
    #[arg(long, default_value = "2000-01-01")]
    earliest: NaiveDate,

    /// Tolerated clock skew into the future, in days
    #[arg(long, default_value_t = 1)]
    max_future_days: i64,
}

impl ImportArgs {
    fn admission_options(&self) -> AdmissionOptions {
        AdmissionOptions {
            offset: self.offset,
            earliest: self.earliest,
            max_future_days: self.max_future_days,
        }
    }
}

#[derive(Args)]
struct DayArgs {
    /// Local calendar date (YYYY-MM-DD)
    date: NaiveDate,

    #[arg(long, env = "LEDGER_OFFSET", default_value = "+00:00", allow_hyphen_values = true)]
    offset: LocalOffset,
}

fn parse_now(s: &str) -> std::result::Result<Instant, String> {
    parse_instant(s).map_err(|e| e.to_string())
}

/// What an import run found, printed to stdout as JSON.
#[derive(Serialize)]
struct Report {
    accepted: usize,
    imported: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<DayBoundary>,
    rejected: Vec<Rejection>,
    overlaps: Vec<OverlapRecord>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Check(args) => execute_import(&args, false),
        Command::Import(args) => execute_import(&args, true),
        Command::Day(args) => {
            let boundary = boundaries_for(args.date, args.offset)?;
            println!("{}", serde_json::to_string_pretty(&boundary)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn execute_import(args: &ImportArgs, write: bool) -> Result<ExitCode> {
    let options = args.admission_options();
    let now = args.now.unwrap_or_else(Utc::now);

    let raws = snapshot::load_export(&args.export)?;
    let mut store = snapshot::load_store(&args.store)?;

    let outcome = filter_batch(&raws, &options, now);
    let range = outcome.import_range(options.offset);
    let FilterOutcome { accepted, rejected } = outcome;

    let mut report = Report {
        accepted: accepted.len(),
        imported: 0,
        range,
        rejected,
        overlaps: Vec::new(),
    };

    let Some(range) = range else {
        print_report(&report)?;
        return Ok(ExitCode::SUCCESS);
    };

    let result = if write {
        admit_and_write(&mut store, range.start, range.end, accepted, options.offset).map(Some)
    } else {
        admit(&store, range.start, range.end, &accepted, options.offset).map(|()| None)
    };

    match result {
        Ok(written) => {
            if let Some(n) = written {
                snapshot::save_store(&args.store, &store)?;
                report.imported = n;
            }
            print_report(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(GuardError::Blocked(blocked)) => {
            report.overlaps = blocked.records.clone();
            print_report(&report)?;
            eprintln!("{blocked}");
            Ok(ExitCode::FAILURE)
        }
        Err(GuardError::Store(never)) => match never {},
    }
}

fn print_report(report: &Report) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
