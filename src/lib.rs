pub mod cli;
pub mod config;
pub mod filter;
pub mod output;
pub mod owner;
pub mod query;
pub mod render;
pub mod snapshot;

use anyhow::Context;
use config::Config;
use filter::DisplayOptions;
use output::Output;
use owner::{OwnershipResolver, PasswdLookup, ProcFsOwners, ProcessOwners, UserLookup};
use query::GpuQueryProvider;
use std::io::{self, Write};
use std::thread;
use tracing::warn;

/// Refresh forever; only losing the query tool altogether ends the loop.
pub fn run_nvtop(config: &Config, options: &DisplayOptions) -> anyhow::Result<()> {
    let provider = query::provider_for(&config.query_source);
    let owners = ProcFsOwners::new(&config.proc_root);
    let users = PasswdLookup;
    let current_uid = owner::current_uid();
    let mut output = Output::new(io::stdout(), config.output_mode.clone());
    let mut tool_answered = false;

    loop {
        run_cycle(
            provider.as_ref(),
            &owners,
            &users,
            current_uid,
            options,
            &mut output,
            &mut tool_answered,
        )?;
        thread::sleep(config.refresh_interval);
    }
}

/// One refresh: query, parse, filter, render. A cycle with unusable output is
/// skipped with a warning, the next one may do better.
///
/// The device query is fatal only while the tool has never answered, or when it
/// cannot be started at all. `tool_answered` carries that across cycles.
pub fn run_cycle<P, O, L, W>(
    provider: &P,
    owners: &O,
    users: &L,
    current_uid: u32,
    options: &DisplayOptions,
    output: &mut Output<W>,
    tool_answered: &mut bool,
) -> anyhow::Result<()>
where
    P: GpuQueryProvider + ?Sized,
    O: ProcessOwners + ?Sized,
    L: UserLookup + ?Sized,
    W: Write,
{
    let (raw, process_error) = match query::capture(provider) {
        Ok(captured) => captured,
        Err(e) if *tool_answered && e.kind() != io::ErrorKind::NotFound => {
            warn!("Skipping refresh, GPU query failed: {}", e);
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to query GPU state"),
    };
    *tool_answered = true;
    output.begin_cycle()?;

    if let Some(e) = process_error {
        warn!("Failed to list GPU processes: {}", e);
    }
    for argument in &options.ignored_arguments {
        warn!("Ignoring unknown argument {:?}", argument);
    }

    let snapshot = match snapshot::parse_snapshot(&raw, owners) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Skipping refresh: {}", e);
            return Ok(());
        }
    };

    let mut resolver = OwnershipResolver::new(users, current_uid);
    let view = filter::apply(&snapshot, options, &mut resolver);
    for invalid in &view.invalid_selection {
        warn!("{}", invalid);
    }

    output.write_view(&view, options)?;
    Ok(())
}
