//! `session-manager`: the full-screen session browser. Dials an optional
//! `uphps` hop chain, discovers tmux/screen sessions on the far end, and
//! lets the user pick one to attach to (or start a new one).

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use svty::config::{DEFAULT_OUTER_OPTIONS, DEFAULT_PROXY_OPTIONS, DEFAULT_SSH_OPTIONS};
use svty::errors::Error;
use svty::executor::Executor;
use svty::logging::{self, LogRing};
use svty::terminal_driver::{all_drivers, TerminalDriver};
use svty::tui::{run_browser, Selection};
use svty::uphps::parse_uphps;

#[derive(Parser, Debug)]
#[command(
    name = "session-manager",
    about = "Browse and attach to remote terminal-multiplexer sessions"
)]
struct Cli {
    /// `user[:pass]@host[:port]+...` hop chain. Omit to browse locally.
    uphps: Option<String>,

    #[arg(short, long)]
    verbose: bool,

    /// Accepted for compatibility with the original tool's remote-debugger
    /// flag; only logged, never acted on.
    #[arg(short, long)]
    debug: Option<u16>,

    #[arg(long, default_value = DEFAULT_PROXY_OPTIONS)]
    proxy_options: String,

    #[arg(long, default_value = DEFAULT_OUTER_OPTIONS)]
    outer_options: String,

    #[arg(short = 's', long, default_value = DEFAULT_SSH_OPTIONS)]
    ssh_options: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let logs = LogRing::new();
    logging::init(logs.clone(), cli.verbose);

    if let Some(port) = cli.debug {
        tracing::debug!(port, "remote debugger flag accepted (no-op in this build)");
    }

    let executor = match &cli.uphps {
        Some(uphps) => {
            let (hops, passwords) = parse_uphps(uphps).context("parsing uphps chain")?;
            let extra = format!("{} {}", cli.outer_options, cli.ssh_options);
            Executor::remote(&hops, passwords, &cli.proxy_options, &extra)
                .context("establishing remote connection")?
        }
        None => Executor::local(),
    };
    let executor = Arc::new(executor);

    let drivers = all_drivers(executor.clone());
    let selection = run_browser(drivers, logs)?;

    let drivers = all_drivers(executor.clone());
    match selection {
        Selection::NewSession => new_session_with_fallback(&drivers)?,
        Selection::Existing {
            driver_index,
            session,
        } => {
            drivers[driver_index].attach(&session)?;
        }
        Selection::Quit => {}
    }

    executor.close()?;
    Ok(())
}

/// Try each driver's `new_session` in turn, falling through to the next on
/// [`Error::ProgramMissing`] — tmux, then screen, then the null shell —
/// mirroring the original's loop over `[tmux, screen, null]` catching
/// `FileNotFoundError`.
fn new_session_with_fallback(drivers: &[Box<dyn TerminalDriver>]) -> Result<()> {
    let mut last_missing = None;
    for driver in drivers {
        match driver.new_session() {
            Ok(_) => return Ok(()),
            Err(Error::ProgramMissing { program }) => {
                tracing::debug!(program, "driver unavailable, trying next");
                last_missing = Some(program);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(anyhow::anyhow!(
        "no terminal multiplexer available (last missing: {})",
        last_missing.unwrap_or_else(|| "none".to_string())
    ))
}
