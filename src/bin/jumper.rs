//! `jumper`: dial a multi-hop `uphps` chain, inject passwords, then either
//! run a one-shot command or hand the session over to the user as a raw
//! interactive shell.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use svty::config::{DEFAULT_OUTER_OPTIONS, DEFAULT_PROXY_OPTIONS, DEFAULT_SSH_OPTIONS};
use svty::logging::{self, LogRing};
use svty::password_injector::PasswordInjector;
use svty::pty::PtyChild;
use svty::relay::relay_interactive;
use svty::uphps::{get_ssh_with_proxies, parse_uphps};

#[derive(Parser, Debug)]
#[command(name = "jumper", about = "Dial a multi-hop SSH chain with password injection")]
struct Cli {
    /// `user[:pass]@host[:port]+...` hop chain.
    uphps: String,

    /// Command to run on the far end; omit for an interactive shell.
    command: Vec<String>,

    #[arg(short, long)]
    verbose: bool,

    #[arg(long, default_value = DEFAULT_PROXY_OPTIONS)]
    proxy_options: String,

    #[arg(long, default_value = DEFAULT_OUTER_OPTIONS)]
    outer_options: String,

    #[arg(short = 's', long, default_value = DEFAULT_SSH_OPTIONS)]
    ssh_options: String,
}

fn terminal_size() -> (u16, u16) {
    crossterm::terminal::size()
        .map(|(cols, rows)| (rows, cols))
        .unwrap_or((24, 80))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let logs = LogRing::new();
    logging::init(logs, cli.verbose);

    let (hops, passwords) = parse_uphps(&cli.uphps).context("parsing uphps chain")?;
    let extra = format!("{} {}", cli.outer_options, cli.ssh_options);
    let ssh_cmd = get_ssh_with_proxies(&hops, &cli.proxy_options, &extra)?;
    let mut argv: Vec<String> =
        shell_words::split(&ssh_cmd).context("splitting synthesised ssh command")?;
    if !cli.command.is_empty() {
        argv.push("--".to_string());
        argv.extend(cli.command.clone());
    }

    let (rows, cols) = terminal_size();
    let pty = Arc::new(PtyChild::spawn(&argv, rows, cols)?);
    let injector = Arc::new(PasswordInjector::new(pty.clone(), passwords, false));

    let result = relay_interactive(&pty, &injector);

    let status = pty.wait()?;
    result?;
    std::process::exit(status.exit_code);
}
