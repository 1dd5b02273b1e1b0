//! Centralised defaults, mirrored in both CLI front ends so the option
//! strings live in one place instead of being duplicated as clap literals.

/// Options always passed to the outer (first) `ssh`/`scp`/`sftp` invocation.
pub const DEFAULT_OUTER_OPTIONS: &str = "-tt";

/// Options passed to every hop, inner and outer alike.
pub const DEFAULT_PROXY_OPTIONS: &str =
    "-q -oStrictHostKeyChecking=no -oUserKnownHostsFile=/dev/null";

/// Extra options appended to the final (innermost) `ssh` invocation only.
pub const DEFAULT_SSH_OPTIONS: &str = "-X";

/// Default TCP port for SSH.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Byte suffix OpenSSH writes to the tty immediately before reading a
/// password. Stable across locales and OpenSSH versions.
pub const PASSWORD_PROMPT_TAIL: &str = "'s password: ";

/// Poll granularity of the PtyChild relay loop's `select`.
pub const RELAY_POLL_MS: u64 = 100;

/// Sleep between `pong` polls while waiting on a remote command's sentinel.
pub const COMMAND_POLL_MS: u64 = 50;

/// Ceiling on how long `Executor::check_output` will wait for the sentinel
/// before giving up. Not present in the original design; added so a wedged
/// remote shell cannot hang the whole browser.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 15_000;

/// Number of most-recent log records retained for the Browser's debug page.
pub const LOG_RING_CAPACITY: usize = 50;

/// Refresh cadence of the Browser's draw loop.
pub const DEFAULT_REFRESH_RATE_MS: u64 = 250;
