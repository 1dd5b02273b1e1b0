//! Error types shared across the crate.

use thiserror::Error;

/// Errors produced by the SSH/terminal-multiplexer core.
#[derive(Error, Debug)]
pub enum Error {
    /// A `uphps` chain or CLI flag combination could not be parsed.
    #[error("command line error: {0}")]
    CommandLineError(String),

    /// A hop's hostname could not be resolved to a numeric address.
    #[error("could not resolve host {host}: {reason}")]
    MissingHostResolution { host: String, reason: String },

    /// The external program (tmux/screen/ssh) is not installed on the target.
    #[error("{program} not found")]
    ProgramMissing { program: String },

    /// A subprocess exited with a non-zero, non-whitelisted status.
    #[error("{command}, stdout '{stdout}', exit code {exit_code}")]
    CommandFailed {
        command: String,
        stdout: String,
        exit_code: i32,
    },

    /// The PTY's remote end went away (EIO on the master, or the child exited).
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// A window/session screenshot could not be captured or parsed.
    #[error("capture failed: {0}")]
    CaptureFailed(String),

    /// A login prompt was seen for a `user@host` with no password on file.
    #[error("no password on file for {0}")]
    MissingPassword(String),

    /// A login prompt was seen twice for the same `user@host`.
    #[error("duplicate password prompt for {0}")]
    DuplicatePrompt(String),

    /// A remote command did not complete within the configured ceiling.
    #[error("timed out waiting for command to complete")]
    Timeout,

    /// An invariant the code relies on did not hold; this indicates a bug.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
