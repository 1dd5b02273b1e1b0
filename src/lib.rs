//! Core library for the SSH multi-hop password-injection and terminal
//! session browser: a PTY-backed proxy driver, a reusable remote-shell
//! command channel, and tmux/screen-aware session browsing.

pub mod config;
pub mod errors;
pub mod executor;
pub mod logging;
pub mod password_injector;
pub mod pty;
pub mod relay;
pub mod terminal_driver;
pub mod tui;
pub mod uphps;

pub use errors::{Error, Result};
