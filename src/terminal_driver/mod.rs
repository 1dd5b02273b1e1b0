//! `TerminalDriver`: translate abstract session/window/pane operations into
//! commands run through an [`Executor`], parsed into these tagged record
//! types. Three implementations: [`tmux`], [`screen`], [`null`].

pub mod null;
pub mod screen;
pub mod tmux;

use crate::errors::Result;
use crate::executor::Executor;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct Pane {
    pub pane_id: String,
    pub pane_active: bool,
    pub pane_title: String,
    pub pane_top: u16,
    pub pane_left: u16,
    pub pane_width: u16,
    pub pane_height: u16,
}

#[derive(Debug, Clone, Serialize)]
pub struct Window {
    pub window_id: String,
    pub window_index: u32,
    pub window_name: String,
    pub window_active: bool,
    pub window_width: u16,
    pub window_height: u16,
    pub panes: Vec<Pane>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub session_id: String,
    pub session_name: String,
    pub session_created: i64,
    pub session_attached: bool,
    /// Which driver kind produced this session, for the home-page table.
    pub program: &'static str,
}

/// A rendered screenshot of a session's active window: a character grid
/// plus the composed status line.
#[derive(Debug, Clone)]
pub struct Capture {
    pub lines: Vec<String>,
    pub status_lhs: String,
    pub status_rhs: String,
}

/// Detect tmux/screen's "program not found" signature: exit 127 with
/// `"command not found"` somewhere in stdout, the shape every shell uses
/// when it can't locate the requested binary.
pub fn is_program_missing(stdout: &str, exit_code: i32) -> bool {
    exit_code == 127 && stdout.contains("command not found")
}

pub trait TerminalDriver {
    fn program_name(&self) -> &'static str;

    /// List all sessions known to this multiplexer on the far end. An
    /// empty vector (not an error) is returned when the multiplexer is
    /// installed but has none; [`Error::ProgramMissing`] is returned only
    /// when the binary itself could not be found.
    fn list_sessions(&self) -> Result<Vec<Session>>;

    fn list_windows(&self, session: &Session) -> Result<Vec<Window>>;

    fn capture(&self, session: &Session) -> Result<Capture>;

    /// Replace the foreground process with a freshly created session
    /// (or, for the null driver, an interactive login shell).
    fn new_session(&self) -> Result<i32>;

    fn attach(&self, session: &Session) -> Result<i32>;
}

/// All three drivers available for a given executor, in the order the
/// Browser iterates them to build its home-page session table.
pub fn all_drivers(executor: Arc<Executor>) -> Vec<Box<dyn TerminalDriver>> {
    vec![
        Box::new(tmux::Tmux::new(executor.clone())),
        Box::new(screen::Screen::new(executor.clone())),
        Box::new(null::Null::new(executor)),
    ]
}
