//! The Browser's state machine: which entry is selected, which page is
//! shown, and the cached session list that is rebuilt whenever the user
//! returns to the home page.

use crate::errors::Error;
use crate::logging::LogRing;
use crate::terminal_driver::{Capture, Session, TerminalDriver};

/// What the user ultimately chose when the browser exits.
#[derive(Debug, Clone)]
pub enum Selection {
    /// `Enter` on the home row: start a brand new session. No driver is
    /// pinned here; the caller tries each driver in order and falls
    /// through on [`Error::ProgramMissing`], the way the original tries
    /// tmux, then screen, then the null shell.
    NewSession,
    /// `Enter` on a session row: attach to it.
    Existing { driver_index: usize, session: Session },
    /// `q`/`Q`: no selection.
    Quit,
}

/// One flattened entry in the home-page table: which driver produced it,
/// plus the session itself.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub driver_index: usize,
    pub session: Session,
}

pub struct App {
    pub drivers: Vec<Box<dyn TerminalDriver>>,
    pub sessions: Vec<SessionEntry>,
    pub current_session_index: usize,
    pub page_number: i32,
    pub logs: LogRing,
    pub should_exit: bool,
    pub selection: Option<Selection>,
    pub last_error: Option<String>,
    pub last_capture: Option<Capture>,
    pub terminal_rows: u16,
    pub terminal_cols: u16,
}

impl App {
    pub fn new(drivers: Vec<Box<dyn TerminalDriver>>, logs: LogRing) -> Self {
        Self {
            drivers,
            sessions: Vec::new(),
            current_session_index: 0,
            page_number: 0,
            logs,
            should_exit: false,
            selection: None,
            last_error: None,
            last_capture: None,
            terminal_rows: 24,
            terminal_cols: 80,
        }
    }

    /// Re-query every driver and rebuild the flattened session list. If
    /// every driver reports [`Error::ProgramMissing`], that is surfaced so
    /// the caller can decide whether to keep going (the Null driver always
    /// succeeds with zero sessions, so in practice this never fires unless
    /// even the Null driver's shell has vanished).
    pub fn refresh_sessions(&mut self) -> Result<(), Error> {
        let mut all = Vec::new();
        let mut missing_count = 0;
        for (idx, driver) in self.drivers.iter().enumerate() {
            match driver.list_sessions() {
                Ok(sessions) => {
                    for session in sessions {
                        all.push(SessionEntry {
                            driver_index: idx,
                            session,
                        });
                    }
                }
                Err(Error::ProgramMissing { .. }) => missing_count += 1,
                Err(e) => {
                    self.last_error = Some(e.to_string());
                }
            }
        }
        if missing_count == self.drivers.len() {
            return Err(Error::ProgramMissing {
                program: "tmux/screen".to_string(),
            });
        }
        self.sessions = all;
        if self.current_session_index > self.sessions.len() {
            self.current_session_index = 0;
        }
        Ok(())
    }

    pub fn on_home_page(&self) -> bool {
        self.current_session_index == 0
    }

    fn wrap_len(&self) -> usize {
        self.sessions.len() + 1
    }

    pub fn next_entry(&mut self) {
        self.current_session_index = (self.current_session_index + 1) % self.wrap_len();
    }

    pub fn prev_entry(&mut self) {
        let len = self.wrap_len();
        self.current_session_index = (self.current_session_index + len - 1) % len;
    }

    pub fn page_down(&mut self) {
        self.page_number += 1;
    }

    pub fn page_up(&mut self) {
        if self.page_number > 0 {
            self.page_number -= 1;
        }
    }

    pub fn select(&mut self) {
        if self.current_session_index == 0 {
            self.selection = Some(Selection::NewSession);
        } else {
            let entry = &self.sessions[self.current_session_index - 1];
            self.selection = Some(Selection::Existing {
                driver_index: entry.driver_index,
                session: entry.session.clone(),
            });
        }
        self.should_exit = true;
    }

    pub fn quit(&mut self) {
        self.selection = Some(Selection::Quit);
        self.should_exit = true;
    }

    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.terminal_rows = rows;
        self.terminal_cols = cols;
    }

    /// Recapture the currently selected session's active window, caching
    /// the result for rendering and for the page_number>0 JSON dump.
    pub fn refresh_capture(&mut self) {
        if self.current_session_index == 0 {
            self.last_capture = None;
            return;
        }
        let entry = &self.sessions[self.current_session_index - 1];
        let driver = &self.drivers[entry.driver_index];
        match driver.capture(&entry.session) {
            Ok(capture) => self.last_capture = Some(capture),
            Err(e) => {
                self.last_error = Some(e.to_string());
                self.last_capture = None;
            }
        }
    }

    /// Compose the status line the way the original pads the left half and
    /// truncates with `"..."` if the combined text overflows the terminal
    /// width.
    pub fn status_line(&self, lhs: &str, rhs: &str) -> String {
        let cols = self.terminal_cols as usize;
        if rhs.len() >= cols {
            return rhs.chars().take(cols).collect();
        }
        let lhs_budget = cols - rhs.len();
        let mut composed = if lhs.len() > lhs_budget {
            format!("{}...", &lhs[..lhs_budget.saturating_sub(3)])
        } else {
            let mut s = lhs.to_string();
            s.extend(std::iter::repeat(' ').take(lhs_budget - lhs.len()));
            s
        };
        composed.push_str(rhs);
        composed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;
    use crate::terminal_driver::null::Null;
    use std::sync::Arc;

    fn fixture_app() -> App {
        let drivers: Vec<Box<dyn TerminalDriver>> =
            vec![Box::new(Null::new(Arc::new(Executor::local())))];
        App::new(drivers, LogRing::new())
    }

    #[test]
    fn navigation_wraps_around() {
        let mut app = fixture_app();
        app.sessions = vec![
            SessionEntry {
                driver_index: 0,
                session: Session {
                    session_id: "a".into(),
                    session_name: "a".into(),
                    session_created: 0,
                    session_attached: false,
                    program: "tmux",
                },
            },
            SessionEntry {
                driver_index: 0,
                session: Session {
                    session_id: "b".into(),
                    session_name: "b".into(),
                    session_created: 0,
                    session_attached: false,
                    program: "tmux",
                },
            },
        ];
        assert_eq!(app.current_session_index, 0);
        app.next_entry();
        assert_eq!(app.current_session_index, 1);
        app.next_entry();
        assert_eq!(app.current_session_index, 2);
        app.next_entry();
        assert_eq!(app.current_session_index, 0);
        app.prev_entry();
        assert_eq!(app.current_session_index, 2);
    }

    #[test]
    fn page_up_clamps_at_zero() {
        let mut app = fixture_app();
        app.page_up();
        assert_eq!(app.page_number, 0);
        app.page_down();
        app.page_down();
        app.page_up();
        assert_eq!(app.page_number, 1);
    }

    #[test]
    fn select_on_home_row_requests_new_session() {
        let mut app = fixture_app();
        app.select();
        assert!(matches!(app.selection, Some(Selection::NewSession)));
        assert!(app.should_exit);
    }

    #[test]
    fn status_line_pads_and_truncates() {
        let mut app = fixture_app();
        app.terminal_cols = 20;
        let line = app.status_line("short", " right");
        assert_eq!(line.len(), 20);
        assert!(line.ends_with(" right"));

        let line = app.status_line(&"x".repeat(30), " right");
        assert!(line.ends_with("... right"));
    }
}
