//! The curses-like session browser: lists sessions discovered across every
//! [`crate::terminal_driver::TerminalDriver`], lets the user page and
//! navigate, and returns what they picked.

pub mod app;
pub mod event;
pub mod terminal;

pub use app::{App, Selection};
pub use event::{Event, EventHandler};
pub use terminal::Terminal;

use crate::config::DEFAULT_REFRESH_RATE_MS;
use crate::logging::LogRing;
use crate::terminal_driver::TerminalDriver;
use anyhow::Result;

/// Run the browser to completion, returning the user's selection.
pub fn run_browser(drivers: Vec<Box<dyn TerminalDriver>>, logs: LogRing) -> Result<Selection> {
    let app = App::new(drivers, logs);
    let terminal = Terminal::new()?;
    let event_handler = EventHandler::new(100);

    let app = terminal.draw_loop(app, event_handler, DEFAULT_REFRESH_RATE_MS)?;
    Ok(app.selection.unwrap_or(Selection::Quit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tui_module_imports() {
        let _ = LogRing::new();
    }
}
