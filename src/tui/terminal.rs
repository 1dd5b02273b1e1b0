//! Terminal lifecycle and rendering for the session browser.

use anyhow::Result;
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::layout::Alignment;
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};
use std::io::Stdout;
use std::time::{Duration, Instant};

use crate::tui::app::App;
use crate::tui::event::{
    is_next_key, is_page_down_key, is_page_up_key, is_prev_key, is_quit_key, is_select_key, Event,
    EventHandler,
};

/// Thin wrapper around the `ratatui` terminal that owns raw-mode and
/// alternate-screen lifecycle.
pub struct Terminal {
    terminal: ratatui::Terminal<CrosstermBackend<Stdout>>,
}

impl Terminal {
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = ratatui::Terminal::new(backend)?;

        Ok(Self { terminal })
    }

    /// Main loop: re-query sessions on the home page, recapture the active
    /// window otherwise, draw a frame, then dispatch one pending input
    /// event. Returns the final `App` so the caller can read `selection`.
    pub fn draw_loop(
        mut self,
        mut app: App,
        event_handler: EventHandler,
        refresh_rate_ms: u64,
    ) -> Result<App> {
        let tick_duration = Duration::from_millis(refresh_rate_ms);
        let mut last_refresh = Instant::now() - tick_duration;

        loop {
            if last_refresh.elapsed() >= tick_duration {
                if app.on_home_page() && app.page_number == 0 {
                    let _ = app.refresh_sessions();
                } else if !app.on_home_page() && app.page_number == 0 {
                    app.refresh_capture();
                }
                last_refresh = Instant::now();
            }

            {
                let app_ref = &app;
                self.terminal.draw(|f| Self::ui_static(f, app_ref))?;
            }

            if let Some(event) = event_handler.next() {
                match event {
                    Event::Key(key) => {
                        if is_quit_key(key) {
                            app.quit();
                        } else if is_select_key(key) {
                            app.select();
                        } else if is_next_key(key) {
                            app.next_entry();
                        } else if is_prev_key(key) {
                            app.prev_entry();
                        } else if is_page_down_key(key) {
                            app.page_down();
                        } else if is_page_up_key(key) {
                            app.page_up();
                        }
                    }
                    Event::Resize(cols, rows) => {
                        app.resize(rows, cols);
                    }
                    _ => {}
                }
            }

            if app.should_exit {
                break;
            }

            std::thread::sleep(Duration::from_millis(10));
        }

        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;

        Ok(app)
    }

    fn ui_static(f: &mut Frame, app: &App) {
        let size = f.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(0)
            .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
            .split(size);

        if app.page_number > 0 {
            Self::render_debug_page(f, app, chunks[0]);
        } else if app.on_home_page() {
            Self::render_home(f, app, chunks[0]);
        } else {
            Self::render_session(f, app, chunks[0]);
        }

        Self::render_status(f, app, chunks[1]);
    }

    /// `PROGRAM / CREATED / ATTACHED / SESSION` table with the "new
    /// session" synthetic row at index 0, matching the original layout.
    fn render_home(f: &mut Frame, app: &App, area: Rect) {
        let header = Row::new(vec!["PROGRAM", "CREATED", "ATTACHED", "SESSION"])
            .style(Style::default().add_modifier(Modifier::BOLD));

        let mut rows = vec![Row::new(vec!["", "", "", "<new session>"])];
        for (idx, entry) in app.sessions.iter().enumerate() {
            let style = if idx + 1 == app.current_session_index {
                Style::default().bg(Color::Blue).fg(Color::White)
            } else {
                Style::default()
            };
            rows.push(
                Row::new(vec![
                    entry.session.program.to_string(),
                    entry.session.session_created.to_string(),
                    if entry.session.session_attached {
                        "yes".to_string()
                    } else {
                        "no".to_string()
                    },
                    entry.session.session_name.clone(),
                ])
                .style(style),
            );
        }
        if app.current_session_index == 0 {
            rows[0] = rows[0].clone().style(Style::default().bg(Color::Blue).fg(Color::White));
        }

        let widths = [
            Constraint::Length(8),
            Constraint::Length(19),
            Constraint::Length(8),
            Constraint::Min(10),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::NONE));
        f.render_widget(table, area);
    }

    fn render_session(f: &mut Frame, app: &App, area: Rect) {
        let text = match &app.last_capture {
            Some(capture) => capture.lines.join("\n"),
            None => app
                .last_error
                .clone()
                .unwrap_or_else(|| "(no capture yet)".to_string()),
        };
        let paragraph = Paragraph::new(text).block(Block::default().borders(Borders::NONE));
        f.render_widget(paragraph, area);
    }

    /// Debug page: on the home page, the last 50 log records; on a session,
    /// a JSON dump of the session/window/pane metadata.
    fn render_debug_page(f: &mut Frame, app: &App, area: Rect) {
        let lines: Vec<String> = if app.on_home_page() {
            app.logs.snapshot()
        } else {
            let entry = &app.sessions[app.current_session_index - 1];
            serde_json::to_string_pretty(&entry.session)
                .unwrap_or_default()
                .lines()
                .map(|s| s.to_string())
                .collect()
        };

        let page_lines = area.height.max(1) as usize;
        let total_pages = lines.len().div_ceil(page_lines).max(1);
        let page = ((app.page_number - 1).max(0) as usize).min(total_pages - 1);
        let start = page * page_lines;
        let end = (start + page_lines).min(lines.len());
        let shown = lines.get(start..end).unwrap_or_default().join("\n");

        let paragraph = Paragraph::new(shown).block(
            Block::default()
                .borders(Borders::TOP)
                .title(format!("debug page {}/{}", page + 1, total_pages)),
        );
        f.render_widget(paragraph, area);
    }

    fn render_status(f: &mut Frame, app: &App, area: Rect) {
        let (lhs, rhs) = match &app.last_capture {
            Some(c) => (c.status_lhs.clone(), c.status_rhs.clone()),
            None => ("q: quit  Enter: select  ←/→: navigate  PgUp/PgDn: debug".to_string(), String::new()),
        };
        let line = app.status_line(&lhs, &rhs);
        let status = Paragraph::new(Line::from(Span::styled(
            line,
            Style::default().bg(Color::White).fg(Color::Black),
        )))
        .alignment(Alignment::Left);
        f.render_widget(status, area);
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_terminal_module_compiles() {}
}
