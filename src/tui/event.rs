//! Event handling for the session browser: a background thread polls
//! crossterm and forwards key/resize/tick events to the draw loop.

use crossterm::event::{self, KeyCode, KeyEvent, KeyModifiers};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Events that can occur while the browser is running.
#[derive(Debug, Clone)]
pub enum Event {
    /// Tick event (drives the periodic re-query of sessions).
    Tick,
    /// Key event.
    Key(KeyEvent),
    /// Window resize event.
    Resize(u16, u16),
    /// Other events.
    Other,
}

/// Handles terminal events on a background thread.
pub struct EventHandler {
    rx: mpsc::Receiver<Event>,
    _tx: mpsc::Sender<Event>,
    stop_flag: Arc<AtomicBool>,
}

impl EventHandler {
    /// Create a new event handler with specified poll interval (ms).
    pub fn new(poll_interval_ms: u64) -> Self {
        let (tx, rx) = mpsc::channel();
        let tx_clone = tx.clone();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag_clone = Arc::clone(&stop_flag);

        thread::spawn(move || {
            let poll_duration = Duration::from_millis(poll_interval_ms);

            loop {
                if stop_flag_clone.load(Ordering::Relaxed) {
                    break;
                }

                if event::poll(poll_duration).ok().unwrap_or(false) {
                    if let Ok(event::Event::Key(key)) = event::read() {
                        let _ = tx_clone.send(Event::Key(key));
                    } else if let Ok(event::Event::Resize(width, height)) = event::read() {
                        let _ = tx_clone.send(Event::Resize(width, height));
                    }
                }

                let _ = tx_clone.send(Event::Tick);
            }
        });

        Self {
            rx,
            _tx: tx,
            stop_flag,
        }
    }

    /// Get next event (non-blocking).
    pub fn next(&self) -> Option<Event> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(_) => None,
        }
    }

    /// Stop the event handler.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// `q`/`Q` quit.
pub fn is_quit_key(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('q') | KeyCode::Char('Q'))
}

/// Enter (CR, LF or the terminal's own Enter keycode) selects the current
/// entry.
pub fn is_select_key(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Enter)
}

/// Right arrow advances `current_session_index`.
pub fn is_next_key(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Right)
}

/// Left arrow retreats `current_session_index`.
pub fn is_prev_key(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Left)
}

/// PageDown enters/advances the debug page.
pub fn is_page_down_key(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::PageDown)
}

/// PageUp retreats the debug page (clamped to zero by the caller).
pub fn is_page_up_key(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::PageUp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_handler_creation() {
        let _handler = EventHandler::new(250);
    }

    #[test]
    fn test_is_quit_key() {
        let key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(is_quit_key(key));
        let key = KeyEvent::new(KeyCode::Char('Q'), KeyModifiers::NONE);
        assert!(is_quit_key(key));
        let key = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        assert!(!is_quit_key(key));
    }

    #[test]
    fn test_is_select_key() {
        let key = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert!(is_select_key(key));
        let key = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE);
        assert!(!is_select_key(key));
    }

    #[test]
    fn test_navigation_keys() {
        assert!(is_next_key(KeyEvent::new(KeyCode::Right, KeyModifiers::NONE)));
        assert!(!is_next_key(KeyEvent::new(KeyCode::Left, KeyModifiers::NONE)));
        assert!(is_prev_key(KeyEvent::new(KeyCode::Left, KeyModifiers::NONE)));
        assert!(!is_prev_key(KeyEvent::new(KeyCode::Right, KeyModifiers::NONE)));
    }

    #[test]
    fn test_page_keys() {
        assert!(is_page_down_key(KeyEvent::new(
            KeyCode::PageDown,
            KeyModifiers::NONE
        )));
        assert!(is_page_up_key(KeyEvent::new(
            KeyCode::PageUp,
            KeyModifiers::NONE
        )));
    }
}
