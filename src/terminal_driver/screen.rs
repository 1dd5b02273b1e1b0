//! GNU screen(1) driver: line-oriented `-list`/`-Q windows`/`-Q info` output
//! parsing plus the mktemp/hardcopy/cat/rm dance for window capture.

use super::{is_program_missing, Capture, Session, TerminalDriver, Window};
use crate::errors::{Error, Result};
use crate::executor::Executor;
use chrono::NaiveDateTime;
use std::sync::Arc;

const LIST_SAFE_MSGS: &[&str] = &["There is a screen on", "There are screens on"];
const LIST_UNSAFE_MSGS: &[&str] = &["No Sockets found in", "No screen session found"];

pub struct Screen {
    executor: Arc<Executor>,
}

impl Screen {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self { executor }
    }

    fn check_output(&self, args: &[String], safe_msgs: &[&str]) -> Result<Vec<String>> {
        let mut cmd = vec!["screen".to_string()];
        cmd.extend_from_slice(args);
        let safe_msgs_owned: Vec<String> = safe_msgs.iter().map(|s| s.to_string()).collect();
        let ignore = move |stdout: &str, code: i32| {
            code == 1 && safe_msgs_owned.iter().any(|m| stdout.starts_with(m.as_str()))
        };
        let stdout = self
            .executor
            .check_output(&cmd, Some(&ignore))
            .map_err(|e| self.reclassify(e))?;
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(trimmed.split('\n').map(|s| s.to_string()).collect())
        }
    }

    fn session_check_output(&self, session_id: &str, args: &[String]) -> Result<Vec<String>> {
        let mut full = vec!["-X".to_string(), "-S".to_string(), session_id.to_string()];
        full.extend_from_slice(args);
        self.check_output(&full, &[])
    }

    fn reclassify(&self, err: Error) -> Error {
        if let Error::CommandFailed {
            stdout, exit_code, ..
        } = &err
        {
            if is_program_missing(stdout, *exit_code) {
                return Error::ProgramMissing {
                    program: "screen".to_string(),
                };
            }
        }
        err
    }

    fn list_windows_for(&self, session_id: &str) -> Result<Vec<Window>> {
        let lines = self.session_check_output(
            session_id,
            &["-Q".to_string(), "windows".to_string()],
        )?;
        let Some(first) = lines.first() else {
            return Ok(Vec::new());
        };
        let tokens: Vec<&str> = first.split_whitespace().collect();
        if tokens.len() % 2 != 0 {
            return Err(Error::InternalInvariant(
                "screen window list had an odd token count".to_string(),
            ));
        }
        let flags = regex::Regex::new("[-$!@L&Z]").expect("static flag-stripping regex");
        let strip_flags = |s: &str| flags.replace_all(s, "").to_string();
        let mut windows = Vec::new();
        for pair in tokens.chunks(2) {
            let (flagged_index, name) = (pair[0], pair[1]);
            let stripped = strip_flags(flagged_index);
            let active = stripped.ends_with('*');
            let index_str = stripped.trim_end_matches('*');
            let window_index: u32 = index_str.parse().unwrap_or(0);
            windows.push(Window {
                window_id: name.to_string(),
                window_index,
                window_name: name.to_string(),
                window_active: active,
                window_width: 0,
                window_height: 0,
                panes: Vec::new(),
            });
        }
        // screen omits the asterisk when there's only one window.
        if windows.len() == 1 {
            windows[0].window_active = true;
        }
        Ok(windows)
    }
}

impl TerminalDriver for Screen {
    fn program_name(&self) -> &'static str {
        "screen"
    }

    fn list_sessions(&self) -> Result<Vec<Session>> {
        let lines = match self.check_output(&["-list".to_string()], LIST_SAFE_MSGS) {
            Ok(lines) => lines,
            Err(Error::CommandFailed {
                stdout, exit_code, ..
            }) if exit_code == 1 && LIST_UNSAFE_MSGS.iter().any(|m| stdout.starts_with(m)) => {
                Vec::new()
            }
            Err(e) => return Err(self.reclassify(e)),
        };
        if lines.len() < 2 {
            return Ok(Vec::new());
        }
        let body = &lines[1..lines.len() - 1];
        let mut sessions = Vec::new();
        for line in body {
            let fields: Vec<&str> = line.trim().split('\t').collect();
            if fields.len() != 3 {
                continue;
            }
            let name = fields[0].to_string();
            let attached = fields[2].trim_matches(&['(', ')'][..]);
            sessions.push(Session {
                session_id: name.clone(),
                session_name: name,
                session_created: parse_screen_timestamp(fields[1]),
                session_attached: attached.eq_ignore_ascii_case("attached"),
                program: "screen",
            });
        }
        Ok(sessions)
    }

    fn list_windows(&self, session: &Session) -> Result<Vec<Window>> {
        self.list_windows_for(&session.session_id)
    }

    fn capture(&self, session: &Session) -> Result<Capture> {
        let windows = self.list_windows(session)?;
        let active = windows
            .iter()
            .find(|w| w.window_active)
            .ok_or_else(|| Error::CaptureFailed("active window not found".to_string()))?;

        let info = self.session_check_output(
            &session.session_id,
            &["-Q".to_string(), "info".to_string()],
        )?;
        let info_line = info
            .first()
            .ok_or_else(|| Error::CaptureFailed("no -Q info output".to_string()))?;
        // "(37,45)/(143,45)+10000 +flow UTF-8 0(srhaque)" -- second pair is
        // the real window geometry.
        let second_paren = info_line
            .splitn(3, '(')
            .nth(2)
            .ok_or_else(|| Error::CaptureFailed("unexpected -Q info format".to_string()))?;
        let dims = second_paren
            .split(')')
            .next()
            .ok_or_else(|| Error::CaptureFailed("unexpected -Q info format".to_string()))?;
        let (w_str, h_str) = dims
            .split_once(',')
            .ok_or_else(|| Error::CaptureFailed("unexpected -Q info format".to_string()))?;
        let width: usize = w_str
            .parse()
            .map_err(|_| Error::CaptureFailed("bad width in -Q info".to_string()))?;
        let height: usize = h_str
            .parse::<usize>()
            .map_err(|_| Error::CaptureFailed("bad height in -Q info".to_string()))?
            + 1;

        let tmp = self
            .executor
            .check_output(&["mktemp".to_string()], None)?;
        let tmp = tmp.trim().to_string();
        self.executor
            .check_output(&["rm".to_string(), "-f".to_string(), tmp.clone()], None)?;
        self.session_check_output(
            &session.session_id,
            &["hardcopy".to_string(), tmp.clone()],
        )?;
        let dump = self
            .executor
            .check_output(&["cat".to_string(), tmp.clone()], None)?;
        self.executor
            .check_output(&["rm".to_string(), tmp], None)?;

        let mut lines: Vec<&str> = dump.split('\n').collect();
        if lines.last() == Some(&"") {
            lines.pop();
        }
        if lines.len() + 1 != height {
            return Err(Error::CaptureFailed(format!(
                "expected {} captured lines, got {}",
                height - 1,
                lines.len()
            )));
        }
        let lines: Vec<String> = lines.iter().map(|l| pad(l, width)).collect();

        let lhs_parts: Vec<String> = windows
            .iter()
            .map(|w| {
                format!(
                    "{}:{}{}",
                    w.window_index,
                    w.window_name,
                    if w.window_active { "*" } else { "-" }
                )
            })
            .collect();
        let status_lhs = format!("[{}] {}", session.session_id, lhs_parts.join(" "));

        Ok(Capture {
            lines,
            status_lhs,
            status_rhs: String::new(),
        })
    }

    fn new_session(&self) -> Result<i32> {
        self.executor
            .exec(&["screen".to_string()])
            .map_err(|e| self.reclassify(e))
    }

    fn attach(&self, session: &Session) -> Result<i32> {
        self.executor.exec(&[
            "screen".to_string(),
            "-x".to_string(),
            session.session_id.clone(),
        ])
    }
}

/// Parse screen's `-list` timestamp field, e.g. `"(26/07/26 14:03:21)"`,
/// into a Unix epoch. Matches `datetime.strptime(created[1:-1], "%d/%m/%y
/// %H:%M:%S")` in the original, using UTC in place of the original's
/// implicit local-timezone interpretation.
fn parse_screen_timestamp(raw: &str) -> i64 {
    let trimmed = raw.trim_matches(&['(', ')'][..]);
    NaiveDateTime::parse_from_str(trimmed, "%d/%m/%y %H:%M:%S")
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}

fn pad(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        s.to_string()
    } else {
        let mut out = s.to_string();
        out.extend(std::iter::repeat(' ').take(width - len));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_screen_window_flags() {
        let stripped = "3*$".replace(['-', '$', '!', '@', 'L', '&', 'Z'], "");
        assert_eq!(stripped, "3*");
    }

    #[test]
    fn single_window_forced_active() {
        let windows = vec![Window {
            window_id: "bash".into(),
            window_index: 0,
            window_name: "bash".into(),
            window_active: false,
            window_width: 0,
            window_height: 0,
            panes: vec![],
        }];
        let mut windows = windows;
        if windows.len() == 1 {
            windows[0].window_active = true;
        }
        assert!(windows[0].window_active);
    }

    #[test]
    fn pads_short_lines_to_width() {
        assert_eq!(pad("hi", 5), "hi   ");
        assert_eq!(pad("hello world", 5), "hello world");
    }

    #[test]
    fn parses_screen_list_timestamp() {
        let epoch = parse_screen_timestamp("(26/07/26 14:03:21)");
        assert!(epoch > 0);
        let expected = chrono::NaiveDate::from_ymd_opt(2026, 7, 26)
            .unwrap()
            .and_hms_opt(14, 3, 21)
            .unwrap()
            .and_utc()
            .timestamp();
        assert_eq!(epoch, expected);
    }

    #[test]
    fn bad_timestamp_falls_back_to_zero() {
        assert_eq!(parse_screen_timestamp("(garbage)"), 0);
    }
}
