//! `PasswordInjector`: scans bytes bound for the user's terminal for SSH
//! login prompts, attributes each to a `user@host`, and writes back the
//! matching password — then gets out of the way.

use crate::config::PASSWORD_PROMPT_TAIL;
use crate::errors::{Error, Result};
use crate::pty::PtyChild;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// Post-login connection mode. `Transcript` is terminal; `ProgrammedIo` and
/// `HumanComputerInteraction` may be switched back and forth freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOn {
    /// No follow-on: keep relaying, just capture output.
    Transcript,
    /// Caller drives the connection with explicit `ping`/`pong`.
    ProgrammedIo,
    /// Raw bidirectional passthrough with the foreground terminal.
    HumanComputerInteraction,
}

impl FollowOn {
    fn to_tag(self) -> u8 {
        match self {
            FollowOn::Transcript => 0,
            FollowOn::ProgrammedIo => 1,
            FollowOn::HumanComputerInteraction => 2,
        }
    }

    fn from_tag(tag: u8) -> Self {
        match tag {
            1 => FollowOn::ProgrammedIo,
            2 => FollowOn::HumanComputerInteraction,
            _ => FollowOn::Transcript,
        }
    }
}

/// Wraps a [`PtyChild`]'s parent-bound write path with password-prompt
/// interception. Construct once per connection; the `passwords` map is
/// drained as prompts are matched.
pub struct PasswordInjector {
    pty: Arc<PtyChild>,
    passwords: Mutex<HashMap<String, String>>,
    buffer: Mutex<Vec<u8>>,
    add_cr: bool,
    mode: AtomicU8,
    seen: Mutex<std::collections::HashSet<String>>,
}

impl PasswordInjector {
    pub fn new(pty: Arc<PtyChild>, passwords: HashMap<String, String>, add_cr: bool) -> Self {
        Self {
            pty,
            passwords: Mutex::new(passwords),
            buffer: Mutex::new(Vec::new()),
            add_cr,
            mode: AtomicU8::new(FollowOn::Transcript.to_tag()),
            seen: Mutex::new(std::collections::HashSet::new()),
        }
    }

    pub fn follow_on(&self) -> FollowOn {
        FollowOn::from_tag(self.mode.load(Ordering::Relaxed))
    }

    pub fn set_follow_on(&self, mode: FollowOn) {
        self.mode.store(mode.to_tag(), Ordering::Relaxed);
    }

    pub fn passwords_remaining(&self) -> usize {
        self.passwords
            .lock()
            .map(|p| p.len())
            .unwrap_or(0)
    }

    /// Process a chunk of data the child wrote, consuming any login prompts
    /// it contains, and return the data the caller should actually see
    /// (identical to `data` once scanning is disabled).
    pub fn write_parent(&self, data: &[u8]) -> Result<Vec<u8>> {
        let rewritten = if self.add_cr {
            rewrite_lf_to_crlf(data)
        } else {
            data.to_vec()
        };

        if self.passwords_remaining() == 0 {
            return Ok(rewritten);
        }

        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| Error::InternalInvariant("prompt buffer lock poisoned".into()))?;
        buffer.extend_from_slice(&rewritten);

        loop {
            let tail = PASSWORD_PROMPT_TAIL.as_bytes();
            let Some(prompt_at) = find_subslice(&buffer, tail) else {
                break;
            };
            let line_start = buffer[..prompt_at]
                .iter()
                .rposition(|&b| b == b'\n')
                .map(|i| i + 1)
                .unwrap_or(0);
            let user_host = String::from_utf8_lossy(&buffer[line_start..prompt_at]).to_string();

            let mut seen = self
                .seen
                .lock()
                .map_err(|_| Error::InternalInvariant("seen-set lock poisoned".into()))?;
            if !seen.insert(user_host.clone()) {
                return Err(Error::DuplicatePrompt(user_host));
            }
            drop(seen);

            let password = {
                let mut passwords = self
                    .passwords
                    .lock()
                    .map_err(|_| Error::InternalInvariant("password map lock poisoned".into()))?;
                passwords
                    .remove(&user_host)
                    .ok_or_else(|| Error::MissingPassword(user_host.clone()))?
            };

            let mut to_send = password.into_bytes();
            to_send.push(b'\n');
            self.pty.write_master(&to_send)?;

            let consumed_to = prompt_at + tail.len();
            buffer.drain(..consumed_to);

            if self.passwords_remaining() == 0 {
                buffer.clear();
                break;
            }
        }

        Ok(rewritten)
    }

    /// Write bytes to the remote shell in `ProgrammedIo` mode.
    pub fn ping(&self, data: &[u8]) -> Result<()> {
        self.pty.write_master(data)
    }
}

fn rewrite_lf_to_crlf(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        if b == b'\n' {
            out.push(b'\r');
        }
        out.push(b);
    }
    out
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn dummy_pty() -> Arc<PtyChild> {
        // A PtyChild that spawns `cat` — enough to have a live master to
        // write into without actually needing a remote SSH session.
        Arc::new(PtyChild::spawn(&["cat".to_string()], 24, 80).expect("spawn cat"))
    }

    #[test]
    fn passthrough_when_no_passwords_pending() {
        let pty = dummy_pty();
        let injector = PasswordInjector::new(pty, HashMap::new(), false);
        let out = injector.write_parent(b"hello world").unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn matches_single_prompt_and_drains_map() {
        let pty = dummy_pty();
        let mut passwords = HashMap::new();
        passwords.insert("admin@10.0.0.2".to_string(), "secret".to_string());
        let injector = PasswordInjector::new(pty, passwords, false);

        let chunk = b"Welcome\nadmin@10.0.0.2's password: ";
        injector.write_parent(chunk).unwrap();
        assert_eq!(injector.passwords_remaining(), 0);
    }

    #[test]
    fn missing_password_is_an_error() {
        let pty = dummy_pty();
        let injector = PasswordInjector::new(pty, HashMap::new(), false);
        // force a pending state to exercise the scan path
        injector
            .passwords
            .lock()
            .unwrap()
            .insert("someone@1.2.3.4".to_string(), "x".to_string());

        let chunk = b"other@9.9.9.9's password: ";
        let err = injector.write_parent(chunk).unwrap_err();
        assert!(matches!(err, Error::MissingPassword(_)));
    }

    #[test]
    fn duplicate_prompt_for_same_host_errors() {
        let pty = dummy_pty();
        let mut passwords = HashMap::new();
        passwords.insert("a@1.1.1.1".to_string(), "x".to_string());
        passwords.insert("a@1.1.1.1#2".to_string(), "y".to_string());
        let injector = PasswordInjector::new(pty, passwords, false);
        injector.seen.lock().unwrap().insert("a@1.1.1.1".to_string());

        let chunk = b"a@1.1.1.1's password: ";
        let err = injector.write_parent(chunk).unwrap_err();
        assert!(matches!(err, Error::DuplicatePrompt(_)));
    }

    #[test]
    fn lf_rewritten_to_crlf_when_requested() {
        let pty = dummy_pty();
        let injector = PasswordInjector::new(pty, HashMap::new(), true);
        let out = injector.write_parent(b"a\nb").unwrap();
        assert_eq!(out, b"a\r\nb");
    }
}
