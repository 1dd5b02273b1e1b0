//! `Executor`: a uniform "run a command, get back (stdout, exit code)"
//! façade over either a local subprocess or a reused remote shell-loop
//! session driven through a [`PasswordInjector`]-wrapped [`PtyChild`].

use crate::config::{COMMAND_POLL_MS, DEFAULT_COMMAND_TIMEOUT_MS};
use crate::errors::{Error, Result};
use crate::password_injector::{FollowOn, PasswordInjector};
use crate::pty::PtyChild;
use crate::relay::relay_interactive;
use crate::uphps::{get_ssh_with_proxies, Hop};
use rand::Rng;
use std::collections::HashMap;
use std::io::Read;
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Predicate used to demote a nonzero exit / particular stdout prefix to an
/// empty, non-error result (e.g. tmux's "no server running" case).
pub type IgnorePredicate = dyn Fn(&str, i32) -> bool + Send + Sync;

fn random_sentinel() -> String {
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| rng.sample(rand::distributions::Alphanumeric) as char)
        .collect()
}

enum Backend {
    Local,
    Remote {
        pty: Arc<PtyChild>,
        injector: Arc<PasswordInjector>,
        sentinel: String,
        read_buf: Mutex<Vec<u8>>,
        reader: Mutex<Box<dyn Read + Send>>,
    },
}

/// Runs commands either as local subprocesses or over a single persistent
/// SSH session, exposing the same `exec`/`check_output` shape either way.
pub struct Executor {
    backend: Backend,
    command_timeout: Duration,
}

impl Executor {
    /// A local-process backend: no SSH, no password injection.
    pub fn local() -> Self {
        Self {
            backend: Backend::Local,
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
        }
    }

    /// Dial the hop chain, inject passwords as prompts appear, then install
    /// the remote shell loop (`while IFS= read -r l; do eval "$l"; echo -e
    /// "\n$?\n<sentinel>"; done`) so subsequent `check_output` calls reuse
    /// one connection instead of paying SSH's handshake cost per command.
    pub fn remote(
        hops: &[Hop],
        passwords: HashMap<String, String>,
        proxy_options: &str,
        outer_options: &str,
    ) -> Result<Self> {
        let ssh_cmd = get_ssh_with_proxies(hops, proxy_options, outer_options)?;
        let argv: Vec<String> = shell_words::split(&ssh_cmd)
            .map_err(|e| Error::CommandLineError(e.to_string()))?;

        let pty = Arc::new(PtyChild::spawn(&argv, 40, 200)?);
        let injector = Arc::new(PasswordInjector::new(pty.clone(), passwords, false));

        // Drain prompts until the map empties, then fall through to
        // installing the shell loop. A production relay loop would run this
        // on a background thread reading continuously; here we poll
        // synchronously since dialing only happens once at startup.
        let reader = pty.try_clone_reader()?;
        let mut reader = reader;
        let deadline = Instant::now() + Duration::from_secs(30);
        let mut scratch = [0u8; 4096];
        while injector.passwords_remaining() > 0 {
            if Instant::now() > deadline {
                return Err(Error::Timeout);
            }
            match reader.read(&mut scratch) {
                Ok(0) => return Err(Error::ConnectionClosed("eof during login".into())),
                Ok(n) => {
                    injector.write_parent(&scratch[..n])?;
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(PtyChild::poll_interval());
                }
                Err(e) => return Err(Error::ConnectionClosed(e.to_string())),
            }
        }

        injector.set_follow_on(FollowOn::ProgrammedIo);
        let sentinel = random_sentinel();
        let loop_cmd = format!(
            "while IFS= read -r l; do eval \"$l\"; echo -e \"\\n$?\\n{sentinel}\"; done\n"
        );
        injector.ping(loop_cmd.as_bytes())?;

        Ok(Self {
            backend: Backend::Remote {
                pty,
                injector,
                sentinel,
                read_buf: Mutex::new(Vec::new()),
                reader: Mutex::new(reader),
            },
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Run `argv`, replacing the caller's terminal for the duration (local)
    /// or switching the remote connection into raw passthrough (remote).
    pub fn exec(&self, argv: &[String]) -> Result<i32> {
        match &self.backend {
            Backend::Local => {
                let status = Command::new(&argv[0])
                    .args(&argv[1..])
                    .env("TZ", "UTC")
                    .env("LANG", "en_GB.UTF-8")
                    .status()?;
                Ok(status.code().unwrap_or(-1))
            }
            Backend::Remote { pty, injector, .. } => {
                let quoted = shell_words::join(argv);
                injector.set_follow_on(FollowOn::HumanComputerInteraction);
                injector.ping(format!("exec {quoted}\n").as_bytes())?;
                // Resume bidirectional relay for the interactive phase: the
                // far end now owns the tty (tmux attach, screen -x, or a
                // login shell) until it exits and the connection closes.
                let relay_result = relay_interactive(pty, injector);
                let status = pty.wait()?;
                injector.set_follow_on(FollowOn::Transcript);
                relay_result?;
                Ok(status.exit_code)
            }
        }
    }

    /// Run `argv`, capture stdout, and enforce a zero exit code unless
    /// `ignore` says the observed `(stdout, exit_code)` is an acceptable
    /// "empty" result (tmux/screen's various "no server" messages).
    pub fn check_output(
        &self,
        argv: &[String],
        ignore: Option<&IgnorePredicate>,
    ) -> Result<String> {
        match &self.backend {
            Backend::Local => {
                let output = Command::new(&argv[0])
                    .args(&argv[1..])
                    .env("TZ", "UTC")
                    .env("LANG", "en_GB.UTF-8")
                    .output()?;
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let exit_code = output.status.code().unwrap_or(-1);
                if exit_code != 0 {
                    if let Some(pred) = ignore {
                        if pred(&stdout, exit_code) {
                            return Ok(String::new());
                        }
                    }
                    return Err(Error::CommandFailed {
                        command: shell_words::join(argv),
                        stdout,
                        exit_code,
                    });
                }
                Ok(stdout)
            }
            Backend::Remote {
                injector,
                sentinel,
                read_buf,
                reader,
                ..
            } => self.remote_check_output(argv, ignore, injector, sentinel, read_buf, reader),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn remote_check_output(
        &self,
        argv: &[String],
        ignore: Option<&IgnorePredicate>,
        injector: &Arc<PasswordInjector>,
        sentinel: &str,
        read_buf: &Mutex<Vec<u8>>,
        reader: &Mutex<Box<dyn Read + Send>>,
    ) -> Result<String> {
        let mut full: Vec<String> = vec!["TZ=UTC".into(), "LANG=en_GB.UTF-8".into()];
        full.extend_from_slice(argv);
        let command_line = shell_words::join(&full);
        injector.ping(format!("{command_line}\n").as_bytes())?;

        let terminator = format!("{sentinel}\r\n");
        let deadline = Instant::now() + self.command_timeout;
        let mut buf = read_buf
            .lock()
            .map_err(|_| Error::InternalInvariant("read buffer lock poisoned".into()))?;
        buf.clear();

        loop {
            if buf.len() >= terminator.len()
                && &buf[buf.len() - terminator.len()..] == terminator.as_bytes()
            {
                break;
            }
            if Instant::now() > deadline {
                return Err(Error::Timeout);
            }
            let mut scratch = [0u8; 4096];
            let mut r = reader
                .lock()
                .map_err(|_| Error::InternalInvariant("reader lock poisoned".into()))?;
            match r.read(&mut scratch) {
                Ok(0) => return Err(Error::ConnectionClosed("eof waiting for sentinel".into())),
                Ok(n) => buf.extend_from_slice(&scratch[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    drop(r);
                    std::thread::sleep(Duration::from_millis(COMMAND_POLL_MS));
                }
                Err(e) => return Err(Error::ConnectionClosed(e.to_string())),
            }
        }

        let text = String::from_utf8_lossy(&buf).replace("\r\n", "\n");
        let (body, exit_code) = split_response(&text, sentinel)?;
        let mut body = strip_leading_echo(body, &command_line);
        body = body.trim_start().to_string();

        if exit_code != 0 {
            if let Some(pred) = ignore {
                if pred(&body, exit_code) {
                    return Ok(String::new());
                }
            }
            return Err(Error::CommandFailed {
                command: command_line,
                stdout: body,
                exit_code,
            });
        }
        Ok(body)
    }

    pub fn close(&self) -> Result<()> {
        if let Backend::Remote { pty, .. } = &self.backend {
            pty.stop();
        }
        Ok(())
    }
}

/// Split `"<body>\n<exit_code>\n<sentinel>\n"` (after CR-LF normalisation
/// and stripping the trailing empty segments produced by `rsplit`) into
/// `(body, exit_code)`.
fn split_response(text: &str, sentinel: &str) -> Result<(&str, i32)> {
    let trimmed = text
        .strip_suffix(&format!("{sentinel}\n"))
        .ok_or_else(|| Error::InternalInvariant("response missing sentinel".into()))?;
    let trimmed = trimmed.strip_suffix('\n').unwrap_or(trimmed);
    let (body, exit_str) = trimmed
        .rsplit_once('\n')
        .ok_or_else(|| Error::InternalInvariant("response missing exit code line".into()))?;
    let exit_code: i32 = exit_str
        .trim()
        .parse()
        .map_err(|_| Error::InternalInvariant(format!("bad exit code {exit_str:?}")))?;
    Ok((body, exit_code))
}

/// Strip every leading occurrence of the literal command echoed back by the
/// remote tty. Some jump chains echo the command 1-2 times; the original
/// implementation compensates the same way rather than diagnosing the
/// root cause, so this keeps the same behaviour.
fn strip_leading_echo<'a>(body: &'a str, command: &str) -> String {
    let mut rest = body;
    loop {
        if let Some(after) = rest.strip_prefix(command) {
            rest = after.strip_prefix('\n').unwrap_or(after);
        } else {
            break;
        }
    }
    rest.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_check_output_runs_and_captures() {
        let exec = Executor::local();
        let out = exec
            .check_output(&["echo".into(), "hi".into()], None)
            .unwrap();
        assert_eq!(out.trim(), "hi");
    }

    #[test]
    fn local_check_output_enforces_exit_code() {
        let exec = Executor::local();
        let err = exec
            .check_output(&["false".into()], None)
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
    }

    #[test]
    fn local_check_output_honors_ignore_predicate() {
        let exec = Executor::local();
        let ignore: &IgnorePredicate = &|_out, code| code == 1;
        let out = exec
            .check_output(&["false".into()], Some(ignore))
            .unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn split_response_parses_body_and_exit_code() {
        let text = "foo\n0\nHI\n";
        let (body, code) = split_response(text, "HI").unwrap();
        assert_eq!(body, "foo");
        assert_eq!(code, 0);
    }

    #[test]
    fn strip_leading_echo_removes_one_or_two_copies() {
        let cmd = "TZ=UTC LANG=en_GB.UTF-8 echo foo";
        let body = format!("{cmd}\n{cmd}\nfoo");
        assert_eq!(strip_leading_echo(&body, cmd), "foo");
    }
}
