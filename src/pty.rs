//! `PtyChild`: fork-exec a command under a pseudo-terminal and relay bytes
//! between it and the controlling terminal, propagating window-size changes.

use crate::config::RELAY_POLL_MS;
use crate::errors::{Error, Result};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Decoded wait(2) status, following the historical bit layout for parity
/// with shells that report core-dump/kill-signal information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub exit_code: i32,
    pub kill_signal: i32,
    pub core_dumped: bool,
}

/// A pseudo-terminal-backed child process plus a byte relay that a caller
/// can read from / write to while the relay runs on a background thread.
pub struct PtyChild {
    master: Box<dyn MasterPty + Send>,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
    stopping: Arc<AtomicBool>,
    rows: Arc<AtomicU16>,
    cols: Arc<AtomicU16>,
}

impl PtyChild {
    /// Spawn `argv` under a new PTY sized to the caller-supplied `(rows, cols)`.
    pub fn spawn(argv: &[String], rows: u16, cols: u16) -> Result<Self> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| Error::ConnectionClosed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&argv[0]);
        cmd.args(&argv[1..]);

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| Error::ConnectionClosed(e.to_string()))?;
        drop(pair.slave);

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| Error::ConnectionClosed(e.to_string()))?;

        Ok(Self {
            master: pair.master,
            writer: Arc::new(Mutex::new(writer)),
            child: Arc::new(Mutex::new(child)),
            stopping: Arc::new(AtomicBool::new(false)),
            rows: Arc::new(AtomicU16::new(rows)),
            cols: Arc::new(AtomicU16::new(cols)),
        })
    }

    /// A cloneable reader for the master side; used by the relay loop and by
    /// `Executor`'s `pong` to pull bytes off the wire.
    pub fn try_clone_reader(&self) -> Result<Box<dyn Read + Send>> {
        self.master
            .try_clone_reader()
            .map_err(|e| Error::ConnectionClosed(e.to_string()))
    }

    /// Write raw bytes to the PTY master (what the child sees as its stdin).
    pub fn write_master(&self, data: &[u8]) -> Result<()> {
        let mut w = self
            .writer
            .lock()
            .map_err(|_| Error::InternalInvariant("pty writer lock poisoned".into()))?;
        w.write_all(data)?;
        w.flush()?;
        Ok(())
    }

    /// Record a new controlling-terminal size and forward it to the PTY.
    /// Safe to call from a signal handler's associated thread: only touches
    /// atomics and an ioctl, never the relay loop's read path.
    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        self.rows.store(rows, Ordering::Relaxed);
        self.cols.store(cols, Ordering::Relaxed);
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| Error::ConnectionClosed(e.to_string()))
    }

    /// Ask the relay loop to stop on its next poll tick.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Relaxed);
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Relaxed)
    }

    pub fn poll_interval() -> Duration {
        Duration::from_millis(RELAY_POLL_MS)
    }

    /// Block until the child exits and decode its status using the
    /// historical `wait(2)` bit layout (signal in the low byte, exit code in
    /// bits 8-14, core-dump flag in bit 15) so behaviour matches the
    /// original tool across platforms that don't expose a typed status.
    pub fn wait(&self) -> Result<ExitStatus> {
        let mut child = self
            .child
            .lock()
            .map_err(|_| Error::InternalInvariant("pty child lock poisoned".into()))?;
        let status = child
            .wait()
            .map_err(|e| Error::ConnectionClosed(e.to_string()))?;
        let raw = status.exit_code() as i32;
        Ok(ExitStatus {
            exit_code: (raw >> 8) & 0x7f,
            kill_signal: raw & 0xff,
            core_dumped: (raw >> 15) & 1 != 0,
        })
    }
}

#[cfg(unix)]
pub mod sigwinch {
    //! SIGWINCH plumbing: the controlling terminal's resize notifications are
    //! only ever handled on the main thread, then forwarded to the PTY via
    //! `PtyChild::resize`, which is the only cross-thread-safe touchpoint.
    use super::PtyChild;
    use nix::sys::signal::{self, SigHandler, Signal};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    static RESIZE_PENDING: AtomicBool = AtomicBool::new(false);

    extern "C" fn on_sigwinch(_: i32) {
        RESIZE_PENDING.store(true, Ordering::Relaxed);
    }

    /// Install a SIGWINCH handler; returns a guard whose `check_and_forward`
    /// should be polled from the main loop.
    pub struct WinchGuard {
        old: SigHandler,
    }

    impl WinchGuard {
        pub fn install() -> Self {
            let old = unsafe {
                signal::signal(Signal::SIGWINCH, SigHandler::Handler(on_sigwinch))
                    .unwrap_or(SigHandler::SigDfl)
            };
            Self { old }
        }

        /// If a resize was observed since the last call, query the current
        /// terminal size and forward it to `pty`.
        pub fn check_and_forward(&self, pty: &Arc<PtyChild>) {
            if RESIZE_PENDING.swap(false, Ordering::Relaxed) {
                if let Some((rows, cols)) = current_terminal_size() {
                    let _ = pty.resize(rows, cols);
                }
            }
        }
    }

    impl Drop for WinchGuard {
        fn drop(&mut self) {
            // Restoring from a non-main thread raises EINVAL on some
            // platforms; swallow it the way the original tool does.
            unsafe {
                let _ = signal::signal(Signal::SIGWINCH, self.old);
            }
        }
    }

    fn current_terminal_size() -> Option<(u16, u16)> {
        use std::mem::MaybeUninit;
        unsafe {
            let mut ws: libc::winsize = MaybeUninit::zeroed().assume_init();
            if libc::ioctl(libc::STDIN_FILENO, libc::TIOCGWINSZ, &mut ws) == 0 {
                Some((ws.ws_row, ws.ws_col))
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_decodes_clean_exit() {
        // status bits: exit code 0 in bits 8-14, no signal, no core dump
        let raw: i32 = 0 << 8;
        let status = ExitStatus {
            exit_code: (raw >> 8) & 0x7f,
            kill_signal: raw & 0xff,
            core_dumped: (raw >> 15) & 1 != 0,
        };
        assert_eq!(status.exit_code, 0);
        assert_eq!(status.kill_signal, 0);
        assert!(!status.core_dumped);
    }

    #[test]
    fn exit_status_decodes_nonzero_exit() {
        let raw: i32 = 7 << 8;
        let status = ExitStatus {
            exit_code: (raw >> 8) & 0x7f,
            kill_signal: raw & 0xff,
            core_dumped: (raw >> 15) & 1 != 0,
        };
        assert_eq!(status.exit_code, 7);
    }
}
