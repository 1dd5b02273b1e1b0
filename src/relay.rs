//! Bidirectional stdin/stdout <-> pty relay, shared by `jumper`'s raw
//! interactive session and [`crate::executor::Executor::exec`]'s resumed
//! `HumanComputerInteraction` phase — the Rust equivalent of the original's
//! `SSHMultiPass.run()` loop once `_follow_on` switches to `FOLLOW_ON_HCI`.

use crate::errors::Result;
use crate::password_injector::PasswordInjector;
use crate::pty::PtyChild;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Put the local terminal into raw mode, relay bytes until the far end
/// closes its end of the pty, then restore the terminal regardless of
/// how the relay finished.
pub fn relay_interactive(pty: &Arc<PtyChild>, injector: &Arc<PasswordInjector>) -> Result<()> {
    enable_raw_mode().ok();
    let result = relay(pty, injector);
    disable_raw_mode().ok();
    result
}

fn relay(pty: &Arc<PtyChild>, injector: &Arc<PasswordInjector>) -> Result<()> {
    let mut reader = pty.try_clone_reader()?;
    let stopping = Arc::new(AtomicBool::new(false));

    let writer_pty = pty.clone();
    let writer_injector = injector.clone();
    let writer_stop = stopping.clone();
    let stdin_thread = std::thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 1024];
        loop {
            if writer_stop.load(Ordering::Relaxed) {
                break;
            }
            match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    // Gate stdin while passwords are still pending so the
                    // user cannot race a keystroke into a password prompt.
                    if writer_injector.passwords_remaining() == 0 {
                        let _ = writer_pty.write_master(&buf[..n]);
                    }
                }
                Err(_) => break,
            }
        }
    });

    let mut stdout = std::io::stdout();
    let mut scratch = [0u8; 4096];
    loop {
        if pty.is_stopping() {
            break;
        }
        match reader.read(&mut scratch) {
            Ok(0) => break,
            Ok(n) => {
                let out = injector.write_parent(&scratch[..n])?;
                stdout.write_all(&out)?;
                stdout.flush()?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(PtyChild::poll_interval());
            }
            Err(_) => break,
        }
    }

    stopping.store(true, Ordering::Relaxed);
    pty.stop();
    let _ = stdin_thread.join();
    Ok(())
}
