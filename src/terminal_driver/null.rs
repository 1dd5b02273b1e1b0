//! Fallback driver for hosts with no terminal multiplexer installed: always
//! reports zero sessions, and `new_session` just starts an interactive
//! login shell.

use super::{Capture, Session, TerminalDriver, Window};
use crate::errors::{Error, Result};
use crate::executor::Executor;
use std::sync::Arc;

pub struct Null {
    executor: Arc<Executor>,
}

impl Null {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self { executor }
    }
}

impl TerminalDriver for Null {
    fn program_name(&self) -> &'static str {
        "(none)"
    }

    fn list_sessions(&self) -> Result<Vec<Session>> {
        Ok(Vec::new())
    }

    fn list_windows(&self, _session: &Session) -> Result<Vec<Window>> {
        Ok(Vec::new())
    }

    fn capture(&self, _session: &Session) -> Result<Capture> {
        Err(Error::CaptureFailed(
            "the null driver has no sessions to capture".to_string(),
        ))
    }

    fn new_session(&self) -> Result<i32> {
        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        self.executor
            .exec(&[shell, "-i".to_string(), "-l".to_string()])
    }

    fn attach(&self, _session: &Session) -> Result<i32> {
        Err(Error::CaptureFailed(
            "the null driver has no sessions to attach to".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn null_driver_always_reports_no_sessions() {
        let driver = Null::new(Arc::new(Executor::local()));
        assert_eq!(driver.list_sessions().unwrap().len(), 0);
    }
}
