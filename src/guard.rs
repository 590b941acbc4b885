//! Call-once wrapper for hosts whose start-up path might run twice.

use log::debug;

use crate::error::{Error, Result};
use crate::{install_self_protection, Protection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum State {
    #[default]
    Pending,
    Done(Protection),
    Failed,
}

/// One-shot installation flag, owned by the host's start-up sequence.
///
/// The first `protect()` installs; every later call returns
/// `Error::AlreadyInstalled` without touching the kernel, whether or not the
/// first attempt succeeded.
#[derive(Debug, Default)]
pub struct StartupGuard {
    state: State,
}

impl StartupGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protect(&mut self) -> Result<Protection> {
        self.protect_with(install_self_protection)
    }

    fn protect_with<F>(&mut self, install: F) -> Result<Protection>
    where
        F: FnOnce() -> Result<Protection>,
    {
        if self.state != State::Pending {
            debug!("[seccomp] kill-guard install requested again, ignoring");
            return Err(Error::AlreadyInstalled);
        }
        match install() {
            Ok(protection) => {
                self.state = State::Done(protection);
                Ok(protection)
            }
            Err(e) => {
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    /// Status after a successful `protect()`.
    pub fn protection(&self) -> Option<Protection> {
        match self.state {
            State::Done(p) => Some(p),
            _ => None,
        }
    }
}
