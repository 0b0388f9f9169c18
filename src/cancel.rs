//! Cooperative cancellation for long-running installs.
//!
//! The extractor polls the token between archive entries and between copy
//! chunks, so a cancelled install stops at a chunk boundary rather than
//! mid-write.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{InstallError, Result};

/// Shared flag that requests an in-flight install to stop.
///
/// Clones observe the same flag; any clone may call [`CancelToken::cancel`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Returns [`InstallError::Cancelled`] once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(InstallError::Cancelled);
        }
        Ok(())
    }

    /// Cancel this token on the first Ctrl-C; a second one exits with 130.
    ///
    /// Only one handler can be registered per process.
    pub fn cancel_on_interrupt(&self) -> std::result::Result<(), ctrlc::Error> {
        let token = self.clone();
        ctrlc::set_handler(move || on_interrupt(&token))
    }
}

fn on_interrupt(token: &CancelToken) {
    if token.is_cancelled() {
        std::process::exit(130);
    }
    token.cancel();
}
