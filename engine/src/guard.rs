//! Session lifecycle guard.
//!
//! While a logout is in progress, no scheduled or in-flight persistence may
//! execute: the bulk deletions inside the logout path would otherwise
//! schedule a push that re-persists already-cleared data. The flag
//! auto-clears after a fixed cooldown; nothing cancels the cooldown early.

use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct GuardState {
    suppressed: bool,
    /// Incremented on every explicit flag change so a stale cooldown expiry
    /// cannot clear a suppression window that was re-armed after it started.
    epoch: u64,
}

/// Process-wide suppression flag for the push path.
#[derive(Debug, Clone, Default)]
pub struct LogoutGuard {
    state: Arc<Mutex<GuardState>>,
}

impl LogoutGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether persistence is currently suppressed.
    pub fn is_suppressed(&self) -> bool {
        self.state.lock().unwrap().suppressed
    }

    /// Explicitly set or clear the flag.
    pub fn set(&self, suppressed: bool) {
        let mut state = self.state.lock().unwrap();
        state.suppressed = suppressed;
        state.epoch += 1;
    }

    /// Raise the flag and schedule it to auto-clear after `cooldown`.
    ///
    /// The cooldown itself is fire-and-forget; if the flag is raised again
    /// while it is pending, the expiry becomes a no-op.
    pub fn begin_cooldown(&self, cooldown: Duration) {
        let armed_epoch = {
            let mut state = self.state.lock().unwrap();
            state.suppressed = true;
            state.epoch += 1;
            state.epoch
        };

        let guard = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            let mut state = guard.state.lock().unwrap();
            if state.epoch == armed_epoch {
                state.suppressed = false;
                tracing::debug!("logout cooldown elapsed, resuming persistence");
            }
        });
    }
}
