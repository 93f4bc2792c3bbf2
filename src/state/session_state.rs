//! Lifecycle of the renderable browser session
//!
//! ```text
//! Stopped ──launch──▶ Healthy ──fetch fails──▶ NeedsRestart
//!    ▲                   ▲                          │
//!    │                   └──── launch ok ◀── Restarting ◀── next fetch begins
//!    └── release (batch handed off)
//! ```
//!
//! Restarts are lazy: a failed fetch only marks the session, and the
//! relaunch happens just before the next fetch.
use std::fmt;

/// State of the fetch session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Not launched yet, or released while a batch is handed off
    Stopped,

    /// Ready to fetch
    Healthy,

    /// A fetch failed; relaunch before the next fetch
    NeedsRestart,

    /// A relaunch is in progress
    Restarting,
}

impl SessionState {
    /// Returns true if the session must be (re)launched before fetching
    pub fn needs_launch(&self) -> bool {
        !matches!(self, Self::Healthy)
    }

    /// Returns true if moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Stopped, Restarting)
                | (Stopped, Healthy)
                | (Healthy, NeedsRestart)
                | (Healthy, Stopped)
                | (NeedsRestart, Restarting)
                | (NeedsRestart, Stopped)
                | (Restarting, Healthy)
                | (Restarting, NeedsRestart)
        )
    }

    /// Converts to a short label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Healthy => "healthy",
            Self::NeedsRestart => "needs_restart",
            Self::Restarting => "restarting",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
