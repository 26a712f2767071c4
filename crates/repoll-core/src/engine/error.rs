//! Start errors and session termination causes.

use std::fmt;

/// Error type a result handler may return to abort polling.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Returned by `start`/`restart`. Never leaves the session mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    /// Malformed start parameters (missing task, zero interval, bad factor, ...).
    #[error("invalid poll config: {0}")]
    InvalidConfig(String),
    /// The session is already running; stop it first.
    #[error("session is already polling")]
    AlreadyPolling,
}

/// Why a session went idle. Exposed for observability only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `stop` was called by the owner.
    Stopped,
    /// The result handler returned `false`.
    Declined,
    /// The task failed and retries are disabled.
    TaskFailed,
    /// The task failed with no retries left.
    RetriesExhausted,
    /// The result handler returned an error or panicked.
    CallbackFailed(String),
    /// The task future panicked.
    TaskPanicked(String),
}

impl StopReason {
    /// True for terminations caused by a failure rather than a normal stop signal.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StopReason::TaskFailed
                | StopReason::RetriesExhausted
                | StopReason::CallbackFailed(_)
                | StopReason::TaskPanicked(_)
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Stopped => write!(f, "stopped"),
            StopReason::Declined => write!(f, "result handler declined to continue"),
            StopReason::TaskFailed => write!(f, "task failed"),
            StopReason::RetriesExhausted => write!(f, "retries exhausted"),
            StopReason::CallbackFailed(e) => write!(f, "result handler failed: {}", e),
            StopReason::TaskPanicked(e) => write!(f, "task panicked: {}", e),
        }
    }
}
