//! Polling engine: timer-driven cycles with bounded retry and interval backoff.
//!
//! A session invokes its task one interval after `start`, hands successful
//! values to the result handler (which decides whether to continue), and
//! routes failures through the optional failure handler and the retry budget.
//! The next cycle is only scheduled once the previous task has settled, so a
//! slow backend never accumulates queued requests.

mod config;
mod cycle;
mod error;
mod session;


use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::watch;

pub use config::{PollConfig, DEFAULT_INTERVAL};
pub use error::{CallbackError, StartError, StopReason};
pub use session::{SessionHandle, SessionSnapshot, SessionState, SessionStatus};

use session::Shared;

/// Creates polling sessions on a tokio runtime.
///
/// Sessions are independent; the engine only hands out ids and the runtime handle.
#[derive(Debug)]
pub struct PollingEngine {
    runtime: Handle,
    next_id: AtomicU64,
}

impl PollingEngine {
    /// Engine that spawns its timers on `runtime`. Usable from non-async code.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(1),
        }
    }

    /// Engine bound to the runtime of the calling context.
    pub fn try_current() -> Result<Self, TryCurrentError> {
        Ok(Self::new(Handle::try_current()?))
    }

    /// Validate `config` and start a new session. The first cycle runs after
    /// one base interval; nothing is invoked before this returns.
    pub fn start<T, E>(&self, config: PollConfig<T, E>) -> Result<SessionHandle<T, E>, StartError>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        let settings = config.validate()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(Shared::new(id, settings, self.runtime.clone()));
        cycle::begin(&shared)?;
        Ok(SessionHandle { shared })
    }

    /// Start a stopped session again with its original config.
    pub fn restart<T, E>(&self, handle: &SessionHandle<T, E>) -> Result<(), StartError>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        handle.restart()
    }

    /// Idempotent; see [`SessionHandle::stop`].
    pub fn stop<T, E>(&self, handle: &SessionHandle<T, E>) {
        handle.stop();
    }

    pub fn is_polling<T, E>(&self, handle: &SessionHandle<T, E>) -> bool {
        handle.is_polling()
    }

    pub fn subscribe<T, E>(&self, handle: &SessionHandle<T, E>) -> watch::Receiver<SessionStatus> {
        handle.subscribe()
    }

    pub fn snapshot<T, E>(&self, handle: &SessionHandle<T, E>) -> SessionSnapshot {
        handle.snapshot()
    }
}
