//! Session state and the owner-facing handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use super::config::Settings;
use super::cycle;
use super::error::{StartError, StopReason};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Polling,
    /// Teardown in progress. Only ever held under the session lock, so
    /// `state`, `snapshot` and the status channel report `Idle` or `Polling`.
    Stopping,
}

/// Value published on the status channel whenever polling starts or stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub polling: bool,
    /// Cause of the last termination (None while polling or before the first run).
    pub reason: Option<StopReason>,
}

/// Point-in-time view of a session, for instrumentation and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub current_interval: Duration,
    pub remaining_retries: u32,
    pub generation: u64,
    pub timer_pending: bool,
    pub in_flight: bool,
    /// Task invocations in the current (or last) run.
    pub cycles: u64,
    pub reason: Option<StopReason>,
}

pub(crate) struct Inner {
    pub(crate) state: SessionState,
    pub(crate) current_interval: Duration,
    pub(crate) remaining_retries: u32,
    /// The single outstanding timer, if any.
    pub(crate) timer: Option<AbortHandle>,
    pub(crate) generation: u64,
    pub(crate) in_flight: bool,
    pub(crate) cycles: u64,
    pub(crate) reason: Option<StopReason>,
}

pub(crate) struct Shared<T, E> {
    pub(crate) id: u64,
    pub(crate) settings: Settings<T, E>,
    pub(crate) runtime: Handle,
    inner: Mutex<Inner>,
    pub(crate) status: watch::Sender<SessionStatus>,
}

impl<T, E> Shared<T, E> {
    pub(crate) fn new(id: u64, settings: Settings<T, E>, runtime: Handle) -> Self {
        let (status, _) = watch::channel(SessionStatus {
            polling: false,
            reason: None,
        });
        let inner = Inner {
            state: SessionState::Idle,
            current_interval: settings.interval,
            remaining_retries: settings.max_retries,
            timer: None,
            generation: 0,
            in_flight: false,
            cycles: 0,
            reason: None,
        };
        Self {
            id,
            settings,
            runtime,
            inner: Mutex::new(inner),
            status,
        }
    }

    /// Callbacks never run under this lock, so poisoning only follows a bug
    /// in the engine itself; keep going with the inner value.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, E> Drop for Shared<T, E> {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
    }
}

/// Owner's handle to one polling session.
///
/// Cheap to clone. Dropping every clone tears the session down: a pending
/// timer is cancelled and an in-flight completion is discarded.
pub struct SessionHandle<T, E> {
    pub(crate) shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for SessionHandle<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> std::fmt::Debug for SessionHandle<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.shared.id)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl<T, E> SessionHandle<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Start this (idle) session again with its original config.
    pub fn restart(&self) -> Result<(), StartError> {
        cycle::begin(&self.shared)
    }
}

impl<T, E> SessionHandle<T, E> {
    /// Idempotent. Cancels the pending timer and invalidates any in-flight cycle.
    pub fn stop(&self) {
        let mut inner = self.shared.lock();
        cycle::stop_locked(&self.shared, &mut inner, StopReason::Stopped);
    }

    pub fn is_polling(&self) -> bool {
        self.shared.lock().state == SessionState::Polling
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Why the session last went idle.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.shared.lock().reason.clone()
    }

    /// Observe `polling` transitions; the receiver starts at the current status.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.shared.status.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.shared.lock();
        SessionSnapshot {
            state: inner.state,
            current_interval: inner.current_interval,
            remaining_retries: inner.remaining_retries,
            generation: inner.generation,
            timer_pending: inner.timer.is_some(),
            in_flight: inner.in_flight,
            cycles: inner.cycles,
            reason: inner.reason.clone(),
        }
    }

    /// Resolves once the session is idle. Returns the stop reason.
    pub async fn wait_idle(&self) -> Option<StopReason> {
        let mut rx = self.subscribe();
        // The sender lives inside `shared`, which `self` keeps alive.
        let _ = rx.wait_for(|s| !s.polling).await;
        self.stop_reason()
    }
}
