//! Timer scheduling and the per-cycle state machine.
//!
//! Every timer and every in-flight task captures the session generation at
//! scheduling time. Any effect (callback, state change, new timer) is applied
//! only while that generation is still current; `stop` bumps it, which turns
//! everything already dispatched into a no-op.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::error::{StartError, StopReason};
use super::session::{Inner, SessionState, SessionStatus, Shared};

/// Transition an idle session to `Polling` and arm the first timer.
pub(crate) fn begin<T, E>(shared: &Arc<Shared<T, E>>) -> Result<(), StartError>
where
    T: Send + 'static,
    E: Send + 'static,
{
    let mut inner = shared.lock();
    if inner.state != SessionState::Idle {
        return Err(StartError::AlreadyPolling);
    }
    inner.state = SessionState::Polling;
    inner.remaining_retries = shared.settings.max_retries;
    inner.current_interval = shared.settings.interval;
    inner.in_flight = false;
    inner.cycles = 0;
    inner.reason = None;
    let delay = inner.current_interval;
    schedule(shared, &mut inner, delay);
    shared.status.send_replace(SessionStatus {
        polling: true,
        reason: None,
    });
    tracing::info!(
        session = shared.id,
        generation = inner.generation,
        interval_ms = delay.as_millis() as u64,
        max_retries = shared.settings.max_retries,
        "polling started"
    );
    Ok(())
}

/// Stop under the session lock. No-op when already idle.
pub(crate) fn stop_locked<T, E>(shared: &Shared<T, E>, inner: &mut Inner, reason: StopReason) {
    if inner.state == SessionState::Idle {
        return;
    }
    inner.state = SessionState::Stopping;
    if let Some(timer) = inner.timer.take() {
        timer.abort();
    }
    inner.generation += 1;
    inner.in_flight = false;
    inner.state = SessionState::Idle;
    inner.reason = Some(reason.clone());
    if reason.is_failure() {
        tracing::warn!(session = shared.id, cycles = inner.cycles, %reason, "polling stopped");
    } else {
        tracing::info!(session = shared.id, cycles = inner.cycles, %reason, "polling stopped");
    }
    shared.status.send_replace(SessionStatus {
        polling: false,
        reason: Some(reason),
    });
}

/// Arm the session's single timer to run one cycle after `delay`.
fn schedule<T, E>(shared: &Arc<Shared<T, E>>, inner: &mut Inner, delay: Duration)
where
    T: Send + 'static,
    E: Send + 'static,
{
    if let Some(stale) = inner.timer.take() {
        // Only one timer may be outstanding; a leftover here means a logic error upstream.
        tracing::error!(session = shared.id, "replacing a pending timer");
        stale.abort();
    }
    let generation = inner.generation;
    let weak = Arc::downgrade(shared);
    let timer = shared.runtime.spawn(async move {
        tokio::time::sleep(delay).await;
        run_cycle(weak, generation).await;
    });
    inner.timer = Some(timer.abort_handle());
    tracing::debug!(
        session = shared.id,
        generation,
        delay_ms = delay.as_millis() as u64,
        "next cycle scheduled"
    );
}

/// Body of one fired timer: invoke the task and apply its outcome.
async fn run_cycle<T, E>(weak: Weak<Shared<T, E>>, generation: u64)
where
    T: Send + 'static,
    E: Send + 'static,
{
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let (task, runtime, id) = {
        let mut inner = shared.lock();
        if inner.generation != generation || inner.state != SessionState::Polling {
            return;
        }
        // The timer has fired; from here on the cycle is a task in flight, which
        // `stop` must not abort.
        inner.timer = None;
        inner.in_flight = true;
        inner.cycles += 1;
        tracing::debug!(session = shared.id, generation, cycle = inner.cycles, "invoking task");
        (
            Arc::clone(&shared.settings.task),
            shared.runtime.clone(),
            shared.id,
        )
    };
    // Do not keep the session alive while the task runs.
    drop(shared);

    // `run` itself executes inside the spawned task so a panic in it, synchronous
    // or not, surfaces as a join error.
    let joined = runtime.spawn(async move { task.run().await }).await;

    let Some(shared) = weak.upgrade() else {
        tracing::debug!(session = id, "session dropped while task in flight");
        return;
    };
    match joined {
        Ok(Ok(value)) => on_success(&shared, generation, value),
        Ok(Err(err)) => on_failure(&shared, generation, err),
        Err(join_err) => {
            let mut inner = shared.lock();
            if inner.generation == generation {
                let msg = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    "task cancelled".to_string()
                };
                stop_locked(&shared, &mut inner, StopReason::TaskPanicked(msg));
            }
        }
    }
}

fn is_current<T, E>(shared: &Shared<T, E>, generation: u64) -> bool {
    let inner = shared.lock();
    inner.generation == generation && inner.state == SessionState::Polling
}

fn on_success<T, E>(shared: &Arc<Shared<T, E>>, generation: u64, value: T)
where
    T: Send + 'static,
    E: Send + 'static,
{
    if !is_current(shared, generation) {
        tracing::debug!(session = shared.id, generation, "discarding stale result");
        return;
    }
    let handler = Arc::clone(&shared.settings.on_result);
    let decision = panic::catch_unwind(AssertUnwindSafe(|| handler(value)));

    // The handler may have called `stop`; re-check before deciding.
    let mut inner = shared.lock();
    if inner.generation != generation || inner.state != SessionState::Polling {
        return;
    }
    inner.in_flight = false;
    match decision {
        Ok(Ok(true)) => {
            inner.remaining_retries = shared.settings.max_retries;
            inner.current_interval = shared.settings.backoff.next_interval(inner.current_interval);
            let delay = inner.current_interval;
            schedule(shared, &mut inner, delay);
        }
        Ok(Ok(false)) => stop_locked(shared, &mut inner, StopReason::Declined),
        Ok(Err(e)) => {
            tracing::error!(session = shared.id, error = %e, "result handler failed");
            stop_locked(shared, &mut inner, StopReason::CallbackFailed(e.to_string()));
        }
        Err(payload) => {
            let msg = panic_message(payload);
            tracing::error!(session = shared.id, panic = %msg, "result handler panicked");
            stop_locked(shared, &mut inner, StopReason::CallbackFailed(msg));
        }
    }
}

fn on_failure<T, E>(shared: &Arc<Shared<T, E>>, generation: u64, err: E)
where
    T: Send + 'static,
    E: Send + 'static,
{
    if !is_current(shared, generation) {
        tracing::debug!(session = shared.id, generation, "discarding stale failure");
        return;
    }
    if let Some(handler) = shared.settings.on_failure.clone() {
        match panic::catch_unwind(AssertUnwindSafe(|| handler(&err))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(session = shared.id, error = %e, "failure handler returned an error")
            }
            Err(payload) => tracing::warn!(
                session = shared.id,
                panic = %panic_message(payload),
                "failure handler panicked"
            ),
        }
    }

    let mut inner = shared.lock();
    if inner.generation != generation || inner.state != SessionState::Polling {
        return;
    }
    inner.in_flight = false;
    let max = shared.settings.max_retries;
    if max > 0 && inner.remaining_retries > 0 {
        inner.remaining_retries -= 1;
        tracing::debug!(
            session = shared.id,
            remaining = inner.remaining_retries,
            "task failed, retrying"
        );
        // Retries keep the current interval; only continuing successes grow it.
        let delay = inner.current_interval;
        schedule(shared, &mut inner, delay);
    } else {
        let reason = if max == 0 {
            StopReason::TaskFailed
        } else {
            StopReason::RetriesExhausted
        };
        stop_locked(shared, &mut inner, reason);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
