//! The unit of work a polling session invokes once per cycle.

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`PollTask::run`].
pub type TaskFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'static>>;

/// Deferred operation producing one poll result.
///
/// The engine never assumes synchronous completion: the returned future is
/// driven on the engine's runtime and may itself hand work to other threads
/// (the HTTP task uses `spawn_blocking`).
pub trait PollTask: Send + Sync + 'static {
    type Output: Send + 'static;
    type Error: Send + 'static;

    /// Start one invocation.
    fn run(&self) -> TaskFuture<Self::Output, Self::Error>;

    /// Synchronous sanity check performed by `start` (e.g. empty URL).
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl<F, Fut, T, E> PollTask for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    type Output = T;
    type Error = E;

    fn run(&self) -> TaskFuture<T, E> {
        Box::pin(self())
    }
}
