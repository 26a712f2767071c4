//! Per-session polling parameters.

use std::sync::Arc;
use std::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::task::PollTask;

use super::error::{CallbackError, StartError};

/// Default base interval between cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(3000);

pub(crate) type SharedTask<T, E> = Arc<dyn PollTask<Output = T, Error = E>>;
pub(crate) type ResultHandler<T> = Arc<dyn Fn(T) -> Result<bool, CallbackError> + Send + Sync>;
pub(crate) type FailureHandler<E> = Arc<dyn Fn(&E) -> Result<(), CallbackError> + Send + Sync>;

/// Builder for one polling session.
///
/// ```
/// use std::time::Duration;
/// use repoll_core::engine::PollConfig;
///
/// let cfg = PollConfig::new()
///     .task(|| async { Ok::<u32, String>(7) })
///     .interval(Duration::from_secs(1))
///     .backoff_factor(2.0)
///     .retries(3)
///     .on_result(|v| Ok(v < 10));
/// assert_eq!(cfg.max_retries(), 3);
/// ```
pub struct PollConfig<T, E> {
    pub(crate) task: Option<SharedTask<T, E>>,
    pub(crate) interval: Duration,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) max_retries: u32,
    pub(crate) on_result: Option<ResultHandler<T>>,
    pub(crate) on_failure: Option<FailureHandler<E>>,
}

impl<T, E> Default for PollConfig<T, E> {
    fn default() -> Self {
        Self {
            task: None,
            interval: DEFAULT_INTERVAL,
            backoff: BackoffPolicy::default(),
            max_retries: 0,
            on_result: None,
            on_failure: None,
        }
    }
}

impl<T, E> Clone for PollConfig<T, E> {
    fn clone(&self) -> Self {
        Self {
            task: self.task.clone(),
            interval: self.interval,
            backoff: self.backoff,
            max_retries: self.max_retries,
            on_result: self.on_result.clone(),
            on_failure: self.on_failure.clone(),
        }
    }
}

impl<T, E> PollConfig<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task<P>(mut self, task: P) -> Self
    where
        P: PollTask<Output = T, Error = E>,
    {
        self.task = Some(Arc::new(task));
        self
    }

    /// Base interval; also the delay before the very first cycle.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Growth factor applied after each continuing success (1.0 = constant).
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff.factor = factor;
        self
    }

    pub fn max_interval(mut self, max: Duration) -> Self {
        self.backoff.max_interval = Some(max);
        self
    }

    /// Number of retries after a failed cycle (0 = stop on first failure).
    pub fn retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Decides after each successful cycle whether to keep polling.
    /// Returning `Err` terminates the session as a fatal condition.
    pub fn on_result<F>(mut self, f: F) -> Self
    where
        F: Fn(T) -> Result<bool, CallbackError> + Send + Sync + 'static,
    {
        self.on_result = Some(Arc::new(f));
        self
    }

    /// Called on every failed cycle before the retry decision. Errors are logged and ignored.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&E) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(f));
        self
    }
}

impl<T, E> PollConfig<T, E> {
    pub fn base_interval(&self) -> Duration {
        self.interval
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl<T, E> PollConfig<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Check everything `start` requires and freeze the config.
    pub(crate) fn validate(self) -> Result<Settings<T, E>, StartError> {
        let task = self
            .task
            .ok_or_else(|| StartError::InvalidConfig("no task provided to poll".into()))?;
        task.validate().map_err(StartError::InvalidConfig)?;
        let on_result = self
            .on_result
            .ok_or_else(|| StartError::InvalidConfig("no result handler provided".into()))?;
        if self.interval.is_zero() {
            return Err(StartError::InvalidConfig(
                "interval must be a positive duration".into(),
            ));
        }
        let factor = self.backoff.factor;
        if !factor.is_finite() || factor < 1.0 {
            return Err(StartError::InvalidConfig(format!(
                "backoff factor must be a finite number >= 1, got {}",
                factor
            )));
        }
        if let Some(max) = self.backoff.max_interval {
            if max < self.interval {
                return Err(StartError::InvalidConfig(format!(
                    "max interval {:?} is below base interval {:?}",
                    max, self.interval
                )));
            }
        }
        Ok(Settings {
            task,
            interval: self.interval,
            backoff: self.backoff,
            max_retries: self.max_retries,
            on_result,
            on_failure: self.on_failure,
        })
    }
}

/// Validated, immutable session parameters.
pub(crate) struct Settings<T, E> {
    pub(crate) task: SharedTask<T, E>,
    pub(crate) interval: Duration,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) max_retries: u32,
    pub(crate) on_result: ResultHandler<T>,
    pub(crate) on_failure: Option<FailureHandler<E>>,
}
