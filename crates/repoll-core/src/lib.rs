//! repoll core: a timer-driven polling engine with bounded retry and backoff.
//!
//! The engine invokes an injected [`task::PollTask`] once per cycle, lets a
//! result handler decide whether to keep going, and retries failures up to a
//! configured budget. [`http::HttpTask`] is the default task.

pub mod config;
pub mod logging;

pub mod backoff;
pub mod engine;
pub mod http;
pub mod task;

pub use backoff::BackoffPolicy;
pub use engine::{
    PollConfig, PollingEngine, SessionHandle, SessionSnapshot, SessionState, SessionStatus,
    StartError, StopReason,
};
pub use http::{HttpError, HttpMethod, HttpRequest, HttpTask};
pub use task::{PollTask, TaskFuture};
