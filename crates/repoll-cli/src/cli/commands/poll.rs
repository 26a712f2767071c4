//! `repoll poll <url>` – poll until a condition holds, a limit is hit, or Ctrl-C.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{bail, Result};
use repoll_core::config::{HttpSettings, PollSettings, RepollConfig};
use repoll_core::{HttpError, HttpMethod, HttpRequest, HttpTask, PollConfig, PollingEngine};
use serde_json::Value;

use crate::cli::PollArgs;

/// `--until POINTER=VALUE`: stop once `value.pointer(POINTER) == VALUE`.
#[derive(Debug, Clone, PartialEq)]
pub struct UntilCondition {
    pub pointer: String,
    /// Parsed as JSON when possible, otherwise kept as a string.
    pub expected: Value,
}

impl UntilCondition {
    pub fn matches(&self, value: &Value) -> bool {
        value.pointer(&self.pointer) == Some(&self.expected)
    }
}

pub fn parse_until(s: &str) -> Result<UntilCondition, String> {
    let (pointer, expected) = s
        .split_once('=')
        .ok_or_else(|| format!("expected POINTER=VALUE, got {:?}", s))?;
    if !pointer.is_empty() && !pointer.starts_with('/') {
        return Err(format!("JSON pointer must start with '/': {:?}", pointer));
    }
    let expected =
        serde_json::from_str(expected).unwrap_or_else(|_| Value::String(expected.to_string()));
    Ok(UntilCondition {
        pointer: pointer.to_string(),
        expected,
    })
}

pub fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected 'Name: value', got {:?}", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in {:?}", s));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Request from config defaults with CLI overrides applied.
pub(crate) fn build_request(http: &HttpSettings, args: &PollArgs) -> HttpRequest {
    let mut request = HttpRequest::get(args.url.clone());
    request.method = args.method.unwrap_or(http.method);
    request.connect_timeout = Duration::from_secs(http.connect_timeout_secs);
    request.timeout = Duration::from_secs(http.timeout_secs);
    request.headers = http.headers.clone();
    for (name, value) in &args.headers {
        request.headers.insert(name.clone(), value.clone());
    }
    if args.body.is_some() && request.method == HttpMethod::Get {
        tracing::warn!("--body is ignored for GET requests");
    }
    request.body = args.body.clone();
    request
}

/// Interval, backoff and retry settings with CLI overrides applied.
pub(crate) fn apply_poll_settings(
    poll: &PollSettings,
    args: &PollArgs,
    cfg: PollConfig<Value, HttpError>,
) -> PollConfig<Value, HttpError> {
    let interval = args.interval.map(Duration::from_millis).unwrap_or(poll.interval());
    let max_interval = args
        .max_interval
        .map(Duration::from_millis)
        .or(poll.max_interval());
    let cfg = cfg
        .interval(interval)
        .backoff_factor(args.backoff.unwrap_or(poll.backoff_factor))
        .retries(args.retries.unwrap_or(poll.retry_count));
    match max_interval {
        Some(max) => cfg.max_interval(max),
        None => cfg,
    }
}

/// True when the session should keep going after the `n`th successful response.
pub(crate) fn should_continue(
    value: &Value,
    n: u64,
    until: Option<&UntilCondition>,
    max_cycles: Option<u64>,
) -> bool {
    if until.is_some_and(|u| u.matches(value)) {
        return false;
    }
    !max_cycles.is_some_and(|max| n >= max)
}

pub async fn run_poll(cfg: &RepollConfig, args: PollArgs) -> Result<()> {
    let request = build_request(&cfg.http, &args);
    let until = args.until.clone();
    let max_cycles = args.max_cycles;
    let successes = AtomicU64::new(0);

    let poll = PollConfig::new()
        .task(HttpTask::new(request))
        .on_result(move |value: Value| {
            println!("{}", value);
            let n = successes.fetch_add(1, Ordering::Relaxed) + 1;
            Ok(should_continue(&value, n, until.as_ref(), max_cycles))
        })
        .on_failure(|err: &HttpError| {
            match err {
                HttpError::Status { status, data } => {
                    eprintln!("request failed: HTTP {}: {}", status, data)
                }
                other => eprintln!("request failed: {}", other),
            }
            Ok(())
        });
    let poll = apply_poll_settings(&cfg.poll, &args, poll);

    let engine = PollingEngine::try_current()?;
    let session = engine.start(poll)?;
    tracing::info!(url = %args.url, session = session.id(), "polling started");

    let reason = tokio::select! {
        reason = session.wait_idle() => reason,
        _ = tokio::signal::ctrl_c() => {
            session.stop();
            session.stop_reason()
        }
    };

    match reason {
        Some(reason) if reason.is_failure() => bail!("polling ended: {}", reason),
        Some(reason) => {
            tracing::info!(%reason, "polling finished");
            Ok(())
        }
        None => Ok(()),
    }
}
