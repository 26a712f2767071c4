//! Default poll task: one HTTP request per cycle.
//!
//! Uses the curl crate (libcurl) on a blocking thread. The response body is
//! decoded as JSON when possible so result and failure handlers get a
//! structured value either way.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::{PollTask, TaskFuture};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
        }
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("get") {
            Ok(HttpMethod::Get)
        } else if s.eq_ignore_ascii_case("post") {
            Ok(HttpMethod::Post)
        } else {
            Err(format!("unsupported HTTP method: {}", s))
        }
    }
}

/// What to send on every cycle.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    /// Request body, sent with POST only.
    pub body: Option<String>,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: BTreeMap::new(),
            body: None,
            connect_timeout: Duration::from_secs(15),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            body: Some(body.into()),
            ..Self::get(url)
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Error returned by one HTTP cycle.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Curl reported an error (timeout, connection, DNS, ...).
    #[error("request failed: {0}")]
    Transport(#[from] curl::Error),
    /// The server answered with a non-2xx status; `data` is the decoded body.
    #[error("HTTP {status}")]
    Status { status: u32, data: Value },
    /// The blocking request thread did not complete.
    #[error("request thread failed: {0}")]
    Join(String),
}

impl HttpError {
    pub fn status(&self) -> Option<u32> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// [`PollTask`] that performs `request` once per cycle.
#[derive(Debug, Clone)]
pub struct HttpTask {
    request: Arc<HttpRequest>,
}

impl HttpTask {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request: Arc::new(request),
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }
}

impl PollTask for HttpTask {
    type Output = Value;
    type Error = HttpError;

    fn run(&self) -> TaskFuture<Value, HttpError> {
        let request = Arc::clone(&self.request);
        Box::pin(async move {
            tokio::task::spawn_blocking(move || perform(&request))
                .await
                .map_err(|e| HttpError::Join(e.to_string()))?
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.request.url.trim().is_empty() {
            return Err("no url provided to poll".to_string());
        }
        Ok(())
    }
}

/// Performs the request and decodes the response.
///
/// Runs in the current thread; call from `spawn_blocking` if used from async code.
pub(crate) fn perform(request: &HttpRequest) -> Result<Value, HttpError> {
    let mut body = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(&request.url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(request.connect_timeout)?;
    easy.timeout(request.timeout)?;
    match request.method {
        HttpMethod::Get => easy.get(true)?,
        HttpMethod::Post => {
            easy.post(true)?;
            easy.post_fields_copy(request.body.as_deref().unwrap_or("").as_bytes())?;
        }
    }

    // Build curl list for custom headers (e.g. "Name: value").
    if !request.headers.is_empty() {
        let mut list = curl::easy::List::new();
        for (k, v) in &request.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        easy.http_headers(list)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let status = easy.response_code()?;
    let data = decode_body(&body);
    tracing::debug!(
        url = %request.url,
        method = %request.method,
        status,
        bytes = body.len(),
        "poll request finished"
    );
    if (200..300).contains(&status) {
        Ok(data)
    } else {
        Err(HttpError::Status { status, data })
    }
}

/// JSON if the body parses, `null` if it is empty, otherwise the text as a JSON string.
pub(crate) fn decode_body(body: &[u8]) -> Value {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
