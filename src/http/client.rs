//! HTTP client for test execution
//!
//! Sends a test's prepared request with reqwest and captures status, headers,
//! body and timing into a [`TestResult`]. Transport failures are recorded on
//! the result; only an unusable test definition is an error.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, Method, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RunnerConfig;
use crate::error::{ExecutionError, RunError};
use crate::executor::HttpExecutor;
use crate::models::{PreparedRequest, ResponseHeaders, Test, TestResult};
use crate::utils::Timer;

/// Redirects followed when neither the test nor the client sets a limit
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// reqwest-backed [`HttpExecutor`]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
    accept_invalid_certs: bool,
    max_redirects: Option<i32>,
    /// Clients for per-test redirect limits that differ from the default
    redirect_clients: Mutex<HashMap<i32, Client>>,
}

impl HttpClient {
    /// Client with default settings
    pub fn new() -> Result<Self, RunError> {
        Self::from_config(&RunnerConfig::default())
    }

    pub fn from_config(config: &RunnerConfig) -> Result<Self, RunError> {
        let timeout = config.timeout();
        let client = build_client(timeout, config.accept_invalid_certs, config.max_redirects)?;

        Ok(Self {
            client,
            timeout,
            accept_invalid_certs: config.accept_invalid_certs,
            max_redirects: config.max_redirects,
            redirect_clients: Mutex::new(HashMap::new()),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Client honouring the test's redirect limit
    fn client_for(&self, test: &Test) -> Result<Client, RunError> {
        let limit = match test.max_redirects {
            Some(limit) if Some(limit) != self.max_redirects => limit,
            _ => return Ok(self.client.clone()),
        };

        let mut clients = self
            .redirect_clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&limit) {
            return Ok(client.clone());
        }

        let client = build_client(self.timeout, self.accept_invalid_certs, Some(limit))?;
        clients.insert(limit, client.clone());
        Ok(client)
    }

    async fn send(
        &self,
        client: &Client,
        method: Method,
        request: &PreparedRequest,
        timeout: Duration,
    ) -> Result<Response, ExecutionError> {
        let mut builder = client.request(method, &request.url).timeout(timeout);

        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        builder
            .send()
            .await
            .map_err(|e| classify_error(&e, timeout))
    }
}

#[async_trait]
impl HttpExecutor for HttpClient {
    async fn execute(
        &self,
        cancel: &CancellationToken,
        test: &Test,
    ) -> Result<TestResult, RunError> {
        let request = test
            .request
            .as_ref()
            .ok_or_else(|| RunError::MissingRequest(test.name.clone()))?;
        let method = parse_method(&request.method).ok_or_else(|| RunError::InvalidMethod {
            test: test.name.clone(),
            method: request.method.clone(),
        })?;
        let client = self.client_for(test)?;
        let timeout = test.timeout.unwrap_or(self.timeout);

        debug!("Sending {} request to {}", method, request.url);
        let timer = Timer::start(format!("{} {}", method, request.url));

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExecutionError::Cancelled),
            response = self.send(&client, method, request, timeout) => response,
        };
        // Time to response headers; body transfer is not counted.
        let response_time = timer.stop();

        let outcome = match sent {
            Ok(response) => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ExecutionError::Cancelled),
                read = read_response(response) => read,
            },
            Err(err) => Err(err),
        };

        let mut result = match outcome {
            Ok((status, headers, body)) => TestResult::response(test.clone(), status, body)
                .with_headers(headers),
            Err(ExecutionError::Body(reason)) => {
                warn!("{}: failed to read response body: {}", test.name, reason);
                TestResult::failed(test.clone(), ExecutionError::Body(reason))
            }
            Err(err) => {
                debug!("{}: {}", test.name, err);
                TestResult::failed(test.clone(), err)
            }
        };
        result.response_time = response_time;
        result.prepared_request = Some(request.clone());

        Ok(result)
    }
}

async fn read_response(
    response: Response,
) -> Result<(u16, ResponseHeaders, String), ExecutionError> {
    let status = response.status();

    let mut headers = ResponseHeaders::new();
    for (name, value) in response.headers() {
        let value = match value.to_str() {
            Ok(v) => v.to_string(),
            Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
        };
        headers.append(name.as_str(), value);
    }

    let body = response
        .text()
        .await
        .map_err(|e| ExecutionError::Body(e.to_string()))?;

    debug!(
        "Response: {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    );

    Ok((status.as_u16(), headers, body))
}

/// Empty defaults to GET; names are case-insensitive
fn parse_method(method: &str) -> Option<Method> {
    let method = method.trim();
    if method.is_empty() {
        return Some(Method::GET);
    }
    Method::from_bytes(method.to_ascii_uppercase().as_bytes()).ok()
}

fn classify_error(err: &reqwest::Error, timeout: Duration) -> ExecutionError {
    if err.is_timeout() {
        ExecutionError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    } else if err.is_connect() {
        ExecutionError::Connect(err.to_string())
    } else {
        ExecutionError::Request(err.to_string())
    }
}

/// `None` follows the default limit, `0` disables redirects and a negative
/// limit follows redirects without bound.
pub fn redirect_policy(max_redirects: Option<i32>) -> Policy {
    match max_redirects {
        None => Policy::limited(DEFAULT_MAX_REDIRECTS),
        Some(0) => Policy::none(),
        Some(n) if n < 0 => Policy::custom(|attempt| attempt.follow()),
        Some(n) => Policy::limited(n.unsigned_abs() as usize),
    }
}

fn build_client(
    timeout: Duration,
    accept_invalid_certs: bool,
    max_redirects: Option<i32>,
) -> Result<Client, RunError> {
    Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .redirect(redirect_policy(max_redirects))
        .build()
        .map_err(|e| RunError::Client(e.to_string()))
}
