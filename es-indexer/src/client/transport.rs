//! HTTP transport used by the search client
//!
//! [`UreqTransport`] talks to the cluster. [`RetryTransport`] and
//! [`MetricsTransport`] wrap any other transport: the first retries throttled
//! requests with exponential backoff, the second records every attempt in
//! [`StatusMetrics`].

use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, warn};

use crate::config::ElasticConfig;
use crate::core::error::ElasticError;
use crate::metrics::{ArgsAddIndexingData, StatusMetrics};

const JSON_CONTENT_TYPE: &str = "application/json";
const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// A request against the cluster, relative to the base url
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub content_type: &'static str,
    /// Metrics topic, usually the target index
    pub topic: String,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            content_type: JSON_CONTENT_TYPE,
            topic: String::new(),
        }
    }

    pub fn json(method: Method, path: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            body: Some(body),
            ..Self::new(method, path)
        }
    }

    pub fn ndjson(method: Method, path: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            body: Some(body),
            content_type: NDJSON_CONTENT_TYPE,
            ..Self::new(method, path)
        }
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn body_len(&self) -> usize {
        self.body.as_ref().map(Vec::len).unwrap_or_default()
    }
}

/// Raw response; non 2xx statuses are not errors at this level
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the cluster
pub trait Transport: Send + Sync {
    fn send(&self, request: &Request) -> Result<Response, ElasticError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &Request) -> Result<Response, ElasticError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &Request) -> Result<Response, ElasticError> {
        (**self).send(request)
    }
}

/// Blocking transport on top of a `ureq` agent
pub struct UreqTransport {
    base_url: String,
    agent: ureq::Agent,
    authorization: Option<String>,
    request_timeout: Duration,
}

impl UreqTransport {
    pub fn new(config: &ElasticConfig) -> Self {
        let request_timeout = Duration::from_secs(config.request_timeout_secs);
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(config.connect_timeout_secs))
            .timeout(request_timeout)
            .build();

        let authorization = if config.username.is_empty() {
            None
        } else {
            let credentials = format!("{}:{}", config.username, config.password);
            Some(format!("Basic {}", STANDARD.encode(credentials)))
        };

        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            agent,
            authorization,
            request_timeout,
        }
    }

    fn read_response(response: ureq::Response) -> Result<Response, ElasticError> {
        let status = response.status();
        let mut body = Vec::new();
        response.into_reader().read_to_end(&mut body)?;

        Ok(Response { status, body })
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &Request) -> Result<Response, ElasticError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut call = self.agent.request(request.method.as_str(), &url);
        for (key, value) in &request.query {
            call = call.query(key, value);
        }
        if let Some(authorization) = &self.authorization {
            call = call.set("Authorization", authorization);
        }

        debug!(
            target: "es_indexer::transport",
            "{} {} ({} bytes)",
            request.method.as_str(),
            request.path,
            request.body_len()
        );

        let result = match &request.body {
            Some(body) => call.set("Content-Type", request.content_type).send_bytes(body),
            None => call.call(),
        };

        match result {
            Ok(response) => Self::read_response(response),
            Err(ureq::Error::Status(_, response)) => Self::read_response(response),
            Err(ureq::Error::Transport(transport)) => {
                if transport.kind() == ureq::ErrorKind::Io
                    && transport.to_string().contains("timed out")
                {
                    return Err(ElasticError::Timeout(self.request_timeout));
                }
                Err(ElasticError::Transport(transport.to_string()))
            }
        }
    }
}

/// Retries requests answered with one of the configured statuses
pub struct RetryTransport<T> {
    inner: T,
    max_retries: u32,
    base_delay: Duration,
    retry_statuses: Vec<u16>,
}

impl<T: Transport> RetryTransport<T> {
    pub fn new(inner: T, max_retries: u32, base_delay: Duration, retry_statuses: Vec<u16>) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            retry_statuses,
        }
    }

    /// Delay before retry number `attempt` (zero based): `base * 2^attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(Duration::MAX)
    }
}

impl<T: Transport> Transport for RetryTransport<T> {
    fn send(&self, request: &Request) -> Result<Response, ElasticError> {
        let mut attempt = 0;
        loop {
            let response = self.inner.send(request)?;
            if !self.retry_statuses.contains(&response.status) || attempt >= self.max_retries {
                return Ok(response);
            }

            let delay = self.backoff(attempt);
            warn!(
                target: "es_indexer::transport",
                "{} {} answered {}, retrying in {:?} (attempt {}/{})",
                request.method.as_str(),
                request.path,
                response.status,
                delay,
                attempt + 1,
                self.max_retries
            );
            std::thread::sleep(delay);
            attempt += 1;
        }
    }
}

/// Records every request in the status metrics
pub struct MetricsTransport<T> {
    inner: T,
    metrics: Arc<StatusMetrics>,
}

impl<T: Transport> MetricsTransport<T> {
    pub fn new(inner: T, metrics: Arc<StatusMetrics>) -> Self {
        Self { inner, metrics }
    }
}

impl<T: Transport> Transport for MetricsTransport<T> {
    fn send(&self, request: &Request) -> Result<Response, ElasticError> {
        let started = Instant::now();
        let result = self.inner.send(request);

        let topic = if request.topic.is_empty() {
            request.path.clone()
        } else {
            request.topic.clone()
        };
        self.metrics.add_indexing_data(ArgsAddIndexingData {
            status_code: result.as_ref().map(|response| response.status).unwrap_or_default(),
            got_error: result.is_err(),
            message_len: request.body_len() as u64,
            topic,
            duration: started.elapsed(),
        });

        result
    }
}
