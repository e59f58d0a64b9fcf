//! Single request execution.
//!
//! The HTTP client itself sits behind [`Transport`]; the executor only classifies what comes back
//! and feeds the shared 5xx metric.
use crate::metric::{Check, Checks, RateMetric};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: vec![],
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach `body` as JSON along with its `Content-Type`.
    pub fn json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, TransportError> {
        let mut request = self.header("Content-Type", "application/json");
        request.body = Some(serde_json::to_vec(body)?);
        Ok(request)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The opaque request/response primitive the harness drives.
///
/// Implement [`Transport`]; the `Send` variant is generated from this definition.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}

impl<C: Transport + Sync> Transport for Arc<C> {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        Transport::send(self.as_ref(), request).await
    }
}

/// What a single call produced.
#[derive(Debug)]
pub enum Outcome {
    Response(Response),
    TransportFailure(TransportError),
}

impl Outcome {
    /// Status code, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Response(res) => Some(res.status),
            Outcome::TransportFailure(_) => None,
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|status| status >= 500)
    }

    pub fn has_status(&self, status: u16) -> bool {
        self.status() == Some(status)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Response(res) => write!(f, "{} {}", res.status, res.body),
            Outcome::TransportFailure(err) => write!(f, "{err}"),
        }
    }
}

/// Issues requests and records `status >= 500` for every one of them.
///
/// Non-2xx statuses are not errors here. Callers compare the status with what they expected and
/// report through a [`Check`].
pub struct RequestExecutor<C> {
    transport: Arc<C>,
    metric: Arc<RateMetric>,
    checks: Arc<Checks>,
}

impl<C> Clone for RequestExecutor<C> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            metric: self.metric.clone(),
            checks: self.checks.clone(),
        }
    }
}

impl<C> RequestExecutor<C>
where
    C: Transport + Sync + 'static,
{
    pub fn new(transport: C, metric: RateMetric) -> Self {
        Self {
            transport: Arc::new(transport),
            metric: Arc::new(metric),
            checks: Arc::new(Checks::new()),
        }
    }

    pub fn metric(&self) -> &RateMetric {
        &self.metric
    }

    pub fn checks(&self) -> &Checks {
        &self.checks
    }

    /// Shorthand for registering a check with this executor's registry.
    pub fn check(&self, name: &'static str) -> Arc<Check> {
        self.checks.register(name)
    }

    pub async fn execute(&self, request: Request) -> Outcome {
        let method = request.method;
        trace!("{method} {}", request.url);

        let outcome = match Transport::send(&*self.transport, request).await {
            Ok(res) => Outcome::Response(res),
            Err(err) => {
                debug!("Transport failure: {err}");
                Outcome::TransportFailure(err)
            }
        };

        self.metric.record(outcome.is_server_error());
        outcome
    }

    /// `POST` a JSON body.
    pub async fn post_json<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Outcome {
        match Request::new(Method::Post, url).json(body) {
            Ok(request) => self.execute(request).await,
            Err(err) => {
                error!("Unable to encode request for {url}: {err}");
                self.metric.record(false);
                Outcome::TransportFailure(err)
            }
        }
    }
}
