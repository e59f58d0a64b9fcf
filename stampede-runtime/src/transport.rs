//! HTTP transport backed by `reqwest`.
use stampede::executor::{Method, Request, Response, Transport, TransportError};
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// A pooled HTTP client. One instance is shared by every iteration of a run.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("stampede/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let res = builder.send().await.map_err(classify)?;
        let status = res.status().as_u16();
        // The status is already known; a body cut short does not change the outcome.
        let body = match res.text().await {
            Ok(body) => body,
            Err(err) => {
                debug!("Unable to read response body: {err}");
                String::new()
            }
        };
        Ok(Response::new(status, body))
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Request(err.to_string())
    }
}
