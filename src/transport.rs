//! HTTP transport.

use crate::types::Method;
use std::{collections::BTreeMap, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Connection(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Already serialized JSON.
    Json(String),
    Form(Vec<(String, String)>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one request and waits for its response. Any HTTP status counts as
/// a response; only failures to get one are errors.
pub trait Transport {
    fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport backed by `ureq`.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut call = self
            .agent
            .request(request.method.as_str(), &request.url)
            .timeout(request.timeout);
        for (k, v) in &request.headers {
            call = call.set(k, v);
        }
        let result = match &request.body {
            None => call.call(),
            Some(RequestBody::Json(s)) | Some(RequestBody::Text(s)) => call.send_string(s),
            Some(RequestBody::Form(pairs)) => {
                let pairs: Vec<(&str, &str)> = pairs
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                call.send_form(&pairs)
            }
        };
        let response = match result {
            Ok(r) => r,
            Err(ureq::Error::Status(_, r)) => r,
            Err(ureq::Error::Transport(t)) => return Err(TransportError::Connection(t.to_string())),
        };
        let status = response.status();
        let body = response
            .into_string()
            .map_err(|e| TransportError::Body(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}
