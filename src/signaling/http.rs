//! HTTP transport seam for the signaling client
//!
//! The coordination layer never talks to a socket directly: host
//! applications supply an [`HttpClient`] implementation (reqwest, ureq
//! behind `spawn_blocking`, a platform webview bridge, a scripted fake in
//! tests) and the signaling client builds requests on top of it. The
//! request/response structs are deliberately plain so implementations stay
//! trivial.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

/// A single HTTP request to the signaling backend
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Absolute request URL
    pub url: String,
    /// "GET" or "POST"
    pub method: String,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Request body, if any
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Build a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Build a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "POST".to_string(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Add a header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Attach a body
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

/// Response to an [`HttpRequest`]
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Complete response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Build a response from a status code and body bytes
    pub fn new(status_code: u16, body: Vec<u8>) -> Self {
        Self { status_code, body }
    }

    /// Build a response with an empty body
    pub fn empty(status_code: u16) -> Self {
        Self { status_code, body: Vec::new() }
    }

    /// Whether the status code is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Trait for executing HTTP requests in a runtime-agnostic way
///
/// Implementations are expected to return `Ok` for any response the server
/// produced (including 4xx/5xx) and `Err` only for transport-level failures
/// (connect, DNS, TLS, aborted sockets). The signaling client maps status
/// codes to typed errors itself.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Executes a given HTTP request and returns the response
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}
