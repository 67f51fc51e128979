//! HTTP exchange seam between the session and the network.

use crate::error::DriverError;
use eyre::Result;
use std::io::Read;
use std::time::Duration;

/// HTTP method used by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// A single outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header value by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What came back from the server.
///
/// Non-2xx statuses are replies, not errors: the session decides what a
/// status means.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpReply {
    pub status: u16,
    /// Raw `Set-Cookie` header values, in arrival order
    pub set_cookies: Vec<String>,
    pub body: String,
}

impl HttpReply {
    /// Reply with a status and a body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            set_cookies: Vec::new(),
            body: body.into(),
        }
    }

    /// Add a `Set-Cookie` value.
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.set_cookies.push(cookie.into());
        self
    }
}

/// Performs one HTTP exchange.
///
/// Implementations must surface socket-level failures as
/// [`DriverError::Transport`].
pub trait Transport: Send + Sync {
    fn send(&self, request: HttpRequest) -> Result<HttpReply>;
}

/// `ureq`-backed transport.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Create a transport whose socket operations give up after `timeout`.
    pub fn new(timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self { agent: builder.build() }
    }

    fn into_reply(response: ureq::Response) -> Result<HttpReply> {
        let status = response.status();
        let set_cookies = response
            .all("set-cookie")
            .into_iter()
            .map(String::from)
            .collect();
        // Read to end: a fixed-size buffer cannot tell a full body from a truncated one.
        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .map_err(|e| eyre::eyre!(DriverError::Transport(format!("failed reading response body: {}", e))))?;
        Ok(HttpReply {
            status,
            set_cookies,
            body,
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpReply> {
        let mut outgoing = self.agent.request(request.method.as_str(), &request.url);
        for (name, value) in &request.headers {
            outgoing = outgoing.set(name, value);
        }

        match outgoing.call() {
            Ok(response) => Self::into_reply(response),
            Err(ureq::Error::Status(_, response)) => Self::into_reply(response),
            Err(ureq::Error::Transport(e)) => Err(eyre::eyre!(DriverError::Transport(format!(
                "{} {} failed: {}",
                request.method.as_str(),
                request.url,
                e
            )))),
        }
    }
}
