//! HTTP transport types.
//!
//! # Design
//! Requests and buffered responses are plain data. `GatewayClient::build_*`
//! produces `HttpRequest` values and `response::parse_buffered` consumes
//! `HttpResponse` values without touching the network; only the executors in
//! `client` perform I/O. This keeps building and decoding deterministic and
//! testable on their own.

use std::fmt;

use serde::Serialize;

use crate::config::{AUTH_HEADER, OPENAPI_AUTH_HEADER};
use crate::error::ApiError;
use crate::multipart::Part;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        })
    }
}

/// Request payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    Text(String),
    Multipart(Vec<Part>),
}

impl Body {
    /// Serialize `value` as JSON text. Does not set any header.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_string(value)
            .map(Body::Text)
            .map_err(|e| ApiError::Serialization(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Vec<Part>> for Body {
    fn from(parts: Vec<Part>) -> Self {
        Body::Multipart(parts)
    }
}

/// An HTTP request described as plain data.
///
/// Headers keep insertion order and the exact case they were given in.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl HttpRequest {
    /// Append a header. Content type is always the caller's decision.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        header_lookup(&self.headers, name)
    }

    /// Render as a curl command for debug logs, with the token redacted.
    pub fn to_curl(&self) -> String {
        let mut cmd = format!("curl -X {} -L '{}'", self.method, self.url);
        for (name, value) in &self.headers {
            let secret = name.eq_ignore_ascii_case(AUTH_HEADER) || name.eq_ignore_ascii_case(OPENAPI_AUTH_HEADER);
            let value = if secret {
                "<redacted>"
            } else {
                value.as_str()
            };
            cmd.push_str(&format!(" \\\n -H '{name}: {value}'"));
        }
        match &self.body {
            Body::Empty => {}
            Body::Text(text) => cmd.push_str(&format!(" \\\n -d '{text}'")),
            Body::Multipart(parts) => {
                for part in parts {
                    cmd.push_str(&format!(" \\\n -F '{}'", part.curl_field()));
                }
            }
        }
        cmd
    }
}

/// A fully buffered HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn header_value(&self, name: &str) -> Option<&str> {
        header_lookup(&self.headers, name)
    }
}

/// Case-insensitive header lookup; HTTP header names are not case-sensitive
/// on the wire even though we store them as given.
pub(crate) fn header_lookup<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
