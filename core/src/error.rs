//! Error types for the gateway client.
//!
//! # Design
//! A single enum covers every failure the client can report. Each variant
//! carries only the fields that make sense for its category, so callers can
//! tell "the gateway rejected the HTTP request" (`Http`) apart from "the
//! gateway answered 200 with a non-zero business code" (`Application`).
//!
//! Mid-stream read failures on a `FrameStream` are not represented here; they
//! end the stream instead of surfacing as an error.

use thiserror::Error;

/// Errors returned by `GatewayClient` and the types built on it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client construction failed, e.g. no token could be resolved.
    #[error("configuration error: {0}")]
    Config(String),

    /// The HTTP exchange could not be completed (connect, DNS, socket I/O).
    #[error("transport error: {0}")]
    Transport(String),

    /// The gateway answered with a non-success HTTP status.
    #[error("HTTP {status} {reason} (request_id={})", display_id(.request_id))]
    Http {
        request_id: Option<String>,
        status: u16,
        reason: String,
        body: Option<String>,
    },

    /// The gateway answered, but the envelope carried a non-zero `code`.
    #[error("application error {code}: {message} (request_id={})", display_id(.request_id))]
    Application {
        request_id: Option<String>,
        status: u16,
        reason: String,
        code: i64,
        message: String,
    },

    /// The response body could not be decoded into the expected type.
    #[error("decode failed: {message} (request_id={})", display_id(.request_id))]
    Decode {
        request_id: Option<String>,
        status: u16,
        message: String,
        body: String,
    },

    /// The request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A frame was requested from a stream that has no more frames.
    #[error("frame stream exhausted")]
    Exhausted,
}

fn display_id(request_id: &Option<String>) -> &str {
    request_id.as_deref().unwrap_or("-")
}

impl ApiError {
    /// HTTP failure with no body attached.
    pub fn http(request_id: Option<String>, status: u16, reason: impl Into<String>) -> Self {
        ApiError::Http {
            request_id,
            status,
            reason: reason.into(),
            body: None,
        }
    }

    /// HTTP failure carrying the raw response body for diagnostics.
    pub fn http_with_body(
        request_id: Option<String>,
        status: u16,
        reason: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        ApiError::Http {
            request_id,
            status,
            reason: reason.into(),
            body: Some(body.into()),
        }
    }

    /// Business-level failure reported inside an otherwise successful response.
    pub fn application(
        request_id: Option<String>,
        status: u16,
        reason: impl Into<String>,
        code: i64,
        message: impl Into<String>,
    ) -> Self {
        ApiError::Application {
            request_id,
            status,
            reason: reason.into(),
            code,
            message: message.into(),
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            ApiError::Http { request_id, .. }
            | ApiError::Application { request_id, .. }
            | ApiError::Decode { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    /// HTTP status of the response that caused the error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. }
            | ApiError::Application { status, .. }
            | ApiError::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn app_code(&self) -> Option<i64> {
        match self {
            ApiError::Application { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn app_message(&self) -> Option<&str> {
        match self {
            ApiError::Application { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn response_body(&self) -> Option<&str> {
        match self {
            ApiError::Http { body, .. } => body.as_deref(),
            ApiError::Decode { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl From<ureq::Error> for ApiError {
    fn from(err: ureq::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}
