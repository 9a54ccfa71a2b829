//! Blocking client core for the app platform gateway.
//!
//! # Overview
//! Resolves credentials, builds authenticated requests, and executes them in
//! one of two ways: `execute` buffers and decodes a JSON body, `execute_sse`
//! hands back a lazy [`FrameStream`] of JSON frames read from a
//! server-sent-events body.
//!
//! # Design
//! - `ClientConfig` is resolved once and owned by the client. Reading the
//!   environment is an explicit strategy (`ClientConfig::from_env`).
//! - One client talks to two surfaces: the app gateway (`build_request`) and
//!   the console OpenAPI (`build_openapi_request`). They differ in base URL
//!   and auth header only.
//! - Requests and buffered responses are plain data (`HttpRequest`,
//!   `HttpResponse`); only `GatewayClient::execute*` performs I/O.
//! - Every failure is an [`ApiError`]. Business-level `code != 0` is left to
//!   callers, who turn it into `ApiError::Application` via [`Envelope`].
//! - Everything blocks the calling thread. A `FrameStream` belongs to one
//!   consumer and releases its connection when exhausted, closed or dropped.

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod multipart;
pub mod paths;
pub mod response;
pub mod sse;

pub use client::GatewayClient;
pub use config::{ClientConfig, OpenApiConfig};
pub use envelope::Envelope;
pub use error::ApiError;
pub use http::{Body, HttpMethod, HttpRequest, HttpResponse};
pub use multipart::Part;
pub use response::{parse_buffered, Buffered, Response};
pub use sse::{FrameStream, StreamState};
