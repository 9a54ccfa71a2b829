//! Request building and execution against the app platform gateway.
//!
//! # Design
//! `GatewayClient` holds the resolved `ClientConfig` and a ureq agent; it
//! carries no other state between calls. Building is split from I/O the same
//! way as decoding: `build_*` produce plain `HttpRequest` values, and the two
//! executors (`execute`, `execute_sse`) are the only methods that touch the
//! network.
//!
//! Requests target one of two surfaces. `build_request` and
//! `build_query_request` address the app gateway; the `build_openapi_*`
//! variants address the console OpenAPI. Both executors accept either.
//!
//! The agent is configured to hand back 4xx/5xx responses as data, so status
//! interpretation stays in `response::parse_buffered` and `execute_sse`.

use std::io::BufReader;

use serde::de::DeserializeOwned;
use ureq::http;
use ureq::Agent;

use crate::config::{ClientConfig, AUTH_HEADER, OPENAPI_AUTH_HEADER};
use crate::error::ApiError;
use crate::http::{Body, HttpMethod, HttpRequest, HttpResponse};
use crate::multipart;
use crate::response::{parse_buffered, request_id_of, Buffered, Response};
use crate::sse::{BodyReader, FrameStream};

/// Blocking client for the gateway.
///
/// Cloning is cheap and clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    config: ClientConfig,
    agent: Agent,
}

impl GatewayClient {
    pub fn new(config: ClientConfig) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_recv_response(Some(config.response_timeout()))
            .build()
            .new_agent();
        Self { config, agent }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build a request for `gateway + path`, carrying only the auth header.
    ///
    /// `path` is appended verbatim; no content type is set for any body.
    /// `GET` and `DELETE` requests carry no body: executing one built with a
    /// non-empty body fails with `ApiError::Serialization`.
    pub fn build_request(&self, method: HttpMethod, path: &str, body: impl Into<Body>) -> HttpRequest {
        self.request_to(method, format!("{}{path}", self.config.gateway()), AUTH_HEADER, body.into())
    }

    /// Build a body-less request with a form-urlencoded query string.
    ///
    /// Pairs whose value is `None` are left out.
    pub fn build_query_request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &[(&str, Option<String>)],
    ) -> HttpRequest {
        self.build_request(method, &with_query(path, query), Body::Empty)
    }

    /// Build a console OpenAPI request for `gateway + prefix + version + path`.
    ///
    /// The token travels in the standard `Authorization` header instead of
    /// the app gateway's vendor header.
    pub fn build_openapi_request(&self, method: HttpMethod, path: &str, body: impl Into<Body>) -> HttpRequest {
        let url = format!("{}{path}", self.config.openapi().base_url());
        self.request_to(method, url, OPENAPI_AUTH_HEADER, body.into())
    }

    /// `build_query_request` for the console OpenAPI.
    pub fn build_openapi_query_request(
        &self,
        method: HttpMethod,
        path: &str,
        query: &[(&str, Option<String>)],
    ) -> HttpRequest {
        self.build_openapi_request(method, &with_query(path, query), Body::Empty)
    }

    fn request_to(&self, method: HttpMethod, url: String, auth_header: &str, body: Body) -> HttpRequest {
        HttpRequest {
            method,
            url,
            headers: vec![(auth_header.to_string(), self.config.token().to_string())],
            body,
        }
    }

    /// Send `request`, buffer the whole body and decode it as `T`.
    ///
    /// Bodies are read in full up to `ClientConfig::body_limit`, which is
    /// unlimited unless configured.
    pub fn execute<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<Response<Buffered<T>>, ApiError> {
        let response = self.send(request)?;
        let status = response.status();
        let headers = collect_headers(response.headers());
        let mut body = response.into_body();
        let body = body
            .with_config()
            .limit(self.config.body_limit())
            .read_to_string()
            .map_err(|e| ApiError::Transport(format!("reading response body: {e}")))?;
        tracing::debug!(status = status.as_u16(), bytes = body.len(), "buffered response received");
        parse_buffered(HttpResponse {
            status: status.as_u16(),
            reason: reason_of(status),
            headers,
            body,
        })
    }

    /// Send `request` and return as soon as headers arrive.
    ///
    /// The body is exposed as a [`FrameStream`] that owns the connection.
    /// Non-2xx statuses are read in full and returned as `ApiError::Http`.
    pub fn execute_sse<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> Result<Response<FrameStream<T>>, ApiError> {
        let response = self.send(request)?;
        let status = response.status();
        let headers = collect_headers(response.headers());
        let request_id = request_id_of(&headers, "");

        if !status.is_success() {
            let mut body = response.into_body();
            // Best effort: the status is the primary signal here.
            let body = body
                .with_config()
                .limit(self.config.body_limit())
                .read_to_string()
                .unwrap_or_default();
            let request_id = request_id.or_else(|| request_id_of(&[], &body));
            return Err(ApiError::http_with_body(request_id, status.as_u16(), reason_of(status), body));
        }

        let reader: BodyReader = Box::new(BufReader::new(response.into_body().into_reader()));
        tracing::debug!(status = status.as_u16(), request_id = ?request_id, "event stream opened");
        Ok(Response {
            status: status.as_u16(),
            reason: reason_of(status),
            request_id: request_id.clone(),
            headers,
            body: FrameStream::new(reader).with_context(request_id, status.as_u16()),
        })
    }

    fn send(&self, request: HttpRequest) -> Result<http::Response<ureq::Body>, ApiError> {
        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        tracing::trace!("{}", request.to_curl());

        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        if method != HttpMethod::Post && !body.is_empty() {
            return Err(ApiError::Serialization(format!("{method} request cannot carry a body")));
        }

        let (content_type, bytes) = match body {
            Body::Empty => (None, None),
            Body::Text(text) => (None, Some(text.into_bytes())),
            Body::Multipart(parts) => {
                let form = multipart::encode(&parts);
                (Some(form.content_type), Some(form.bytes))
            }
        };

        let response = match method {
            HttpMethod::Get => {
                let mut builder = self.agent.get(&url);
                for (name, value) in &headers {
                    builder = builder.header(name, value);
                }
                builder.call()
            }
            HttpMethod::Delete => {
                let mut builder = self.agent.delete(&url);
                for (name, value) in &headers {
                    builder = builder.header(name, value);
                }
                builder.call()
            }
            HttpMethod::Post => {
                let mut builder = self.agent.post(&url);
                for (name, value) in &headers {
                    builder = builder.header(name, value);
                }
                if let Some(content_type) = content_type {
                    builder = builder.header("Content-Type", content_type);
                }
                match bytes {
                    Some(bytes) => builder.send(&bytes[..]),
                    None => builder.send_empty(),
                }
            }
        };
        response.map_err(|e| {
            tracing::debug!(error = %e, url = %url, "transport failure");
            ApiError::from(e)
        })
    }
}

fn collect_headers(headers: &http::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn with_query(path: &str, query: &[(&str, Option<String>)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in query {
        if let Some(value) = value {
            serializer.append_pair(key, value);
        }
    }
    let query = serializer.finish();
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

fn reason_of(status: http::StatusCode) -> String {
    status.canonical_reason().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, Write};

    use super::*;
    use crate::config::{OpenApiConfig, DEFAULT_GATEWAY};
    use crate::multipart::Part;
    use crate::paths;

    /// Serve one HTTP/1.1 response with `body` on a fresh port and return its base URL.
    fn serve_once(body: String) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = std::io::BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap_or(0) > 2 {
                line.clear();
            }
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            // The client may hang up early when it rejects the body.
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(body.as_bytes());
        });
        format!("http://{addr}")
    }

    fn large_body(len: usize) -> String {
        format!(r#"{{"code":0,"message":"ok","result":"{}"}}"#, "a".repeat(len))
    }

    fn client() -> GatewayClient {
        GatewayClient::new(ClientConfig::new("test-token", "http://localhost:3000").unwrap())
    }

    #[test]
    fn build_request_concatenates_path_verbatim() {
        let req = client().build_request(HttpMethod::Post, "/app/conversation", Body::Empty);
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/app/conversation");

        let req = client().build_request(HttpMethod::Get, "apps", Body::Empty);
        assert_eq!(req.url, "http://localhost:3000apps");
    }

    #[test]
    fn build_request_only_sets_auth_header() {
        let req = client().build_request(HttpMethod::Post, "/x", r#"{"a":1}"#);
        assert_eq!(
            req.headers,
            vec![(AUTH_HEADER.to_string(), "Bearer test-token".to_string())]
        );
        assert!(req.header_value("Content-Type").is_none());
        assert_eq!(req.body, Body::Text(r#"{"a":1}"#.to_string()));
    }

    #[test]
    fn content_type_is_the_callers_choice() {
        let req = client()
            .build_request(HttpMethod::Post, "/x", Body::json(&serde_json::json!({"a": 1})).unwrap())
            .header("Content-Type", "application/json");
        assert_eq!(req.headers.len(), 2);
        assert_eq!(req.headers[1], ("Content-Type".to_string(), "application/json".to_string()));
    }

    #[test]
    fn build_query_request_skips_none_and_encodes() {
        let req = client().build_query_request(
            HttpMethod::Get,
            "/knowledge_base/documents",
            &[
                ("knowledge_base_id", Some("kb 1".to_string())),
                ("marker", None),
                ("limit", Some("10&x".to_string())),
            ],
        );
        assert_eq!(
            req.url,
            "http://localhost:3000/knowledge_base/documents?knowledge_base_id=kb+1&limit=10%26x"
        );
        assert!(req.body.is_empty());
    }

    #[test]
    fn build_query_request_without_values_has_no_question_mark() {
        let req = client().build_query_request(HttpMethod::Delete, "/doc", &[("id", None)]);
        assert_eq!(req.url, "http://localhost:3000/doc");
    }

    #[test]
    fn multipart_body_is_kept_as_parts() {
        let req = client().build_request(
            HttpMethod::Post,
            "/app/conversation/file/upload",
            vec![Part::text("app_id", "a")],
        );
        assert!(matches!(req.body, Body::Multipart(ref parts) if parts.len() == 1));
        assert!(req.header_value("Content-Type").is_none());
    }

    #[test]
    fn default_gateway_is_used_for_urls() {
        let client = GatewayClient::new(ClientConfig::new("t", DEFAULT_GATEWAY).unwrap());
        let req = client.build_request(HttpMethod::Get, "/apps", Body::Empty);
        assert_eq!(req.url, "https://appbuilder.baidu.com/apps");
    }

    #[test]
    fn openapi_request_uses_console_base_and_standard_auth() {
        let config = ClientConfig::new("t", "http://app-gw")
            .unwrap()
            .with_openapi(OpenApiConfig {
                gateway: "http://console".to_string(),
                prefix: "/api".to_string(),
                version: "/v2".to_string(),
            });
        let client = GatewayClient::new(config);

        let req = client.build_openapi_request(HttpMethod::Post, paths::KNOWLEDGE_BASE_CREATE, r#"{"name":"kb"}"#);
        assert_eq!(req.url, "http://console/api/v2/knowledgeBase?Action=CreateKnowledgeBase");
        assert_eq!(req.headers, vec![("Authorization".to_string(), "Bearer t".to_string())]);
        assert!(req.header_value(AUTH_HEADER).is_none());

        let req = client.build_openapi_query_request(
            HttpMethod::Get,
            "/knowledgeBase",
            &[("Action", Some("DescribeKnowledgeBases".to_string())), ("marker", None)],
        );
        assert_eq!(req.url, "http://console/api/v2/knowledgeBase?Action=DescribeKnowledgeBases");
    }

    #[test]
    fn openapi_defaults_point_at_console_host() {
        let req = client().build_openapi_request(HttpMethod::Get, "/components", Body::Empty);
        assert_eq!(req.url, "https://qianfan.baidubce.com/v2/components");
    }

    #[test]
    fn body_on_get_or_delete_is_rejected_before_sending() {
        for method in [HttpMethod::Get, HttpMethod::Delete] {
            let req = client().build_request(method, "/apps", r#"{"a":1}"#);
            let err = client().execute::<serde_json::Value>(req).unwrap_err();
            assert!(matches!(err, ApiError::Serialization(_)), "{method}: {err}");

            let req = client().build_request(method, "/apps", vec![Part::text("a", "b")]);
            let err = client().execute_sse::<serde_json::Value>(req).unwrap_err();
            assert!(matches!(err, ApiError::Serialization(_)), "{method}: {err}");
        }
    }

    #[test]
    fn execute_buffers_bodies_past_ten_mebibytes() {
        let len = 11 * 1024 * 1024;
        let gateway = serve_once(large_body(len));
        let client = GatewayClient::new(ClientConfig::new("t", &gateway).unwrap());
        let req = client.build_request(HttpMethod::Get, "/large", Body::Empty);
        let resp = client.execute::<serde_json::Value>(req).unwrap();
        assert_eq!(resp.body.decoded["result"].as_str().unwrap().len(), len);
    }

    #[test]
    fn configured_body_limit_is_enforced() {
        let gateway = serve_once(large_body(4096));
        let client = GatewayClient::new(ClientConfig::new("t", &gateway).unwrap().with_body_limit(1024));
        let req = client.build_request(HttpMethod::Get, "/large", Body::Empty);
        let err = client.execute::<serde_json::Value>(req).unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)), "{err}");
    }

    #[test]
    fn connection_refused_is_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = GatewayClient::new(ClientConfig::new("t", &format!("http://127.0.0.1:{port}")).unwrap());
        let req = client.build_request(HttpMethod::Get, "/apps", Body::Empty);
        let err = client.execute::<serde_json::Value>(req).unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert_eq!(err.status(), None);
    }
}
