use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Multipart, Query},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

pub const AUTH_HEADER: &str = "x-appbuilder-authorization";
/// Auth header of the console OpenAPI routes under `/v2`.
pub const OPENAPI_AUTH_HEADER: &str = "authorization";
pub const REQUEST_ID_HEADER: &str = "x-appbuilder-request-id";

/// Business code returned for an unknown app id.
pub const BAD_APP_CODE: i64 = 17;

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationRequest {
    pub app_id: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub count: u32,
    /// Abort the body in the middle of an extra frame after `count` frames.
    #[serde(default)]
    pub truncate: bool,
    /// Emit a non-JSON frame in place of this index.
    #[serde(default)]
    pub malformed_at: Option<u32>,
}

/// One frame of a run's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFrame {
    pub index: u32,
    pub answer: String,
    pub is_completion: bool,
}

pub fn app() -> Router {
    Router::new()
        .route("/app/conversation", post(create_conversation))
        .route("/app/conversation/runs", post(run_conversation))
        .route("/app/conversation/file/upload", post(upload_file))
        .route("/v2/knowledge_base/documents", get(list_documents))
        .route("/v2/knowledge_base/document", delete(delete_document))
        .route("/v2/knowledgeBase", post(knowledge_base_action))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Fresh request id, attached to a response as the vendor header.
fn request_id() -> (String, HeaderMap) {
    let id = Uuid::new_v4().to_string();
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    (id, headers)
}

fn check_auth(headers: &HeaderMap) -> Result<(), Response> {
    check_auth_with(headers, AUTH_HEADER)
}

fn check_auth_with(headers: &HeaderMap, name: &str) -> Result<(), Response> {
    let token = headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("");
    if token.starts_with("Bearer ") && token.len() > "Bearer ".len() {
        return Ok(());
    }
    let (_, id_headers) = request_id();
    Err((
        StatusCode::UNAUTHORIZED,
        id_headers,
        Json(json!({"code": 401, "message": "invalid token"})),
    )
        .into_response())
}

async fn create_conversation(headers: HeaderMap, Json(input): Json<ConversationRequest>) -> Response {
    if let Err(rejection) = check_auth(&headers) {
        return rejection;
    }
    let (_, id_headers) = request_id();
    if input.app_id == "bad" {
        return (
            id_headers,
            Json(json!({"code": BAD_APP_CODE, "message": "bad app id"})),
        )
            .into_response();
    }
    let body = json!({
        "code": 0,
        "message": "ok",
        "result": {"conversation_id": Uuid::new_v4().to_string(), "app_id": input.app_id},
    });
    (id_headers, Json(body)).into_response()
}

fn frame_line(index: u32, last: bool) -> String {
    let frame = RunFrame {
        index,
        answer: format!("chunk {index}"),
        is_completion: last,
    };
    // RunFrame always serializes.
    let json = serde_json::to_string(&frame).unwrap_or_default();
    format!("data: {json}\n\n")
}

async fn run_conversation(headers: HeaderMap, Json(input): Json<RunRequest>) -> Response {
    if let Err(rejection) = check_auth(&headers) {
        return rejection;
    }
    let mut chunks: Vec<Result<Bytes, std::io::Error>> = (0..input.count)
        .map(|i| {
            let line = if input.malformed_at == Some(i) {
                "data: {not json\n\n".to_string()
            } else {
                frame_line(i, i + 1 == input.count && !input.truncate)
            };
            Ok(Bytes::from(line))
        })
        .collect();
    if input.truncate {
        chunks.push(Ok(Bytes::from_static(b"data: {\"index\":")));
        chunks.push(Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionAborted,
            "upstream went away",
        )));
    }

    let (_, mut id_headers) = request_id();
    id_headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    // Pause before failing so the frames already queued reach the client.
    let stream = futures::stream::iter(chunks).then(|chunk| async move {
        if chunk.is_err() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        chunk
    });
    let body = Body::from_stream(stream);
    (id_headers, body).into_response()
}

async fn upload_file(headers: HeaderMap, mut multipart: Multipart) -> Response {
    if let Err(rejection) = check_auth(&headers) {
        return rejection;
    }
    let mut fields = BTreeMap::new();
    let mut files = BTreeMap::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };
        match file_name {
            Some(file_name) => {
                files.insert(name, json!({"file_name": file_name, "size": data.len()}));
            }
            None => {
                fields.insert(name, Value::String(String::from_utf8_lossy(&data).into_owned()));
            }
        }
    }
    let (id, id_headers) = request_id();
    let body = json!({
        "request_id": id,
        "code": 0,
        "message": "ok",
        "result": {"id": Uuid::new_v4().to_string(), "fields": fields, "files": files},
    });
    (id_headers, Json(body)).into_response()
}

/// Echoes the query string; the request id travels only in the body here.
async fn list_documents(headers: HeaderMap, Query(query): Query<BTreeMap<String, String>>) -> Response {
    if let Err(rejection) = check_auth_with(&headers, OPENAPI_AUTH_HEADER) {
        return rejection;
    }
    let body = json!({
        "request_id": Uuid::new_v4().to_string(),
        "code": 0,
        "message": "ok",
        "result": {"query": query},
    });
    Json(body).into_response()
}

async fn delete_document(headers: HeaderMap, Query(query): Query<BTreeMap<String, String>>) -> Response {
    if let Err(rejection) = check_auth_with(&headers, OPENAPI_AUTH_HEADER) {
        return rejection;
    }
    let (_, id_headers) = request_id();
    match query.get("document_id") {
        Some(_) => (id_headers, Json(json!({"code": 0, "message": "ok"}))).into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            id_headers,
            Json(json!({"code": 400, "message": "document_id is required"})),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ActionQuery {
    #[serde(rename = "Action")]
    action: String,
}

/// Console OpenAPI: echoes the action and the JSON body.
async fn knowledge_base_action(
    headers: HeaderMap,
    Query(query): Query<ActionQuery>,
    Json(input): Json<Value>,
) -> Response {
    if let Err(rejection) = check_auth_with(&headers, OPENAPI_AUTH_HEADER) {
        return rejection;
    }
    let (id, id_headers) = request_id();
    let body = json!({
        "request_id": id,
        "code": 0,
        "message": "ok",
        "result": {"action": query.action, "input": input},
    });
    (id_headers, Json(body)).into_response()
}
