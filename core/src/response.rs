//! Response envelopes and buffered decoding.
//!
//! # Design
//! `Response<B>` carries the transport metadata common to every call. The
//! body type says which executor produced it: `Buffered<T>` for `execute`
//! (raw text plus decoded value), `FrameStream<T>` for `execute_sse`. A
//! response therefore never holds both a raw body and a frame stream.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::REQUEST_ID_HEADER;
use crate::error::ApiError;
use crate::http::{header_lookup, HttpResponse};

/// Transport metadata plus a body of type `B`.
#[derive(Debug)]
pub struct Response<B> {
    pub status: u16,
    pub reason: String,
    pub request_id: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: B,
}

impl<B> Response<B> {
    pub fn header_value(&self, name: &str) -> Option<&str> {
        header_lookup(&self.headers, name)
    }

    /// Split into the body and a copy of the metadata with a unit body.
    pub fn into_parts(self) -> (Response<()>, B) {
        let meta = Response {
            status: self.status,
            reason: self.reason,
            request_id: self.request_id,
            headers: self.headers,
            body: (),
        };
        (meta, self.body)
    }
}

/// Body of a buffered response: the raw text and what it decoded to.
#[derive(Debug, Clone)]
pub struct Buffered<T> {
    pub raw: String,
    pub decoded: T,
}

#[derive(Deserialize)]
struct RequestIdField {
    #[serde(alias = "requestId")]
    request_id: Option<String>,
}

/// Request id from the vendor header, else from a top-level body field.
pub(crate) fn request_id_of(headers: &[(String, String)], body: &str) -> Option<String> {
    header_lookup(headers, REQUEST_ID_HEADER)
        .map(str::to_string)
        .or_else(|| {
            serde_json::from_str::<RequestIdField>(body)
                .ok()
                .and_then(|field| field.request_id)
        })
}

/// Decode a buffered response into `T`.
///
/// Non-2xx statuses become `ApiError::Http` with the raw body attached. The
/// body's own business `code` is not inspected.
pub fn parse_buffered<T: DeserializeOwned>(response: HttpResponse) -> Result<Response<Buffered<T>>, ApiError> {
    let request_id = request_id_of(&response.headers, &response.body);
    if !(200..300).contains(&response.status) {
        return Err(ApiError::Http {
            request_id,
            status: response.status,
            reason: response.reason,
            body: Some(response.body),
        });
    }
    let decoded = match serde_json::from_str(&response.body) {
        Ok(decoded) => decoded,
        Err(e) => {
            return Err(ApiError::Decode {
                request_id,
                status: response.status,
                message: e.to_string(),
                body: response.body,
            })
        }
    };
    Ok(Response {
        status: response.status,
        reason: response.reason,
        request_id,
        headers: response.headers,
        body: Buffered {
            raw: response.body,
            decoded,
        },
    })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::envelope::Envelope;

    #[derive(Debug, Deserialize)]
    struct Created {
        id: String,
    }

    fn response(status: u16, headers: Vec<(&str, &str)>, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            reason: if status == 200 { "OK" } else { "Error" }.to_string(),
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.to_string(),
        }
    }

    #[test]
    fn decodes_envelope_and_request_id_from_body() {
        let raw = r#"{"request_id":"r1","code":0,"message":"ok","result":{"id":"abc"}}"#;
        let parsed = parse_buffered::<Envelope<Created>>(response(200, vec![], raw)).unwrap();
        assert_eq!(parsed.request_id.as_deref(), Some("r1"));
        assert_eq!(parsed.body.raw, raw);
        assert_eq!(parsed.body.decoded.result.unwrap().id, "abc");
    }

    #[test]
    fn header_request_id_wins_over_body() {
        let raw = r#"{"request_id":"from-body","code":0}"#;
        let parsed = parse_buffered::<serde_json::Value>(response(
            200,
            vec![("x-appbuilder-request-id", "from-header")],
            raw,
        ))
        .unwrap();
        assert_eq!(parsed.request_id.as_deref(), Some("from-header"));
    }

    #[test]
    fn camel_case_request_id_is_recognized() {
        let parsed =
            parse_buffered::<serde_json::Value>(response(200, vec![], r#"{"requestId":"r2"}"#)).unwrap();
        assert_eq!(parsed.request_id.as_deref(), Some("r2"));
    }

    #[test]
    fn missing_request_id_is_none() {
        let parsed = parse_buffered::<serde_json::Value>(response(200, vec![], "[1,2]")).unwrap();
        assert!(parsed.request_id.is_none());
    }

    #[test]
    fn business_code_is_not_inspected() {
        let raw = r#"{"code":17,"message":"bad app id"}"#;
        let parsed = parse_buffered::<Envelope<serde_json::Value>>(response(200, vec![], raw)).unwrap();
        assert_eq!(parsed.body.decoded.code, 17);
    }

    #[test]
    fn non_success_status_carries_raw_body() {
        let err = parse_buffered::<serde_json::Value>(response(
            401,
            vec![("X-Appbuilder-Request-Id", "r9")],
            "unauthorized",
        ))
        .unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 401, .. }));
        assert_eq!(err.request_id(), Some("r9"));
        assert_eq!(err.response_body(), Some("unauthorized"));
    }

    #[test]
    fn undecodable_body_is_decode_error() {
        let err = parse_buffered::<Created>(response(200, vec![], "not json")).unwrap_err();
        assert!(matches!(err, ApiError::Decode { status: 200, .. }));
        assert_eq!(err.response_body(), Some("not json"));
    }

    #[test]
    fn into_parts_keeps_metadata() {
        let parsed = parse_buffered::<serde_json::Value>(response(200, vec![("A", "1")], "{}")).unwrap();
        let (meta, body) = parsed.into_parts();
        assert_eq!(meta.status, 200);
        assert_eq!(meta.header_value("a"), Some("1"));
        assert_eq!(body.raw, "{}");
    }
}
