//! The `{request_id, code, message, result}` envelope returned by buffered
//! gateway calls, and the conversion of a non-zero `code` into
//! `ApiError::Application`.
//!
//! Executors never look at `code`; endpoint wrappers call
//! [`Envelope::check`] or [`Response::into_result`] once they have a decoded
//! response in hand.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::response::{Buffered, Response};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<R> {
    #[serde(default, alias = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<R>,
}

impl<R> Envelope<R> {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Return `result` when `code == 0`, else an `Application` error built from
    /// the envelope and the transport metadata in `meta`.
    ///
    /// The envelope's own request id is preferred over the response's.
    pub fn check<B>(self, meta: &Response<B>) -> Result<Option<R>, ApiError> {
        if self.is_success() {
            return Ok(self.result);
        }
        Err(ApiError::application(
            self.request_id.or_else(|| meta.request_id.clone()),
            meta.status,
            meta.reason.clone(),
            self.code,
            self.message,
        ))
    }
}

impl<R> Response<Buffered<Envelope<R>>> {
    /// Unwrap the envelope of a buffered response, failing on a non-zero code.
    pub fn into_result(self) -> Result<Option<R>, ApiError> {
        let (meta, body) = self.into_parts();
        body.decoded.check(&meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(request_id: Option<&str>) -> Response<()> {
        Response {
            status: 200,
            reason: "OK".to_string(),
            request_id: request_id.map(str::to_string),
            headers: Vec::new(),
            body: (),
        }
    }

    #[test]
    fn non_zero_code_becomes_application_error() {
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"code":17,"message":"bad app id"}"#).unwrap();
        let err = envelope.check(&meta(Some("hdr"))).unwrap_err();
        assert_eq!(err.app_code(), Some(17));
        assert_eq!(err.app_message(), Some("bad app id"));
        assert_eq!(err.status(), Some(200));
        assert_eq!(err.request_id(), Some("hdr"));
    }

    #[test]
    fn envelope_request_id_is_preferred() {
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"request_id":"body","code":3,"message":"x"}"#).unwrap();
        let err = envelope.check(&meta(Some("hdr"))).unwrap_err();
        assert_eq!(err.request_id(), Some("body"));
    }

    #[test]
    fn zero_code_returns_result() {
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_str(r#"{"code":0,"message":"ok","result":{"id":"abc"}}"#).unwrap();
        let result = envelope.check(&meta(None)).unwrap().unwrap();
        assert_eq!(result["id"], "abc");
    }

    #[test]
    fn missing_fields_default_to_success() {
        let envelope: Envelope<serde_json::Value> = serde_json::from_str("{}").unwrap();
        assert!(envelope.is_success());
        assert!(envelope.message.is_empty());
        assert!(envelope.result.is_none());
    }
}
