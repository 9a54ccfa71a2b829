//! `multipart/form-data` encoding for upload endpoints.

use uuid::Uuid;

/// One field of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Part {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: None,
            data: value.into().into_bytes(),
        }
    }

    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: Some(content_type.into()),
            data,
        }
    }

    pub(crate) fn curl_field(&self) -> String {
        match &self.filename {
            Some(filename) => format!("{}=@{filename}", self.name),
            None => format!("{}={}", self.name, String::from_utf8_lossy(&self.data)),
        }
    }
}

/// An encoded multipart body together with its `Content-Type` header value.
#[derive(Debug)]
pub(crate) struct EncodedForm {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub(crate) fn encode(parts: &[Part]) -> EncodedForm {
    encode_with_boundary(parts, &format!("appbuilder-{}", Uuid::new_v4().simple()))
}

fn encode_with_boundary(parts: &[Part], boundary: &str) -> EncodedForm {
    let mut bytes = Vec::new();
    for part in parts {
        bytes.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", escape(&part.name));
        if let Some(filename) = &part.filename {
            disposition.push_str(&format!("; filename=\"{}\"", escape(filename)));
        }
        bytes.extend_from_slice(disposition.as_bytes());
        bytes.extend_from_slice(b"\r\n");
        if let Some(content_type) = &part.content_type {
            bytes.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        bytes.extend_from_slice(b"\r\n");
        bytes.extend_from_slice(&part.data);
        bytes.extend_from_slice(b"\r\n");
    }
    bytes.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    EncodedForm {
        content_type: format!("multipart/form-data; boundary={boundary}"),
        bytes,
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
