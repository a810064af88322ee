//! HTTP request and response types shared by the transport and the core.
//!
//! # Design
//! `HttpRequest` is plain owned data: the executor builds it, the transport
//! sends it. `RawResponse` wraps the status line, the headers and a streaming
//! body. Reading the body consumes the response by value, so a body can be
//! read at most once and only by a single reader.
//!
//! GET and DELETE requests never carry a body; the only way to attach one is
//! through `HttpRequest::post`.

use std::fmt;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::{self, Stream};

use crate::error::ApiError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// `path` is either relative to the configured base URL or an absolute URL
/// (status locations returned by the service may be either).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    method: HttpMethod,
    path: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl HttpRequest {
    pub fn get(path: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            headers,
            body: None,
        }
    }

    pub fn delete(path: impl Into<String>, headers: Vec<(String, String)>) -> Self {
        Self {
            method: HttpMethod::Delete,
            path: path.into(),
            headers,
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, headers: Vec<(String, String)>, body: Option<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            headers,
            body,
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// Stream of body chunks as produced by a transport.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, ApiError>> + Send>>;

/// The not-yet-consumed body of a response.
pub struct ResponseBody {
    stream: BodyStream,
}

impl ResponseBody {
    pub fn from_stream(stream: BodyStream) -> Self {
        Self { stream }
    }

    /// A body whose full content is already in memory.
    pub fn from_text(text: impl Into<String>) -> Self {
        let bytes = Bytes::from(text.into());
        Self::from_stream(Box::pin(stream::iter([Ok::<_, ApiError>(bytes)])))
    }

    pub fn empty() -> Self {
        Self::from_stream(Box::pin(stream::empty::<Result<Bytes, ApiError>>()))
    }

    pub(crate) fn into_stream(self) -> BodyStream {
        self.stream
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseBody { .. }")
    }
}

/// A response as handed back by a `Transport`: status, headers and an
/// unread body.
#[derive(Debug)]
pub struct RawResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: ResponseBody,
}

impl RawResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: ResponseBody) -> Self {
        Self { status, headers, body }
    }

    /// Convenience constructor for in-memory responses.
    pub fn from_text(status: u16, headers: Vec<(String, String)>, body: impl Into<String>) -> Self {
        Self::new(status, headers, ResponseBody::from_text(body))
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Give up the response, keeping only its body.
    pub fn into_body(self) -> ResponseBody {
        self.body
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
