//! Body reader: drains a response stream into text, optionally as JSON.

use futures_util::StreamExt;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::RawResponse;

/// Read the whole body of `response` as text.
///
/// A stream failure before the end surfaces as `ApiError::Transport`.
/// Invalid UTF-8 sequences are replaced rather than rejected.
pub async fn read_body(response: RawResponse) -> Result<String, ApiError> {
    let mut stream = response.into_body().into_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(match String::from_utf8(buf) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Read the whole body and parse it as JSON.
///
/// On a parse failure the raw text is kept in `ApiError::MalformedBody`.
pub async fn read_json_body(response: RawResponse) -> Result<Value, ApiError> {
    let text = read_body(response).await?;
    serde_json::from_str(&text).map_err(|_| ApiError::MalformedBody { raw_body: text })
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures_util::stream;

    use super::*;
    use crate::http::ResponseBody;

    fn chunked(chunks: Vec<Result<Bytes, ApiError>>) -> RawResponse {
        RawResponse::new(200, Vec::new(), ResponseBody::from_stream(Box::pin(stream::iter(chunks))))
    }

    #[tokio::test]
    async fn joins_all_chunks() {
        let response = chunked(vec![
            Ok(Bytes::from_static(b"{\"na")),
            Ok(Bytes::from_static(b"me\":\"x\"}")),
        ]);
        let value = read_json_body(response).await.unwrap();
        assert_eq!(value["name"], "x");
    }

    #[tokio::test]
    async fn stream_failure_is_a_transport_error() {
        let response = chunked(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(ApiError::transport("connection reset")),
        ]);
        let err = read_body(response).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
    }

    #[tokio::test]
    async fn unparsable_json_keeps_raw_text() {
        let response = RawResponse::from_text(200, Vec::new(), "not-json");
        let err = read_json_body(response).await.unwrap_err();
        match err {
            ApiError::MalformedBody { raw_body } => assert_eq!(raw_body, "not-json"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_body_reads_as_empty_string() {
        let response = RawResponse::new(204, Vec::new(), ResponseBody::empty());
        assert_eq!(read_body(response).await.unwrap(), "");
    }
}
