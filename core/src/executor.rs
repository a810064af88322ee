//! Synchronous request executor: one HTTP exchange per operation.
//!
//! # Design
//! `build_request` attaches the auth/version headers and serialises the
//! payload; `send_api_request` sends and classifies, returning the raw
//! response only on success. `execute` adds the body handling for
//! operations that finish within a single exchange. The poller reuses the
//! first two.

use std::sync::Arc;

use serde_json::Value;

use crate::body::read_json_body;
use crate::classify::{has_json_content, is_success, read_api_error, CONTENT_TYPE_JSON};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, RawResponse};
use crate::transport::Transport;

pub const HEADER_VERSION: &str = "X-Version";
pub const HEADER_TOKEN: &str = "X-Token";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

pub struct RequestExecutor<T> {
    transport: T,
    config: Arc<ClientConfig>,
}

impl<T: Transport> RequestExecutor<T> {
    pub fn new(transport: T, config: Arc<ClientConfig>) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build a request carrying `X-Version` and `X-Token`.
    ///
    /// A payload is only accepted for POST; it is serialised as JSON and
    /// announced with `Content-Type: application/json`.
    pub fn build_request(&self, method: HttpMethod, path: &str, payload: Option<&Value>) -> Result<HttpRequest, ApiError> {
        let mut headers = vec![
            (HEADER_VERSION.to_string(), self.config.api_version.to_string()),
            (HEADER_TOKEN.to_string(), self.config.token.clone()),
        ];

        match (method, payload) {
            (HttpMethod::Get, None) => Ok(HttpRequest::get(path, headers)),
            (HttpMethod::Delete, None) => Ok(HttpRequest::delete(path, headers)),
            (HttpMethod::Post, None) => Ok(HttpRequest::post(path, headers, None)),
            (HttpMethod::Post, Some(payload)) => {
                let body = serde_json::to_string(payload).map_err(ApiError::Serialization)?;
                headers.push((HEADER_CONTENT_TYPE.to_string(), CONTENT_TYPE_JSON.to_string()));
                Ok(HttpRequest::post(path, headers, Some(body)))
            }
            (method, Some(_)) => Err(ApiError::InvalidRequest(format!("{method} {path} cannot carry a body"))),
        }
    }

    /// Send `request` and return the response if its status is a success;
    /// otherwise read the error body and fail with it.
    pub async fn send_api_request(&self, request: HttpRequest) -> Result<RawResponse, ApiError> {
        let method = request.method();
        let response = self.transport.send(request).await?;
        if is_success(&response) {
            Ok(response)
        } else {
            let status = response.status();
            let err = read_api_error(response).await;
            tracing::debug!(%method, status, error = %err, "request failed");
            Err(err)
        }
    }

    /// Run one request to completion.
    ///
    /// Resolves to the parsed JSON body, or `None` when the successful
    /// response carries no JSON (e.g. 204 No Content).
    pub async fn execute(&self, method: HttpMethod, path: &str, payload: Option<Value>) -> Result<Option<Value>, ApiError> {
        let request = self.build_request(method, path, payload.as_ref())?;
        let response = self.send_api_request(request).await?;
        if has_json_content(&response) {
            read_json_body(response).await.map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{json_headers, ScriptedTransport};

    fn executor() -> (Arc<ScriptedTransport>, RequestExecutor<Arc<ScriptedTransport>>) {
        let transport = Arc::new(ScriptedTransport::new());
        let config = Arc::new(ClientConfig::new("secret", 2));
        (transport.clone(), RequestExecutor::new(transport, config))
    }

    #[test]
    fn get_request_has_auth_headers_and_no_body() {
        let (_, exec) = executor();
        let req = exec.build_request(HttpMethod::Get, "/cloudrecognition/targetCollection", None).unwrap();
        assert_eq!(req.header("x-version"), Some("2"));
        assert_eq!(req.header("x-token"), Some("secret"));
        assert!(req.header("content-type").is_none());
        assert!(req.body().is_none());
    }

    #[test]
    fn post_with_payload_is_json() {
        let (_, exec) = executor();
        let payload = json!({"name": "tc"});
        let req = exec.build_request(HttpMethod::Post, "/c", Some(&payload)).unwrap();
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        let body: Value = serde_json::from_str(req.body().unwrap()).unwrap();
        assert_eq!(body, payload);
    }

    #[test]
    fn post_without_payload_has_no_content_type() {
        let (_, exec) = executor();
        let req = exec.build_request(HttpMethod::Post, "/c/1/generation/cloudarchive", None).unwrap();
        assert!(req.body().is_none());
        assert!(req.header("content-type").is_none());
    }

    #[test]
    fn delete_with_payload_is_rejected() {
        let (_, exec) = executor();
        let err = exec.build_request(HttpMethod::Delete, "/c/1", Some(&json!({}))).unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn success_with_json_returns_value() {
        let (transport, exec) = executor();
        transport.push_json(200, r#"{"id":"tc1","name":"tc"}"#);
        let value = exec
            .execute(HttpMethod::Post, "/c", Some(json!({"name": "tc"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value["id"], "tc1");
        assert_eq!(transport.requests()[0].method(), HttpMethod::Post);
    }

    #[tokio::test]
    async fn no_content_resolves_to_none() {
        let (transport, exec) = executor();
        transport.push(RawResponse::from_text(204, Vec::new(), ""));
        assert!(exec.execute(HttpMethod::Delete, "/c/1", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn success_with_zero_length_json_resolves_to_none() {
        let (transport, exec) = executor();
        let mut headers = json_headers();
        headers.push(("content-length".to_string(), "0".to_string()));
        transport.push(RawResponse::from_text(200, headers, ""));
        assert!(exec.execute(HttpMethod::Get, "/c", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn created_status_is_a_failure() {
        let (transport, exec) = executor();
        transport.push_json(201, r#"{"id":"x"}"#);
        let err = exec.execute(HttpMethod::Post, "/c", None).await.unwrap_err();
        assert!(matches!(err, ApiError::Service { .. }));
    }

    #[tokio::test]
    async fn service_error_is_propagated() {
        let (transport, exec) = executor();
        transport.push_json(400, r#"{"message":"bad name","code":400,"reason":"INVALID_NAME"}"#);
        let err = exec.execute(HttpMethod::Post, "/c", Some(json!({"name": ""}))).await.unwrap_err();
        assert_eq!(err.reason(), Some("INVALID_NAME"));
        assert_eq!(err.status_code(), Some(400));
    }

    #[tokio::test]
    async fn transport_failure_aborts() {
        let (transport, exec) = executor();
        transport.push_error(ApiError::transport("tls handshake failed"));
        let err = exec.execute(HttpMethod::Get, "/c", None).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }));
        assert_eq!(transport.requests().len(), 1);
    }
}
