//! Transport: sends one request and hands back the raw response.
//!
//! # Design
//! The executor and poller only see the `Transport` trait, so hosts can plug
//! in their own HTTP stack and tests can script responses. `ReqwestTransport`
//! is the production implementation. It never retries and never follows
//! redirects: a 3xx is handed back as is and classified as a failure. Any
//! connection-level fault becomes `ApiError::Transport` and aborts the
//! calling operation.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Url};

use crate::config::{ClientConfig, TlsPolicy};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, RawResponse, ResponseBody};

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, ApiError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, ApiError> {
        (**self).send(request).await
    }
}

/// HTTPS transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut builder = Client::builder().redirect(Policy::none());
        if config.tls == TlsPolicy::AcceptInvalidCerts {
            tracing::warn!(base_url = %config.base_url, "TLS certificate validation is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self::with_client(client, &config.base_url))
    }

    /// Wrap an already configured `reqwest::Client`.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Absolute URLs are used verbatim; anything else is appended to the
    /// base URL.
    fn resolve(&self, path: &str) -> Result<Url, ApiError> {
        if let Ok(url) = Url::parse(path) {
            return Ok(url);
        }
        let joined = if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        };
        Url::parse(&joined).map_err(|e| ApiError::InvalidConfig(format!("invalid request url {joined:?}: {e}")))
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, ApiError> {
        let url = self.resolve(request.path())?;
        tracing::debug!(method = %request.method(), %url, "sending request");

        let mut builder = self.client.request(to_method(request.method()), url);
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        tracing::debug!(status, "received response");

        let stream = response.bytes_stream().map_err(ApiError::from);
        Ok(RawResponse::new(status, headers, ResponseBody::from_stream(Box::pin(stream))))
    }
}
