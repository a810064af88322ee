//! Asynchronous operation poller.
//!
//! # Design
//! A long-running operation moves through
//! `Submitted -> Waiting -> Polling -> Completed`. The loop below drives an
//! explicit `OperationState` value; each arm performs one step and yields the
//! next state. The only suspension points are the transport calls and the
//! timers, and both observe the optional `Cancellation`.
//!
//! The first wait uses the `estimatedLatency` announced in the accepted
//! response, if any; every later wait uses the configured poll interval.
//! `COMPLETED` is the only terminal status. Any other value, including ones
//! that look like failures, keeps the loop going until the `PollLimit` (if
//! one is set) is exhausted.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::body::read_json_body;
use crate::classify::has_json_content;
use crate::config::PollLimit;
use crate::error::ApiError;
use crate::executor::RequestExecutor;
use crate::http::HttpMethod;
use crate::transport::Transport;
use crate::types::OperationStatus;

pub const HEADER_LOCATION: &str = "location";

/// Cooperative cancellation signal, cheap to clone and share.
#[derive(Debug, Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Where a long-running operation currently is.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationState {
    Submitted,
    Waiting { delay: Duration },
    Polling,
    Completed(OperationStatus),
}

/// One long-running operation: the initiating request plus its poll loop.
pub struct AsyncOperation<'a, T> {
    executor: &'a RequestExecutor<T>,
    method: HttpMethod,
    path: String,
    payload: Option<Value>,
    limit: PollLimit,
    cancellation: Option<Cancellation>,
}

impl<'a, T: Transport> AsyncOperation<'a, T> {
    pub fn new(executor: &'a RequestExecutor<T>, method: HttpMethod, path: &str, payload: Option<Value>) -> Self {
        Self {
            executor,
            method,
            path: path.to_string(),
            payload,
            limit: executor.config().poll_limit,
            cancellation: None,
        }
    }

    /// Override the client-wide poll bound for this operation.
    pub fn with_limit(mut self, limit: PollLimit) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    /// Submit the operation and poll until the service reports completion.
    pub async fn run(self) -> Result<OperationStatus, ApiError> {
        self.limit.validate()?;
        let interval = self.executor.config().poll_interval();
        let started = Instant::now();
        let mut location = String::new();
        let mut attempts: u32 = 0;
        let mut state = OperationState::Submitted;

        loop {
            state = match state {
                OperationState::Submitted => {
                    let (loc, delay) = self.guard(self.submit(interval)).await?;
                    tracing::debug!(path = %self.path, location = %loc, ?delay, "operation accepted");
                    location = loc;
                    self.check_deadline(&location, attempts, started, delay)?;
                    OperationState::Waiting { delay }
                }
                OperationState::Waiting { delay } => {
                    self.guard(async {
                        tokio::time::sleep(delay).await;
                        Ok(())
                    })
                    .await?;
                    OperationState::Polling
                }
                OperationState::Polling => {
                    attempts += 1;
                    let status = self.guard(self.read_status(&location)).await?;
                    tracing::trace!(%location, attempt = attempts, status = %status.status, "polled operation");
                    if status.is_completed() {
                        OperationState::Completed(status)
                    } else {
                        if self.limit.max_attempts.is_some_and(|max| attempts >= max) {
                            return Err(ApiError::PollLimitExceeded {
                                location,
                                attempts,
                                elapsed: started.elapsed(),
                            });
                        }
                        self.check_deadline(&location, attempts, started, interval)?;
                        OperationState::Waiting { delay: interval }
                    }
                }
                OperationState::Completed(status) => {
                    tracing::debug!(%location, attempts, "operation completed");
                    return Ok(status);
                }
            };
        }
    }

    /// Send the initiating request; return the status location and the
    /// delay before the first poll.
    async fn submit(&self, interval: Duration) -> Result<(String, Duration), ApiError> {
        let request = self
            .executor
            .build_request(self.method, &self.path, self.payload.as_ref())?;
        let response = self.executor.send_api_request(request).await?;
        let location = response
            .header(HEADER_LOCATION)
            .map(str::to_string)
            .ok_or(ApiError::MissingLocation {
                status: response.status(),
            })?;

        let delay = if has_json_content(&response) {
            let body = read_json_body(response).await?;
            estimated_latency(&body).unwrap_or(interval)
        } else {
            interval
        };
        Ok((location, delay))
    }

    async fn read_status(&self, location: &str) -> Result<OperationStatus, ApiError> {
        let request = self.executor.build_request(HttpMethod::Get, location, None)?;
        let response = self.executor.send_api_request(request).await?;
        let body = read_json_body(response).await?;
        serde_json::from_value(body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    /// Fail now if sleeping for `next_wait` would overrun the time bound.
    fn check_deadline(&self, location: &str, attempts: u32, started: Instant, next_wait: Duration) -> Result<(), ApiError> {
        let elapsed = started.elapsed();
        match self.limit.max_duration {
            Some(max) if elapsed + next_wait > max => Err(ApiError::PollLimitExceeded {
                location: location.to_string(),
                attempts,
                elapsed,
            }),
            _ => Ok(()),
        }
    }

    async fn guard<R>(&self, fut: impl Future<Output = Result<R, ApiError>>) -> Result<R, ApiError> {
        match &self.cancellation {
            None => fut.await,
            Some(cancellation) => {
                tokio::select! {
                    biased;
                    () = cancellation.cancelled() => {
                        tracing::debug!(path = %self.path, "operation cancelled");
                        Err(ApiError::Cancelled)
                    }
                    result = fut => result,
                }
            }
        }
    }
}

fn estimated_latency(body: &Value) -> Option<Duration> {
    let value = body.get("estimatedLatency")?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|ms| *ms >= 0.0).map(|ms| ms as u64))
        .map(Duration::from_millis)
}

impl<T: Transport> RequestExecutor<T> {
    /// Start a long-running operation with the client-wide poll bound.
    pub fn operation(&self, method: HttpMethod, path: &str, payload: Option<Value>) -> AsyncOperation<'_, T> {
        AsyncOperation::new(self, method, path, payload)
    }

    /// Submit a long-running operation and wait for it to complete.
    pub async fn execute_async(&self, method: HttpMethod, path: &str, payload: Option<Value>) -> Result<OperationStatus, ApiError> {
        self.operation(method, path, payload).run().await
    }
}
