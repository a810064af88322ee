//! Async client core for the Cloud Targets API.
//!
//! # Overview
//! Callers manage target collections and the target images inside them.
//! Most operations finish in one HTTP exchange; bulk additions and archive
//! generation are accepted with 202 and then polled until the service reports
//! `COMPLETED`.
//!
//! # Design
//! - `Transport` sends one request and returns a raw, unread response.
//!   `ReqwestTransport` is the HTTPS implementation; tests script their own.
//! - `classify` decides success purely by status code and turns failure
//!   bodies into a typed `ApiError`.
//! - `RequestExecutor` runs single-exchange operations; `AsyncOperation`
//!   drives the submit/wait/poll state machine on top of it.
//! - `TargetsClient` is a thin facade mapping each endpoint to a method,
//!   a path and an optional payload.
//! - Configuration is an immutable `ClientConfig` owned by each client; there
//!   is no global state.

pub mod body;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod poller;
pub mod transport;
pub mod types;

#[cfg(test)]
mod test_support;

pub use client::TargetsClient;
pub use config::{ClientConfig, PollLimit, TlsPolicy};
pub use error::ApiError;
pub use executor::RequestExecutor;
pub use http::{HttpMethod, HttpRequest, RawResponse, ResponseBody};
pub use poller::{AsyncOperation, Cancellation, OperationState};
pub use transport::{ReqwestTransport, Transport};
pub use types::{NewCollection, NewTarget, OperationStatus, Target, TargetCollection};
