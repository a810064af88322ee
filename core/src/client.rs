//! Endpoint facade for the Cloud Targets API.
//!
//! # Design
//! `TargetsClient` owns one `RequestExecutor` and therefore one immutable
//! `ClientConfig`. Every method only resolves its path, picks a method and
//! an optional payload, then hands over to the executor (single exchange)
//! or to the poller (operations answered with 202 Accepted).

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::executor::RequestExecutor;
use crate::http::HttpMethod;
use crate::poller::{AsyncOperation, Cancellation};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{NewCollection, NewTarget, OperationStatus, Target, TargetCollection};

const PATH_COLLECTIONS: &str = "/cloudrecognition/targetCollection";

fn collection_path(tc_id: &str) -> String {
    format!("{PATH_COLLECTIONS}/{tc_id}")
}

fn targets_path(tc_id: &str) -> String {
    format!("{PATH_COLLECTIONS}/{tc_id}/target")
}

fn bulk_targets_path(tc_id: &str) -> String {
    format!("{PATH_COLLECTIONS}/{tc_id}/targets")
}

fn target_path(tc_id: &str, target_id: &str) -> String {
    format!("{PATH_COLLECTIONS}/{tc_id}/target/{target_id}")
}

fn generation_path(tc_id: &str) -> String {
    format!("{PATH_COLLECTIONS}/{tc_id}/generation/cloudarchive")
}

/// Client for target collections and the target images inside them.
pub struct TargetsClient<T = ReqwestTransport> {
    executor: RequestExecutor<T>,
}

impl TargetsClient<ReqwestTransport> {
    /// Build a client that talks HTTPS through `reqwest`.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> TargetsClient<T> {
    pub fn with_transport(transport: T, config: ClientConfig) -> Self {
        Self {
            executor: RequestExecutor::new(transport, Arc::new(config)),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        self.executor.config()
    }

    pub fn executor(&self) -> &RequestExecutor<T> {
        &self.executor
    }

    /// Create an empty collection. The returned `id` addresses it from now on.
    pub async fn create_collection(&self, name: &str) -> Result<TargetCollection, ApiError> {
        let payload = to_payload(&NewCollection { name: name.to_string() })?;
        self.fetch(HttpMethod::Post, PATH_COLLECTIONS, Some(payload)).await
    }

    pub async fn list_collections(&self) -> Result<Vec<TargetCollection>, ApiError> {
        self.fetch(HttpMethod::Get, PATH_COLLECTIONS, None).await
    }

    pub async fn get_collection(&self, tc_id: &str) -> Result<TargetCollection, ApiError> {
        self.fetch(HttpMethod::Get, &collection_path(tc_id), None).await
    }

    pub async fn rename_collection(&self, tc_id: &str, name: &str) -> Result<TargetCollection, ApiError> {
        let payload = to_payload(&NewCollection { name: name.to_string() })?;
        self.fetch(HttpMethod::Post, &collection_path(tc_id), Some(payload)).await
    }

    /// Delete a collection with all of its targets. This cannot be undone.
    pub async fn delete_collection(&self, tc_id: &str) -> Result<(), ApiError> {
        self.executor
            .execute(HttpMethod::Delete, &collection_path(tc_id), None)
            .await
            .map(drop)
    }

    pub async fn list_targets(&self, tc_id: &str) -> Result<Vec<Target>, ApiError> {
        self.fetch(HttpMethod::Get, &targets_path(tc_id), None).await
    }

    /// Add one target. Changes only go live after `generate_collection`.
    pub async fn add_target(&self, tc_id: &str, target: &NewTarget) -> Result<Target, ApiError> {
        let payload = to_payload(target)?;
        self.fetch(HttpMethod::Post, &targets_path(tc_id), Some(payload)).await
    }

    /// Add several targets at once; completes asynchronously on the server.
    pub async fn add_targets(&self, tc_id: &str, targets: &[NewTarget]) -> Result<OperationStatus, ApiError> {
        self.add_targets_operation(tc_id, targets)?.run().await
    }

    /// Like `add_targets`, but returns the operation so the caller can attach
    /// a `PollLimit` or a `Cancellation` before running it.
    pub fn add_targets_operation(&self, tc_id: &str, targets: &[NewTarget]) -> Result<AsyncOperation<'_, T>, ApiError> {
        let payload = to_payload(targets)?;
        Ok(self
            .executor
            .operation(HttpMethod::Post, &bulk_targets_path(tc_id), Some(payload)))
    }

    pub async fn get_target(&self, tc_id: &str, target_id: &str) -> Result<Target, ApiError> {
        self.fetch(HttpMethod::Get, &target_path(tc_id, target_id), None).await
    }

    /// Update properties of an existing target, e.g. `{"physicalHeight": 200}`.
    pub async fn update_target(&self, tc_id: &str, target_id: &str, properties: &Value) -> Result<Target, ApiError> {
        self.fetch(HttpMethod::Post, &target_path(tc_id, target_id), Some(properties.clone()))
            .await
    }

    pub async fn delete_target(&self, tc_id: &str, target_id: &str) -> Result<(), ApiError> {
        self.executor
            .execute(HttpMethod::Delete, &target_path(tc_id, target_id), None)
            .await
            .map(drop)
    }

    /// Publish pending target changes as a cloud archive.
    pub async fn generate_collection(&self, tc_id: &str) -> Result<OperationStatus, ApiError> {
        self.generate_collection_operation(tc_id).run().await
    }

    pub fn generate_collection_operation(&self, tc_id: &str) -> AsyncOperation<'_, T> {
        self.executor
            .operation(HttpMethod::Post, &generation_path(tc_id), None)
    }

    /// `generate_collection` that gives up when `cancellation` fires.
    pub async fn generate_collection_with(&self, tc_id: &str, cancellation: Cancellation) -> Result<OperationStatus, ApiError> {
        self.generate_collection_operation(tc_id)
            .with_cancellation(cancellation)
            .run()
            .await
    }

    async fn fetch<R: DeserializeOwned>(&self, method: HttpMethod, path: &str, payload: Option<Value>) -> Result<R, ApiError> {
        let body = self
            .executor
            .execute(method, path, payload)
            .await?
            .ok_or_else(|| ApiError::Deserialization(format!("{method} {path} returned no JSON body")))?;
        serde_json::from_value(body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }
}

fn to_payload<P: Serialize + ?Sized>(payload: &P) -> Result<Value, ApiError> {
    serde_json::to_value(payload).map_err(ApiError::Serialization)
}
