//! Walks through a typical collection lifecycle against a live service:
//! create, rename, add targets, publish, delete.
//!
//! Configure with `TARGETS_API_TOKEN` and friends (see `ClientConfig::from_env`);
//! point `TARGETS_API_URL` at a running `mock-server` to try it locally.

use targets_core::{ApiError, ClientConfig, NewTarget, TargetsClient};
use tracing_subscriber::EnvFilter;

const EXAMPLE_IMAGE_URLS: [&str; 2] = [
    "http://s3-eu-west-1.amazonaws.com/web-api-hosting/examples_data/surfer.jpeg",
    "http://s3-eu-west-1.amazonaws.com/web-api-hosting/examples_data/biker.jpeg",
];

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = TargetsClient::new(ClientConfig::from_env()?)?;

    let collection = client.create_collection("targetCollection").await?;
    tracing::info!(id = %collection.id, "created target collection");

    let renamed = client
        .rename_collection(&collection.id, "renamed targetCollection")
        .await?;
    tracing::info!(id = %renamed.id, name = %renamed.name, "renamed target collection");

    let target = client
        .add_target(&collection.id, &NewTarget::new("myTarget0", EXAMPLE_IMAGE_URLS[0]))
        .await?;
    tracing::info!(id = %target.id, "created target");

    let status = client
        .add_targets(&collection.id, &[NewTarget::new("myTarget1", EXAMPLE_IMAGE_URLS[1])])
        .await?;
    tracing::info!(status = %status.status, generation = ?status.get("generationId"), "created targets");

    let archive = client.generate_collection(&collection.id).await?;
    tracing::info!(archive = ?archive.get("id"), "generated cloud archive");

    client.delete_collection(&collection.id).await?;
    tracing::info!(id = %collection.id, "removed target collection");
    Ok(())
}
