use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const OPERATIONS_PATH: &str = "/cloudrecognition/operation";

/// Behaviour knobs for the emulated service.
#[derive(Clone, Debug)]
pub struct MockConfig {
    pub token: String,
    /// Status polls answered with `PROCESSING` before an operation completes.
    pub polls_until_complete: u32,
    /// `estimatedLatency` announced when bulk target additions are accepted.
    pub estimated_latency_ms: Option<u64>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            token: "mock-token".to_string(),
            polls_until_complete: 2,
            estimated_latency_ms: Some(10),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: Uuid,
    pub name: String,
    pub image_url: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetCollection {
    pub id: Uuid,
    pub name: String,
    #[serde(skip)]
    pub targets: HashMap<Uuid, Target>,
}

#[derive(Deserialize)]
pub struct NewCollection {
    pub name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTarget {
    pub name: String,
    pub image_url: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

struct Operation {
    remaining_polls: u32,
    result: Value,
}

#[derive(Default)]
pub struct Store {
    collections: HashMap<Uuid, TargetCollection>,
    operations: HashMap<Uuid, Operation>,
}

#[derive(Clone)]
pub struct AppState {
    config: Arc<MockConfig>,
    store: Arc<RwLock<Store>>,
}

/// Error body in the shape the real service uses.
pub struct ServiceFailure {
    status: StatusCode,
    message: String,
    reason: &'static str,
}

impl ServiceFailure {
    fn new(status: StatusCode, reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            reason,
        }
    }

    fn collection_not_found(id: Uuid) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("target collection {id} not found"))
    }

    fn target_not_found(id: Uuid) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("target {id} not found"))
    }
}

impl IntoResponse for ServiceFailure {
    fn into_response(self) -> Response {
        let body = json!({
            "message": self.message,
            "code": self.status.as_u16(),
            "reason": self.reason,
        });
        (self.status, Json(body)).into_response()
    }
}

pub fn app() -> Router {
    app_with(MockConfig::default())
}

pub fn app_with(config: MockConfig) -> Router {
    let state = AppState {
        config: Arc::new(config),
        store: Arc::new(RwLock::new(Store::default())),
    };
    Router::new()
        .route(
            "/cloudrecognition/targetCollection",
            get(list_collections).post(create_collection),
        )
        .route(
            "/cloudrecognition/targetCollection/{tc}",
            get(get_collection).post(rename_collection).delete(delete_collection),
        )
        .route(
            "/cloudrecognition/targetCollection/{tc}/target",
            get(list_targets).post(add_target),
        )
        .route("/cloudrecognition/targetCollection/{tc}/targets", post(add_targets))
        .route(
            "/cloudrecognition/targetCollection/{tc}/target/{target}",
            get(get_target).post(update_target).delete(delete_target),
        )
        .route(
            "/cloudrecognition/targetCollection/{tc}/generation/cloudarchive",
            post(generate_collection),
        )
        .route("/cloudrecognition/operation/{op}", get(operation_status))
        .layer(middleware::from_fn_with_state(state.clone(), require_credentials))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, config: MockConfig) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(config)).await
}

async fn require_credentials(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ServiceFailure> {
    let token = headers.get("x-token").and_then(|v| v.to_str().ok());
    if token != Some(state.config.token.as_str()) {
        tracing::debug!(uri = %request.uri(), "rejected request with bad token");
        return Err(ServiceFailure::new(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "missing or invalid X-Token header",
        ));
    }
    if headers.get("x-version").is_none() {
        return Err(ServiceFailure::new(
            StatusCode::BAD_REQUEST,
            "MISSING_VERSION",
            "missing X-Version header",
        ));
    }
    Ok(next.run(request).await)
}

fn validate_name(name: &str) -> Result<(), ServiceFailure> {
    if name.trim().is_empty() {
        return Err(ServiceFailure::new(
            StatusCode::BAD_REQUEST,
            "INVALID_NAME",
            "name must not be empty",
        ));
    }
    Ok(())
}

/// Queue an operation and build its 202 response.
fn accept_operation(store: &mut Store, config: &MockConfig, result: Value, latency: Option<u64>) -> Response {
    let id = Uuid::new_v4();
    let mut result = result;
    result["status"] = json!("COMPLETED");
    result["id"] = json!(id);
    store.operations.insert(
        id,
        Operation {
            remaining_polls: config.polls_until_complete,
            result,
        },
    );
    let location = format!("{OPERATIONS_PATH}/{id}");
    match latency {
        Some(ms) => (
            StatusCode::ACCEPTED,
            [(header::LOCATION, location)],
            Json(json!({ "estimatedLatency": ms })),
        )
            .into_response(),
        None => (StatusCode::ACCEPTED, [(header::LOCATION, location)]).into_response(),
    }
}

async fn list_collections(State(state): State<AppState>) -> Json<Vec<TargetCollection>> {
    let store = state.store.read().await;
    Json(store.collections.values().cloned().collect())
}

async fn create_collection(
    State(state): State<AppState>,
    Json(input): Json<NewCollection>,
) -> Result<Json<TargetCollection>, ServiceFailure> {
    validate_name(&input.name)?;
    let collection = TargetCollection {
        id: Uuid::new_v4(),
        name: input.name,
        targets: HashMap::new(),
    };
    state
        .store
        .write()
        .await
        .collections
        .insert(collection.id, collection.clone());
    Ok(Json(collection))
}

async fn get_collection(
    State(state): State<AppState>,
    Path(tc): Path<Uuid>,
) -> Result<Json<TargetCollection>, ServiceFailure> {
    let store = state.store.read().await;
    store
        .collections
        .get(&tc)
        .cloned()
        .map(Json)
        .ok_or(ServiceFailure::collection_not_found(tc))
}

async fn rename_collection(
    State(state): State<AppState>,
    Path(tc): Path<Uuid>,
    Json(input): Json<NewCollection>,
) -> Result<Json<TargetCollection>, ServiceFailure> {
    validate_name(&input.name)?;
    let mut store = state.store.write().await;
    let collection = store
        .collections
        .get_mut(&tc)
        .ok_or(ServiceFailure::collection_not_found(tc))?;
    collection.name = input.name;
    Ok(Json(collection.clone()))
}

async fn delete_collection(
    State(state): State<AppState>,
    Path(tc): Path<Uuid>,
) -> Result<StatusCode, ServiceFailure> {
    let mut store = state.store.write().await;
    store
        .collections
        .remove(&tc)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(ServiceFailure::collection_not_found(tc))
}

async fn list_targets(
    State(state): State<AppState>,
    Path(tc): Path<Uuid>,
) -> Result<Json<Vec<Target>>, ServiceFailure> {
    let store = state.store.read().await;
    let collection = store
        .collections
        .get(&tc)
        .ok_or(ServiceFailure::collection_not_found(tc))?;
    Ok(Json(collection.targets.values().cloned().collect()))
}

fn insert_target(collection: &mut TargetCollection, input: NewTarget) -> Result<Target, ServiceFailure> {
    validate_name(&input.name)?;
    let target = Target {
        id: Uuid::new_v4(),
        name: input.name,
        image_url: input.image_url,
        properties: input.properties,
    };
    collection.targets.insert(target.id, target.clone());
    Ok(target)
}

async fn add_target(
    State(state): State<AppState>,
    Path(tc): Path<Uuid>,
    Json(input): Json<NewTarget>,
) -> Result<Json<Target>, ServiceFailure> {
    let mut store = state.store.write().await;
    let collection = store
        .collections
        .get_mut(&tc)
        .ok_or(ServiceFailure::collection_not_found(tc))?;
    insert_target(collection, input).map(Json)
}

async fn add_targets(
    State(state): State<AppState>,
    Path(tc): Path<Uuid>,
    Json(input): Json<Vec<NewTarget>>,
) -> Result<Response, ServiceFailure> {
    let mut store = state.store.write().await;
    let collection = store
        .collections
        .get_mut(&tc)
        .ok_or(ServiceFailure::collection_not_found(tc))?;
    let mut ids = Vec::with_capacity(input.len());
    for target in input {
        ids.push(insert_target(collection, target)?.id);
    }
    let result = json!({ "tcId": tc, "generationId": Uuid::new_v4(), "targetIds": ids });
    Ok(accept_operation(
        &mut store,
        &state.config,
        result,
        state.config.estimated_latency_ms,
    ))
}

async fn get_target(
    State(state): State<AppState>,
    Path((tc, target)): Path<(Uuid, Uuid)>,
) -> Result<Json<Target>, ServiceFailure> {
    let store = state.store.read().await;
    let collection = store
        .collections
        .get(&tc)
        .ok_or(ServiceFailure::collection_not_found(tc))?;
    collection
        .targets
        .get(&target)
        .cloned()
        .map(Json)
        .ok_or(ServiceFailure::target_not_found(target))
}

async fn update_target(
    State(state): State<AppState>,
    Path((tc, target)): Path<(Uuid, Uuid)>,
    Json(input): Json<Map<String, Value>>,
) -> Result<Json<Target>, ServiceFailure> {
    let mut store = state.store.write().await;
    let collection = store
        .collections
        .get_mut(&tc)
        .ok_or(ServiceFailure::collection_not_found(tc))?;
    let existing = collection
        .targets
        .get_mut(&target)
        .ok_or(ServiceFailure::target_not_found(target))?;
    for (key, value) in input {
        match (key.as_str(), value) {
            ("name", Value::String(name)) => existing.name = name,
            ("imageUrl", Value::String(url)) => existing.image_url = url,
            ("id", _) => {}
            (_, value) => {
                existing.properties.insert(key, value);
            }
        }
    }
    Ok(Json(existing.clone()))
}

async fn delete_target(
    State(state): State<AppState>,
    Path((tc, target)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ServiceFailure> {
    let mut store = state.store.write().await;
    let collection = store
        .collections
        .get_mut(&tc)
        .ok_or(ServiceFailure::collection_not_found(tc))?;
    collection
        .targets
        .remove(&target)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or(ServiceFailure::target_not_found(target))
}

async fn generate_collection(
    State(state): State<AppState>,
    Path(tc): Path<Uuid>,
) -> Result<Response, ServiceFailure> {
    let mut store = state.store.write().await;
    let targets = store
        .collections
        .get(&tc)
        .map(|c| c.targets.len())
        .ok_or(ServiceFailure::collection_not_found(tc))?;
    let result = json!({ "tcId": tc, "targetCount": targets });
    // No latency hint here: clients fall back to their poll interval.
    Ok(accept_operation(&mut store, &state.config, result, None))
}

async fn operation_status(
    State(state): State<AppState>,
    Path(op): Path<Uuid>,
) -> Result<Json<Value>, ServiceFailure> {
    let mut store = state.store.write().await;
    let operation = store.operations.get_mut(&op).ok_or(ServiceFailure::new(
        StatusCode::NOT_FOUND,
        "NOT_FOUND",
        format!("operation {op} not found"),
    ))?;
    if operation.remaining_polls > 0 {
        operation.remaining_polls -= 1;
        return Ok(Json(json!({ "status": "PROCESSING", "id": op })));
    }
    // A completed operation is reported once, then forgotten.
    let finished = store.operations.remove(&op).map(|o| o.result).unwrap_or_default();
    Ok(Json(finished))
}
