// Contract Primer - Web Server
// REST API over the demo contracts (Axum)

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use contract_primer::{
    load_chain, save_chain, setup_database, Address, Chain, Config, ContractError, Event,
    SystemClock, Uint, ValueStore,
};

/// Shared application state
///
/// One lock around chain + connection: calls are serialized like transactions.
#[derive(Clone)]
struct AppState {
    inner: Arc<Mutex<Node>>,
}

struct Node {
    chain: Chain,
    db: Connection,
}

impl Node {
    /// Run a mutating call and persist it; on any failure the call is undone
    fn apply<T, F>(&mut self, call: F) -> Result<T, ContractError>
    where
        F: FnOnce(&mut Chain) -> Result<T, ContractError>,
    {
        let checkpoint = self.chain.checkpoint();
        let result = call(&mut self.chain);
        let result = match result {
            Ok(output) => save_chain(&self.db, &mut self.chain).map(|_| output),
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.chain.rollback(checkpoint);
        }
        result
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Setter value: a decimal string (full u128 range) or a plain JSON number
#[derive(Deserialize)]
#[serde(untagged)]
enum ValueInput {
    Text(String),
    Number(u64),
}

/// Request body for setters
#[derive(Deserialize)]
struct SetRequest {
    value: ValueInput,
}

#[derive(Serialize)]
struct ValueResponse {
    value: String,
}

#[derive(Serialize)]
struct TimestampedResponse {
    value: String,
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct InstanceResponse {
    index: usize,
    address: Address,
    value: String,
}

#[derive(Serialize)]
struct DeployResponse {
    index: usize,
    address: Address,
}

#[derive(Serialize)]
struct GreetingResponse {
    greeting: String,
}

fn value_response(value: Uint) -> ValueResponse {
    ValueResponse {
        value: value.to_string(),
    }
}

fn parse_value(req: &SetRequest) -> Result<Uint, Response> {
    match &req.value {
        ValueInput::Number(n) => Ok(Uint::from(*n)),
        ValueInput::Text(text) => text.parse::<Uint>().map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::err(format!("invalid value: {}", text))),
            )
                .into_response()
        }),
    }
}

fn error_response(err: ContractError) -> Response {
    let status = match err {
        ContractError::IndexOutOfBounds { .. } => StatusCode::NOT_FOUND,
        ref e if e.is_caller_error() => StatusCode::BAD_REQUEST,
        ContractError::StaleState { .. } => {
            warn!("Rejected write: {}", err);
            StatusCode::CONFLICT
        }
        _ => {
            error!("Internal error: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ApiResponse::<()>::err(err.to_string()))).into_response()
}

fn lock(state: &AppState) -> std::sync::MutexGuard<'_, Node> {
    state.inner.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/storage - SimpleStorage.get
async fn storage_get(State(state): State<AppState>) -> Response {
    let node = lock(&state);
    Json(ApiResponse::ok(value_response(node.chain.store_get()))).into_response()
}

/// POST /api/storage - SimpleStorage.set
async fn storage_set(State(state): State<AppState>, Json(req): Json<SetRequest>) -> Response {
    let value = match parse_value(&req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut node = lock(&state);
    match node.apply(|chain| {
        chain.store_set(value);
        Ok(())
    }) {
        Ok(()) => Json(ApiResponse::ok(value_response(value))).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/timestamped - TimestampedStorage.get + last write time
async fn timestamped_get(State(state): State<AppState>) -> Response {
    let node = lock(&state);
    Json(ApiResponse::ok(TimestampedResponse {
        value: node.chain.stamped_get().to_string(),
        last_updated: node.chain.stamped_last_updated(),
    }))
    .into_response()
}

/// POST /api/timestamped - TimestampedStorage.set
async fn timestamped_set(State(state): State<AppState>, Json(req): Json<SetRequest>) -> Response {
    let value = match parse_value(&req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut node = lock(&state);
    match node.apply(|chain| {
        chain.stamped_set(value);
        Ok(chain.stamped_last_updated())
    }) {
        Ok(last_updated) => Json(ApiResponse::ok(TimestampedResponse {
            value: value.to_string(),
            last_updated,
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/factory - list children
async fn factory_list(State(state): State<AppState>) -> Response {
    let node = lock(&state);
    let instances: Vec<InstanceResponse> = node
        .chain
        .factory()
        .instances()
        .iter()
        .enumerate()
        .map(|(index, child)| InstanceResponse {
            index,
            address: child.address,
            value: child.get().to_string(),
        })
        .collect();
    Json(ApiResponse::ok(instances)).into_response()
}

/// POST /api/factory/deploy - StorageFactory.deployInstance
async fn factory_deploy(State(state): State<AppState>) -> Response {
    let mut node = lock(&state);
    match node.apply(|chain| {
        let address = chain.factory_deploy();
        Ok(DeployResponse {
            index: chain.factory_len() - 1,
            address,
        })
    }) {
        Ok(deployed) => (StatusCode::CREATED, Json(ApiResponse::ok(deployed))).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/factory/:index - StorageFactory.getAt
async fn factory_get_at(State(state): State<AppState>, Path(index): Path<usize>) -> Response {
    let node = lock(&state);
    match node.chain.factory_get_at(index) {
        Ok(value) => Json(ApiResponse::ok(value_response(value))).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/factory/:index - StorageFactory.setAt
async fn factory_set_at(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Json(req): Json<SetRequest>,
) -> Response {
    let value = match parse_value(&req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut node = lock(&state);
    match node.apply(|chain| chain.factory_set_at(index, value)) {
        Ok(()) => Json(ApiResponse::ok(value_response(value))).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/greeting - Child.combinedGreeting
async fn greeting(State(state): State<AppState>) -> Response {
    let node = lock(&state);
    Json(ApiResponse::ok(GreetingResponse {
        greeting: node.chain.greeting(),
    }))
    .into_response()
}

/// GET /api/events - audit trail
async fn events(State(state): State<AppState>) -> Response {
    let node = lock(&state);
    let events: Vec<Event> = node.chain.events().to_vec();
    Json(ApiResponse::ok(events)).into_response()
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/storage", get(storage_get).post(storage_set))
        .route("/timestamped", get(timestamped_get).post(timestamped_set))
        .route("/factory", get(factory_list))
        .route("/factory/deploy", post(factory_deploy))
        .route("/factory/:index", get(factory_get_at).post(factory_set_at))
        .route("/greeting", get(greeting))
        .route("/events", get(events))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("Failed to load config")?;

    let db = Connection::open(&config.db_path)
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    setup_database(&db).context("Failed to set up database")?;
    info!(db = %config.db_path.display(), "database opened");

    let clock = Arc::new(SystemClock);
    let mut chain = match load_chain(&db, clock.clone()).context("Failed to load chain")? {
        Some(chain) => chain,
        None => Chain::new(clock),
    }
    .with_actor(config.actor.clone());
    save_chain(&db, &mut chain).context("Failed to save initial chain")?;

    let state = AppState {
        inner: Arc::new(Mutex::new(Node { chain, db })),
    };

    let listener = tokio::net::TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server_addr))?;

    info!(addr = %config.server_addr, "server running");
    println!("🚀 Contract Primer running on http://{}/api", config.server_addr);

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
