use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, head},
    Router,
};
use hyper::Server;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

use crate::dispatch::ActionDispatcher;
use crate::error::SyncError;
use crate::fetch::Trello;
use crate::schema::data::{RecipeCard, RecipeDetails, Tag};
use crate::storage::{Collection, DocumentStore};

/// Tag name that marks a recipe as public on `/recipe/published`.
pub const PUBLISHED_TAG: &str = "published";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub trello: Arc<Trello>,
    pub dispatcher: ActionDispatcher,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, trello: Arc<Trello>) -> Self {
        Self {
            dispatcher: ActionDispatcher::new(store.clone()),
            store,
            trello,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// JSON error body: `{ "kind": ..., "message": ... }`.
pub struct ApiError(SyncError);

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            SyncError::DocumentNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        let body = json!({ "kind": self.0.kind(), "message": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

async fn status() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "recipe_sync",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn all_tags(State(state): State<AppState>) -> ApiResult<Vec<Tag>> {
    Ok(Json(Collection::<Tag>::new(state.store.as_ref()).read_all().await?))
}

async fn all_recipes(State(state): State<AppState>) -> ApiResult<Vec<RecipeCard>> {
    Ok(Json(Collection::<RecipeCard>::new(state.store.as_ref()).read_all().await?))
}

async fn published_recipes(State(state): State<AppState>) -> ApiResult<Vec<RecipeCard>> {
    let recipes = Collection::<RecipeCard>::new(state.store.as_ref()).read_all().await?;
    Ok(Json(
        recipes
            .into_iter()
            .filter(|recipe| recipe.has_tag_named(PUBLISHED_TAG))
            .collect(),
    ))
}

async fn recipe_details(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<RecipeDetails> {
    Ok(Json(
        Collection::<RecipeDetails>::new(state.store.as_ref())
            .require_one(&id)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    query: String,
}

async fn search_recipes(State(state): State<AppState>, Query(params): Query<SearchParams>) -> ApiResult<Vec<RecipeCard>> {
    Ok(Json(state.trello.search(&params.query).await?))
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// The board checks the callback URL with a HEAD before registering it.
async fn webhook_probe() -> StatusCode {
    StatusCode::OK
}

/// Always acknowledges; failures are logged and never sent back to the board.
async fn webhook(State(state): State<AppState>, body: Bytes) -> Json<Value> {
    match serde_json::from_slice::<Value>(&body) {
        Ok(mut payload) => match payload.get_mut("action").map(Value::take) {
            Some(action) => {
                if let Err(e) = state.dispatcher.handle_value(action).await {
                    error!("Webhook action failed: {}", e);
                } else {
                    debug!("Webhook action applied");
                }
            }
            None => error!("Webhook payload has no action"),
        },
        Err(e) => error!("Webhook payload is not JSON: {}", e),
    }
    Json(json!({ "success": true }))
}

/// Read API, webhook, and metrics routes.
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", head(webhook_probe).post(webhook))
        .route("/status", get(status))
        .route("/tag/all", get(all_tags))
        .route("/recipe/all", get(all_recipes))
        .route("/recipe/published", get(published_recipes))
        .route("/recipe/details/:id", get(recipe_details))
        .route("/recipe/search", get(search_recipes))
        .route("/metrics", get(render_metrics))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

/// Serves until Ctrl+C or SIGTERM.
pub async fn start_server(state: AppState, port: u16) -> crate::error::Result<()> {
    let app = create_server(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{port}");
    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| SyncError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
