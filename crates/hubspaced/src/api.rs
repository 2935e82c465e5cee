use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::bridge::Bridge;
use crate::bridge::BridgeError;
use crate::command::SendCommand;
use crate::entity::EntityError;
use crate::entity::Service;
use crate::vendor::VendorClient;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
    entities: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Optional arguments for entity services
#[derive(Debug, Default, Deserialize)]
struct ServiceArgs {
    #[serde(default)]
    percentage: Option<u8>,
    #[serde(default)]
    brightness: Option<u8>,
}

/// Shared application state
struct AppState<C: VendorClient> {
    version: &'static str,
    bridge: Bridge<C>,
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = match &self {
            BridgeError::UnknownEntity(_) => StatusCode::NOT_FOUND,
            BridgeError::Entity(EntityError::Unsupported { .. })
            | BridgeError::Entity(EntityError::NotOwned { .. })
            | BridgeError::Entity(EntityError::InvalidArgument(_)) => StatusCode::BAD_REQUEST,
            BridgeError::Entity(EntityError::Vendor(_)) => StatusCode::BAD_GATEWAY,
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info<C: VendorClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
            entities: state.bridge.snapshot().await.len(),
        }),
    )
}

/// Handler for GET /v1/entities
#[tracing::instrument(skip(state))]
async fn list_entities<C: VendorClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
) -> impl IntoResponse {
    Json(state.bridge.snapshot().await)
}

/// Handler for GET /v1/entities/:entity_id
#[tracing::instrument(skip(state))]
async fn get_entity<C: VendorClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Path(entity_id): Path<String>,
) -> Result<impl IntoResponse, BridgeError> {
    state
        .bridge
        .entity(&entity_id)
        .await
        .map(Json)
        .ok_or(BridgeError::UnknownEntity(entity_id))
}

/// Handler for POST /v1/send_command
///
/// Accepted rather than OK: the write went out but state is only re-read on
/// the next poll.
#[tracing::instrument(skip(state))]
async fn send_command<C: VendorClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Json(cmd): Json<SendCommand>,
) -> impl IntoResponse {
    let report = state.bridge.send_command(&cmd).await;
    (StatusCode::ACCEPTED, Json(report))
}

/// Handler for POST /v1/entities/:entity_id/:service
#[tracing::instrument(skip(state, args))]
async fn call_service<C: VendorClient + 'static>(
    State(state): State<Arc<AppState<C>>>,
    Path((entity_id, service)): Path<(String, String)>,
    args: Option<Json<ServiceArgs>>,
) -> Result<Response, BridgeError> {
    let args = args.map(|Json(a)| a).unwrap_or_default();
    let service = match service.as_str() {
        "turn_on" => Service::TurnOn {
            percentage: args.percentage,
            brightness: args.brightness,
        },
        "turn_off" => Service::TurnOff,
        "lock" => Service::Lock,
        "unlock" => Service::Unlock,
        other => {
            return Ok((
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Unknown service: {}", other),
                }),
            )
                .into_response());
        }
    };

    let snapshot = state.bridge.call_service(&entity_id, &service).await?;
    Ok(Json(snapshot).into_response())
}

/// Create the API router with all endpoints
fn create_router<C: VendorClient + 'static>(state: Arc<AppState<C>>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info::<C>))
        .route("/v1/entities", get(list_entities::<C>))
        .route("/v1/entities/:entity_id", get(get_entity::<C>))
        .route("/v1/entities/:entity_id/:service", post(call_service::<C>))
        .route("/v1/send_command", post(send_command::<C>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Binds to `listen:port` and serves until `shutdown_rx` fires.
pub async fn serve<C: VendorClient + 'static>(
    bridge: Bridge<C>,
    listen: String,
    port: u16,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let version = env!("CARGO_PKG_VERSION");

    let state = Arc::new(AppState { version, bridge });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}
