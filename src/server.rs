//!
//! car_doctor HTTP server
//! ----------------------
//! Axum router for the booking API.
//!
//! Responsibilities:
//! - Service catalog reads (`/services`, `/services/{id}`).
//! - Cart management (`/cart`, `/cart/{key}`): insert, list by owner email, status update, delete.
//! - Session issue/clear (`/jwt`, `/logout`) with the token carried in an HTTP-only cookie.
//! - Session gate on the cart listing only; every other route is open.
//!
//! Each handler performs exactly one store call. The store handle lives in `AppState`
//! and is released when the server shuts down.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Extension, FromRequest, Path, State};
use axum::handler::Handler;
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_mw, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::security::{self, CookiePolicy, Identity, TokenKeys};
use crate::settings::{Settings, StoreBackend};
use crate::storage::memory::MemoryStore;
use crate::storage::mongo::MongoStore;
use crate::storage::{parse_object_id, DeleteOutcome, InsertOutcome, JsonDocument, DocumentStore, SharedStore, UpdateOutcome, SERVICE_DETAIL_FIELDS};

pub mod middleware;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub keys: TokenKeys,
    pub cookie: CookiePolicy,
    pub cart_owner_check: bool,
}

impl AppState {
    pub fn new(store: SharedStore, settings: &Settings) -> Self {
        Self {
            store,
            keys: TokenKeys::new(&settings.token_secret),
            cookie: settings.cookie,
            cart_owner_check: settings.cart_owner_check,
        }
    }
}

/// Credentialed CORS for the listed front-end origins. Unparseable origins are skipped.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => { warn!(origin = %o, "ignoring invalid CORS origin"); None }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

/// Build the full router. Tests drive this directly with an in-memory store.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let session_gate = axum_mw::from_fn_with_state(state.clone(), middleware::require_session);
    Router::new()
        .route("/", get(|| async { "Car doctor server is running fine" }))
        .route("/services", get(list_services))
        .route("/services/{id}", get(service_detail))
        .route("/jwt", post(issue_jwt))
        .route("/logout", post(logout))
        .route("/cart", post(add_to_cart))
        // one segment: owner email for GET, booking id for PATCH/DELETE
        .route(
            "/cart/{key}",
            get(cart_by_email.layer(session_gate)).patch(update_cart_status).delete(remove_from_cart),
        )
        .layer(axum_mw::from_fn(middleware::log_request))
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Open the configured store, serve until ctrl-c/SIGTERM, then release the store.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let store: SharedStore = match settings.backend {
        StoreBackend::Mongo => {
            let uri = settings.mongo_uri.as_deref().context("mongo backend selected without a connection string")?;
            let store = MongoStore::connect(uri, &settings.db_name)
                .await
                .with_context(|| format!("While creating MongoDB client for database {}", settings.db_name))?;
            store.ping().await.context("While pinging MongoDB deployment")?;
            Arc::new(store)
        }
        StoreBackend::Memory => {
            let store = match &settings.seed_path {
                Some(path) => MemoryStore::from_seed_file(path)?,
                None => MemoryStore::new(),
            };
            warn!("using in-memory store; data is lost on exit");
            Arc::new(store)
        }
    };

    let app = router(AppState::new(store.clone(), &settings), &settings.cors_origins);
    let addr = settings.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("While binding {}", addr))?;
    info!("Server is running on port: {}", settings.port);
    serve(listener, app, store, shutdown_signal()).await
}

/// Serve until `signal` resolves. The store is released whether serving ends cleanly or not.
async fn serve<F>(listener: tokio::net::TcpListener, app: Router, store: SharedStore, signal: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let served = axum::serve(listener, app).with_graceful_shutdown(signal).await;
    store.shutdown().await;
    info!("server stopped");
    served.context("While serving HTTP")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await { warn!("ctrl-c handler failed: {e}"); }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => { s.recv().await; }
            Err(e) => { warn!("SIGTERM handler failed: {e}"); std::future::pending::<()>().await }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

/// `axum::Json` whose rejections render as `AppError` (400 `invalid_body`).
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
struct JsonBody<T>(T);

async fn list_services(State(state): State<AppState>) -> AppResult<Json<Vec<JsonDocument>>> {
    Ok(Json(state.store.find_services().await?))
}

/// `null` when no service has this id.
async fn service_detail(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<Option<JsonDocument>>> {
    let id = parse_object_id(&id)?;
    Ok(Json(state.store.find_service(id, &SERVICE_DETAIL_FIELDS).await?))
}

async fn issue_jwt(State(state): State<AppState>, JsonBody(identity): JsonBody<JsonValue>) -> AppResult<impl IntoResponse> {
    let token = security::issue_token(&state.keys, identity, chrono::Utc::now().timestamp())?;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, security::session_cookie(&token, &state.cookie)?);
    Ok((headers, Json(json!({ "success": true }))))
}

async fn logout(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, security::clear_session_cookie(&state.cookie)?);
    Ok((headers, Json(json!({ "success": true }))))
}

async fn cart_by_email(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(email): Path<String>,
) -> AppResult<Json<Vec<JsonDocument>>> {
    if state.cart_owner_check && identity.email() != Some(email.as_str()) {
        warn!(requested = %email, session = ?identity.email(), "cart owner mismatch");
        return Err(AppError::forbidden("forbidden", "Forbidden access"));
    }
    Ok(Json(state.store.find_bookings(&email).await?))
}

async fn add_to_cart(State(state): State<AppState>, JsonBody(booking): JsonBody<JsonDocument>) -> AppResult<Json<InsertOutcome>> {
    Ok(Json(state.store.insert_booking(booking).await?))
}

async fn remove_from_cart(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<DeleteOutcome>> {
    let id = parse_object_id(&id)?;
    Ok(Json(state.store.delete_booking(id).await?))
}

#[derive(Debug, Deserialize)]
struct StatusPatch {
    /// Any JSON value; an absent field clears the status to null.
    #[serde(default)]
    status: JsonValue,
}

async fn update_cart_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<StatusPatch>,
) -> AppResult<Json<UpdateOutcome>> {
    let id = parse_object_id(&id)?;
    info!(booking = %id, status = %patch.status, "updating cart status");
    Ok(Json(state.store.set_booking_status(id, patch.status).await?))
}
