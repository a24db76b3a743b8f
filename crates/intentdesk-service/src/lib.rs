//! REST front end for the intent desk engine.
//!
//! The service does not authenticate callers. `POST /v1/commands` acts as
//! whatever `caller` the body names, so role checks only hold when every
//! client that can reach the listener is trusted. Bind to loopback or a
//! private network behind an authenticating proxy.

#![deny(unsafe_code)]

pub mod config;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use intentdesk_core::{
    Address, Balance, BindingView, Command, Engine, EngineConfig, ErrorKind, InstantActionView,
    JournalEntry, JournalStorageConfig, OpenIntent, Outcome, ProtocolConfig, ProtocolError, Trade,
    WithdrawRequest,
};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

pub use config::DeskConfig;

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub engine: EngineConfig,
}

impl ServiceConfig {
    /// Combine a config file with CLI overrides.
    pub fn from_parts(
        file: DeskConfig,
        admin: Option<Address>,
        journal_storage: JournalStorageConfig,
    ) -> Self {
        let defaults = EngineConfig::default();
        Self {
            engine: EngineConfig {
                admin: admin.or(file.admin).unwrap_or(defaults.admin),
                protocol: file.protocol,
                journal_storage,
            },
        }
    }
}

/// `--journal-storage` choice before a database url is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JournalStorageMode {
    Auto,
    Memory,
    Postgres,
}

/// Pick the journal backend from the CLI mode and an optional database url.
///
/// A durable journal needs at least one pooled connection; a url passed
/// alongside `memory` is ignored with a warning since nothing would be kept.
pub fn resolve_journal_storage(
    mode: JournalStorageMode,
    database_url: Option<String>,
    max_connections: u32,
) -> Result<JournalStorageConfig, ServiceError> {
    let durable = |database_url: String| {
        if max_connections == 0 {
            return Err(ServiceError::Config(
                "journal pool needs at least one connection".to_string(),
            ));
        }
        Ok(JournalStorageConfig::postgres(database_url, max_connections))
    };

    match (mode, database_url) {
        (JournalStorageMode::Memory, Some(_)) => {
            warn!("database url ignored; journal kept in memory and lost on restart");
            Ok(JournalStorageConfig::Memory)
        }
        (JournalStorageMode::Memory, None) | (JournalStorageMode::Auto, None) => {
            Ok(JournalStorageConfig::Memory)
        }
        (JournalStorageMode::Postgres, None) => Err(ServiceError::Config(
            "journal_storage=postgres requires --journal-database-url or DATABASE_URL".to_string(),
        )),
        (JournalStorageMode::Postgres, Some(url)) | (JournalStorageMode::Auto, Some(url)) => {
            durable(url)
        }
    }
}

/// Whether `addr` keeps the unauthenticated command route off the network.
pub fn is_loopback_only(addr: &SocketAddr) -> bool {
    addr.ip().is_loopback()
}

#[derive(Clone)]
pub struct ServiceState {
    pub engine: Arc<Engine>,
}

impl ServiceState {
    pub async fn bootstrap(config: ServiceConfig) -> Result<Self, ServiceError> {
        let engine = Engine::bootstrap(config.engine).await?;
        Ok(Self::from_engine(engine))
    }

    pub fn from_engine(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/commands", post(submit_command))
        .route(
            "/v1/accounts/:user/collateral/:collateral",
            get(get_account_balance),
        )
        .route("/v1/withdrawals/last-id", get(get_last_withdraw_id))
        .route("/v1/withdrawals/:id", get(get_withdraw))
        .route("/v1/intents/open/:id", get(get_open_intent))
        .route("/v1/trades/:id", get(get_trade))
        .route("/v1/party-a/:user/binding", get(get_binding))
        .route(
            "/v1/party-a/:user/instant-action-mode",
            get(get_instant_action_mode),
        )
        .route("/v1/config/protocol", get(get_protocol_config))
        .route("/v1/journal/entries", get(list_journal_entries))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("core engine error: {0}")]
    Core(#[from] ProtocolError),
    #[error("configuration error: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error(transparent)]
    Core(#[from] ProtocolError),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Pause => StatusCode::LOCKED,
        ErrorKind::Access | ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::State => StatusCode::CONFLICT,
        ErrorKind::Balance | ErrorKind::Collateral => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Journal | ErrorKind::Serialization => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Http { status, message } => (
                status,
                Json(serde_json::json!({ "error": message, "kind": "request" })),
            )
                .into_response(),
            ApiError::Core(err) => {
                let kind = err.kind();
                let status = status_for(kind);
                if status.is_server_error() {
                    warn!(error = %err, "request failed");
                }
                (
                    status,
                    Json(serde_json::json!({ "error": err.to_string(), "kind": kind })),
                )
                    .into_response()
            }
        }
    }
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    Ok(Address::parse(raw)?)
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    journal_backend: &'static str,
    journal_entries: usize,
    journal_chain_valid: bool,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "intentdesk-service",
        journal_backend: state.engine.journal_backend().await,
        journal_entries: state.engine.journal_entries().await.len(),
        journal_chain_valid: state.engine.verify_journal_chain().await,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub caller: Address,
    pub command: Command,
}

async fn submit_command(
    State(state): State<ServiceState>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<Outcome>, ApiError> {
    Ok(Json(
        state.engine.submit(&request.caller, request.command).await?,
    ))
}

async fn get_account_balance(
    State(state): State<ServiceState>,
    Path((user, collateral)): Path<(String, String)>,
) -> Result<Json<Balance>, ApiError> {
    let user = parse_address(&user)?;
    let collateral = parse_address(&collateral)?;
    Ok(Json(state.engine.balances_of(&user, &collateral).await))
}

#[derive(Debug, Clone, Serialize)]
struct LastIdResponse {
    last_id: u64,
}

async fn get_last_withdraw_id(State(state): State<ServiceState>) -> Json<LastIdResponse> {
    Json(LastIdResponse {
        last_id: state.engine.get_last_withdraw_id().await,
    })
}

async fn get_withdraw(
    State(state): State<ServiceState>,
    Path(id): Path<u64>,
) -> Result<Json<WithdrawRequest>, ApiError> {
    state
        .engine
        .get_withdraw(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("withdrawal {id} not found")))
}

async fn get_open_intent(
    State(state): State<ServiceState>,
    Path(id): Path<u64>,
) -> Result<Json<OpenIntent>, ApiError> {
    state
        .engine
        .get_open_intent(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("open intent {id} not found")))
}

async fn get_trade(
    State(state): State<ServiceState>,
    Path(id): Path<u64>,
) -> Result<Json<Trade>, ApiError> {
    state
        .engine
        .get_trade(id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("trade {id} not found")))
}

async fn get_binding(
    State(state): State<ServiceState>,
    Path(user): Path<String>,
) -> Result<Json<BindingView>, ApiError> {
    let user = parse_address(&user)?;
    Ok(Json(state.engine.binding(&user).await))
}

async fn get_instant_action_mode(
    State(state): State<ServiceState>,
    Path(user): Path<String>,
) -> Result<Json<InstantActionView>, ApiError> {
    let user = parse_address(&user)?;
    Ok(Json(state.engine.instant_action_mode(&user).await))
}

async fn get_protocol_config(State(state): State<ServiceState>) -> Json<ProtocolConfig> {
    Json(state.engine.protocol_config().await)
}

#[derive(Debug, Clone, Deserialize)]
struct JournalEntriesQuery {
    limit: Option<usize>,
    offset: Option<usize>,
    order: Option<String>,
    caller: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct JournalEntriesResponse {
    backend: &'static str,
    total: usize,
    returned: usize,
    items: Vec<JournalEntry>,
}

async fn list_journal_entries(
    State(state): State<ServiceState>,
    Query(query): Query<JournalEntriesQuery>,
) -> Result<Json<JournalEntriesResponse>, ApiError> {
    let mut entries = match query.caller.as_deref() {
        Some(caller) => {
            state
                .engine
                .journal_entries_by(&parse_address(caller)?)
                .await
        }
        None => state.engine.journal_entries().await,
    };

    let order = query
        .order
        .as_deref()
        .unwrap_or("desc")
        .to_ascii_lowercase();
    if order == "desc" {
        entries.reverse();
    } else if order != "asc" {
        return Err(ApiError::bad_request(format!(
            "invalid order '{order}'; expected asc or desc"
        )));
    }

    let total = entries.len();
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(100).min(1000);
    let items = entries
        .into_iter()
        .skip(offset)
        .take(limit)
        .collect::<Vec<_>>();
    let returned = items.len();

    Ok(Json(JournalEntriesResponse {
        backend: state.engine.journal_backend().await,
        total,
        returned,
        items,
    }))
}
