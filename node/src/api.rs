//! # REST + JSON-RPC + WebSocket API
//!
//! Builds the axum router that exposes the ledger over HTTP. All endpoints
//! share application state through axum's `State` extractor, and REST and
//! JSON-RPC go through the same [`AppState`] operations, so both transports
//! log, count, persist and broadcast identically.
//!
//! ## Endpoints
//!
//! | Method | Path                                   | Description                    |
//! |--------|----------------------------------------|--------------------------------|
//! | GET    | `/health`                              | Liveness probe                 |
//! | GET    | `/status`                              | Version, network, ledger stats |
//! | GET    | `/fees/quote?amount=N`                 | Fee preview                    |
//! | POST   | `/transfers`                           | Create a transfer              |
//! | GET    | `/transfers/:id`                       | Transfer by id                 |
//! | POST   | `/transfers/:id/cancel`                | Sender cancels                 |
//! | POST   | `/transfers/:id/claim`                 | Receiver claims                |
//! | POST   | `/transfers/:id/reclaim`               | Refund an expired transfer     |
//! | GET    | `/accounts/:account/pending`           | Pending transfers              |
//! | GET    | `/accounts/:account/history`           | Settled transfers              |
//! | GET    | `/accounts/:account/balances/:asset`   | Balance lookup                 |
//! | POST   | `/faucet`                              | Devnet balance seeding         |
//! | POST   | `/rpc`                                 | JSON-RPC 2.0 gateway           |
//! | GET    | `/ws`                                  | Live ledger events             |
//!
//! Errors come back as `{ "error": message, "kind": ErrorKind }` with a
//! status code chosen by kind; see [`status_for`].

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use passlock_contracts::{
    ErrorKind, LedgerError, LedgerStats, TransferId, TransferLedger, TransferView,
};
use passlock_protocol::asset::{AccountId, AssetId, BalanceBook};
use passlock_protocol::fee::FeeQuote;
use passlock_protocol::storage::LedgerDb;

use crate::metrics::{SharedMetrics, OUTCOME_OK};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Network identifier (e.g., "devnet", "testnet", "mainnet").
    pub network: String,
    /// The escrow engine.
    pub ledger: Arc<TransferLedger>,
    /// Balances the ledger moves funds through.
    pub book: Arc<BalanceBook>,
    /// Write-through persistence for transfers and balances.
    pub db: Arc<LedgerDb>,
    /// Held while reading balances and writing them out, so a slower
    /// request can't overwrite a newer snapshot with an older one.
    pub persist_lock: Arc<Mutex<()>>,
    /// Broadcast channel for live event notifications.
    pub event_tx: broadcast::Sender<LedgerEvent>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
    /// Whether `POST /faucet` mints balances.
    pub faucet_enabled: bool,
}

/// Events pushed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LedgerEvent {
    #[serde(rename = "transfer_created")]
    TransferCreated {
        id: TransferId,
        sender: AccountId,
        receiver: AccountId,
        asset: AssetId,
        amount: u64,
        fee: u64,
        expires_at: DateTime<Utc>,
    },
    #[serde(rename = "transfer_canceled")]
    TransferCanceled { id: TransferId },
    #[serde(rename = "transfer_claimed")]
    TransferClaimed { id: TransferId },
    #[serde(rename = "transfer_refunded")]
    TransferRefunded { id: TransferId },
    #[serde(rename = "faucet_deposit")]
    FaucetDeposit {
        account: AccountId,
        asset: AssetId,
        amount: u64,
    },
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /transfers` and params of `passlock_createTransfer`.
///
/// Exactly one of `expires_at` and `ttl_secs` must be given.
#[derive(Deserialize)]
pub struct CreateTransferRequest {
    pub sender: AccountId,
    pub receiver: AccountId,
    #[serde(default)]
    pub asset: Option<AssetId>,
    pub amount: u64,
    pub password: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTransferResponse {
    pub id: TransferId,
    pub transfer: TransferView,
}

/// Body of `POST /transfers/:id/cancel`.
#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub caller: AccountId,
}

/// Body of `POST /transfers/:id/claim`.
#[derive(Deserialize)]
pub struct ClaimRequest {
    pub caller: AccountId,
    pub password: String,
}

/// Body of `POST /transfers/:id/reclaim`. The caller is optional; anyone
/// may trigger a refund.
#[derive(Debug, Default, Deserialize)]
pub struct ReclaimRequest {
    #[serde(default)]
    pub caller: Option<AccountId>,
}

/// Body of `POST /faucet`.
#[derive(Debug, Deserialize)]
pub struct FaucetRequest {
    pub account: AccountId,
    #[serde(default)]
    pub asset: Option<AssetId>,
    pub amount: u64,
}

#[derive(Debug, Deserialize)]
pub struct QuoteParams {
    pub amount: u64,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Network identifier.
    pub network: String,
    /// Ledger counters.
    pub ledger: LedgerStats,
    /// Cancel window applied to new transfers, in seconds.
    pub cancel_cooldown_secs: u64,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for balance lookups and faucet deposits.
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account: AccountId,
    pub asset: AssetId,
    pub balance: u64,
}

/// A settled transition, as returned by cancel/claim/reclaim.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub transfer: TransferView,
}

/// Error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    /// The ledger refused the operation.
    Ledger(LedgerError),
    /// The request itself was malformed.
    BadRequest(String),
    /// `POST /faucet` on a node that doesn't mint.
    FaucetDisabled,
}

impl ApiError {
    /// Stable kind name for the error body.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ApiError::Ledger(e) => e.kind().as_str(),
            ApiError::BadRequest(_) => "InvalidRequest",
            ApiError::FaucetDisabled => "FaucetDisabled",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Ledger(e) => status_for(e.kind()),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::FaucetDisabled => StatusCode::FORBIDDEN,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Ledger(e) => e.to_string(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::FaucetDisabled => "faucet is disabled on this network".into(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message(),
            kind: self.kind_name().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// HTTP status for each ledger error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::NotSender | ErrorKind::NotReceiver | ErrorKind::IncorrectPassword => {
            StatusCode::FORBIDDEN
        }
        ErrorKind::NotPending => StatusCode::CONFLICT,
        ErrorKind::CooldownElapsed
        | ErrorKind::ClaimNotYetOpen
        | ErrorKind::TransferExpired
        | ErrorKind::NotYetExpired
        | ErrorKind::PasswordMissing
        | ErrorKind::PasswordTooShort
        | ErrorKind::AmountTooLow
        | ErrorKind::SelfTransferNotAllowed
        | ErrorKind::InvalidExpiration
        | ErrorKind::AmountOverflow => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::AssetMovementFailed => StatusCode::BAD_GATEWAY,
        ErrorKind::InvalidFeeConfiguration
        | ErrorKind::InvalidCooldownConfiguration
        | ErrorKind::InvalidRecord => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl AppState {
    /// Runs one ledger operation with timing and outcome metrics.
    fn observe<T>(
        &self,
        operation: &'static str,
        op: impl FnOnce() -> Result<T, LedgerError>,
    ) -> Result<T, ApiError> {
        let started = Instant::now();
        let result = op();
        let outcome = match &result {
            Ok(_) => OUTCOME_OK,
            Err(e) => e.kind().as_str(),
        };
        self.metrics
            .record(operation, outcome, started.elapsed().as_secs_f64());
        result.map_err(ApiError::from)
    }

    fn persist_guard(&self) -> MutexGuard<'_, ()> {
        self.persist_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn refresh_gauges(&self) {
        let stats = self.ledger.stats();
        self.metrics.set_counts(stats.pending, stats.total);
    }

    /// Writes the transfer, the id counter and every balance the transfer
    /// touched. A failure here is logged; the ledger has already committed.
    fn persist_transfer(&self, id: TransferId) {
        let _guard = self.persist_guard();
        let Some(record) = self.ledger.record(id) else {
            return;
        };

        let mut accounts = vec![record.sender.clone(), record.receiver.clone()];
        if let Some(treasury) = &self.ledger.config().treasury {
            accounts.push(treasury.clone());
        }
        let balances: Vec<(AccountId, u64)> = accounts
            .into_iter()
            .map(|account| {
                let balance = self.book.balance_of(&account, &record.asset);
                (account, balance)
            })
            .collect();

        let result = self.db.commit_transfer(
            id.value(),
            &record,
            self.ledger.next_id(),
            balances
                .iter()
                .map(|(account, amount)| (account.as_str(), record.asset.as_str(), *amount)),
        );
        if let Err(e) = result {
            tracing::error!(transfer = %id, "failed to persist transfer: {}", e);
        }
    }

    fn persist_balance(&self, account: &AccountId, asset: &AssetId) {
        let _guard = self.persist_guard();
        let balance = self.book.balance_of(account, asset);
        if let Err(e) = self
            .db
            .put_balances([(account.as_str(), asset.as_str(), balance)])
        {
            tracing::error!(%account, %asset, "failed to persist balance: {}", e);
        }
    }

    fn publish(&self, event: LedgerEvent) {
        // No subscribers is not an error.
        let _ = self.event_tx.send(event);
    }

    pub fn create_transfer(
        &self,
        req: CreateTransferRequest,
    ) -> Result<CreateTransferResponse, ApiError> {
        let expires_at = match (req.expires_at, req.ttl_secs) {
            (Some(at), None) => at,
            (None, Some(ttl)) => {
                let ttl = i64::try_from(ttl)
                    .ok()
                    .and_then(Duration::try_seconds)
                    .ok_or_else(|| ApiError::BadRequest(format!("ttl_secs {} is too large", ttl)))?;
                self.ledger
                    .now()
                    .checked_add_signed(ttl)
                    .ok_or_else(|| ApiError::BadRequest("ttl_secs overflows the calendar".into()))?
            }
            _ => {
                return Err(ApiError::BadRequest(
                    "exactly one of expires_at and ttl_secs is required".into(),
                ))
            }
        };
        let asset = req.asset.unwrap_or(AssetId::Native);

        let id = self.observe("create", || {
            self.ledger.create(
                &req.sender,
                &req.receiver,
                &asset,
                req.amount,
                &req.password,
                expires_at,
            )
        })?;
        let transfer = self.ledger.get_transfer(id)?;

        self.persist_transfer(id);
        self.refresh_gauges();
        self.publish(LedgerEvent::TransferCreated {
            id,
            sender: transfer.sender.clone(),
            receiver: transfer.receiver.clone(),
            asset: transfer.asset.clone(),
            amount: transfer.net_amount,
            fee: transfer.fee_amount,
            expires_at: transfer.expires_at,
        });
        Ok(CreateTransferResponse { id, transfer })
    }

    pub fn cancel_transfer(
        &self,
        id: TransferId,
        req: CancelRequest,
    ) -> Result<TransitionResponse, ApiError> {
        self.observe("cancel", || self.ledger.cancel(id, &req.caller))?;
        self.settled(id, LedgerEvent::TransferCanceled { id })
    }

    pub fn claim_transfer(
        &self,
        id: TransferId,
        req: ClaimRequest,
    ) -> Result<TransitionResponse, ApiError> {
        self.observe("claim", || {
            self.ledger.claim(id, &req.caller, &req.password)
        })?;
        self.settled(id, LedgerEvent::TransferClaimed { id })
    }

    pub fn reclaim_transfer(
        &self,
        id: TransferId,
        req: ReclaimRequest,
    ) -> Result<TransitionResponse, ApiError> {
        let caller = req
            .caller
            .unwrap_or_else(|| AccountId::from("anonymous"));
        self.observe("reclaim", || self.ledger.reclaim_expired(id, &caller))?;
        self.settled(id, LedgerEvent::TransferRefunded { id })
    }

    fn settled(&self, id: TransferId, event: LedgerEvent) -> Result<TransitionResponse, ApiError> {
        self.persist_transfer(id);
        self.refresh_gauges();
        self.publish(event);
        Ok(TransitionResponse {
            transfer: self.ledger.get_transfer(id)?,
        })
    }

    pub fn faucet(&self, req: FaucetRequest) -> Result<BalanceResponse, ApiError> {
        if !self.faucet_enabled {
            return Err(ApiError::FaucetDisabled);
        }
        let asset = req.asset.unwrap_or(AssetId::Native);
        let balance = self
            .book
            .deposit(&req.account, &asset, req.amount)
            .map_err(|e| ApiError::Ledger(LedgerError::AssetMovementFailed(e)))?;

        self.persist_balance(&req.account, &asset);
        tracing::info!(account = %req.account, %asset, amount = req.amount, "faucet deposit");
        self.publish(LedgerEvent::FaucetDeposit {
            account: req.account.clone(),
            asset: asset.clone(),
            amount: req.amount,
        });
        Ok(BalanceResponse {
            account: req.account,
            asset,
            balance,
        })
    }

    pub fn balance(&self, account: AccountId, asset: AssetId) -> BalanceResponse {
        let balance = self.book.balance_of(&account, &asset);
        BalanceResponse {
            account,
            asset,
            balance,
        }
    }

    pub fn quote(&self, amount: u64) -> Result<FeeQuote, ApiError> {
        Ok(self.ledger.quote_fee(amount)?)
    }

    pub fn status(&self) -> StatusResponse {
        StatusResponse {
            version: self.version.clone(),
            network: self.network.clone(),
            ledger: self.ledger.stats(),
            cancel_cooldown_secs: self.ledger.cooldown().cooldown_secs(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
///
/// The returned router is ready to be served on the configured RPC port.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/fees/quote", get(quote_handler))
        .route("/transfers", post(create_handler))
        .route("/transfers/:id", get(transfer_handler))
        .route("/transfers/:id/cancel", post(cancel_handler))
        .route("/transfers/:id/claim", post(claim_handler))
        .route("/transfers/:id/reclaim", post(reclaim_handler))
        .route("/accounts/:account/pending", get(pending_handler))
        .route("/accounts/:account/history", get(history_handler))
        .route("/accounts/:account/balances/:asset", get(balance_handler))
        .route("/faucet", post(faucet_handler))
        .route("/rpc", post(rpc_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// REST Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
///
/// This is the liveness probe for orchestrators (k8s, systemd, etc.).
/// It intentionally does not check internal subsystem health — that
/// belongs in `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — version, network and ledger counters.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.status())
}

/// `GET /fees/quote?amount=N` — what a transfer of `N` would cost.
async fn quote_handler(
    State(state): State<AppState>,
    Query(params): Query<QuoteParams>,
) -> Result<Json<FeeQuote>, ApiError> {
    state.quote(params.amount).map(Json)
}

/// `POST /transfers` — lock funds for a receiver.
async fn create_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateTransferRequest>,
) -> Result<(StatusCode, Json<CreateTransferResponse>), ApiError> {
    let resp = state.create_transfer(req)?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// `GET /transfers/:id` — display view; never includes the commitment.
async fn transfer_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
) -> Result<Json<TransferView>, ApiError> {
    Ok(Json(state.ledger.get_transfer(TransferId(id))?))
}

async fn cancel_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    state.cancel_transfer(TransferId(id), req).map(Json)
}

async fn claim_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<ClaimRequest>,
) -> Result<Json<TransitionResponse>, ApiError> {
    state.claim_transfer(TransferId(id), req).map(Json)
}

/// `POST /transfers/:id/reclaim` — body optional.
async fn reclaim_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    body: Option<Json<ReclaimRequest>>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    state.reclaim_transfer(TransferId(id), req).map(Json)
}

async fn pending_handler(
    Path(account): Path<String>,
    State(state): State<AppState>,
) -> Json<Vec<TransferView>> {
    Json(state.ledger.list_pending_for(&AccountId::new(account)))
}

async fn history_handler(
    Path(account): Path<String>,
    State(state): State<AppState>,
) -> Json<Vec<TransferView>> {
    Json(state.ledger.list_history_for(&AccountId::new(account)))
}

async fn balance_handler(
    Path((account, asset)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Json<BalanceResponse> {
    Json(state.balance(AccountId::new(account), AssetId::from(asset)))
}

/// `POST /faucet` — mint test balances. Devnet only.
async fn faucet_handler(
    State(state): State<AppState>,
    Json(req): Json<FaucetRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    state.faucet(req).map(Json)
}

// ---------------------------------------------------------------------------
// JSON-RPC
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version. Must be "2.0".
    pub jsonrpc: String,
    /// The method to invoke.
    pub method: String,
    /// Method parameters (positional or named).
    pub params: Option<serde_json::Value>,
    /// Request identifier. Echoed back in the response.
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version. Always "2.0".
    pub jsonrpc: String,
    /// The result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// The error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier, echoed from the request.
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    /// Short human-readable error description.
    pub message: String,
    /// Structured error data; carries the error kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: message.into(),
            data: None,
        }
    }
}

impl From<ApiError> for JsonRpcError {
    fn from(err: ApiError) -> Self {
        let code = match &err {
            ApiError::Ledger(e) if e.kind() == ErrorKind::NotFound => -32001,
            ApiError::Ledger(_) => -32000,
            ApiError::BadRequest(_) => -32602,
            ApiError::FaucetDisabled => -32003,
        };
        JsonRpcError {
            code,
            message: err.message(),
            data: Some(serde_json::json!({ "kind": err.kind_name() })),
        }
    }
}

/// Named params carrying a transfer id next to a request body.
#[derive(Deserialize)]
struct WithId<T> {
    id: u64,
    #[serde(flatten)]
    body: T,
}

type RpcResult = Result<serde_json::Value, JsonRpcError>;

/// `params[index]` of a positional parameter list.
fn positional(params: &Option<serde_json::Value>, index: usize) -> Option<&serde_json::Value> {
    params
        .as_ref()
        .and_then(|p| p.as_array())
        .and_then(|arr| arr.get(index))
}

fn named<T: serde::de::DeserializeOwned>(params: Option<serde_json::Value>) -> Result<T, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("Invalid params: expected an object"))?;
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
}

fn to_value<T: Serialize>(value: T) -> RpcResult {
    serde_json::to_value(value).map_err(|e| JsonRpcError {
        code: -32603,
        message: format!("Internal error: {}", e),
        data: None,
    })
}

/// `POST /rpc` — JSON-RPC 2.0 gateway.
///
/// Routes method calls to the same operations as the REST endpoints.
/// Unknown methods return error code -32601 (Method not found).
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError {
                code: -32600,
                message: "Invalid Request: jsonrpc must be \"2.0\"".into(),
                data: None,
            }),
            id: req.id,
        });
    }

    let outcome = dispatch_rpc(&state, &req.method, req.params);
    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(err) => (None, Some(err)),
    };

    Json(JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result,
        error,
        id: req.id,
    })
}

fn dispatch_rpc(state: &AppState, method: &str, params: Option<serde_json::Value>) -> RpcResult {
    match method {
        "passlock_version" => to_value(&state.version),
        "passlock_networkId" => to_value(&state.network),
        "passlock_status" => to_value(state.status()),
        "passlock_quoteFee" => {
            let amount = positional(&params, 0)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| JsonRpcError::invalid_params("Invalid params: expected [amount]"))?;
            to_value(state.quote(amount)?)
        }
        "passlock_getTransfer" => {
            let id = positional(&params, 0)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| JsonRpcError::invalid_params("Invalid params: expected [id]"))?;
            let view = state
                .ledger
                .get_transfer(TransferId(id))
                .map_err(ApiError::from)?;
            to_value(view)
        }
        "passlock_listPending" | "passlock_listHistory" => {
            let account = positional(&params, 0)
                .and_then(|v| v.as_str())
                .map(AccountId::from)
                .ok_or_else(|| JsonRpcError::invalid_params("Invalid params: expected [account]"))?;
            if method == "passlock_listPending" {
                to_value(state.ledger.list_pending_for(&account))
            } else {
                to_value(state.ledger.list_history_for(&account))
            }
        }
        "passlock_getBalance" => {
            let account = positional(&params, 0).and_then(|v| v.as_str());
            let asset = positional(&params, 1).and_then(|v| v.as_str());
            match (account, asset) {
                (Some(account), Some(asset)) => {
                    to_value(state.balance(AccountId::from(account), AssetId::from(asset.to_string())))
                }
                _ => Err(JsonRpcError::invalid_params(
                    "Invalid params: expected [account, asset]",
                )),
            }
        }
        "passlock_createTransfer" => {
            let req: CreateTransferRequest = named(params)?;
            to_value(state.create_transfer(req)?)
        }
        "passlock_cancel" => {
            let WithId { id, body } = named::<WithId<CancelRequest>>(params)?;
            to_value(state.cancel_transfer(TransferId(id), body)?)
        }
        "passlock_claim" => {
            let WithId { id, body } = named::<WithId<ClaimRequest>>(params)?;
            to_value(state.claim_transfer(TransferId(id), body)?)
        }
        "passlock_reclaim" => {
            let WithId { id, body } = named::<WithId<ReclaimRequest>>(params)?;
            to_value(state.reclaim_transfer(TransferId(id), body)?)
        }
        "passlock_faucet" => {
            let req: FaucetRequest = named(params)?;
            to_value(state.faucet(req)?)
        }
        _ => Err(JsonRpcError {
            code: -32601,
            message: format!("Method not found: {}", method),
            data: None,
        }),
    }
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// `GET /ws` — WebSocket upgrade for live event streaming.
///
/// Clients receive JSON-encoded [`LedgerEvent`] messages for every
/// committed transition. The connection is read-only from the server's
/// perspective; client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding broadcast events
/// until the client disconnects or the channel is closed.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            // Client disconnected.
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {
                        // Client messages are ignored — this is a push-only channel.
                    }
                    _ => break, // Disconnected or error.
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

/// Rebuilds the balance book from the database.
pub fn load_book(db: &LedgerDb) -> anyhow::Result<BalanceBook> {
    let entries = db
        .load_balances()?
        .into_iter()
        .map(|(account, asset, amount)| (AccountId::new(account), AssetId::from(asset), amount));
    Ok(BalanceBook::from_entries(entries))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use passlock_contracts::{LedgerConfig, TransferStatus};
    use passlock_protocol::timing::ManualClock;
    use tower::ServiceExt;

    const PASSWORD: &str = "tr0ub4dor&3";

    /// Creates a test AppState on a manual clock and a temporary database.
    fn test_app_state() -> (AppState, Arc<ManualClock>) {
        let db = Arc::new(LedgerDb::open_temporary().expect("temp db"));
        let book = Arc::new(BalanceBook::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let ledger = TransferLedger::new(LedgerConfig::default(), book.clone(), clock.clone())
            .expect("ledger");
        let (event_tx, _) = broadcast::channel(16);
        let metrics = Arc::new(crate::metrics::LedgerMetrics::new().expect("metrics"));

        let state = AppState {
            version: "0.1.0-test".into(),
            network: "devnet".into(),
            ledger: Arc::new(ledger),
            book,
            db,
            persist_lock: Arc::default(),
            event_tx,
            metrics,
            faucet_enabled: true,
        };
        (state, clock)
    }

    /// Sends a GET request and returns the (status, body_json).
    async fn get(router: &Router, path: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        send(router, req).await
    }

    /// Sends a POST request with JSON body and returns (status, body_json).
    async fn post_json(
        router: &Router,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        send(router, req).await
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn fund_and_create(router: &Router) -> u64 {
        let (status, _) = post_json(
            router,
            "/faucet",
            serde_json::json!({ "account": "alice", "amount": 1_000_000 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = post_json(
            router,
            "/transfers",
            serde_json::json!({
                "sender": "alice",
                "receiver": "bob",
                "amount": 100_000,
                "password": PASSWORD,
                "ttl_secs": 86_400,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "body: {}", body);
        body["id"].as_u64().unwrap()
    }

    // -- 1. Health -----------------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (state, _) = test_app_state();
        let router = create_router(state);
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    // -- 2. Quote ------------------------------------------------------------

    #[tokio::test]
    async fn quote_endpoint_uses_ledger_schedule() {
        let (state, _) = test_app_state();
        let router = create_router(state);
        let (status, body) = get(&router, "/fees/quote?amount=1000000").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fee"], 5_000);
        assert_eq!(body["total"], 1_005_000);
        assert_eq!(body["tier"], "Two");
    }

    // -- 3. Create + read ----------------------------------------------------

    #[tokio::test]
    async fn created_transfer_is_readable_without_commitment() {
        let (state, _) = test_app_state();
        let router = create_router(state.clone());
        let id = fund_and_create(&router).await;
        assert_eq!(id, 1);

        let (status, body) = get(&router, "/transfers/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Pending");
        assert_eq!(body["net_amount"], 100_000);
        assert_eq!(body["fee_amount"], 1_000);
        assert_eq!(body["phase"], "CancelWindow");
        assert!(body.get("password").is_none());

        let (_, balance) = get(&router, "/accounts/alice/balances/native").await;
        assert_eq!(balance["balance"], 1_000_000 - 101_000);
    }

    #[tokio::test]
    async fn missing_transfer_is_404_with_kind() {
        let (state, _) = test_app_state();
        let router = create_router(state);
        let (status, body) = get(&router, "/transfers/42").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "NotFound");
        assert!(body["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn validation_errors_are_422() {
        let (state, _) = test_app_state();
        let router = create_router(state);
        let (status, body) = post_json(
            &router,
            "/transfers",
            serde_json::json!({
                "sender": "alice",
                "receiver": "alice",
                "amount": 10,
                "password": PASSWORD,
                "ttl_secs": 60,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "SelfTransferNotAllowed");
    }

    #[tokio::test]
    async fn expiration_must_be_given_once() {
        let (state, _) = test_app_state();
        let router = create_router(state);
        let (status, body) = post_json(
            &router,
            "/transfers",
            serde_json::json!({
                "sender": "alice",
                "receiver": "bob",
                "amount": 10,
                "password": PASSWORD,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "InvalidRequest");
    }

    #[tokio::test]
    async fn unfunded_sender_is_bad_gateway() {
        let (state, _) = test_app_state();
        let router = create_router(state);
        let (status, body) = post_json(
            &router,
            "/transfers",
            serde_json::json!({
                "sender": "pauper",
                "receiver": "bob",
                "amount": 10,
                "password": PASSWORD,
                "ttl_secs": 60,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "AssetMovementFailed");
    }

    // -- 4. Lifecycle over REST ----------------------------------------------

    #[tokio::test]
    async fn claim_flow_over_rest() {
        let (state, clock) = test_app_state();
        let router = create_router(state.clone());
        let id = fund_and_create(&router).await;

        // Too early.
        let (status, body) = post_json(
            &router,
            &format!("/transfers/{}/claim", id),
            serde_json::json!({ "caller": "bob", "password": PASSWORD }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "ClaimNotYetOpen");

        clock.advance(Duration::hours(2));

        // Wrong password.
        let (status, body) = post_json(
            &router,
            &format!("/transfers/{}/claim", id),
            serde_json::json!({ "caller": "bob", "password": "guess guess" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], "IncorrectPassword");

        // Right password.
        let (status, body) = post_json(
            &router,
            &format!("/transfers/{}/claim", id),
            serde_json::json!({ "caller": "bob", "password": PASSWORD }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transfer"]["status"], "Claimed");

        // Second claim conflicts.
        let (status, body) = post_json(
            &router,
            &format!("/transfers/{}/claim", id),
            serde_json::json!({ "caller": "bob", "password": PASSWORD }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "NotPending");

        let (_, balance) = get(&router, "/accounts/bob/balances/native").await;
        assert_eq!(balance["balance"], 100_000);

        let (_, history) = get(&router, "/accounts/bob/history").await;
        assert_eq!(history.as_array().unwrap().len(), 1);
        let (_, pending) = get(&router, "/accounts/bob/pending").await;
        assert!(pending.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancel_and_reclaim_over_rest() {
        let (state, clock) = test_app_state();
        let router = create_router(state.clone());
        let id = fund_and_create(&router).await;

        let (status, body) = post_json(
            &router,
            &format!("/transfers/{}/cancel", id),
            serde_json::json!({ "caller": "bob" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], "NotSender");

        let (status, body) = post_json(
            &router,
            &format!("/transfers/{}/reclaim", id),
            serde_json::json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["kind"], "NotYetExpired");

        clock.advance(Duration::days(2));
        let (status, body) = post_json(
            &router,
            &format!("/transfers/{}/reclaim", id),
            serde_json::json!({ "caller": "keeper" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transfer"]["status"], "ExpiredAndRefunded");
        assert_eq!(
            state.ledger.get_transfer(TransferId(id)).unwrap().status,
            TransferStatus::ExpiredAndRefunded
        );
    }

    // -- 5. Persistence ------------------------------------------------------

    #[tokio::test]
    async fn committed_operations_are_written_through() {
        let (state, _) = test_app_state();
        let router = create_router(state.clone());
        let id = fund_and_create(&router).await;

        post_json(
            &router,
            &format!("/transfers/{}/cancel", id),
            serde_json::json!({ "caller": "alice" }),
        )
        .await;

        let stored: passlock_contracts::Transfer =
            state.db.get_transfer(id).unwrap().expect("stored record");
        assert_eq!(stored.status, TransferStatus::Canceled);
        assert_eq!(state.db.next_transfer_id().unwrap(), Some(2));

        let book = load_book(&state.db).unwrap();
        assert_eq!(
            book.balance_of(&AccountId::from("alice"), &AssetId::Native),
            1_000_000 - 1_000
        );
    }

    // -- 6. Faucet -----------------------------------------------------------

    #[tokio::test]
    async fn faucet_can_be_disabled() {
        let (mut state, _) = test_app_state();
        state.faucet_enabled = false;
        let router = create_router(state);
        let (status, body) = post_json(
            &router,
            "/faucet",
            serde_json::json!({ "account": "alice", "amount": 5 }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], "FaucetDisabled");
    }

    // -- 7. Status -----------------------------------------------------------

    #[tokio::test]
    async fn status_reports_ledger_stats() {
        let (state, _) = test_app_state();
        let router = create_router(state);
        fund_and_create(&router).await;

        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.network, "devnet");
        assert_eq!(resp.ledger.pending, 1);
        assert_eq!(resp.ledger.fees_collected[&AssetId::Native], 1_000);
        assert_eq!(resp.cancel_cooldown_secs, 3_600);
    }

    // -- 8. JSON-RPC ---------------------------------------------------------

    async fn rpc(router: &Router, method: &str, params: serde_json::Value) -> JsonRpcResponse {
        let (status, body) = post_json(
            router,
            "/rpc",
            serde_json::json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn rpc_full_lifecycle() {
        let (state, clock) = test_app_state();
        let router = create_router(state);

        let resp = rpc(
            &router,
            "passlock_faucet",
            serde_json::json!({ "account": "alice", "amount": 500_000 }),
        )
        .await;
        assert!(resp.error.is_none());

        let resp = rpc(
            &router,
            "passlock_createTransfer",
            serde_json::json!({
                "sender": "alice",
                "receiver": "bob",
                "amount": 50_000,
                "password": PASSWORD,
                "ttl_secs": 7_200,
            }),
        )
        .await;
        let id = resp.result.unwrap()["id"].as_u64().unwrap();

        let resp = rpc(
            &router,
            "passlock_claim",
            serde_json::json!({ "id": id, "caller": "bob", "password": PASSWORD }),
        )
        .await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32000);
        assert_eq!(err.data.unwrap()["kind"], "ClaimNotYetOpen");

        clock.advance(Duration::minutes(61));
        let resp = rpc(
            &router,
            "passlock_claim",
            serde_json::json!({ "id": id, "caller": "bob", "password": PASSWORD }),
        )
        .await;
        assert_eq!(resp.result.unwrap()["transfer"]["status"], "Claimed");

        let resp = rpc(&router, "passlock_getBalance", serde_json::json!(["bob", "native"])).await;
        assert_eq!(resp.result.unwrap()["balance"], 50_000);

        let resp = rpc(&router, "passlock_listHistory", serde_json::json!(["alice"])).await;
        assert_eq!(resp.result.unwrap().as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rpc_not_found_and_bad_params() {
        let (state, _) = test_app_state();
        let router = create_router(state);

        let resp = rpc(&router, "passlock_getTransfer", serde_json::json!([9])).await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32001);
        assert_eq!(err.data.unwrap()["kind"], "NotFound");

        let resp = rpc(&router, "passlock_getTransfer", serde_json::json!(["nine"])).await;
        assert_eq!(resp.error.unwrap().code, -32602);

        let resp = rpc(&router, "passlock_quoteFee", serde_json::json!([50])).await;
        assert_eq!(resp.result.unwrap()["fee"], 0);
    }

    #[tokio::test]
    async fn rpc_unknown_method_and_bad_version() {
        let (state, _) = test_app_state();
        let router = create_router(state);

        let resp = rpc(&router, "eth_blockNumber", serde_json::json!([])).await;
        assert_eq!(resp.error.unwrap().code, -32601);

        let (_, body) = post_json(
            &router,
            "/rpc",
            serde_json::json!({ "jsonrpc": "1.0", "method": "passlock_version", "id": 7 }),
        )
        .await;
        let resp: JsonRpcResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.error.unwrap().code, -32600);
        assert_eq!(resp.id, 7);
    }

    // -- 9. Events and metrics -----------------------------------------------

    #[tokio::test]
    async fn transitions_are_broadcast_and_counted() {
        let (state, _) = test_app_state();
        let mut rx = state.event_tx.subscribe();
        let router = create_router(state.clone());
        let id = fund_and_create(&router).await;
        post_json(
            &router,
            &format!("/transfers/{}/cancel", id),
            serde_json::json!({ "caller": "alice" }),
        )
        .await;

        assert!(matches!(rx.recv().await.unwrap(), LedgerEvent::FaucetDeposit { .. }));
        assert!(matches!(
            rx.recv().await.unwrap(),
            LedgerEvent::TransferCreated { amount: 100_000, .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            LedgerEvent::TransferCanceled { .. }
        ));

        let text = state.metrics.encode().unwrap();
        assert!(text.contains(r#"operation="create",outcome="ok""#));
        assert!(text.contains(r#"operation="cancel",outcome="ok""#));
        assert!(text.contains("passlock_pending_transfers 0"));
    }

    #[test]
    fn every_kind_has_a_status() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::NotPending), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorKind::CooldownElapsed), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::AssetMovementFailed), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(ErrorKind::InvalidFeeConfiguration),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
