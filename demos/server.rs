//! Simple REST API server example for the budget approval engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /departments` - Upsert a department (admin)
//! - `POST /accounts` - Upsert a key account (admin)
//! - `POST /requests` - Create a withdrawal request
//! - `POST /requests/{id}/approve` - Approve a request (admin)
//! - `POST /requests/{id}/reject` - Reject a request (admin)
//! - `POST /requests/{id}/revision` - Send a request back for revision (admin)
//! - `POST /requests/{id}/resubmit` - Resubmit a revised request (owner)
//! - `POST /requests/{id}/resolve` - Resolve a revision child into its parent (admin)
//! - `GET /requests/pending` - List pending requests
//! - `GET /accounts/{id}/budget` - Current budget snapshot
//!
//! ## Example Usage
//!
//! ```bash
//! curl -X POST http://localhost:3000/accounts \
//!   -H "Content-Type: application/json" \
//!   -d '{"actor": {"user_id": 1, "role": "admin"}, "account_id": 1, "name": "IT operations", "account_type": "expense", "total_budget": "1000.00"}'
//!
//! curl -X POST http://localhost:3000/requests \
//!   -H "Content-Type: application/json" \
//!   -d '{"actor": {"user_id": 2, "role": "user"}, "department_id": 1, "key_account_id": 1, "amount": "250.00", "reason": "new monitors"}'
//!
//! curl http://localhost:3000/accounts/1/budget
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use budget_ledger_rs::{
    Actor, ApprovalEngine, ApprovalError, BudgetSnapshot, CategoryId, DepartmentId, KeyAccountId,
    RequestId, WithdrawalRequest,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

// === Request/Response DTOs ===

#[derive(Debug, Deserialize)]
pub struct UpsertDepartmentRequest {
    pub actor: Actor,
    pub department_id: u32,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpsertAccountRequest {
    pub actor: Actor,
    pub account_id: u32,
    pub name: String,
    pub account_type: String,
    pub total_budget: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub actor: Actor,
    pub department_id: u32,
    pub key_account_id: u32,
    pub category_id: Option<u32>,
    pub amount: Decimal,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub actor: Actor,
    /// Rejection reason or revision feedback, depending on the endpoint.
    pub feedback: Option<String>,
    /// Suggested amount for revision requests.
    pub amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct ResubmitRequest {
    pub actor: Actor,
    pub amount: Decimal,
    pub reason: String,
    pub key_account_id: u32,
    pub category_id: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub request_id: RequestId,
}

#[derive(Debug, Serialize)]
pub struct BudgetResponse {
    pub account: u32,
    #[serde(flatten)]
    pub snapshot: BudgetSnapshot,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the approval engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ApprovalEngine>,
}

// === Error Handling ===

/// Wrapper for converting `ApprovalError` into HTTP responses.
pub struct AppError(ApprovalError);

impl From<ApprovalError> for AppError {
    fn from(err: ApprovalError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            ApprovalError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
            ApprovalError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApprovalError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApprovalError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
            ApprovalError::InsufficientBudget { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_BUDGET")
            }
            ApprovalError::StorageUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "STORAGE_UNAVAILABLE")
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

async fn upsert_department(
    State(state): State<AppState>,
    Json(request): Json<UpsertDepartmentRequest>,
) -> Result<StatusCode, AppError> {
    state.engine.upsert_department(
        request.actor,
        DepartmentId(request.department_id),
        &request.name,
    )?;
    Ok(StatusCode::CREATED)
}

async fn upsert_account(
    State(state): State<AppState>,
    Json(request): Json<UpsertAccountRequest>,
) -> Result<StatusCode, AppError> {
    state.engine.upsert_account(
        request.actor,
        KeyAccountId(request.account_id),
        &request.name,
        &request.account_type,
        request.total_budget,
    )?;
    Ok(StatusCode::CREATED)
}

async fn create_request(
    State(state): State<AppState>,
    Json(request): Json<CreateRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let request_id = state.engine.create_request(
        request.actor,
        DepartmentId(request.department_id),
        KeyAccountId(request.key_account_id),
        request.category_id.map(CategoryId),
        request.amount,
        &request.reason,
    )?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { request_id })))
}

async fn approve(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<DecisionRequest>,
) -> Result<StatusCode, AppError> {
    state.engine.approve(request.actor, RequestId(id))?;
    Ok(StatusCode::OK)
}

async fn reject(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<DecisionRequest>,
) -> Result<StatusCode, AppError> {
    let reason = request.feedback.unwrap_or_default();
    state.engine.reject(request.actor, RequestId(id), &reason)?;
    Ok(StatusCode::OK)
}

async fn request_revision(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<DecisionRequest>,
) -> Result<StatusCode, AppError> {
    let feedback = request.feedback.unwrap_or_default();
    state
        .engine
        .request_revision(request.actor, RequestId(id), &feedback, request.amount)?;
    Ok(StatusCode::OK)
}

async fn resubmit(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ResubmitRequest>,
) -> Result<StatusCode, AppError> {
    state.engine.submit_revision(
        request.actor,
        RequestId(id),
        request.amount,
        &request.reason,
        KeyAccountId(request.key_account_id),
        request.category_id.map(CategoryId),
    )?;
    Ok(StatusCode::OK)
}

async fn resolve(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<DecisionRequest>,
) -> Result<StatusCode, AppError> {
    state.engine.resolve_revision(request.actor, RequestId(id))?;
    Ok(StatusCode::OK)
}

async fn pending_requests(State(state): State<AppState>) -> Json<Vec<WithdrawalRequest>> {
    Json(state.engine.pending_requests())
}

async fn budget(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<BudgetResponse>, AppError> {
    let snapshot = state.engine.available_budget(KeyAccountId(id))?;
    Ok(Json(BudgetResponse {
        account: id,
        snapshot,
    }))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/departments", post(upsert_department))
        .route("/accounts", post(upsert_account))
        .route("/requests", post(create_request))
        .route("/requests/{id}/approve", post(approve))
        .route("/requests/{id}/reject", post(reject))
        .route("/requests/{id}/revision", post(request_revision))
        .route("/requests/{id}/resubmit", post(resubmit))
        .route("/requests/{id}/resolve", post(resolve))
        .route("/requests/pending", get(pending_requests))
        .route("/accounts/{id}/budget", get(budget))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let state = AppState {
        engine: Arc::new(ApprovalEngine::new()),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Budget approval API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST /departments              - Upsert a department (admin)");
    println!("  POST /accounts                 - Upsert a key account (admin)");
    println!("  POST /requests                 - Create a withdrawal request");
    println!("  POST /requests/:id/approve     - Approve (admin)");
    println!("  POST /requests/:id/reject      - Reject (admin)");
    println!("  POST /requests/:id/revision    - Request revision (admin)");
    println!("  POST /requests/:id/resubmit    - Resubmit a revision (owner)");
    println!("  POST /requests/:id/resolve     - Resolve a revision child (admin)");
    println!("  GET  /requests/pending         - List pending requests");
    println!("  GET  /accounts/:id/budget      - Budget snapshot");

    axum::serve(listener, app).await.unwrap();
}
