// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

//! Customer-facing withdrawal endpoints.

use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::Auth,
    error::ApiError,
    ledger::{WithdrawalRequestRecord, CURRENCY},
    state::AppState,
};

/// Request to file a withdrawal intent.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmitWithdrawalRequest {
    /// Client-chosen correlation id; generated server-side when absent
    #[serde(default)]
    pub withdrawal_id: Option<String>,
    /// Amount to withdraw in USDT
    pub amount: Decimal,
    /// Destination wallet address
    pub address: String,
}

/// The caller's own requests, newest first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OwnRequestsResponse {
    pub requests: Vec<WithdrawalRequestRecord>,
}

/// Wallet balance response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletBalanceResponse {
    /// Wallet owner
    pub user_id: String,
    /// Current balance
    pub balance: Decimal,
    /// Balance denomination (always USDT)
    pub currency: String,
}

/// File a withdrawal request.
///
/// The request starts `pending` and stays that way until an admin confirms
/// it. The customer is notified by mail.
#[utoipa::path(
    post,
    path = "/v1/withdrawal-requests",
    tag = "Withdrawals",
    request_body = SubmitWithdrawalRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Request filed", body = WithdrawalRequestRecord),
        (status = 400, description = "Invalid amount or address"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Withdrawal id already in use")
    )
)]
pub async fn submit_withdrawal_request(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<SubmitWithdrawalRequest>,
) -> Result<(StatusCode, Json<WithdrawalRequestRecord>), ApiError> {
    if request.amount <= Decimal::ZERO {
        return Err(ApiError::bad_request("Amount must be positive"));
    }
    if request.address.trim().is_empty() {
        return Err(ApiError::bad_request("Destination address is required"));
    }

    let withdrawal_id = request
        .withdrawal_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let record = WithdrawalRequestRecord::new_pending(
        Uuid::new_v4().to_string(),
        withdrawal_id,
        user.user_id,
        user.email,
        user.username,
        request.amount,
        request.address,
    );

    let record = state.lifecycle.submit(record).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// List the caller's own withdrawal requests, newest first.
#[utoipa::path(
    get,
    path = "/v1/withdrawal-requests",
    tag = "Withdrawals",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Requests listed", body = OwnRequestsResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_own_requests(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<OwnRequestsResponse>, ApiError> {
    let requests = state.db.find_requests_by_user(&user.user_id)?;
    Ok(Json(OwnRequestsResponse { requests }))
}

/// Get the caller's wallet balance. Users without a wallet yet read zero.
#[utoipa::path(
    get,
    path = "/v1/wallet",
    tag = "Wallet",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Balance retrieved", body = WalletBalanceResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_own_wallet(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<WalletBalanceResponse>, ApiError> {
    let balance = state
        .db
        .get_wallet(&user.user_id)?
        .map(|wallet| wallet.balance)
        .unwrap_or(Decimal::ZERO);

    Ok(Json(WalletBalanceResponse {
        user_id: user.user_id,
        balance,
        currency: CURRENCY.to_string(),
    }))
}
