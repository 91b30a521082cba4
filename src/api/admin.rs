// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

//! Admin-only API endpoints for the withdrawal back office.
//!
//! These endpoints require the Admin role and provide:
//! - Paginated request/withdrawal lists (the two management screens)
//! - Exact-match search by withdrawal id or customer email
//! - The confirm and revert lifecycle actions
//! - Wallet credits (deposit side) and account purges
//! - SSE live feeds backing the management screens

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::AdminOnly,
    error::ApiError,
    ledger::{
        search, FeedSource, FeedState, LiveFeed, RevertOutcome, SearchKey, WithdrawalRecord,
        WithdrawalRequestRecord, CURRENCY, PAGE_SIZE,
    },
    state::AppState,
};

use super::requests::WalletBalanceResponse;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Cursor-pagination query parameters.
#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    /// Opaque cursor from the previous page
    pub cursor: Option<String>,
    /// Page size (default and maximum: 50)
    #[param(default = 50)]
    pub limit: Option<usize>,
}

impl PageQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(PAGE_SIZE).clamp(1, PAGE_SIZE)
    }
}

/// One page of withdrawal requests.
#[derive(Debug, Serialize, ToSchema)]
pub struct RequestPageResponse {
    /// Newest-first records
    pub records: Vec<WithdrawalRequestRecord>,
    /// Cursor for the next page; absent when exhausted
    pub next_cursor: Option<String>,
    /// Total page count at the fixed page size
    pub total_pages: u64,
}

/// One page of confirmed withdrawals.
#[derive(Debug, Serialize, ToSchema)]
pub struct WithdrawalPageResponse {
    /// Newest-first records
    pub records: Vec<WithdrawalRecord>,
    /// Cursor for the next page; absent when exhausted
    pub next_cursor: Option<String>,
    /// Total page count at the fixed page size
    pub total_pages: u64,
}

/// Search query parameters.
#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Which field to match: `withdrawal_id` or `user_email`
    pub by: SearchKey,
    /// Exact term to match
    pub term: String,
}

/// Search response: match sets from both collections.
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    pub requests: Vec<WithdrawalRequestRecord>,
    pub withdrawals: Vec<WithdrawalRecord>,
    /// True when neither collection matched
    pub no_results: bool,
}

/// Result of a revert action.
#[derive(Debug, Serialize, ToSchema)]
pub struct RevertResponse {
    /// `reverted` or `no_match`
    pub outcome: String,
    /// Originating request id, when it still existed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Amount credited back, when the refund policy applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunded: Option<Decimal>,
}

/// Request to credit a wallet (deposit side).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreditRequest {
    /// Amount to credit in USDT
    pub amount: Decimal,
}

/// What an account purge removed.
#[derive(Debug, Serialize, ToSchema)]
pub struct PurgeResponse {
    /// Withdrawal requests deleted
    pub requests: usize,
    /// Ledger entries deleted
    pub withdrawals: usize,
    /// Whether a wallet document was deleted
    pub wallet_removed: bool,
}

// ============================================================================
// List & Search
// ============================================================================

/// List withdrawal requests, newest first, cursor-paginated.
#[utoipa::path(
    get,
    path = "/v1/admin/withdrawal-requests",
    tag = "Admin",
    params(PageQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Page of requests", body = RequestPageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only")
    )
)]
pub async fn list_withdrawal_requests(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<RequestPageResponse>, ApiError> {
    let (records, next_cursor) = state.db.list_requests(query.cursor.as_deref(), query.limit())?;
    let count = state.db.count_requests()?;

    Ok(Json(RequestPageResponse {
        records,
        next_cursor,
        total_pages: count.div_ceil(PAGE_SIZE as u64),
    }))
}

/// List confirmed withdrawals, newest first, cursor-paginated.
#[utoipa::path(
    get,
    path = "/v1/admin/withdrawals",
    tag = "Admin",
    params(PageQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Page of withdrawals", body = WithdrawalPageResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only")
    )
)]
pub async fn list_withdrawals(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<WithdrawalPageResponse>, ApiError> {
    let (records, next_cursor) = state
        .db
        .list_withdrawals(query.cursor.as_deref(), query.limit())?;
    let count = state.db.count_withdrawals()?;

    Ok(Json(WithdrawalPageResponse {
        records,
        next_cursor,
        total_pages: count.div_ceil(PAGE_SIZE as u64),
    }))
}

/// Exact-match search across both collections.
///
/// Results replace the management screens' paginated lists; they are not
/// merged into pagination state.
#[utoipa::path(
    get,
    path = "/v1/admin/search",
    tag = "Admin",
    params(SearchQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Match sets from both collections", body = SearchResponse),
        (status = 400, description = "Empty search term"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only")
    )
)]
pub async fn search_withdrawals(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let term = query.term.trim();
    if term.is_empty() {
        return Err(ApiError::bad_request("Search term is required"));
    }

    let results = search::search(&state.db, query.by, term).map_err(|e| {
        tracing::warn!(error = %e, "Withdrawal search failed");
        ApiError::internal("Search failed")
    })?;

    let no_results = results.is_empty();
    Ok(Json(SearchResponse {
        requests: results.requests,
        withdrawals: results.withdrawals,
        no_results,
    }))
}

// ============================================================================
// Lifecycle Actions
// ============================================================================

/// Confirm a pending withdrawal request.
///
/// Creates the ledger entry, debits the customer wallet and flips the
/// request status in one transaction. An insufficient balance rejects the
/// whole action.
#[utoipa::path(
    post,
    path = "/v1/admin/withdrawal-requests/{request_id}/confirm",
    tag = "Admin",
    params(("request_id" = String, Path, description = "Request record id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Withdrawal confirmed", body = WithdrawalRecord),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only"),
        (status = 404, description = "Request not found"),
        (status = 422, description = "Insufficient wallet balance")
    )
)]
pub async fn confirm_withdrawal_request(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<WithdrawalRecord>, ApiError> {
    tracing::info!(request_id = %request_id, admin = %admin.user_id, "Admin confirming withdrawal request");
    let entry = state.lifecycle.confirm(&request_id).await?;
    Ok(Json(entry))
}

/// Revert a confirmed withdrawal.
///
/// Deletes the ledger entry and returns the originating request to
/// `pending`. A missing ledger entry reports `no_match` and writes nothing.
#[utoipa::path(
    post,
    path = "/v1/admin/withdrawals/{withdrawal_id}/revert",
    tag = "Admin",
    params(("withdrawal_id" = String, Path, description = "Ledger entry id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Revert outcome", body = RevertResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only")
    )
)]
pub async fn revert_withdrawal(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(withdrawal_id): Path<String>,
) -> Result<Json<RevertResponse>, ApiError> {
    tracing::info!(withdrawal_id = %withdrawal_id, admin = %admin.user_id, "Admin reverting withdrawal");
    let outcome = state.lifecycle.revert(&withdrawal_id).await?;

    let response = match outcome {
        RevertOutcome::Reverted {
            request_id,
            refunded,
        } => RevertResponse {
            outcome: "reverted".to_string(),
            request_id,
            refunded,
        },
        RevertOutcome::NoMatch => RevertResponse {
            outcome: "no_match".to_string(),
            request_id: None,
            refunded: None,
        },
    };
    Ok(Json(response))
}

// ============================================================================
// Wallets & Accounts
// ============================================================================

/// Credit a customer wallet (deposit settlement).
#[utoipa::path(
    post,
    path = "/v1/admin/wallets/{user_id}/credit",
    tag = "Admin",
    params(("user_id" = String, Path, description = "Wallet owner")),
    request_body = CreditRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Wallet credited", body = WalletBalanceResponse),
        (status = 400, description = "Invalid amount"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only")
    )
)]
pub async fn credit_wallet(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<CreditRequest>,
) -> Result<Json<WalletBalanceResponse>, ApiError> {
    if request.amount <= Decimal::ZERO {
        return Err(ApiError::bad_request("Amount must be positive"));
    }

    tracing::info!(
        user_id = %user_id,
        amount = %request.amount,
        admin = %admin.user_id,
        "Admin crediting wallet"
    );
    let wallet = state.db.credit(&user_id, request.amount)?;

    Ok(Json(WalletBalanceResponse {
        user_id: wallet.user_id,
        balance: wallet.balance,
        currency: CURRENCY.to_string(),
    }))
}

/// Purge every document belonging to a user in one atomic batch.
#[utoipa::path(
    delete,
    path = "/v1/admin/users/{user_id}",
    tag = "Admin",
    params(("user_id" = String, Path, description = "User to purge")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Documents removed", body = PurgeResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only")
    )
)]
pub async fn purge_user(
    AdminOnly(admin): AdminOnly,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PurgeResponse>, ApiError> {
    tracing::info!(user_id = %user_id, admin = %admin.user_id, "Admin purging user documents");
    let summary = state.db.purge_user(&user_id)?;

    Ok(Json(PurgeResponse {
        requests: summary.requests,
        withdrawals: summary.withdrawals,
        wallet_removed: summary.wallet_removed,
    }))
}

// ============================================================================
// Live Feeds (SSE)
// ============================================================================

/// Stream live first-page snapshots of the withdrawal-requests screen.
#[utoipa::path(
    get,
    path = "/v1/admin/withdrawal-requests/stream",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "SSE stream of request-page snapshots"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only")
    )
)]
pub async fn stream_withdrawal_requests(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    feed_sse::<WithdrawalRequestRecord>(state)
}

/// Stream live first-page snapshots of the withdrawals screen.
#[utoipa::path(
    get,
    path = "/v1/admin/withdrawals/stream",
    tag = "Admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "SSE stream of withdrawal-page snapshots"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin only")
    )
)]
pub async fn stream_withdrawals(
    AdminOnly(_admin): AdminOnly,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    feed_sse::<WithdrawalRecord>(state)
}

/// Start a per-connection live feed and adapt it to SSE.
///
/// The feed is owned by the stream: when the client disconnects the stream
/// drops, which cancels the feed task.
fn feed_sse<T>(state: AppState) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: FeedSource + serde::Serialize,
{
    let feed = LiveFeed::<T>::start(state.db.clone());
    let rx = feed.state();

    let stream = futures::stream::unfold(
        (rx, feed, true),
        |(mut rx, feed, first)| async move {
            if !first {
                rx.changed().await.ok()?;
            }
            let event = {
                let snapshot: &FeedState<T> = &rx.borrow_and_update();
                Event::default().event("snapshot").json_data(snapshot).ok()?
            };
            Some((Ok::<_, Infallible>(event), (rx, feed, false)))
        },
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}
