// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

pub mod admin;
pub mod health;
pub mod requests;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/withdrawal-requests",
            post(requests::submit_withdrawal_request).get(requests::list_own_requests),
        )
        .route("/wallet", get(requests::get_own_wallet))
        .route(
            "/admin/withdrawal-requests",
            get(admin::list_withdrawal_requests),
        )
        .route(
            "/admin/withdrawal-requests/stream",
            get(admin::stream_withdrawal_requests),
        )
        .route(
            "/admin/withdrawal-requests/{request_id}/confirm",
            post(admin::confirm_withdrawal_request),
        )
        .route("/admin/withdrawals", get(admin::list_withdrawals))
        .route(
            "/admin/withdrawals/stream",
            get(admin::stream_withdrawals),
        )
        .route(
            "/admin/withdrawals/{withdrawal_id}/revert",
            post(admin::revert_withdrawal),
        )
        .route("/admin/search", get(admin::search_withdrawals))
        .route(
            "/admin/wallets/{user_id}/credit",
            post(admin::credit_wallet),
        )
        .route("/admin/users/{user_id}", delete(admin::purge_user));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        requests::submit_withdrawal_request,
        requests::list_own_requests,
        requests::get_own_wallet,
        admin::list_withdrawal_requests,
        admin::list_withdrawals,
        admin::search_withdrawals,
        admin::confirm_withdrawal_request,
        admin::revert_withdrawal,
        admin::credit_wallet,
        admin::purge_user,
        admin::stream_withdrawal_requests,
        admin::stream_withdrawals
    ),
    components(
        schemas(
            crate::ledger::WithdrawalRequestRecord,
            crate::ledger::WithdrawalRecord,
            crate::ledger::RequestStatus,
            crate::ledger::SearchKey,
            requests::SubmitWithdrawalRequest,
            requests::OwnRequestsResponse,
            requests::WalletBalanceResponse,
            admin::RequestPageResponse,
            admin::WithdrawalPageResponse,
            admin::SearchResponse,
            admin::RevertResponse,
            admin::CreditRequest,
            admin::PurgeResponse,
            health::ReadyResponse,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Service probes"),
        (name = "Withdrawals", description = "Customer withdrawal requests"),
        (name = "Wallet", description = "Customer wallet balance"),
        (name = "Admin", description = "Back-office withdrawal management")
    )
)]
struct ApiDoc;
