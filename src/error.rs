// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::ledger::LedgerError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<LedgerError> for ApiError {
    /// Map store errors onto the HTTP envelope. Detailed store internals
    /// stay in the logs; callers get the category and a short message.
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound(message) => ApiError::not_found(message),
            LedgerError::AlreadyExists(message) => ApiError::conflict(message),
            LedgerError::InsufficientFunds { .. } => ApiError::unprocessable(e.to_string()),
            other => {
                tracing::error!(error = %other, "Ledger operation failed");
                ApiError::internal("Ledger operation failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use rust_decimal::Decimal;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let unp = ApiError::unprocessable("oops");
        assert_eq!(unp.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(unp.message, "oops");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data"}"#);
    }

    #[test]
    fn ledger_errors_map_to_statuses() {
        let nf: ApiError = LedgerError::NotFound("request x".to_string()).into();
        assert_eq!(nf.status, StatusCode::NOT_FOUND);

        let dup: ApiError = LedgerError::AlreadyExists("id y".to_string()).into();
        assert_eq!(dup.status, StatusCode::CONFLICT);

        let poor: ApiError = LedgerError::InsufficientFunds {
            available: Decimal::new(10, 0),
            requested: Decimal::new(30, 0),
        }
        .into();
        assert_eq!(poor.status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
