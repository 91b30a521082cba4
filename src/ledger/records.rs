// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

//! Typed records for the withdrawal collections and the wallet ledger.
//!
//! Two collections track one logical withdrawal: the *request* a customer
//! files, and the *ledger entry* created when an admin confirms it. The
//! `withdrawal_id` correlation key joins them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// All balances and amounts in this service are denominated in USDT.
pub const CURRENCY: &str = "USDT";

/// Withdrawal request lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Filed by the customer, awaiting admin action
    Pending,
    /// Paid out; a ledger entry exists under the same `withdrawal_id`
    Confirmed,
}

impl Default for RequestStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Customer-filed withdrawal request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WithdrawalRequestRecord {
    /// Store-assigned record identifier (UUID)
    pub id: String,
    /// Client-chosen correlation identifier; becomes the ledger-entry key
    pub withdrawal_id: String,
    /// Owner user ID
    pub user_id: String,
    /// Owner email (notification target, search key)
    pub user_email: String,
    /// Owner display name
    pub username: String,
    /// Requested amount in USDT
    pub amount: Decimal,
    /// Destination wallet address
    pub address: String,
    /// Submission timestamp
    pub date: DateTime<Utc>,
    /// Current status
    pub status: RequestStatus,
}

impl WithdrawalRequestRecord {
    /// Construct a new pending request, stamped with the current time.
    pub fn new_pending(
        id: String,
        withdrawal_id: String,
        user_id: String,
        user_email: String,
        username: String,
        amount: Decimal,
        address: String,
    ) -> Self {
        Self {
            id,
            withdrawal_id,
            user_id,
            user_email,
            username,
            amount,
            address,
            date: Utc::now(),
            status: RequestStatus::Pending,
        }
    }

    /// Whether the request is still awaiting admin action.
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

/// Confirmed ledger entry. Its existence is the single source of truth for
/// "this withdrawal has been paid out".
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WithdrawalRecord {
    /// Ledger key; equal to the originating request's `withdrawal_id`
    pub id: String,
    /// Owner email
    pub user_email: String,
    /// Owner display name
    pub username: String,
    /// Paid-out amount in USDT
    pub amount: Decimal,
    /// Destination wallet address
    pub address: String,
    /// Confirmation timestamp
    pub date: DateTime<Utc>,
    /// Always `confirmed`
    pub status: RequestStatus,
}

impl WithdrawalRecord {
    /// Build a ledger entry from its originating request, stamped with a
    /// fresh confirmation timestamp.
    pub fn from_request(request: &WithdrawalRequestRecord, confirmed_at: DateTime<Utc>) -> Self {
        Self {
            id: request.withdrawal_id.clone(),
            user_email: request.user_email.clone(),
            username: request.username.clone(),
            amount: request.amount,
            address: request.address.clone(),
            date: confirmed_at,
            status: RequestStatus::Confirmed,
        }
    }
}

/// Per-user wallet balance.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WalletRecord {
    /// Owner user ID (one wallet per user)
    pub user_id: String,
    /// Current balance in USDT; never negative
    pub balance: Decimal,
    /// Last debit/credit timestamp
    pub updated_at: DateTime<Utc>,
}

impl WalletRecord {
    /// A fresh wallet with a zero balance.
    pub fn empty(user_id: String) -> Self {
        Self {
            user_id,
            balance: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> WithdrawalRequestRecord {
        WithdrawalRequestRecord::new_pending(
            "req-1".to_string(),
            "W1".to_string(),
            "user-1".to_string(),
            "a@x.com".to_string(),
            "alice".to_string(),
            "30".parse().unwrap(),
            "T9yD2kP".to_string(),
        )
    }

    #[test]
    fn new_request_is_pending() {
        let request = sample_request();
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(request.is_pending());
    }

    #[test]
    fn ledger_entry_inherits_request_fields() {
        let request = sample_request();
        let confirmed_at = Utc::now();
        let entry = WithdrawalRecord::from_request(&request, confirmed_at);

        assert_eq!(entry.id, request.withdrawal_id);
        assert_eq!(entry.user_email, request.user_email);
        assert_eq!(entry.amount, request.amount);
        assert_eq!(entry.status, RequestStatus::Confirmed);
        assert_eq!(entry.date, confirmed_at);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&RequestStatus::Pending).unwrap();
        assert_eq!(json, r#""pending""#);
        let json = serde_json::to_string(&RequestStatus::Confirmed).unwrap();
        assert_eq!(json, r#""confirmed""#);
    }

    #[test]
    fn amount_serializes_as_string() {
        let request = sample_request();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["amount"], serde_json::json!("30"));
    }

    #[test]
    fn empty_wallet_has_zero_balance() {
        let wallet = WalletRecord::empty("user-1".to_string());
        assert_eq!(wallet.balance, Decimal::ZERO);
    }
}
