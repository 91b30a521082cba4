// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

//! # Withdrawal Ledger Module
//!
//! Persistent state for the withdrawal lifecycle, backed by an embedded
//! redb database.
//!
//! ## Collections
//!
//! - `withdrawal_requests` - customer-filed intents, `pending` until an
//!   admin confirms them
//! - `withdrawals` - confirmed ledger entries keyed by the correlation id;
//!   existence means "paid out"
//! - `wallets` - one balance per user, debited on confirm
//!
//! ## Layers
//!
//! - [`records`] - typed documents
//! - [`database`] - storage, indexes, pagination, atomic transitions
//! - [`feed`] - live first-page subscriptions
//! - [`search`] - exact-match lookup across both collections

pub mod database;
pub mod feed;
pub mod records;
pub mod search;

pub use database::{
    ChangeEvent, LedgerDatabase, LedgerError, LedgerResult, PurgeSummary, RevertOutcome,
    PAGE_SIZE,
};
pub use feed::{FeedSource, FeedState, LiveFeed};
pub use records::{
    RequestStatus, WalletRecord, WithdrawalRecord, WithdrawalRequestRecord, CURRENCY,
};
pub use search::{SearchKey, SearchResults};
