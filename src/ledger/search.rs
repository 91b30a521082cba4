// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

//! Exact-match lookup across both withdrawal collections.
//!
//! Admin screens search by the correlation id or by customer email. Results
//! replace whatever paginated lists the caller holds; they are never merged
//! into pagination state.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::database::{LedgerDatabase, LedgerResult};
use super::records::{WithdrawalRecord, WithdrawalRequestRecord};

/// Which field a search term is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchKey {
    /// Exact match on the correlation id (point lookup in both collections)
    WithdrawalId,
    /// Exact match on the customer email (collection scan)
    UserEmail,
}

/// Match sets from both collections for one search.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchResults {
    pub requests: Vec<WithdrawalRequestRecord>,
    pub withdrawals: Vec<WithdrawalRecord>,
}

impl SearchResults {
    /// True when neither collection matched: the "no results" condition.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.withdrawals.is_empty()
    }
}

/// Run an exact-match search against both collections.
///
/// Either both lookups succeed or the whole search fails; no partial
/// results are returned.
pub fn search(
    db: &LedgerDatabase,
    key: SearchKey,
    term: &str,
) -> LedgerResult<SearchResults> {
    match key {
        SearchKey::WithdrawalId => {
            let requests = db
                .get_request_by_withdrawal_id(term)?
                .into_iter()
                .collect();
            let withdrawals = db.get_withdrawal(term)?.into_iter().collect();
            Ok(SearchResults {
                requests,
                withdrawals,
            })
        }
        SearchKey::UserEmail => Ok(SearchResults {
            requests: db.find_requests_by_email(term)?,
            withdrawals: db.find_withdrawals_by_email(term)?,
        }),
    }
}
