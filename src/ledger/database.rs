// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

//! Embedded ledger database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `withdrawal_requests`: request_id → serialized WithdrawalRequestRecord
//! - `request_date_index`: `!timestamp_be|request_id` → request_id
//! - `request_correlations`: withdrawal_id → request_id
//! - `withdrawals`: withdrawal_id → serialized WithdrawalRecord
//! - `withdrawal_date_index`: `!timestamp_be|withdrawal_id` → withdrawal_id
//! - `wallets`: user_id → serialized WalletRecord
//!
//! The inverted-timestamp index keys make a forward range scan yield
//! newest-first pages; the cursor for the next page is the hex-encoded
//! index key of the last row on the current one.
//!
//! Confirm and revert are single write transactions: the ledger entry, the
//! request status and the wallet balance move together or not at all. redb
//! serializes writers, so the balance guard cannot race a concurrent
//! confirm.

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use rust_decimal::Decimal;
use tokio::sync::broadcast;

use super::records::{RequestStatus, WalletRecord, WithdrawalRecord, WithdrawalRequestRecord};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: request_id → serialized WithdrawalRequestRecord (JSON bytes).
const REQUESTS: TableDefinition<&str, &[u8]> = TableDefinition::new("withdrawal_requests");

/// Index: `!timestamp_be|request_id` → request_id, for newest-first scans.
const REQUEST_DATE_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("request_date_index");

/// Map: withdrawal_id → request_id. One request per correlation id.
const CORRELATIONS: TableDefinition<&str, &str> = TableDefinition::new("request_correlations");

/// Primary table: withdrawal_id → serialized WithdrawalRecord (JSON bytes).
const WITHDRAWALS: TableDefinition<&str, &[u8]> = TableDefinition::new("withdrawals");

/// Index: `!timestamp_be|withdrawal_id` → withdrawal_id.
const WITHDRAWAL_DATE_INDEX: TableDefinition<&[u8], &str> =
    TableDefinition::new("withdrawal_date_index");

/// Wallets: user_id → serialized WalletRecord (JSON bytes).
const WALLETS: TableDefinition<&str, &[u8]> = TableDefinition::new("wallets");

/// Fixed page size for list queries and live feeds.
pub const PAGE_SIZE: usize = 50;

/// Broadcast capacity for change notifications.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("insufficient funds: balance {available} USDT, requested {requested} USDT")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },
}

pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Change Events & Outcomes
// =============================================================================

/// Collection touched by a committed write. Published after every commit so
/// live feeds can requery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    Requests,
    Withdrawals,
    Wallets,
}

/// Result of a revert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertOutcome {
    /// Ledger entry deleted; the originating request (if still present) is
    /// pending again. `refunded` carries the credited amount when the
    /// refund policy applied.
    Reverted {
        request_id: Option<String>,
        refunded: Option<Decimal>,
    },
    /// No ledger entry under that withdrawal id; nothing was written.
    NoMatch,
}

/// What a user purge removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeSummary {
    pub requests: usize,
    pub withdrawals: usize,
    pub wallet_removed: bool,
}

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a date-index key: `inverted_timestamp_be_bytes | id`.
///
/// The inverted timestamp ensures newest-first ordering when scanning forward.
fn make_date_key(timestamp: i64, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + 1 + id.len());
    key.extend_from_slice(&(!timestamp as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(id.as_bytes());
    key
}

fn encode_cursor(key: &[u8]) -> String {
    hex::encode(key)
}

fn decode_cursor(cursor: &str) -> Option<Vec<u8>> {
    hex::decode(cursor).ok()
}

// =============================================================================
// LedgerDatabase
// =============================================================================

/// Embedded ACID store for the withdrawal collections and wallet balances.
pub struct LedgerDatabase {
    db: Database,
    changes: broadcast::Sender<ChangeEvent>,
}

impl LedgerDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(REQUESTS)?;
            let _ = write_txn.open_table(REQUEST_DATE_INDEX)?;
            let _ = write_txn.open_table(CORRELATIONS)?;
            let _ = write_txn.open_table(WITHDRAWALS)?;
            let _ = write_txn.open_table(WITHDRAWAL_DATE_INDEX)?;
            let _ = write_txn.open_table(WALLETS)?;
        }
        write_txn.commit()?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self { db, changes })
    }

    /// Subscribe to post-commit change notifications.
    pub fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    fn publish(&self, event: ChangeEvent) {
        // No receivers is fine; feeds come and go.
        let _ = self.changes.send(event);
    }

    // =========================================================================
    // Withdrawal Requests
    // =========================================================================

    /// Persist a new pending request and its index/correlation entries.
    pub fn insert_request(&self, record: &WithdrawalRequestRecord) -> LedgerResult<()> {
        let json = serde_json::to_vec(record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut requests = write_txn.open_table(REQUESTS)?;
            if requests.get(record.id.as_str())?.is_some() {
                return Err(LedgerError::AlreadyExists(format!(
                    "Withdrawal request {}",
                    record.id
                )));
            }

            let mut correlations = write_txn.open_table(CORRELATIONS)?;
            if correlations.get(record.withdrawal_id.as_str())?.is_some() {
                return Err(LedgerError::AlreadyExists(format!(
                    "Withdrawal id {}",
                    record.withdrawal_id
                )));
            }

            requests.insert(record.id.as_str(), json.as_slice())?;
            correlations.insert(record.withdrawal_id.as_str(), record.id.as_str())?;

            let mut index = write_txn.open_table(REQUEST_DATE_INDEX)?;
            let key = make_date_key(record.date.timestamp(), &record.id);
            index.insert(key.as_slice(), record.id.as_str())?;
        }
        write_txn.commit()?;

        self.publish(ChangeEvent::Requests);
        Ok(())
    }

    /// Look up a single request by its store-assigned id.
    pub fn get_request(&self, request_id: &str) -> LedgerResult<Option<WithdrawalRequestRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REQUESTS)?;
        match table.get(request_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look up the request correlated with a withdrawal id.
    pub fn get_request_by_withdrawal_id(
        &self,
        withdrawal_id: &str,
    ) -> LedgerResult<Option<WithdrawalRequestRecord>> {
        let read_txn = self.db.begin_read()?;
        let correlations = read_txn.open_table(CORRELATIONS)?;
        let request_id = match correlations.get(withdrawal_id)? {
            Some(value) => value.value().to_string(),
            None => return Ok(None),
        };
        let requests = read_txn.open_table(REQUESTS)?;
        match requests.get(request_id.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Paginated listing of requests, newest first.
    ///
    /// Returns `(records, next_cursor)`. Pass the returned cursor back to
    /// fetch the following page; `None` means the collection is exhausted.
    pub fn list_requests(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> LedgerResult<(Vec<WithdrawalRequestRecord>, Option<String>)> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(REQUEST_DATE_INDEX)?;
        let table = read_txn.open_table(REQUESTS)?;
        Self::scan_page(&index, limit, cursor, |id| {
            Ok(match table.get(id)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            })
        })
    }

    /// Total number of stored requests.
    pub fn count_requests(&self) -> LedgerResult<u64> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(REQUEST_DATE_INDEX)?;
        Self::count_entries(&index)
    }

    /// All requests filed by one user, newest first. Full scan; per-user
    /// volumes are small.
    pub fn find_requests_by_user(
        &self,
        user_id: &str,
    ) -> LedgerResult<Vec<WithdrawalRequestRecord>> {
        self.scan_requests(|record| record.user_id == user_id)
    }

    /// All requests carrying the given email, newest first.
    pub fn find_requests_by_email(
        &self,
        user_email: &str,
    ) -> LedgerResult<Vec<WithdrawalRequestRecord>> {
        self.scan_requests(|record| record.user_email == user_email)
    }

    fn scan_requests(
        &self,
        keep: impl Fn(&WithdrawalRequestRecord) -> bool,
    ) -> LedgerResult<Vec<WithdrawalRequestRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REQUESTS)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let record: WithdrawalRequestRecord = serde_json::from_slice(value.value())?;
            if keep(&record) {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(records)
    }

    // =========================================================================
    // Withdrawals (ledger entries)
    // =========================================================================

    /// Look up a single ledger entry by withdrawal id.
    pub fn get_withdrawal(&self, withdrawal_id: &str) -> LedgerResult<Option<WithdrawalRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WITHDRAWALS)?;
        match table.get(withdrawal_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Paginated listing of ledger entries, newest first.
    pub fn list_withdrawals(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> LedgerResult<(Vec<WithdrawalRecord>, Option<String>)> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(WITHDRAWAL_DATE_INDEX)?;
        let table = read_txn.open_table(WITHDRAWALS)?;
        Self::scan_page(&index, limit, cursor, |id| {
            Ok(match table.get(id)? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            })
        })
    }

    /// Total number of ledger entries.
    pub fn count_withdrawals(&self) -> LedgerResult<u64> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(WITHDRAWAL_DATE_INDEX)?;
        Self::count_entries(&index)
    }

    /// All ledger entries carrying the given email, newest first.
    pub fn find_withdrawals_by_email(
        &self,
        user_email: &str,
    ) -> LedgerResult<Vec<WithdrawalRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WITHDRAWALS)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let record: WithdrawalRecord = serde_json::from_slice(value.value())?;
            if record.user_email == user_email {
                records.push(record);
            }
        }
        records.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(records)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Confirm a pending request: create the ledger entry under the shared
    /// withdrawal id, debit the wallet, and flip the request status, all in
    /// one transaction. An insufficient balance aborts the whole transition.
    ///
    /// Confirming an already-confirmed request refreshes the ledger entry
    /// (overwrite with the latest confirmation data) without debiting again.
    pub fn confirm_request(&self, request_id: &str) -> LedgerResult<WithdrawalRecord> {
        let now = Utc::now();

        let write_txn = self.db.begin_write()?;
        let (entry, debited) = {
            let mut requests = write_txn.open_table(REQUESTS)?;
            let mut request: WithdrawalRequestRecord = match requests.get(request_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => {
                    return Err(LedgerError::NotFound(format!(
                        "Withdrawal request {request_id}"
                    )))
                }
            };

            let already_confirmed = request.status == RequestStatus::Confirmed;
            let entry = WithdrawalRecord::from_request(&request, now);

            let mut withdrawals = write_txn.open_table(WITHDRAWALS)?;
            let mut wd_index = write_txn.open_table(WITHDRAWAL_DATE_INDEX)?;

            // Overwrite semantics: a previous entry under this id gives way,
            // including its date-index key.
            let previous_date = match withdrawals.get(entry.id.as_str())? {
                Some(value) => {
                    let previous: WithdrawalRecord = serde_json::from_slice(value.value())?;
                    Some(previous.date)
                }
                None => None,
            };
            if let Some(date) = previous_date {
                wd_index.remove(make_date_key(date.timestamp(), &entry.id).as_slice())?;
            }

            withdrawals.insert(entry.id.as_str(), serde_json::to_vec(&entry)?.as_slice())?;
            wd_index.insert(
                make_date_key(entry.date.timestamp(), &entry.id).as_slice(),
                entry.id.as_str(),
            )?;

            // The debit belongs to the pending -> confirmed edge only.
            let debited = if already_confirmed {
                false
            } else {
                let mut wallets = write_txn.open_table(WALLETS)?;
                let mut wallet = match wallets.get(request.user_id.as_str())? {
                    Some(value) => serde_json::from_slice(value.value())?,
                    None => WalletRecord::empty(request.user_id.clone()),
                };
                if wallet.balance < request.amount {
                    // Dropping the transaction aborts it: no ledger entry, no
                    // status flip, no balance change.
                    return Err(LedgerError::InsufficientFunds {
                        available: wallet.balance,
                        requested: request.amount,
                    });
                }
                wallet.balance -= request.amount;
                wallet.updated_at = now;
                wallets.insert(
                    request.user_id.as_str(),
                    serde_json::to_vec(&wallet)?.as_slice(),
                )?;
                true
            };

            request.status = RequestStatus::Confirmed;
            requests.insert(request_id, serde_json::to_vec(&request)?.as_slice())?;

            (entry, debited)
        };
        write_txn.commit()?;

        self.publish(ChangeEvent::Requests);
        self.publish(ChangeEvent::Withdrawals);
        if debited {
            self.publish(ChangeEvent::Wallets);
        }
        Ok(entry)
    }

    /// Revert a confirmed withdrawal: delete the ledger entry and return the
    /// originating request to `pending`, crediting the wallet back when
    /// `refund` is set. A missing ledger entry is a no-op, not an error.
    pub fn revert_withdrawal(
        &self,
        withdrawal_id: &str,
        refund: bool,
    ) -> LedgerResult<RevertOutcome> {
        let now = Utc::now();

        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut withdrawals = write_txn.open_table(WITHDRAWALS)?;
            let entry: WithdrawalRecord = match withdrawals.get(withdrawal_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                // Dropping the uncommitted transaction keeps this a true no-op.
                None => return Ok(RevertOutcome::NoMatch),
            };

            withdrawals.remove(withdrawal_id)?;
            let mut wd_index = write_txn.open_table(WITHDRAWAL_DATE_INDEX)?;
            wd_index.remove(make_date_key(entry.date.timestamp(), &entry.id).as_slice())?;

            let correlations = write_txn.open_table(CORRELATIONS)?;
            let request_id = match correlations.get(withdrawal_id)? {
                Some(value) => Some(value.value().to_string()),
                None => None,
            };

            let mut refunded = None;
            if let Some(ref request_id) = request_id {
                let mut requests = write_txn.open_table(REQUESTS)?;
                let stored = match requests.get(request_id.as_str())? {
                    Some(value) => Some(value.value().to_vec()),
                    None => None,
                };
                match stored {
                    Some(bytes) => {
                        let mut request: WithdrawalRequestRecord =
                            serde_json::from_slice(&bytes)?;
                        request.status = RequestStatus::Pending;
                        requests.insert(
                            request_id.as_str(),
                            serde_json::to_vec(&request)?.as_slice(),
                        )?;

                        if refund {
                            let mut wallets = write_txn.open_table(WALLETS)?;
                            let mut wallet = match wallets.get(request.user_id.as_str())? {
                                Some(value) => serde_json::from_slice(value.value())?,
                                None => WalletRecord::empty(request.user_id.clone()),
                            };
                            wallet.balance += entry.amount;
                            wallet.updated_at = now;
                            wallets.insert(
                                request.user_id.as_str(),
                                serde_json::to_vec(&wallet)?.as_slice(),
                            )?;
                            refunded = Some(entry.amount);
                        }
                    }
                    None => {
                        tracing::warn!(
                            withdrawal_id,
                            request_id = %request_id,
                            "Reverting a withdrawal whose originating request is gone"
                        );
                    }
                }
            }

            RevertOutcome::Reverted {
                request_id,
                refunded,
            }
        };
        write_txn.commit()?;

        self.publish(ChangeEvent::Withdrawals);
        self.publish(ChangeEvent::Requests);
        if matches!(
            outcome,
            RevertOutcome::Reverted {
                refunded: Some(_),
                ..
            }
        ) {
            self.publish(ChangeEvent::Wallets);
        }
        Ok(outcome)
    }

    // =========================================================================
    // Wallet Ledger
    // =========================================================================

    /// Current wallet state, if one exists for the user.
    pub fn get_wallet(&self, user_id: &str) -> LedgerResult<Option<WalletRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(WALLETS)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Credit a wallet. A missing wallet starts from a zero balance.
    pub fn credit(&self, user_id: &str, amount: Decimal) -> LedgerResult<WalletRecord> {
        let write_txn = self.db.begin_write()?;
        let wallet = {
            let mut wallets = write_txn.open_table(WALLETS)?;
            let mut wallet = match wallets.get(user_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => WalletRecord::empty(user_id.to_string()),
            };
            wallet.balance += amount;
            wallet.updated_at = Utc::now();
            wallets.insert(user_id, serde_json::to_vec(&wallet)?.as_slice())?;
            wallet
        };
        write_txn.commit()?;

        self.publish(ChangeEvent::Wallets);
        Ok(wallet)
    }

    /// Debit a wallet. The balance check and the write share one
    /// transaction, so the balance can never go below zero: an
    /// insufficient balance fails the debit and writes nothing.
    pub fn debit(&self, user_id: &str, amount: Decimal) -> LedgerResult<WalletRecord> {
        let write_txn = self.db.begin_write()?;
        let wallet = {
            let mut wallets = write_txn.open_table(WALLETS)?;
            let mut wallet = match wallets.get(user_id)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => WalletRecord::empty(user_id.to_string()),
            };
            if wallet.balance < amount {
                return Err(LedgerError::InsufficientFunds {
                    available: wallet.balance,
                    requested: amount,
                });
            }
            wallet.balance -= amount;
            wallet.updated_at = Utc::now();
            wallets.insert(user_id, serde_json::to_vec(&wallet)?.as_slice())?;
            wallet
        };
        write_txn.commit()?;

        self.publish(ChangeEvent::Wallets);
        Ok(wallet)
    }

    // =========================================================================
    // Account Purge
    // =========================================================================

    /// Remove every document belonging to a user (requests, their index and
    /// correlation entries, correlated ledger entries, and the wallet) in
    /// one atomic batch.
    pub fn purge_user(&self, user_id: &str) -> LedgerResult<PurgeSummary> {
        let write_txn = self.db.begin_write()?;
        let summary = {
            let mut requests = write_txn.open_table(REQUESTS)?;

            // Collect first, mutate after: (request_id, withdrawal_id, ts)
            let mut victims = Vec::new();
            for entry in requests.iter()? {
                let (key, value) = entry?;
                let record: WithdrawalRequestRecord = serde_json::from_slice(value.value())?;
                if record.user_id == user_id {
                    victims.push((
                        key.value().to_string(),
                        record.withdrawal_id,
                        record.date.timestamp(),
                    ));
                }
            }

            let mut req_index = write_txn.open_table(REQUEST_DATE_INDEX)?;
            let mut correlations = write_txn.open_table(CORRELATIONS)?;
            let mut withdrawals = write_txn.open_table(WITHDRAWALS)?;
            let mut wd_index = write_txn.open_table(WITHDRAWAL_DATE_INDEX)?;

            let mut removed_withdrawals = 0;
            for (request_id, withdrawal_id, timestamp) in &victims {
                requests.remove(request_id.as_str())?;
                req_index.remove(make_date_key(*timestamp, request_id).as_slice())?;
                correlations.remove(withdrawal_id.as_str())?;

                let entry_date = match withdrawals.get(withdrawal_id.as_str())? {
                    Some(value) => {
                        let entry: WithdrawalRecord = serde_json::from_slice(value.value())?;
                        Some(entry.date)
                    }
                    None => None,
                };
                if let Some(date) = entry_date {
                    withdrawals.remove(withdrawal_id.as_str())?;
                    wd_index
                        .remove(make_date_key(date.timestamp(), withdrawal_id).as_slice())?;
                    removed_withdrawals += 1;
                }
            }

            let mut wallets = write_txn.open_table(WALLETS)?;
            let wallet_removed = wallets.remove(user_id)?.is_some();

            PurgeSummary {
                requests: victims.len(),
                withdrawals: removed_withdrawals,
                wallet_removed,
            }
        };
        write_txn.commit()?;

        self.publish(ChangeEvent::Requests);
        self.publish(ChangeEvent::Withdrawals);
        self.publish(ChangeEvent::Wallets);
        Ok(summary)
    }

    // =========================================================================
    // Scan Helpers
    // =========================================================================

    /// Walk a date index from an optional cursor, decoding up to `limit`
    /// records through `load`. Returns the page and the next cursor.
    fn scan_page<T>(
        index: &impl ReadableTable<&'static [u8], &'static str>,
        limit: usize,
        cursor: Option<&str>,
        load: impl Fn(&str) -> LedgerResult<Option<T>>,
    ) -> LedgerResult<(Vec<T>, Option<String>)> {
        let start: Vec<u8> = cursor.and_then(decode_cursor).unwrap_or_default();
        let mut skip_first = cursor.is_some() && !start.is_empty();

        let mut results = Vec::with_capacity(limit);
        let mut last_key: Option<Vec<u8>> = None;

        for entry in index.range::<&[u8]>(start.as_slice()..)? {
            let (key, id) = entry?;

            // Skip the cursor entry itself
            if skip_first {
                skip_first = false;
                continue;
            }

            if let Some(record) = load(id.value())? {
                last_key = Some(key.value().to_vec());
                results.push(record);
            }

            if results.len() >= limit {
                break;
            }
        }

        let next_cursor = if results.len() >= limit {
            last_key.map(|key| encode_cursor(&key))
        } else {
            None
        };

        Ok((results, next_cursor))
    }

    fn count_entries(
        index: &impl ReadableTable<&'static [u8], &'static str>,
    ) -> LedgerResult<u64> {
        let mut count = 0;
        for entry in index.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn temp_db() -> (LedgerDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDatabase::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn sample_request(id: &str, withdrawal_id: &str) -> WithdrawalRequestRecord {
        WithdrawalRequestRecord::new_pending(
            id.to_string(),
            withdrawal_id.to_string(),
            "U1".to_string(),
            "a@x.com".to_string(),
            "alice".to_string(),
            "30".parse().unwrap(),
            "TXmGz41pq".to_string(),
        )
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn insert_and_get_request() {
        let (db, _dir) = temp_db();
        db.insert_request(&sample_request("req-1", "W1")).unwrap();

        let loaded = db.get_request("req-1").unwrap().unwrap();
        assert_eq!(loaded.withdrawal_id, "W1");
        assert_eq!(loaded.status, RequestStatus::Pending);

        let by_correlation = db.get_request_by_withdrawal_id("W1").unwrap().unwrap();
        assert_eq!(by_correlation.id, "req-1");
    }

    #[test]
    fn duplicate_withdrawal_id_rejected() {
        let (db, _dir) = temp_db();
        db.insert_request(&sample_request("req-1", "W1")).unwrap();

        let result = db.insert_request(&sample_request("req-2", "W1"));
        assert!(matches!(result, Err(LedgerError::AlreadyExists(_))));
        assert!(db.get_request("req-2").unwrap().is_none());
    }

    #[test]
    fn confirm_debits_wallet_and_creates_ledger_entry() {
        let (db, _dir) = temp_db();
        db.credit("U1", dec("100")).unwrap();
        db.insert_request(&sample_request("req-1", "W1")).unwrap();

        db.confirm_request("req-1").unwrap();

        assert_eq!(db.get_wallet("U1").unwrap().unwrap().balance, dec("70"));
        let entry = db.get_withdrawal("W1").unwrap().unwrap();
        assert_eq!(entry.status, RequestStatus::Confirmed);
        assert_eq!(entry.amount, dec("30"));
        let request = db.get_request("req-1").unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Confirmed);
    }

    #[test]
    fn confirm_missing_request_is_not_found() {
        let (db, _dir) = temp_db();
        let result = db.confirm_request("nope");
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[test]
    fn insufficient_funds_aborts_whole_confirm() {
        let (db, _dir) = temp_db();
        db.credit("U1", dec("10")).unwrap();
        db.insert_request(&sample_request("req-1", "W1")).unwrap();

        let result = db.confirm_request("req-1");
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { .. })
        ));

        // Nothing moved: balance intact, no ledger entry, request pending.
        assert_eq!(db.get_wallet("U1").unwrap().unwrap().balance, dec("10"));
        assert!(db.get_withdrawal("W1").unwrap().is_none());
        let request = db.get_request("req-1").unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
    }

    #[test]
    fn double_confirm_keeps_one_entry_and_debits_once() {
        let (db, _dir) = temp_db();
        db.credit("U1", dec("100")).unwrap();
        db.insert_request(&sample_request("req-1", "W1")).unwrap();

        let first = db.confirm_request("req-1").unwrap();
        let second = db.confirm_request("req-1").unwrap();

        // Overwrite semantics: one document, latest confirmation data.
        let entry = db.get_withdrawal("W1").unwrap().unwrap();
        assert_eq!(entry.date, second.date);
        assert!(second.date >= first.date);
        let (page, _) = db.list_withdrawals(None, 10).unwrap();
        assert_eq!(page.len(), 1);

        // The debit fired only on the pending -> confirmed edge.
        assert_eq!(db.get_wallet("U1").unwrap().unwrap().balance, dec("70"));
    }

    #[test]
    fn revert_restores_request_and_refunds() {
        let (db, _dir) = temp_db();
        db.credit("U1", dec("100")).unwrap();
        db.insert_request(&sample_request("req-1", "W1")).unwrap();
        db.confirm_request("req-1").unwrap();

        let outcome = db.revert_withdrawal("W1", true).unwrap();
        assert_eq!(
            outcome,
            RevertOutcome::Reverted {
                request_id: Some("req-1".to_string()),
                refunded: Some(dec("30")),
            }
        );

        assert!(db.get_withdrawal("W1").unwrap().is_none());
        let request = db.get_request("req-1").unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(db.get_wallet("U1").unwrap().unwrap().balance, dec("100"));
    }

    #[test]
    fn revert_without_refund_keeps_balance() {
        let (db, _dir) = temp_db();
        db.credit("U1", dec("100")).unwrap();
        db.insert_request(&sample_request("req-1", "W1")).unwrap();
        db.confirm_request("req-1").unwrap();

        let outcome = db.revert_withdrawal("W1", false).unwrap();
        assert!(matches!(
            outcome,
            RevertOutcome::Reverted { refunded: None, .. }
        ));
        assert_eq!(db.get_wallet("U1").unwrap().unwrap().balance, dec("70"));
    }

    #[test]
    fn revert_missing_entry_is_a_noop() {
        let (db, _dir) = temp_db();
        db.credit("U1", dec("100")).unwrap();
        db.insert_request(&sample_request("req-1", "W1")).unwrap();

        let outcome = db.revert_withdrawal("W1", true).unwrap();
        assert_eq!(outcome, RevertOutcome::NoMatch);

        // No writes happened.
        let request = db.get_request("req-1").unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(db.get_wallet("U1").unwrap().unwrap().balance, dec("100"));
    }

    #[test]
    fn debit_rejects_overdraw_and_leaves_balance() {
        let (db, _dir) = temp_db();
        db.credit("U1", dec("50")).unwrap();

        let result = db.debit("U1", dec("51"));
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { .. })
        ));
        assert_eq!(db.get_wallet("U1").unwrap().unwrap().balance, dec("50"));

        let wallet = db.debit("U1", dec("50")).unwrap();
        assert_eq!(wallet.balance, Decimal::ZERO);
    }

    #[test]
    fn credit_missing_wallet_starts_from_zero() {
        let (db, _dir) = temp_db();
        let wallet = db.credit("U9", dec("12.5")).unwrap();
        assert_eq!(wallet.balance, dec("12.5"));
    }

    #[test]
    fn pagination_yields_collection_exactly_once_newest_first() {
        let (db, _dir) = temp_db();
        let base = Utc::now();
        for i in 0..120 {
            let mut request = sample_request(&format!("req-{i:03}"), &format!("W{i:03}"));
            request.date = base - Duration::seconds(i);
            db.insert_request(&request).unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let (page, next) = db.list_requests(cursor.as_deref(), PAGE_SIZE).unwrap();
            for window in page.windows(2) {
                assert!(window[0].date >= window[1].date, "newest first within page");
            }
            seen.extend(page);
            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(seen.len(), 120);
        for window in seen.windows(2) {
            assert!(window[0].date >= window[1].date, "newest first across pages");
        }
        let mut ids: Vec<_> = seen.iter().map(|r| r.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 120, "every record exactly once");
    }

    #[test]
    fn counts_track_inserts_and_confirms() {
        let (db, _dir) = temp_db();
        db.credit("U1", dec("100")).unwrap();
        db.insert_request(&sample_request("req-1", "W1")).unwrap();
        db.insert_request(&sample_request("req-2", "W2")).unwrap();

        assert_eq!(db.count_requests().unwrap(), 2);
        assert_eq!(db.count_withdrawals().unwrap(), 0);

        db.confirm_request("req-1").unwrap();
        assert_eq!(db.count_withdrawals().unwrap(), 1);
    }

    #[test]
    fn email_scans_filter_both_collections() {
        let (db, _dir) = temp_db();
        db.credit("U1", dec("100")).unwrap();
        db.insert_request(&sample_request("req-1", "W1")).unwrap();
        let mut other = sample_request("req-2", "W2");
        other.user_email = "b@y.com".to_string();
        db.insert_request(&other).unwrap();
        db.confirm_request("req-1").unwrap();

        let requests = db.find_requests_by_email("a@x.com").unwrap();
        assert_eq!(requests.len(), 1);
        let withdrawals = db.find_withdrawals_by_email("a@x.com").unwrap();
        assert_eq!(withdrawals.len(), 1);

        assert!(db.find_withdrawals_by_email("b@y.com").unwrap().is_empty());
    }

    #[test]
    fn purge_user_removes_all_documents() {
        let (db, _dir) = temp_db();
        db.credit("U1", dec("100")).unwrap();
        db.insert_request(&sample_request("req-1", "W1")).unwrap();
        db.insert_request(&sample_request("req-2", "W2")).unwrap();
        db.confirm_request("req-1").unwrap();

        let mut stranger = sample_request("req-9", "W9");
        stranger.user_id = "U2".to_string();
        db.insert_request(&stranger).unwrap();

        let summary = db.purge_user("U1").unwrap();
        assert_eq!(summary.requests, 2);
        assert_eq!(summary.withdrawals, 1);
        assert!(summary.wallet_removed);

        assert!(db.get_request("req-1").unwrap().is_none());
        assert!(db.get_withdrawal("W1").unwrap().is_none());
        assert!(db.get_wallet("U1").unwrap().is_none());
        assert_eq!(db.count_requests().unwrap(), 1);
        assert!(db.get_request("req-9").unwrap().is_some());
    }

    #[test]
    fn change_events_published_on_commit() {
        let (db, _dir) = temp_db();
        let mut changes = db.changes();

        db.insert_request(&sample_request("req-1", "W1")).unwrap();
        assert_eq!(changes.try_recv().unwrap(), ChangeEvent::Requests);
    }

    #[test]
    fn date_key_ordering_is_newest_first() {
        // Newer timestamps must produce smaller keys (forward scan = newest first)
        let key_old = make_date_key(1000, "a");
        let key_new = make_date_key(2000, "a");
        assert!(key_new < key_old);
    }

    #[test]
    fn cursor_round_trips() {
        let key = make_date_key(1234567, "req-1");
        let encoded = encode_cursor(&key);
        assert_eq!(decode_cursor(&encoded), Some(key));
        assert_eq!(decode_cursor("not hex!"), None);
    }
}
