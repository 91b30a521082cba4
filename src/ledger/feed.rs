// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

//! Live feeds over the withdrawal collections.
//!
//! A [`LiveFeed`] is an explicit subscription object: `start()` spawns a
//! background task that keeps a typed first-page snapshot current, `stop()`
//! (or drop) cancels it. Consumers watch the snapshot through a
//! `tokio::sync::watch` channel, so a slow consumer only ever sees the
//! latest state.
//!
//! The task requeries whenever the database publishes a change event for
//! the watched collection. The two collections have independent feeds with
//! no cross-feed ordering guarantee. A failed requery surfaces through the
//! snapshot's `error` slot and is not retried until the next change event;
//! retry policy belongs to the consumer.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use super::database::{
    ChangeEvent, LedgerDatabase, LedgerResult, PAGE_SIZE,
};
use super::records::{WithdrawalRecord, WithdrawalRequestRecord};

/// One decoded page plus the pagination and delivery state a consumer
/// needs to render it.
#[derive(Debug, Clone, Serialize)]
pub struct FeedState<T> {
    /// Newest-first first page (at most [`PAGE_SIZE`] records)
    pub records: Vec<T>,
    /// Cursor for fetching the next page, if any
    pub cursor: Option<String>,
    /// Total page count for the collection
    pub total_pages: u64,
    /// True until the first snapshot (or error) is delivered
    pub loading: bool,
    /// Last requery failure, if the most recent refresh failed
    pub error: Option<String>,
}

impl<T> FeedState<T> {
    fn initial() -> Self {
        Self {
            records: Vec::new(),
            cursor: None,
            total_pages: 0,
            loading: true,
            error: None,
        }
    }
}

/// A collection that can back a [`LiveFeed`].
pub trait FeedSource: Sized + Clone + Send + Sync + 'static {
    /// Collection name for logs.
    const NAME: &'static str;

    /// Whether a change event invalidates this feed's snapshot.
    fn relevant(event: ChangeEvent) -> bool;

    /// Fetch the first page and the collection count.
    fn first_page(db: &LedgerDatabase) -> LedgerResult<(Vec<Self>, Option<String>, u64)>;
}

impl FeedSource for WithdrawalRequestRecord {
    const NAME: &'static str = "withdrawal_requests";

    fn relevant(event: ChangeEvent) -> bool {
        event == ChangeEvent::Requests
    }

    fn first_page(db: &LedgerDatabase) -> LedgerResult<(Vec<Self>, Option<String>, u64)> {
        let (records, cursor) = db.list_requests(None, PAGE_SIZE)?;
        let count = db.count_requests()?;
        Ok((records, cursor, count))
    }
}

impl FeedSource for WithdrawalRecord {
    const NAME: &'static str = "withdrawals";

    fn relevant(event: ChangeEvent) -> bool {
        event == ChangeEvent::Withdrawals
    }

    fn first_page(db: &LedgerDatabase) -> LedgerResult<(Vec<Self>, Option<String>, u64)> {
        let (records, cursor) = db.list_withdrawals(None, PAGE_SIZE)?;
        let count = db.count_withdrawals()?;
        Ok((records, cursor, count))
    }
}

/// Live subscription to one collection's first page.
pub struct LiveFeed<T: FeedSource> {
    shutdown: CancellationToken,
    state: watch::Receiver<FeedState<T>>,
}

impl<T: FeedSource> LiveFeed<T> {
    /// Start the feed task and deliver the initial snapshot asynchronously.
    pub fn start(db: Arc<LedgerDatabase>) -> Self {
        let shutdown = CancellationToken::new();
        let (tx, rx) = watch::channel(FeedState::initial());
        let changes = db.changes();

        tokio::spawn(run::<T>(db, changes, tx, shutdown.clone()));

        Self {
            shutdown,
            state: rx,
        }
    }

    /// Watch handle onto the current snapshot.
    pub fn state(&self) -> watch::Receiver<FeedState<T>> {
        self.state.clone()
    }

    /// Cancel the feed task. Idempotent; also triggered by drop.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

impl<T: FeedSource> Drop for LiveFeed<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run<T: FeedSource>(
    db: Arc<LedgerDatabase>,
    mut changes: broadcast::Receiver<ChangeEvent>,
    tx: watch::Sender<FeedState<T>>,
    shutdown: CancellationToken,
) {
    tracing::debug!(collection = T::NAME, "Live feed starting");
    refresh(&db, &tx);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!(collection = T::NAME, "Live feed stopped");
                return;
            }
            event = changes.recv() => match event {
                Ok(event) if T::relevant(event) => refresh(&db, &tx),
                Ok(_) => {}
                // Missed notifications mean the snapshot may be stale: resync.
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(
                        collection = T::NAME,
                        missed,
                        "Live feed lagged behind change events, resyncing"
                    );
                    refresh(&db, &tx);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!(collection = T::NAME, "Change channel closed");
                    return;
                }
            }
        }
    }
}

fn refresh<T: FeedSource>(db: &LedgerDatabase, tx: &watch::Sender<FeedState<T>>) {
    match T::first_page(db) {
        Ok((records, cursor, count)) => {
            tx.send_modify(|state| {
                state.records = records;
                state.cursor = cursor;
                state.total_pages = count.div_ceil(PAGE_SIZE as u64);
                state.loading = false;
                state.error = None;
            });
        }
        Err(e) => {
            tracing::warn!(collection = T::NAME, error = %e, "Live feed query failed");
            // Keep the last good page; just surface the failure.
            tx.send_modify(|state| {
                state.loading = false;
                state.error = Some(e.to_string());
            });
        }
    }
}
