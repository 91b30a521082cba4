// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

//! Withdrawal transition engine.
//!
//! Admin actions drive exactly two transitions: confirm (`pending →
//! confirmed`, debiting the wallet) and revert (`confirmed → pending`,
//! deleting the ledger entry). This layer wraps the database transitions
//! with logging, customer notifications and the refund policy; the
//! atomicity lives in [`crate::ledger::database`].
//!
//! There is no in-flight state and no timer-driven expiry: a transition
//! either commits whole or leaves nothing behind.

use std::sync::Arc;

use crate::ledger::{
    LedgerDatabase, LedgerResult, RevertOutcome, WithdrawalRecord, WithdrawalRequestRecord,
};
use crate::mailer::{MailTemplate, Mailer};

/// Orchestrates withdrawal state transitions and their notifications.
#[derive(Clone)]
pub struct WithdrawalLifecycle {
    db: Arc<LedgerDatabase>,
    mailer: Mailer,
    refund_on_revert: bool,
}

impl WithdrawalLifecycle {
    pub fn new(db: Arc<LedgerDatabase>, mailer: Mailer, refund_on_revert: bool) -> Self {
        Self {
            db,
            mailer,
            refund_on_revert,
        }
    }

    /// Whether reverting a payout credits the amount back to the wallet.
    pub fn refunds_on_revert(&self) -> bool {
        self.refund_on_revert
    }

    /// File a new withdrawal request and notify the customer.
    pub async fn submit(
        &self,
        record: WithdrawalRequestRecord,
    ) -> LedgerResult<WithdrawalRequestRecord> {
        self.db.insert_request(&record)?;
        tracing::info!(
            request_id = %record.id,
            withdrawal_id = %record.withdrawal_id,
            user_id = %record.user_id,
            amount = %record.amount,
            "Withdrawal request filed"
        );

        self.notify(
            MailTemplate::WithdrawalRequested {
                username: record.username.clone(),
                withdrawal_id: record.withdrawal_id.clone(),
                amount: record.amount,
            },
            &record.user_email,
        )
        .await;

        Ok(record)
    }

    /// Confirm a pending request: ledger entry created, wallet debited,
    /// request flipped to `confirmed`, atomically. Failures (missing
    /// request, insufficient balance) report to the caller and leave no
    /// partial state.
    pub async fn confirm(&self, request_id: &str) -> LedgerResult<WithdrawalRecord> {
        let entry = match self.db.confirm_request(request_id) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(request_id, error = %e, "Withdrawal confirm failed");
                return Err(e);
            }
        };

        tracing::info!(
            request_id,
            withdrawal_id = %entry.id,
            amount = %entry.amount,
            "Withdrawal confirmed"
        );

        self.notify(
            MailTemplate::WithdrawalConfirmed {
                username: entry.username.clone(),
                withdrawal_id: entry.id.clone(),
                amount: entry.amount,
                address: entry.address.clone(),
            },
            &entry.user_email,
        )
        .await;

        Ok(entry)
    }

    /// Revert a confirmed withdrawal by its correlation id. A missing
    /// ledger entry is a no-op outcome, not an error.
    pub async fn revert(&self, withdrawal_id: &str) -> LedgerResult<RevertOutcome> {
        // Snapshot the entry first; the revert deletes it and the
        // notification needs its fields.
        let entry = self.db.get_withdrawal(withdrawal_id)?;
        self.revert_inner(withdrawal_id, entry.as_ref()).await
    }

    /// Revert driven from a withdrawals list row. Equivalent effect to
    /// [`revert`](Self::revert); the row already carries the notification
    /// fields.
    pub async fn revert_entry(&self, entry: &WithdrawalRecord) -> LedgerResult<RevertOutcome> {
        self.revert_inner(&entry.id, Some(entry)).await
    }

    async fn revert_inner(
        &self,
        withdrawal_id: &str,
        entry: Option<&WithdrawalRecord>,
    ) -> LedgerResult<RevertOutcome> {
        let outcome = match self.db.revert_withdrawal(withdrawal_id, self.refund_on_revert) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(withdrawal_id, error = %e, "Withdrawal revert failed");
                return Err(e);
            }
        };

        match &outcome {
            RevertOutcome::Reverted {
                request_id,
                refunded,
            } => {
                tracing::info!(
                    withdrawal_id,
                    request_id = request_id.as_deref().unwrap_or("<missing>"),
                    refunded = refunded.map(|a| a.to_string()).as_deref().unwrap_or("none"),
                    "Withdrawal reverted"
                );

                if let Some(entry) = entry {
                    self.notify(
                        MailTemplate::WithdrawalReverted {
                            username: entry.username.clone(),
                            withdrawal_id: entry.id.clone(),
                            amount: entry.amount,
                        },
                        &entry.user_email,
                    )
                    .await;
                }
            }
            RevertOutcome::NoMatch => {
                tracing::info!(withdrawal_id, "No matching withdrawal found to revert");
            }
        }

        Ok(outcome)
    }

    /// Best-effort notification: delivery failures are logged, never
    /// propagated.
    async fn notify(&self, template: MailTemplate, recipient: &str) {
        if let Err(e) = self.mailer.send(template, recipient).await {
            tracing::warn!(recipient, error = %e, "Notification mail failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerError, RequestStatus};
    use rust_decimal::Decimal;

    fn fixture(refund_on_revert: bool) -> (WithdrawalLifecycle, Arc<LedgerDatabase>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(LedgerDatabase::open(&dir.path().join("test.redb")).unwrap());
        let lifecycle = WithdrawalLifecycle::new(db.clone(), Mailer::Disabled, refund_on_revert);
        (lifecycle, db, dir)
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

    #[tokio::test]
    async fn submit_then_confirm_then_revert_round_trip() {
        let (lifecycle, db, _dir) = fixture(true);
        db.credit("U1", dec("100")).unwrap();

        lifecycle.submit(sample_request("req-1", "W1")).await.unwrap();
        let entry = lifecycle.confirm("req-1").await.unwrap();
        assert_eq!(entry.id, "W1");
        assert_eq!(db.get_wallet("U1").unwrap().unwrap().balance, dec("70"));

        let outcome = lifecycle.revert("W1").await.unwrap();
        assert!(matches!(outcome, RevertOutcome::Reverted { .. }));
        assert_eq!(db.get_wallet("U1").unwrap().unwrap().balance, dec("100"));
        assert_eq!(
            db.get_request("req-1").unwrap().unwrap().status,
            RequestStatus::Pending
        );
    }

    #[tokio::test]
    async fn revert_without_refund_policy_keeps_balance() {
        let (lifecycle, db, _dir) = fixture(false);
        db.credit("U1", dec("100")).unwrap();

        lifecycle.submit(sample_request("req-1", "W1")).await.unwrap();
        lifecycle.confirm("req-1").await.unwrap();
        lifecycle.revert("W1").await.unwrap();

        assert_eq!(db.get_wallet("U1").unwrap().unwrap().balance, dec("70"));
    }

    #[tokio::test]
    async fn revert_unknown_id_is_no_match() {
        let (lifecycle, _db, _dir) = fixture(true);
        let outcome = lifecycle.revert("W404").await.unwrap();
        assert_eq!(outcome, RevertOutcome::NoMatch);
    }

    #[tokio::test]
    async fn revert_entry_matches_revert_by_id() {
        let (lifecycle, db, _dir) = fixture(true);
        db.credit("U1", dec("100")).unwrap();

        lifecycle.submit(sample_request("req-1", "W1")).await.unwrap();
        let entry = lifecycle.confirm("req-1").await.unwrap();

        let outcome = lifecycle.revert_entry(&entry).await.unwrap();
        assert!(matches!(outcome, RevertOutcome::Reverted { .. }));
        assert!(db.get_withdrawal("W1").unwrap().is_none());
        assert_eq!(db.get_wallet("U1").unwrap().unwrap().balance, dec("100"));
    }

    #[tokio::test]
    async fn confirm_surfaces_insufficient_funds() {
        let (lifecycle, db, _dir) = fixture(true);
        db.credit("U1", dec("10")).unwrap();

        lifecycle.submit(sample_request("req-1", "W1")).await.unwrap();
        let result = lifecycle.confirm("req-1").await;
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { .. })
        ));

        // The failed transition left nothing behind.
        assert_eq!(db.get_wallet("U1").unwrap().unwrap().balance, dec("10"));
        assert!(db.get_withdrawal("W1").unwrap().is_none());
    }
}
