// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

use std::sync::Arc;

use crate::ledger::LedgerDatabase;
use crate::lifecycle::WithdrawalLifecycle;
use crate::mailer::Mailer;

/// Token verification settings shared with the extractors.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// HS256 shared secret; `None` enables development mode (no signature
    /// verification)
    pub secret: Option<String>,
    /// Expected `iss` claim, when issued tokens carry one
    pub issuer: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<LedgerDatabase>,
    pub lifecycle: WithdrawalLifecycle,
    pub auth_config: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(
        db: Arc<LedgerDatabase>,
        mailer: Mailer,
        auth_config: AuthConfig,
        refund_on_revert: bool,
    ) -> Self {
        let lifecycle = WithdrawalLifecycle::new(db.clone(), mailer, refund_on_revert);
        Self {
            db,
            lifecycle,
            auth_config: Arc::new(auth_config),
        }
    }
}
