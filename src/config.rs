// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

//! # Runtime Configuration Constants
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for the embedded ledger database | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `PORTAL_JWT_SECRET` | HS256 secret shared with the portal frontend | Required for production |
//! | `PORTAL_JWT_ISSUER` | Expected JWT issuer claim | Optional |
//! | `MAIL_API_URL` | Mail provider message endpoint | Optional (mail disabled) |
//! | `MAIL_API_KEY` | Mail provider bearer key | Optional (mail disabled) |
//! | `MAIL_FROM` | Sender address for notifications | `no-reply@tradeport.example` |
//! | `REFUND_ON_REVERT` | Credit the wallet back when a payout is reverted | `true` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

/// Environment variable name for the ledger data directory path.
///
/// The embedded database file lives at `{DATA_DIR}/ledger.redb`.
///
/// # Default
/// `/data`
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Default data directory when `DATA_DIR` is unset.
pub const DEFAULT_DATA_DIR: &str = "/data";

/// Environment variable name for the HS256 session-token secret.
pub const JWT_SECRET_ENV: &str = "PORTAL_JWT_SECRET";

/// Environment variable name for the expected JWT issuer.
pub const JWT_ISSUER_ENV: &str = "PORTAL_JWT_ISSUER";

/// Environment variable name for the mail provider endpoint.
pub const MAIL_API_URL_ENV: &str = "MAIL_API_URL";

/// Environment variable name for the mail provider API key.
pub const MAIL_API_KEY_ENV: &str = "MAIL_API_KEY";

/// Environment variable name for the notification sender address.
pub const MAIL_FROM_ENV: &str = "MAIL_FROM";

/// Environment variable name for the revert refund policy.
pub const REFUND_ON_REVERT_ENV: &str = "REFUND_ON_REVERT";

/// Read the refund policy from the environment. Anything other than an
/// explicit opt-out keeps the default of crediting funds back on revert.
pub fn refund_on_revert_from_env() -> bool {
    match std::env::var(REFUND_ON_REVERT_ENV) {
        Ok(value) => !matches!(value.to_lowercase().as_str(), "0" | "false" | "no" | "off"),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refund_policy_defaults_on() {
        // Only meaningful when the variable is unset in the test env
        if std::env::var(REFUND_ON_REVERT_ENV).is_err() {
            assert!(refund_on_revert_from_env());
        }
    }
}
