// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

//! Transactional mail delivery through the portal's mail provider.
//!
//! The provider exposes a single HTTP endpoint taking a template name, a
//! recipient and a JSON payload; the HTML itself lives provider-side. When
//! the provider is not configured (local development, tests) the mailer
//! runs disabled and logs instead of sending. Delivery failures are the
//! caller's to log; nothing here is fatal.

use std::time::Duration;

use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::config::{MAIL_API_KEY_ENV, MAIL_API_URL_ENV, MAIL_FROM_ENV};
use crate::ledger::CURRENCY;

const DEFAULT_FROM_ADDRESS: &str = "no-reply@tradeport.example";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Mail templates sent on withdrawal lifecycle events.
#[derive(Debug, Clone)]
pub enum MailTemplate {
    /// Customer filed a withdrawal request.
    WithdrawalRequested {
        username: String,
        withdrawal_id: String,
        amount: Decimal,
    },
    /// Admin confirmed the payout.
    WithdrawalConfirmed {
        username: String,
        withdrawal_id: String,
        amount: Decimal,
        address: String,
    },
    /// Admin reverted a confirmed payout.
    WithdrawalReverted {
        username: String,
        withdrawal_id: String,
        amount: Decimal,
    },
}

impl MailTemplate {
    /// Provider-side template identifier.
    pub fn name(&self) -> &'static str {
        match self {
            MailTemplate::WithdrawalRequested { .. } => "withdrawal_requested",
            MailTemplate::WithdrawalConfirmed { .. } => "withdrawal_confirmed",
            MailTemplate::WithdrawalReverted { .. } => "withdrawal_reverted",
        }
    }

    /// Substitution payload for the provider.
    pub fn payload(&self) -> Value {
        match self {
            MailTemplate::WithdrawalRequested {
                username,
                withdrawal_id,
                amount,
            } => json!({
                "username": username,
                "withdrawal_id": withdrawal_id,
                "amount": amount.to_string(),
                "currency": CURRENCY,
            }),
            MailTemplate::WithdrawalConfirmed {
                username,
                withdrawal_id,
                amount,
                address,
            } => json!({
                "username": username,
                "withdrawal_id": withdrawal_id,
                "amount": amount.to_string(),
                "currency": CURRENCY,
                "address": address,
            }),
            MailTemplate::WithdrawalReverted {
                username,
                withdrawal_id,
                amount,
            } => json!({
                "username": username,
                "withdrawal_id": withdrawal_id,
                "amount": amount.to_string(),
                "currency": CURRENCY,
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("mail provider configuration missing: {0}")]
    MissingConfig(String),

    #[error("mail request failed: {0}")]
    Request(String),

    #[error("mail provider rejected the message: HTTP {status}")]
    Provider { status: u16 },
}

/// Configured provider client.
#[derive(Debug, Clone)]
pub struct MailerClient {
    api_url: String,
    api_key: String,
    from_address: String,
    http: Client,
}

impl MailerClient {
    pub fn is_configured() -> bool {
        required_env_present(MAIL_API_URL_ENV) && required_env_present(MAIL_API_KEY_ENV)
    }

    pub fn from_env() -> Result<Self, MailerError> {
        let api_url = env_required(MAIL_API_URL_ENV)?;
        let api_key = env_required(MAIL_API_KEY_ENV)?;
        let from_address = env_or_default(MAIL_FROM_ENV, DEFAULT_FROM_ADDRESS);

        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| MailerError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_url,
            api_key,
            from_address,
            http,
        })
    }

    async fn send(&self, template: &MailTemplate, recipient: &str) -> Result<(), MailerError> {
        let body = json!({
            "from": self.from_address,
            "to": recipient,
            "template": template.name(),
            "payload": template.payload(),
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MailerError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MailerError::Provider {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Mail sender; disabled when the provider is not configured.
#[derive(Debug, Clone)]
pub enum Mailer {
    Enabled(MailerClient),
    Disabled,
}

impl Mailer {
    /// Build from the environment, falling back to disabled (with a log
    /// line) when the provider settings are absent or broken.
    pub fn from_env() -> Self {
        if !MailerClient::is_configured() {
            tracing::info!("Mail provider not configured; notifications disabled");
            return Mailer::Disabled;
        }
        match MailerClient::from_env() {
            Ok(client) => Mailer::Enabled(client),
            Err(e) => {
                tracing::warn!(error = %e, "Mail provider misconfigured; notifications disabled");
                Mailer::Disabled
            }
        }
    }

    /// Deliver one templated message.
    pub async fn send(&self, template: MailTemplate, recipient: &str) -> Result<(), MailerError> {
        match self {
            Mailer::Enabled(client) => {
                client.send(&template, recipient).await?;
                tracing::info!(
                    template = template.name(),
                    recipient,
                    "Notification mail sent"
                );
                Ok(())
            }
            Mailer::Disabled => {
                tracing::debug!(
                    template = template.name(),
                    recipient,
                    "Mail disabled, skipping notification"
                );
                Ok(())
            }
        }
    }
}

fn required_env_present(name: &str) -> bool {
    std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false)
}

fn env_required(name: &str) -> Result<String, MailerError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| MailerError::MissingConfig(name.to_string()))
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmed_template() -> MailTemplate {
        MailTemplate::WithdrawalConfirmed {
            username: "alice".to_string(),
            withdrawal_id: "W1".to_string(),
            amount: "30".parse().unwrap(),
            address: "TXmGz41pq".to_string(),
        }
    }

    #[test]
    fn template_names_are_stable() {
        assert_eq!(confirmed_template().name(), "withdrawal_confirmed");
        let requested = MailTemplate::WithdrawalRequested {
            username: "alice".to_string(),
            withdrawal_id: "W1".to_string(),
            amount: "30".parse().unwrap(),
        };
        assert_eq!(requested.name(), "withdrawal_requested");
    }

    #[test]
    fn payload_carries_amount_as_string_with_currency() {
        let payload = confirmed_template().payload();
        assert_eq!(payload["amount"], "30");
        assert_eq!(payload["currency"], "USDT");
        assert_eq!(payload["address"], "TXmGz41pq");
    }

    #[tokio::test]
    async fn disabled_mailer_swallows_sends() {
        let mailer = Mailer::Disabled;
        let result = mailer.send(confirmed_template(), "a@x.com").await;
        assert!(result.is_ok());
    }
}
