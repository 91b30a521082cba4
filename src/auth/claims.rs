// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Claims carried by a portal session token.
///
/// The portal frontend mints these on sign-in; this service only verifies
/// and reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalClaims {
    /// Subject - the canonical user identifier
    pub sub: String,

    /// Account email (notification target, search key)
    pub email: String,

    /// Display name shown on admin screens
    pub username: String,

    /// Issued at timestamp
    #[serde(default)]
    pub iat: i64,

    /// Expiration timestamp
    #[serde(default)]
    pub exp: i64,

    /// Issuer
    #[serde(default)]
    pub iss: String,

    /// Role claim ("admin" or "client"); absent means client
    #[serde(default)]
    pub role: Option<String>,
}

/// Authenticated user information extracted from a verified token.
///
/// This is the primary type used throughout the application to represent
/// the authenticated user making a request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    /// Canonical user ID (`sub` claim)
    pub user_id: String,

    /// Account email
    pub email: String,

    /// Display name
    pub username: String,

    /// User's role
    pub role: Role,

    /// Token expiration (Unix timestamp, used for validation, not serialized)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    /// Create from verified portal claims.
    pub fn from_claims(claims: PortalClaims) -> Self {
        let role = claims
            .role
            .as_deref()
            .and_then(Role::from_str)
            .unwrap_or(Role::Client);

        Self {
            user_id: claims.sub,
            email: claims.email,
            username: claims.username,
            role,
            expires_at: claims.exp,
        }
    }

    /// Check if the user has the required role.
    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }

    /// Check if this user is an admin.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
