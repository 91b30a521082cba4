// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use super::{AuthError, AuthenticatedUser, PortalClaims};
use crate::state::{AppState, AuthConfig};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Extractor for authenticated users.
///
/// Validates the bearer token from the Authorization header and provides
/// the authenticated user information.
///
/// ## Authentication Modes
///
/// - **Production mode** (`PORTAL_JWT_SECRET` set): full HS256 signature
///   verification plus expiry/issuer checks
/// - **Development mode** (no secret): structure validation only (no
///   signature check)
pub struct Auth(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // First check if a test or middleware already set the user
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>().cloned() {
            return Ok(Auth(user));
        }

        // Extract Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        // Extract Bearer token
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthHeader)?;

        let user = verify_jwt(token, &state.auth_config)?;
        Ok(Auth(user))
    }
}

/// Verify a token and extract user information.
fn verify_jwt(token: &str, auth_config: &AuthConfig) -> Result<AuthenticatedUser, AuthError> {
    if let Some(ref secret) = auth_config.secret {
        verify_jwt_production(token, secret, auth_config)
    } else {
        verify_jwt_development(token)
    }
}

/// Production verification: HS256 signature, expiry, optional issuer.
fn verify_jwt_production(
    token: &str,
    secret: &str,
    auth_config: &AuthConfig,
) -> Result<AuthenticatedUser, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = CLOCK_SKEW_LEEWAY;
    validation.validate_aud = false;
    if let Some(ref issuer) = auth_config.issuer {
        validation.set_issuer(&[issuer]);
    }

    let token_data = decode::<PortalClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
        _ => AuthError::MalformedToken,
    })?;

    Ok(AuthenticatedUser::from_claims(token_data.claims))
}

/// Development verification (no signature check).
///
/// WARNING: This should only be used in development environments.
fn verify_jwt_development(token: &str) -> Result<AuthenticatedUser, AuthError> {
    let token_data = jsonwebtoken::dangerous::insecure_decode::<PortalClaims>(token)
        .map_err(|_e| AuthError::MalformedToken)?;

    let claims = token_data.claims;

    // Check expiration manually
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    if claims.exp > 0 && claims.exp < now - CLOCK_SKEW_LEEWAY as i64 {
        return Err(AuthError::TokenExpired);
    }

    Ok(AuthenticatedUser::from_claims(claims))
}

/// Extractor that requires admin role.
pub struct AdminOnly(pub AuthenticatedUser);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::ledger::LedgerDatabase;
    use crate::mailer::Mailer;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::sync::Arc;
    use tempfile::TempDir;

    const TEST_SECRET: &str = "test-secret";

    fn test_state(secret: Option<&str>) -> (AppState, TempDir) {
        let dir = tempfile::tempdir().expect("temp dir");
        let db = Arc::new(LedgerDatabase::open(&dir.path().join("test.redb")).expect("open db"));
        let state = AppState::new(
            db,
            Mailer::Disabled,
            AuthConfig {
                secret: secret.map(str::to_string),
                issuer: None,
            },
            true,
        );
        (state, dir)
    }

    fn claims(role: Option<&str>) -> PortalClaims {
        PortalClaims {
            sub: "user_123".to_string(),
            email: "a@x.com".to_string(),
            username: "alice".to_string(),
            iat: 1700000000,
            exp: 9999999999,
            iss: "test".to_string(),
            role: role.map(str::to_string),
        }
    }

    fn signed_token(role: Option<&str>) -> String {
        encode(
            &Header::default(),
            &claims(role),
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .expect("encode token")
    }

    fn request_parts(token: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let (state, _dir) = test_state(Some(TEST_SECRET));
        let mut parts = request_parts(None);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_accepts_signed_token() {
        let (state, _dir) = test_state(Some(TEST_SECRET));
        let token = signed_token(None);
        let mut parts = request_parts(Some(&token));

        let user = Auth::from_request_parts(&mut parts, &state)
            .await
            .expect("valid token")
            .0;
        assert_eq!(user.user_id, "user_123");
        assert_eq!(user.role, Role::Client);
    }

    #[tokio::test]
    async fn auth_extractor_rejects_wrong_signature() {
        let (state, _dir) = test_state(Some("a-different-secret"));
        let token = signed_token(None);
        let mut parts = request_parts(Some(&token));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidSignature)));
    }

    #[tokio::test]
    async fn dev_mode_accepts_unsigned_structure() {
        let (state, _dir) = test_state(None);
        // Signed with a key the server never saw; dev mode skips the check.
        let token = signed_token(Some("admin"));
        let mut parts = request_parts(Some(&token));

        let user = Auth::from_request_parts(&mut parts, &state)
            .await
            .expect("dev mode decode")
            .0;
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let (state, _dir) = test_state(Some(TEST_SECRET));
        let mut parts = request_parts(None);

        let user = AuthenticatedUser {
            user_id: "user_from_middleware".to_string(),
            email: "m@x.com".to_string(),
            username: "mid".to_string(),
            role: Role::Admin,
            expires_at: 0,
        };
        parts.extensions.insert(user);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert_eq!(result.unwrap().0.user_id, "user_from_middleware");
    }

    #[tokio::test]
    async fn admin_only_rejects_non_admin() {
        let (state, _dir) = test_state(Some(TEST_SECRET));
        let token = signed_token(Some("client"));
        let mut parts = request_parts(Some(&token));

        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }

    #[tokio::test]
    async fn admin_only_accepts_admin() {
        let (state, _dir) = test_state(Some(TEST_SECRET));
        let token = signed_token(Some("admin"));
        let mut parts = request_parts(Some(&token));

        let result = AdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(result.is_ok());
    }
}
