// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

//! # Authentication Module
//!
//! Bearer-token authentication for the portal API.
//!
//! ## Auth Flow
//!
//! 1. The portal frontend authenticates the customer and mints a session
//!    JWT (HS256, shared secret with this service)
//! 2. Clients send `Authorization: Bearer <token>`
//! 3. This service verifies signature, expiry and (optionally) issuer,
//!    then extracts:
//!    - `sub` → canonical `user_id`
//!    - `email`, `username` → notification/display identity
//!    - `role` → `admin` or `client`
//!
//! ## Security
//!
//! - All non-health endpoints require authentication
//! - Clock skew tolerance is 60 seconds
//! - Without `PORTAL_JWT_SECRET` the service runs in development mode and
//!   skips signature verification; never deploy that way

pub mod claims;
pub mod error;
pub mod extractor;
pub mod roles;

pub use claims::{AuthenticatedUser, PortalClaims};
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth};
pub use roles::Role;
