// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Tradeport

//! Tradeport Back-Office - Withdrawal Lifecycle Service
//!
//! This crate provides the back-office service behind the Tradeport
//! customer portal: the USDT withdrawal request lifecycle, the per-user
//! wallet ledger, and the admin endpoints that drive both.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Authentication and authorization (portal JWT)
//! - `ledger` - Withdrawal collections and wallet storage (redb)
//! - `lifecycle` - Confirm/revert transition engine
//! - `mailer` - Customer notification delivery

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod mailer;
pub mod state;
