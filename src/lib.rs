// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Homestay: bookings, verified profile edits and refunds for a small
//! homestay.
//!
//! The crate has two halves sharing `models`:
//! - `client`: the client core (verification channels, contact-update
//!   orchestrator, booking form, refund store, synchronization layer and
//!   admin aggregate view) talking to the API over HTTP
//! - the server of record (`routes`, `db`, `middleware`, `services`), an
//!   axum service enforcing the rules the client relies on

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::MemoryDb;
use services::{GoogleIdVerifier, OtpService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: MemoryDb,
    pub otp: OtpService,
    /// `None` when Google sign-in is not configured.
    pub google: Option<Arc<GoogleIdVerifier>>,
}
