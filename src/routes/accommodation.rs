// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Accommodation rate card.

use crate::error::Result;
use crate::models::{AccommodationRateCard, ApiEnvelope};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, put},
    Json, Router,
};
use std::sync::Arc;
use validator::Validate;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/accommodation", get(get_rate_card))
}

/// Admin-only; layered in routes/mod.rs.
pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/admin/accommodation", put(set_rate_card))
}

async fn get_rate_card(
    State(state): State<Arc<AppState>>,
) -> Json<ApiEnvelope<AccommodationRateCard>> {
    Json(ApiEnvelope::ok(state.db.rate_card()))
}

async fn set_rate_card(
    State(state): State<Arc<AppState>>,
    Json(card): Json<AccommodationRateCard>,
) -> Result<Json<ApiEnvelope<AccommodationRateCard>>> {
    card.validate()?;
    state.db.set_rate_card(card);
    Ok(Json(ApiEnvelope::ok_with_message(card, "Rates updated")))
}
