// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Owner-facing refund routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{ApiEnvelope, RefundCreateRequest, RefundRequest};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/refunds", post(create_refund))
        .route("/api/refunds/my-refunds", get(my_refunds))
        .route("/api/refunds/my-refunds/{id}", delete(withdraw_refund))
}

async fn create_refund(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<RefundCreateRequest>,
) -> Result<Json<ApiEnvelope<RefundRequest>>> {
    body.validate()?;
    let refund = state
        .db
        .create_refund(user.user_id, body.booking_id, &body.reason, Utc::now())?;
    Ok(Json(ApiEnvelope::ok_with_message(refund, "Refund requested")))
}

async fn my_refunds(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<ApiEnvelope<Vec<RefundRequest>>> {
    Json(ApiEnvelope::ok(state.db.refunds_for_user(user.user_id)))
}

/// Withdraw a request. Legal only while `initiated`; otherwise 409.
async fn withdraw_refund(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<()>>> {
    state.db.delete_own_refund(user.user_id, id)?;
    Ok(Json(ApiEnvelope::message("Refund request deleted")))
}
