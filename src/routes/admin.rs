// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Administrator routes. `require_auth` and `require_admin` are layered in
//! routes/mod.rs.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    ApiEnvelope, Booking, BookingDetails, RefundRequest, RefundStatus, UserDetailBundle,
    UserIdentity,
};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, put},
    Extension, Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/{id}/user/detail", get(user_detail))
        .route("/api/admin/{id}/block/user", put(block_user))
        .route("/api/admin/{id}/unblock/user", put(unblock_user))
        .route("/api/admin/{id}/booking/details", get(booking_details))
        .route("/api/admin/{id}/booking/cancel", put(cancel_booking))
        .route("/api/admin/refunds/{id}/reject", put(reject_refund))
}

async fn list_users(State(state): State<Arc<AppState>>) -> Json<ApiEnvelope<Vec<UserIdentity>>> {
    Json(ApiEnvelope::ok(state.db.list_users()))
}

async fn user_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<UserDetailBundle>>> {
    let bundle = state
        .db
        .user_detail(id)
        .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))?;
    Ok(Json(ApiEnvelope::ok(bundle)))
}

async fn block_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<UserIdentity>>> {
    if id == admin.user_id {
        return Err(AppError::BadRequest(
            "Administrators cannot block themselves".to_string(),
        ));
    }
    let user = state.db.set_blocked(id, true)?;
    tracing::info!(admin_id = %admin.user_id, user_id = %id, "User blocked");
    Ok(Json(ApiEnvelope::ok_with_message(user, "User blocked")))
}

async fn unblock_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<UserIdentity>>> {
    let user = state.db.set_blocked(id, false)?;
    tracing::info!(admin_id = %admin.user_id, user_id = %id, "User unblocked");
    Ok(Json(ApiEnvelope::ok_with_message(user, "User unblocked")))
}

async fn booking_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<BookingDetails>>> {
    let details = state
        .db
        .booking_details(id)
        .ok_or_else(|| AppError::NotFound(format!("Booking {id} not found")))?;
    Ok(Json(ApiEnvelope::ok(details)))
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<Booking>>> {
    let booking = state.db.cancel_booking(id, None)?;
    tracing::info!(admin_id = %admin.user_id, booking_id = %id, "Booking cancelled by admin");
    Ok(Json(ApiEnvelope::ok_with_message(booking, "Booking cancelled")))
}

async fn reject_refund(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<RefundRequest>>> {
    let (refund, _) =
        state
            .db
            .apply_refund_transition(id, RefundStatus::Rejected, None, Utc::now())?;
    tracing::info!(admin_id = %admin.user_id, refund_id = %id, "Refund rejected by admin");
    Ok(Json(ApiEnvelope::ok_with_message(refund, "Refund rejected")))
}
