// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Booking routes. The amount is always recomputed here; the client's quote
//! is only checked against it.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    ApiEnvelope, Booking, BookingRequest, BookingStatus, Payment, PaymentStatus,
};
use crate::services::pricing::{compute_amount, validate_booking};
use crate::time_utils::local_today;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/bookings", post(create_booking))
        .route("/api/bookings/my-bookings", get(my_bookings))
        .route("/api/bookings/{id}/cancel", put(cancel_booking))
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<BookingRequest>,
) -> Result<Json<ApiEnvelope<Booking>>> {
    body.draft.validate()?;

    let problems = validate_booking(&body.draft, local_today());
    if let Some(first) = problems.first() {
        return Err(AppError::BadRequest(first.to_string()));
    }
    let Some(stay_date) = body.draft.stay_date else {
        return Err(AppError::BadRequest("Please choose a stay date".to_string()));
    };

    let rates = state.db.rate_card();
    let amount = compute_amount(&body.draft, &rates)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    if amount != body.amount {
        tracing::info!(
            user_id = %user.user_id,
            quoted = body.amount,
            amount,
            "Stale booking quote"
        );
        return Err(AppError::Conflict(format!(
            "Price has changed to {amount}, please review your booking"
        )));
    }

    if !body.payment.success {
        tracing::warn!(
            user_id = %user.user_id,
            order_id = %body.payment.provider_order_id,
            "Payment reported as failed"
        );
        return Err(AppError::PaymentFailed(
            "Payment was not completed".to_string(),
        ));
    }

    let now = Utc::now();
    let booking_id = Uuid::new_v4();
    let payment = Payment {
        id: Uuid::new_v4(),
        booking_id,
        user_id: user.user_id,
        amount,
        status: PaymentStatus::Paid,
        provider_payment_id: body.payment.provider_payment_id.clone(),
        provider_order_id: body.payment.provider_order_id.clone(),
        created_at: now,
    };
    let draft = body.draft;
    let booking = Booking {
        id: booking_id,
        user_id: user.user_id,
        stay_date,
        group_size: draft.group_size,
        group_name: draft.group_name.trim().to_string(),
        need_stay: draft.need_stay,
        stay_night: if draft.need_stay { draft.stay_night } else { 0 },
        meal_type: draft.meal_type,
        phone: draft.phone.trim().to_string(),
        amount,
        status: BookingStatus::Confirmed,
        payment_id: Some(payment.id),
        created_at: now,
    };

    state.db.insert_booking(booking.clone(), payment);
    Ok(Json(ApiEnvelope::ok_with_message(booking, "Booking confirmed")))
}

async fn my_bookings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<ApiEnvelope<Vec<Booking>>> {
    Json(ApiEnvelope::ok(state.db.bookings_for_user(user.user_id)))
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiEnvelope<Booking>>> {
    let booking = state.db.cancel_booking(id, Some(user.user_id))?;
    Ok(Json(ApiEnvelope::ok_with_message(booking, "Booking cancelled")))
}
