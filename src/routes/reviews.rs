// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Guest reviews (testimonials).

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ApiEnvelope, BookingStatus, Review, ReviewRequest};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/reviews", get(list_reviews))
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/reviews", post(create_review))
}

async fn list_reviews(State(state): State<Arc<AppState>>) -> Json<ApiEnvelope<Vec<Review>>> {
    Json(ApiEnvelope::ok(state.db.list_reviews()))
}

async fn create_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<ApiEnvelope<Review>>> {
    body.validate()?;

    let booking = state
        .db
        .get_booking(body.booking_id)
        .filter(|b| b.user_id == user.user_id)
        .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", body.booking_id)))?;
    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::BadRequest(
            "Cancelled bookings cannot be reviewed".to_string(),
        ));
    }

    let author = state
        .db
        .get_user(user.user_id)
        .map(|u| u.name)
        .unwrap_or_default();

    let review = state.db.insert_review(Review {
        id: Uuid::new_v4(),
        user_id: user.user_id,
        booking_id: booking.id,
        author_name: author,
        rating: body.rating,
        comment: body.comment.trim().to_string(),
        created_at: Utc::now(),
    })?;

    Ok(Json(ApiEnvelope::ok_with_message(review, "Thanks for your review")))
}
