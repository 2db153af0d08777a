// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email one-time code routes.

use crate::error::Result;
use crate::middleware::auth::decode_session;
use crate::models::ApiEnvelope;
use crate::AppState;
use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/otp/send-otp", post(send_otp))
        .route("/api/otp/verify-otp", post(verify_otp))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendOtpRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OtpIssued {
    /// Seconds until the code expires.
    pub expires_in: u64,
}

async fn send_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SendOtpRequest>,
) -> Result<Json<ApiEnvelope<OtpIssued>>> {
    let expires_in = state.otp.issue(&body.email).await?;
    Ok(Json(ApiEnvelope::ok_with_message(
        OtpIssued { expires_in },
        "Verification code sent",
    )))
}

/// The resulting grant belongs to the caller's session; without one the
/// code is still checked but nothing can be saved with it.
async fn verify_otp(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<ApiEnvelope<()>>> {
    let holder = decode_session(&state, &jar, &headers).map(|claims| claims.sub);
    state.otp.verify(&body.email, &body.otp, holder)?;
    Ok(Json(ApiEnvelope::message("Email verified")))
}
