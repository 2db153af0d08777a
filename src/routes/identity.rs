// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity routes: registration, sessions, Google sign-in and profile edits.

use crate::db::StoredUser;
use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, expired_session_cookie, session_cookie, AuthUser};
use crate::models::user::{is_valid_mobile, normalize_email};
use crate::models::{ApiEnvelope, AuthProvider, ProfileUpdate, Role, UserIdentity};
use crate::services::credentials::{hash_password, verify_password};
use crate::services::GoogleIdError;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Routes that work without a session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/user/register", post(register))
        .route("/api/user/login", post(login))
        .route("/api/user/logout", post(logout))
        .route("/api/user/auth/google", post(google_sign_in))
        .route("/api/user/auth/google/register", post(google_register))
        .route("/api/user/check-mobile", get(check_mobile))
}

/// Routes that need a session (auth layer applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/user/profile", get(get_profile))
        .route("/api/user/update-profile", put(update_profile))
        .route("/api/user/update-password", put(update_password))
}

type SessionResponse = (CookieJar, Json<ApiEnvelope<UserIdentity>>);

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleCredential {
    pub credential: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckMobileQuery {
    pub number: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MobileAvailability {
    pub available: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PasswordUpdate {
    #[serde(default)]
    pub current_password: Option<String>,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

fn start_session(
    state: &AppState,
    jar: CookieJar,
    user: UserIdentity,
    message: &str,
) -> Result<SessionResponse> {
    let token = create_jwt(user.id, user.role, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;
    let jar = jar.add(session_cookie(token, state.config.secure_cookies()));
    Ok((jar, Json(ApiEnvelope::ok_with_message(user, message))))
}

fn new_identity(name: &str, email: &str, provider: AuthProvider) -> UserIdentity {
    UserIdentity {
        id: Uuid::new_v4(),
        name: name.trim().to_string(),
        email: normalize_email(email),
        mobile: None,
        role: Role::Trekker,
        blocked: false,
        provider,
        created_at: Utc::now(),
    }
}

fn ensure_not_blocked(user: &UserIdentity) -> Result<()> {
    if user.blocked {
        tracing::warn!(user_id = %user.id, "Blocked user attempted to sign in");
        return Err(AppError::Forbidden(
            "Your account has been blocked".to_string(),
        ));
    }
    Ok(())
}

async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<RegisterRequest>,
) -> Result<SessionResponse> {
    body.validate()?;

    let user = state.db.insert_user(StoredUser {
        identity: new_identity(&body.name, &body.email, AuthProvider::Local),
        password_hash: Some(hash_password(&body.password)?),
        google_subject: None,
    })?;

    start_session(&state, jar, user, "Registration successful")
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<SessionResponse> {
    let invalid = || AppError::BadRequest("Invalid email or password".to_string());

    let stored = state.db.find_by_email(&body.email).ok_or_else(invalid)?;
    let hash = stored.password_hash.as_deref().ok_or_else(invalid)?;
    if !verify_password(&body.password, hash) {
        tracing::info!(user_id = %stored.identity.id, "Failed login attempt");
        return Err(invalid());
    }
    ensure_not_blocked(&stored.identity)?;

    tracing::info!(user_id = %stored.identity.id, "User logged in");
    start_session(&state, jar, stored.identity, "Login successful")
}

async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<ApiEnvelope<()>>) {
    let jar = jar.add(expired_session_cookie(state.config.secure_cookies()));
    (jar, Json(ApiEnvelope::message("Logged out")))
}

async fn verify_google(
    state: &AppState,
    credential: &str,
) -> Result<crate::services::GoogleIdentity> {
    let verifier = state
        .google
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("Google sign-in is not enabled".to_string()))?;

    verifier
        .verify_id_token(credential)
        .await
        .map_err(|e| match e {
            GoogleIdError::Rejected(reason) => {
                tracing::info!(reason = %reason, "Google credential rejected");
                AppError::Unauthorized
            }
            GoogleIdError::KeysUnavailable(reason) => AppError::Upstream(reason),
        })
}

async fn google_sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<GoogleCredential>,
) -> Result<SessionResponse> {
    let google = verify_google(&state, &body.credential).await?;

    let stored = match state.db.find_by_google_subject(&google.subject) {
        Some(user) => user,
        None => {
            // An existing local account with the same verified email gets linked.
            let user = state.db.find_by_email(&google.email).ok_or_else(|| {
                AppError::NotFound("No account for this Google user, please register".to_string())
            })?;
            state
                .db
                .link_google_subject(user.identity.id, &google.subject)?;
            user
        }
    };
    ensure_not_blocked(&stored.identity)?;

    start_session(&state, jar, stored.identity, "Login successful")
}

async fn google_register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<GoogleCredential>,
) -> Result<SessionResponse> {
    let google = verify_google(&state, &body.credential).await?;
    let name = google
        .name
        .clone()
        .unwrap_or_else(|| google.email.split('@').next().unwrap_or("Guest").to_string());

    let user = state.db.insert_user(StoredUser {
        identity: new_identity(&name, &google.email, AuthProvider::Google),
        password_hash: None,
        google_subject: Some(google.subject),
    })?;

    start_session(&state, jar, user, "Registration successful")
}

async fn check_mobile(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CheckMobileQuery>,
) -> Result<Json<ApiEnvelope<MobileAvailability>>> {
    let number = query.number.trim();
    if !is_valid_mobile(number) {
        return Err(AppError::BadRequest(
            "Mobile number must be exactly 10 digits".to_string(),
        ));
    }
    Ok(Json(ApiEnvelope::ok(MobileAvailability {
        available: !state.db.mobile_in_use(number),
    })))
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiEnvelope<UserIdentity>>> {
    let identity = state
        .db
        .get_user(user.user_id)
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;
    Ok(Json(ApiEnvelope::ok(identity)))
}

/// Commit a profile draft. A changed email must have been verified through
/// the OTP endpoints by this same user first; the mobile number may only be
/// set once.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<ApiEnvelope<UserIdentity>>> {
    body.validate()?;

    if let Some(mobile) = body.mobile.as_deref().map(str::trim) {
        if !mobile.is_empty() && !is_valid_mobile(mobile) {
            return Err(AppError::BadRequest(
                "Mobile number must be exactly 10 digits".to_string(),
            ));
        }
    }

    let current = state
        .db
        .get_user(user.user_id)
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    let email_changed = normalize_email(&body.email) != normalize_email(&current.email);
    if email_changed && !state.otp.is_verified(user.user_id, &body.email) {
        return Err(AppError::Forbidden(
            "Verify the new email address before saving".to_string(),
        ));
    }

    let updated =
        state
            .db
            .update_profile(user.user_id, &body.name, &body.email, body.mobile.as_deref())?;

    if email_changed {
        state.otp.consume_verified(user.user_id, &body.email);
    }

    tracing::info!(user_id = %user.user_id, email_changed, "Profile updated");
    Ok(Json(ApiEnvelope::ok_with_message(updated, "Profile updated")))
}

async fn update_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<PasswordUpdate>,
) -> Result<Json<ApiEnvelope<()>>> {
    body.validate()?;

    let stored = state
        .db
        .get_stored_user(user.user_id)
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    // Accounts created through Google may set a first password without one.
    if let Some(existing) = stored.password_hash.as_deref() {
        let current = body.current_password.as_deref().unwrap_or_default();
        if !verify_password(current, existing) {
            return Err(AppError::BadRequest(
                "Current password is incorrect".to_string(),
            ));
        }
    }

    state
        .db
        .set_password_hash(user.user_id, hash_password(&body.new_password)?)?;

    tracing::info!(user_id = %user.user_id, "Password updated");
    Ok(Json(ApiEnvelope::message("Password updated")))
}
