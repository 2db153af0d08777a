// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT session middleware.

use crate::error::AppError;
use crate::models::Role;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
    Extension,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "homestay_token";

const SESSION_DAYS: i64 = 7;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: Uuid,
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from the session.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

/// Middleware that requires a valid session belonging to an unblocked user.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = decode_session(&state, &jar, request.headers()).ok_or(AppError::Unauthorized)?;

    // Role and blocked flag come from the store, not the token.
    let user = state.db.get_user(claims.sub).ok_or(AppError::Unauthorized)?;
    if user.blocked {
        tracing::warn!(user_id = %user.id, "Blocked user session refused");
        return Err(AppError::Forbidden(
            "Your account has been blocked".to_string(),
        ));
    }

    request.extensions_mut().insert(AuthUser {
        user_id: user.id,
        role: user.role,
    });

    Ok(next.run(request).await)
}

/// Claims of the session carried by the request, if any and valid.
///
/// Public routes use this to learn who is calling without requiring it.
pub fn decode_session(state: &AppState, jar: &CookieJar, headers: &HeaderMap) -> Option<Claims> {
    // Try cookie first, then header
    let token = match jar.get(SESSION_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::to_string)?,
    };

    let key = DecodingKey::from_secret(&state.config.jwt_signing_key);
    decode::<Claims>(&token, &key, &Validation::new(Algorithm::HS256))
        .ok()
        .map(|data| data.claims)
}

/// Layered after `require_auth` on admin routes.
pub async fn require_admin(
    Extension(user): Extension<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if user.role != Role::Admin {
        return Err(AppError::Forbidden("Administrator access required".to_string()));
    }
    Ok(next.run(request).await)
}

/// Create a JWT for a user session.
pub fn create_jwt(user_id: Uuid, role: Role, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id,
        role,
        iat: now,
        exp: now + (SESSION_DAYS as usize) * 24 * 60 * 60,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Session cookie carrying `token`.
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(if secure { SameSite::None } else { SameSite::Lax })
        .max_age(time::Duration::days(SESSION_DAYS))
        .build()
}

/// Cookie that clears the session.
pub fn expired_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .max_age(time::Duration::ZERO)
        .build()
}
