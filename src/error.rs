// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent envelope responses.

use crate::models::{ApiEnvelope, TransitionError};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// Reasons a one-time code could not be verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpFailure {
    InvalidCode,
    Expired,
    NoActiveCode,
}

impl OtpFailure {
    pub fn code(&self) -> &'static str {
        match self {
            OtpFailure::InvalidCode => "invalid_code",
            OtpFailure::Expired => "expired_code",
            OtpFailure::NoActiveCode => "no_active_code",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            OtpFailure::InvalidCode => "Invalid verification code",
            OtpFailure::Expired => "Verification code has expired, request a new one",
            OtpFailure::NoActiveCode => "No verification code was requested for this email",
        }
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The caller's view of the resource is out of date (e.g. deleting a
    /// refund that is no longer `initiated`).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A refund status change the state machine refused.
    #[error("Refund transition refused: {0}")]
    Transition(#[from] TransitionError),

    #[error("Too many requests, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("OTP verification failed: {0:?}")]
    Otp(OtpFailure),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Please log in to continue".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "stale_state", msg.clone()),
            AppError::Transition(err) => (StatusCode::CONFLICT, "stale_state", err.to_string()),
            AppError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                format!("Please wait {retry_after_secs}s before requesting another code"),
            ),
            AppError::Otp(failure) => (
                StatusCode::BAD_REQUEST,
                failure.code(),
                failure.message().to_string(),
            ),
            AppError::PaymentFailed(msg) => {
                (StatusCode::PAYMENT_REQUIRED, "payment_failed", msg.clone())
            }
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "Upstream service error");
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream_error",
                    "An upstream service is unavailable, try again shortly".to_string(),
                )
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "Something went wrong".to_string(),
                )
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Something went wrong".to_string(),
                )
            }
        };

        let mut response = (status, Json(ApiEnvelope::failure(message, Some(code)))).into_response();

        if let AppError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
