// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP client for the homestay API.
//!
//! Every call carries the session cookie (kept in reqwest's cookie store)
//! and decodes the `{success, message|error, code, data}` envelope.

use crate::client::error::ClientError;
use crate::client::ports::{AdminApi, BookingApi, IdentityApi, OtpApi, RefundApi};
use crate::config::ClientConfig;
use crate::models::{
    AccommodationRateCard, ApiEnvelope, Booking, BookingDetails, BookingRequest, ProfileUpdate,
    RefundCreateRequest, RefundRequest, Review, UserDetailBundle, UserIdentity,
};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct Availability {
    available: bool,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ─── Session ─────────────────────────────────────────────────

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserIdentity, ClientError> {
        let body = json!({ "name": name, "email": email, "password": password });
        self.call(Method::POST, "/api/user/register", Some(&body)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserIdentity, ClientError> {
        let body = json!({ "email": email, "password": password });
        self.call(Method::POST, "/api/user/login", Some(&body)).await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        self.call_unit(Method::POST, "/api/user/logout", None::<&()>)
            .await
    }

    pub async fn google_sign_in(&self, credential: &str) -> Result<UserIdentity, ClientError> {
        let body = json!({ "credential": credential });
        self.call(Method::POST, "/api/user/auth/google", Some(&body))
            .await
    }

    pub async fn google_register(&self, credential: &str) -> Result<UserIdentity, ClientError> {
        let body = json!({ "credential": credential });
        self.call(Method::POST, "/api/user/auth/google/register", Some(&body))
            .await
    }

    pub async fn update_password(
        &self,
        current_password: Option<&str>,
        new_password: &str,
    ) -> Result<(), ClientError> {
        let body = json!({ "currentPassword": current_password, "newPassword": new_password });
        self.call_unit(Method::PUT, "/api/user/update-password", Some(&body))
            .await
    }

    pub async fn request_refund(
        &self,
        booking_id: Uuid,
        reason: &str,
    ) -> Result<RefundRequest, ClientError> {
        let body = RefundCreateRequest {
            booking_id,
            reason: reason.to_string(),
        };
        self.call(Method::POST, "/api/refunds", Some(&body)).await
    }

    pub async fn cancel_own_booking(&self, booking_id: Uuid) -> Result<Booking, ClientError> {
        self.call(
            Method::PUT,
            &format!("/api/bookings/{booking_id}/cancel"),
            None::<&()>,
        )
        .await
    }

    // ─── Plumbing ────────────────────────────────────────────────

    async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiEnvelope<T>, ClientError> {
        let mut request = self.http.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        check_envelope(response).await
    }

    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ClientError> {
        let envelope = self.send::<B, T>(method, path, body).await?;
        envelope.data.ok_or_else(|| ClientError::Api {
            status: StatusCode::OK.as_u16(),
            code: None,
            message: "Response carried no data".to_string(),
            retry_after_secs: None,
        })
    }

    async fn call_unit<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), ClientError> {
        self.send::<B, serde_json::Value>(method, path, body)
            .await
            .map(|_| ())
    }
}

/// Turn a response into its envelope, or the matching `ClientError`.
async fn check_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<ApiEnvelope<T>, ClientError> {
    let status = response.status();
    let retry_after_secs = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok());
    let bytes = response.bytes().await?;

    if status.is_success() {
        let envelope: ApiEnvelope<T> = serde_json::from_slice(&bytes).map_err(|e| {
            ClientError::Transport(format!("Malformed response body: {e}"))
        })?;
        if envelope.success {
            return Ok(envelope);
        }
        return Err(api_error(status, &envelope_failure(&bytes), retry_after_secs));
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::warn!(retry_after_secs, "API rate limit hit (429)");
    }
    Err(api_error(status, &envelope_failure(&bytes), retry_after_secs))
}

fn envelope_failure(bytes: &[u8]) -> ApiEnvelope<serde_json::Value> {
    serde_json::from_slice(bytes).unwrap_or(ApiEnvelope {
        success: false,
        message: None,
        error: None,
        code: None,
        data: None,
    })
}

fn api_error(
    status: StatusCode,
    envelope: &ApiEnvelope<serde_json::Value>,
    retry_after_secs: Option<u64>,
) -> ClientError {
    let message = if envelope.error.is_none() && envelope.message.is_none() {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    } else {
        envelope.failure_text()
    };

    if status == StatusCode::CONFLICT || envelope.code.as_deref() == Some("stale_state") {
        return ClientError::StaleState(message);
    }

    ClientError::Api {
        status: status.as_u16(),
        code: envelope.code.clone(),
        message,
        retry_after_secs,
    }
}

#[async_trait]
impl IdentityApi for ApiClient {
    async fn profile(&self) -> Result<UserIdentity, ClientError> {
        self.call(Method::GET, "/api/user/profile", None::<&()>)
            .await
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserIdentity, ClientError> {
        self.call(Method::PUT, "/api/user/update-profile", Some(update))
            .await
    }

    async fn check_mobile(&self, number: &str) -> Result<bool, ClientError> {
        let path = format!(
            "/api/user/check-mobile?number={}",
            urlencoding::encode(number)
        );
        let availability: Availability = self.call(Method::GET, &path, None::<&()>).await?;
        Ok(availability.available)
    }
}

#[async_trait]
impl OtpApi for ApiClient {
    async fn send_otp(&self, email: &str) -> Result<(), ClientError> {
        let body = json!({ "email": email });
        self.call_unit(Method::POST, "/api/otp/send-otp", Some(&body))
            .await
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> Result<(), ClientError> {
        let body = json!({ "email": email, "otp": otp });
        self.call_unit(Method::POST, "/api/otp/verify-otp", Some(&body))
            .await
    }
}

#[async_trait]
impl BookingApi for ApiClient {
    async fn rate_card(&self) -> Result<AccommodationRateCard, ClientError> {
        self.call(Method::GET, "/api/accommodation", None::<&()>)
            .await
    }

    async fn create_booking(&self, request: &BookingRequest) -> Result<Booking, ClientError> {
        self.call(Method::POST, "/api/bookings", Some(request)).await
    }

    async fn my_bookings(&self) -> Result<Vec<Booking>, ClientError> {
        self.call(Method::GET, "/api/bookings/my-bookings", None::<&()>)
            .await
    }

    async fn reviews(&self) -> Result<Vec<Review>, ClientError> {
        self.call(Method::GET, "/api/reviews", None::<&()>).await
    }
}

#[async_trait]
impl RefundApi for ApiClient {
    async fn my_refunds(&self) -> Result<Vec<RefundRequest>, ClientError> {
        self.call(Method::GET, "/api/refunds/my-refunds", None::<&()>)
            .await
    }

    async fn delete_refund(&self, id: Uuid) -> Result<(), ClientError> {
        self.call_unit(
            Method::DELETE,
            &format!("/api/refunds/my-refunds/{id}"),
            None::<&()>,
        )
        .await
    }
}

#[async_trait]
impl AdminApi for ApiClient {
    async fn user_detail(&self, user_id: Uuid) -> Result<UserDetailBundle, ClientError> {
        self.call(
            Method::GET,
            &format!("/api/admin/{user_id}/user/detail"),
            None::<&()>,
        )
        .await
    }

    async fn block_user(&self, user_id: Uuid) -> Result<UserIdentity, ClientError> {
        self.call(
            Method::PUT,
            &format!("/api/admin/{user_id}/block/user"),
            None::<&()>,
        )
        .await
    }

    async fn unblock_user(&self, user_id: Uuid) -> Result<UserIdentity, ClientError> {
        self.call(
            Method::PUT,
            &format!("/api/admin/{user_id}/unblock/user"),
            None::<&()>,
        )
        .await
    }

    async fn booking_details(&self, booking_id: Uuid) -> Result<BookingDetails, ClientError> {
        self.call(
            Method::GET,
            &format!("/api/admin/{booking_id}/booking/details"),
            None::<&()>,
        )
        .await
    }

    async fn cancel_booking(&self, booking_id: Uuid) -> Result<Booking, ClientError> {
        self.call(
            Method::PUT,
            &format!("/api/admin/{booking_id}/booking/cancel"),
            None::<&()>,
        )
        .await
    }
}
