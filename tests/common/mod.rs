// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

pub mod fakes;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use chrono::{Duration, NaiveDate, Utc};
use homestay::config::Config;
use homestay::db::{MemoryDb, StoredUser};
use homestay::middleware::auth::create_jwt;
use homestay::models::{
    AuthProvider, Booking, BookingStatus, MealType, Payment, PaymentStatus, Role, UserIdentity,
};
use homestay::routes::create_router;
use homestay::services::credentials::hash_password;
use homestay::services::{Mailer, OtpService};
use homestay::AppState;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[allow(dead_code)]
pub const PASSWORD: &str = "correct horse battery";

/// Mailer that keeps every message for inspection.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, _subject: &str, body: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

impl RecordingMailer {
    /// The last code mailed to `to`.
    #[allow(dead_code)]
    pub fn last_code(&self, to: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(addr, _)| addr == to)
            .and_then(|(_, body)| {
                body.split_whitespace()
                    .map(|w| w.trim_end_matches('.'))
                    .find(|w| w.len() == 6 && w.chars().all(|c| c.is_ascii_digit()))
                    .map(str::to_string)
            })
    }
}

/// Create a test app with in-memory state and a recording mailer.
#[allow(dead_code)]
pub fn create_test_app_with_mailer() -> (axum::Router, Arc<AppState>, Arc<RecordingMailer>) {
    let config = Config::test_default();
    let db = MemoryDb::new(config.initial_rate_card);
    let mailer = Arc::new(RecordingMailer::default());
    let otp = OtpService::new(mailer.clone(), config.otp_ttl, config.otp_resend_cooldown);

    let state = Arc::new(AppState {
        config,
        db,
        otp,
        google: None,
    });

    (create_router(state.clone()), state, mailer)
}

/// Create a test app. Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let (router, state, _) = create_test_app_with_mailer();
    (router, state)
}

#[allow(dead_code)]
pub fn seed_user(state: &AppState, name: &str, email: &str, role: Role) -> UserIdentity {
    state
        .db
        .insert_user(StoredUser {
            identity: UserIdentity {
                id: Uuid::new_v4(),
                name: name.to_string(),
                email: email.to_string(),
                mobile: None,
                role,
                blocked: false,
                provider: AuthProvider::Local,
                created_at: Utc::now(),
            },
            password_hash: Some(hash_password(PASSWORD).unwrap()),
            google_subject: None,
        })
        .unwrap()
}

#[allow(dead_code)]
pub fn token_for(state: &AppState, user: &UserIdentity) -> String {
    create_jwt(user.id, user.role, &state.config.jwt_signing_key).unwrap()
}

/// Insert a paid booking in the given status.
#[allow(dead_code)]
pub fn seed_booking(
    state: &AppState,
    user_id: Uuid,
    amount: u64,
    status: BookingStatus,
) -> Booking {
    let booking_id = Uuid::new_v4();
    let payment = Payment {
        id: Uuid::new_v4(),
        booking_id,
        user_id,
        amount,
        status: PaymentStatus::Paid,
        provider_payment_id: format!("pay_{}", booking_id.simple()),
        provider_order_id: format!("order_{}", booking_id.simple()),
        created_at: Utc::now(),
    };
    let booking = Booking {
        id: booking_id,
        user_id,
        stay_date: future_date(),
        group_size: 1,
        group_name: String::new(),
        need_stay: false,
        stay_night: 1,
        meal_type: MealType::Veg,
        phone: "9876543210".to_string(),
        amount,
        status,
        payment_id: Some(payment.id),
        created_at: Utc::now(),
    };
    state.db.insert_booking(booking.clone(), payment);
    booking
}

#[allow(dead_code)]
pub fn future_date() -> NaiveDate {
    (Utc::now() + Duration::days(30)).date_naive()
}

/// Build a JSON request, optionally carrying a session cookie.
#[allow(dead_code)]
pub fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("homestay_token={token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Serve the router on an ephemeral port and return its base URL.
#[allow(dead_code)]
pub async fn spawn_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
