// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity routes: sessions, blocking, OTP-gated email change and the
//! one-time mobile number.

use axum::http::{header, Method, StatusCode};
use homestay::models::Role;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{
    body_json, create_test_app, create_test_app_with_mailer, json_request, seed_user, token_for,
    PASSWORD,
};

#[tokio::test]
async fn test_register_sets_session_cookie() {
    let (app, _) = create_test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/user/register",
            None,
            Some(json!({ "name": "Asha", "email": "Asha@Example.com", "password": PASSWORD })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("homestay_token="));
    assert!(cookie.contains("HttpOnly"));

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], "asha@example.com");
    assert_eq!(body["data"]["role"], "trekker");

    // Same email again is refused.
    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/user/register",
            None,
            Some(json!({ "name": "Asha", "email": "asha@example.com", "password": PASSWORD })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_profile_requires_session() {
    let (app, _) = create_test_app();
    let response = app
        .oneshot(json_request(Method::GET, "/api/user/profile", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_bearer_token_is_accepted() {
    let (app, state) = create_test_app();
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let request = axum::http::Request::builder()
        .uri("/api/user/profile")
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(&state, &user)))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_blocked_user_is_refused() {
    let (app, state) = create_test_app();
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let token = token_for(&state, &user);
    state.db.set_blocked(user.id, true).unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/user/login",
            None,
            Some(json!({ "email": "asha@example.com", "password": PASSWORD })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Existing sessions stop working too.
    let response = app
        .oneshot(json_request(Method::GET, "/api/user/profile", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_email_change_requires_verified_code() {
    let (app, state, mailer) = create_test_app_with_mailer();
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let token = token_for(&state, &user);
    let update = json!({ "name": "Asha", "email": "asha.new@example.com", "mobile": null });

    let response = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/user/update-profile",
            Some(&token),
            Some(update.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/otp/send-otp",
            None,
            Some(json!({ "email": "asha.new@example.com" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["expiresIn"], 300);

    // Wrong code first.
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/otp/verify-otp",
            None,
            Some(json!({ "email": "asha.new@example.com", "otp": "not-it" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "invalid_code");

    let code = mailer.last_code("asha.new@example.com").unwrap();
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/otp/verify-otp",
            Some(&token),
            Some(json!({ "email": "asha.new@example.com", "otp": code })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request(
            Method::PUT,
            "/api/user/update-profile",
            Some(&token),
            Some(update),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["email"], "asha.new@example.com");
    assert!(state.db.find_by_email("asha@example.com").is_none());
}

#[tokio::test]
async fn test_verified_email_belongs_to_verifier() {
    let (app, state, mailer) = create_test_app_with_mailer();
    let asha = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let mallory = seed_user(&state, "Mallory", "mallory@example.com", Role::Trekker);
    let asha_token = token_for(&state, &asha);
    let mallory_token = token_for(&state, &mallory);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/otp/send-otp",
            Some(&asha_token),
            Some(json!({ "email": "asha.new@example.com" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let code = mailer.last_code("asha.new@example.com").unwrap();
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/otp/verify-otp",
            Some(&asha_token),
            Some(json!({ "email": "asha.new@example.com", "otp": code })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Another account cannot save the address Asha just verified.
    let response = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/user/update-profile",
            Some(&mallory_token),
            Some(json!({ "name": "Mallory", "email": "asha.new@example.com", "mobile": null })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        state.db.get_user(mallory.id).unwrap().email,
        "mallory@example.com"
    );

    // Asha's grant survived the attempt.
    let response = app
        .oneshot(json_request(
            Method::PUT,
            "/api/user/update-profile",
            Some(&asha_token),
            Some(json!({ "name": "Asha", "email": "asha.new@example.com", "mobile": null })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_anonymous_verification_cannot_change_email() {
    let (app, state, mailer) = create_test_app_with_mailer();
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let token = token_for(&state, &user);

    app.clone()
        .oneshot(json_request(
            Method::POST,
            "/api/otp/send-otp",
            None,
            Some(json!({ "email": "asha.new@example.com" })),
        ))
        .await
        .unwrap();
    let code = mailer.last_code("asha.new@example.com").unwrap();
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/otp/verify-otp",
            None,
            Some(json!({ "email": "asha.new@example.com", "otp": code })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request(
            Method::PUT,
            "/api/user/update-profile",
            Some(&token),
            Some(json!({ "name": "Asha", "email": "asha.new@example.com", "mobile": null })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_resend_within_cooldown_is_rate_limited() {
    let (app, _) = create_test_app();
    let send = || {
        json_request(
            Method::POST,
            "/api/otp/send-otp",
            None,
            Some(json!({ "email": "asha@example.com" })),
        )
    };

    let response = app.clone().oneshot(send()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(send()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get(header::RETRY_AFTER).is_some());
    assert_eq!(body_json(response).await["code"], "rate_limited");
}

#[tokio::test]
async fn test_mobile_is_set_once() {
    let (app, state) = create_test_app();
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let token = token_for(&state, &user);
    let put = |mobile: &str| {
        json_request(
            Method::PUT,
            "/api/user/update-profile",
            Some(&token),
            Some(json!({ "name": "Asha", "email": "asha@example.com", "mobile": mobile })),
        )
    };

    let response = app.clone().oneshot(put("98765")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.clone().oneshot(put("9876543210")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Resending the same number is fine, changing it is not.
    let response = app.clone().oneshot(put("9876543210")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.clone().oneshot(put("9123456780")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(json_request(
            Method::GET,
            "/api/user/check-mobile?number=9876543210",
            None,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["data"]["available"], false);
}

#[tokio::test]
async fn test_mobile_must_be_unique() {
    let (app, state) = create_test_app();
    let first = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let second = seed_user(&state, "Ravi", "ravi@example.com", Role::Trekker);
    state
        .db
        .update_profile(first.id, "Asha", "asha@example.com", Some("9876543210"))
        .unwrap();

    let response = app
        .oneshot(json_request(
            Method::PUT,
            "/api/user/update-profile",
            Some(&token_for(&state, &second)),
            Some(json!({ "name": "Ravi", "email": "ravi@example.com", "mobile": "9876543210" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.db.get_user(second.id).unwrap().mobile, None);
}

#[tokio::test]
async fn test_update_password_checks_current() {
    let (app, state) = create_test_app();
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let token = token_for(&state, &user);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/user/update-password",
            Some(&token),
            Some(json!({ "currentPassword": "wrong password", "newPassword": "new password 1" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/user/update-password",
            Some(&token),
            Some(json!({ "currentPassword": PASSWORD, "newPassword": "new password 1" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/user/login",
            None,
            Some(json!({ "email": "asha@example.com", "password": "new password 1" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
