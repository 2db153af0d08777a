// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bookings, rate card, reviews and the admin aggregate routes.

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use homestay::models::{BookingStatus, Role};
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::{
    body_json, create_test_app, future_date, json_request, seed_booking, seed_user, token_for,
};

fn booking_body(amount: u64, success: bool) -> Value {
    json!({
        "stayDate": future_date(),
        "groupSize": 2,
        "groupName": "Ridge Walkers",
        "needStay": true,
        "stayNight": 2,
        "mealType": "veg",
        "phone": "9876543210",
        "amount": amount,
        "payment": {
            "success": success,
            "providerPaymentId": "pay_123",
            "providerOrderId": "order_123"
        }
    })
}

#[tokio::test]
async fn test_booking_recomputes_amount() {
    let (app, state) = create_test_app();
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let token = token_for(&state, &user);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/bookings",
            Some(&token),
            Some(booking_body(2600, true)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["amount"], 2600);
    assert_eq!(body["data"]["status"], "confirmed");

    let payments = state.db.payments_for_user(user.id);
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].amount, 2600);
}

#[tokio::test]
async fn test_stale_quote_is_conflict() {
    let (app, state) = create_test_app();
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/bookings",
            Some(&token_for(&state, &user)),
            Some(booking_body(2000, true)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "stale_state");
    assert!(state.db.bookings_for_user(user.id).is_empty());
}

#[tokio::test]
async fn test_failed_payment_is_not_booked() {
    let (app, state) = create_test_app();
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/bookings",
            Some(&token_for(&state, &user)),
            Some(booking_body(2600, false)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert!(state.db.bookings_for_user(user.id).is_empty());
}

#[tokio::test]
async fn test_past_stay_date_rejected() {
    let (app, state) = create_test_app();
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let mut body = booking_body(2600, true);
    body["stayDate"] = json!((Utc::now() - Duration::days(3)).date_naive());

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/bookings",
            Some(&token_for(&state, &user)),
            Some(body),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rate_card_update_is_admin_only() {
    let (app, state) = create_test_app();
    let admin = seed_user(&state, "Admin", "admin@example.com", Role::Admin);
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let card = json!({ "vegRate": 200, "nonVegRate": 300, "pricePerNight": 900 });

    let response = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/admin/accommodation",
            Some(&token_for(&state, &user)),
            Some(card.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/admin/accommodation",
            Some(&token_for(&state, &admin)),
            Some(card.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request(Method::GET, "/api/accommodation", None, None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["data"], card);
}

#[tokio::test]
async fn test_reviews_public_read_authenticated_write() {
    let (app, state) = create_test_app();
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let booking = seed_booking(&state, user.id, 500, BookingStatus::Completed);
    let review = json!({ "bookingId": booking.id, "rating": 5, "comment": "Lovely stay" });

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/reviews",
            None,
            Some(review.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/reviews",
            Some(&token_for(&state, &user)),
            Some(review),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request(Method::GET, "/api/reviews", None, None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"][0]["authorName"], "Asha");
}

#[tokio::test]
async fn test_owner_cancel_is_idempotent() {
    let (app, state) = create_test_app();
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let token = token_for(&state, &user);
    let booking = seed_booking(&state, user.id, 500, BookingStatus::Confirmed);
    let uri = format!("/api/bookings/{}/cancel", booking.id);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(json_request(Method::PUT, &uri, Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["status"], "cancelled");
    }
}

#[tokio::test]
async fn test_admin_user_detail_and_block() {
    let (app, state) = create_test_app();
    let admin = seed_user(&state, "Admin", "admin@example.com", Role::Admin);
    let admin_token = token_for(&state, &admin);
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let booking = seed_booking(&state, user.id, 500, BookingStatus::Cancelled);
    state
        .db
        .create_refund(user.id, booking.id, "Rain", Utc::now())
        .unwrap();

    let response = app
        .clone()
        .oneshot(json_request(
            Method::GET,
            &format!("/api/admin/{}/user/detail", user.id),
            Some(&admin_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["bookings"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["payments"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["refunds"][0]["status"], "initiated");

    // Block twice: the second call is a no-op.
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(json_request(
                Method::PUT,
                &format!("/api/admin/{}/block/user", user.id),
                Some(&admin_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["isBlocked"], true);
    }

    let response = app
        .clone()
        .oneshot(json_request(
            Method::GET,
            &format!("/api/admin/{}/booking/details", booking.id),
            Some(&admin_token),
            None,
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["data"]["user"]["email"], "asha@example.com");
    assert_eq!(body["data"]["refund"]["amount"], 500);

    let response = app
        .oneshot(json_request(
            Method::PUT,
            &format!("/api/admin/{}/unblock/user", user.id),
            Some(&admin_token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["data"]["isBlocked"], false);
}

#[tokio::test]
async fn test_admin_cannot_block_self() {
    let (app, state) = create_test_app();
    let admin = seed_user(&state, "Admin", "admin@example.com", Role::Admin);

    let response = app
        .oneshot(json_request(
            Method::PUT,
            &format!("/api/admin/{}/block/user", admin.id),
            Some(&token_for(&state, &admin)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
