// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client core against a live server on an ephemeral port.

use chrono::Utc;
use homestay::client::verification::{ChannelKind, ChannelState};
use homestay::client::{ClientContext, ClientError, RefundQuery};
use homestay::config::ClientConfig;
use homestay::models::{
    AccommodationRateCard, BookingStatus, MealType, PaymentConfirmation, RefundStatus, Role,
};
use std::sync::Arc;

mod common;
use common::fakes::FakePhone;
use common::{
    create_test_app_with_mailer, future_date, seed_booking, seed_user, spawn_server, PASSWORD,
};

fn client_for(base_url: String) -> ClientContext {
    ClientContext::new(ClientConfig {
        api_base_url: base_url,
        ..ClientConfig::test_default()
    })
    .unwrap()
}

fn paid() -> PaymentConfirmation {
    PaymentConfirmation {
        success: true,
        provider_payment_id: "pay_e2e".to_string(),
        provider_order_id: "order_e2e".to_string(),
    }
}

#[tokio::test]
async fn test_booking_through_form() {
    let (router, state, _) = create_test_app_with_mailer();
    seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let ctx = client_for(spawn_server(router).await);
    ctx.login("asha@example.com", PASSWORD).await.unwrap();

    let mut form = ctx.booking_form().await.unwrap();
    assert!(ctx.store.rate_card().unwrap().is_confirmed());
    form.set_stay_date(Some(future_date()));
    form.set_group_size(2);
    form.set_group_name("Ridge Walkers");
    form.set_need_stay(true);
    form.set_stay_night(2);
    form.set_meal_type(MealType::Veg);
    form.set_phone("9876543210");
    assert_eq!(form.amount(), Ok(2600));

    let booking = form
        .submit(ctx.api.as_ref(), &ctx.store, paid(), Utc::now().date_naive())
        .await
        .unwrap();
    assert_eq!(booking.amount, 2600);
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(ctx.store.bookings().unwrap().len(), 1);
}

#[tokio::test]
async fn test_stale_rate_card_is_refetched() {
    let (router, state, _) = create_test_app_with_mailer();
    seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let ctx = client_for(spawn_server(router).await);
    ctx.login("asha@example.com", PASSWORD).await.unwrap();

    let mut form = ctx.booking_form().await.unwrap();
    form.set_stay_date(Some(future_date()));
    form.set_phone("9876543210");
    assert_eq!(form.amount(), Ok(150));

    let raised = AccommodationRateCard {
        veg_rate: 200,
        non_veg_rate: 300,
        price_per_night: 600,
    };
    state.db.set_rate_card(raised);

    let err = form
        .submit(ctx.api.as_ref(), &ctx.store, paid(), Utc::now().date_naive())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::StaleState(_)));
    assert_eq!(*form.rate_card(), raised);
    assert_eq!(form.amount(), Ok(200));
    assert_eq!(ctx.store.notices().len(), 1);

    // Resubmitting at the new price goes through.
    form.submit(ctx.api.as_ref(), &ctx.store, paid(), Utc::now().date_naive())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_refund_list_and_delete() {
    let (router, state, _) = create_test_app_with_mailer();
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let open = seed_booking(&state, user.id, 700, BookingStatus::Cancelled);
    let other = seed_booking(&state, user.id, 900, BookingStatus::Cancelled);
    let ctx = client_for(spawn_server(router).await);
    ctx.login("asha@example.com", PASSWORD).await.unwrap();

    let first = ctx.api.request_refund(open.id, "Rain").await.unwrap();
    ctx.api.request_refund(other.id, "Landslide").await.unwrap();

    let refunds = ctx.refunds();
    let listed = refunds.list(user.id, &RefundQuery::default()).await.unwrap();
    assert_eq!(listed.len(), 2);

    let prompt = refunds.prepare_delete(first.id()).unwrap();
    assert!(prompt.withdrawable);
    assert_eq!(prompt.amount, 700);
    refunds.delete(&prompt).await.unwrap();

    let remaining = ctx.store.refunds().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].amount(), 900);

    let initiated = refunds.filtered(&RefundQuery {
        status: Some(RefundStatus::Initiated),
        ..Default::default()
    });
    assert_eq!(initiated.len(), 1);
    let timeline = refunds.view_timeline(remaining[0].id()).unwrap();
    assert_eq!(timeline.len(), 1);
}

#[tokio::test]
async fn test_email_change_through_server_otp() {
    let (router, state, mailer) = create_test_app_with_mailer();
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let ctx = client_for(spawn_server(router).await);
    ctx.login("asha@example.com", PASSWORD).await.unwrap();

    let update = ctx.contact_update(Arc::new(FakePhone::default())).unwrap();
    update.set_email("asha.rao@example.com");
    update.request_code(ChannelKind::Email).await.unwrap();

    let err = update
        .confirm_code(ChannelKind::Email, "000000")
        .await
        .unwrap_err();
    assert_eq!(err.api_code(), None);
    assert_eq!(update.email_channel().state(), ChannelState::CodeSent);

    let code = mailer.last_code("asha.rao@example.com").unwrap();
    update
        .confirm_code(ChannelKind::Email, &code)
        .await
        .unwrap();
    let updated = update.submit().await.unwrap();
    assert_eq!(updated.email, "asha.rao@example.com");
    assert_eq!(
        state.db.get_user(user.id).unwrap().email,
        "asha.rao@example.com"
    );
    update.teardown();
}

#[tokio::test]
async fn test_admin_blocks_user() {
    let (router, state, _) = create_test_app_with_mailer();
    seed_user(&state, "Admin", "admin@example.com", Role::Admin);
    let user = seed_user(&state, "Asha", "asha@example.com", Role::Trekker);
    let booking = seed_booking(&state, user.id, 500, BookingStatus::Confirmed);
    let base = spawn_server(router).await;

    let guest = client_for(base.clone());
    guest.login("asha@example.com", PASSWORD).await.unwrap();

    let admin = client_for(base);
    admin.login("admin@example.com", PASSWORD).await.unwrap();
    let view = admin.admin_user(user.id);
    view.load().await.unwrap();
    assert_eq!(view.counts().bookings, 1);
    assert!(view.can_block());

    view.block().await.unwrap();
    assert!(view.can_unblock());
    assert!(state.db.get_user(user.id).unwrap().blocked);

    let cancelled = view.cancel_booking(booking.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(
        view.bookings_page().items[0].status,
        BookingStatus::Cancelled
    );

    // The blocked guest's session stops working.
    let err = guest.refresh_profile().await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 403, .. }));
}
