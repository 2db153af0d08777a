// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Collaborator contracts used by the client core.
//!
//! `ApiClient` implements all of them over HTTP; tests substitute
//! hand-written fakes.

use crate::client::error::ClientError;
use crate::models::{
    AccommodationRateCard, Booking, BookingDetails, BookingRequest, ProfileUpdate, RefundRequest,
    Review, UserDetailBundle, UserIdentity,
};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn profile(&self) -> Result<UserIdentity, ClientError>;

    /// Commit the full draft.
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserIdentity, ClientError>;

    /// `true` when no account uses `number`.
    async fn check_mobile(&self, number: &str) -> Result<bool, ClientError>;
}

#[async_trait]
pub trait OtpApi: Send + Sync {
    async fn send_otp(&self, email: &str) -> Result<(), ClientError>;
    async fn verify_otp(&self, email: &str, otp: &str) -> Result<(), ClientError>;
}

#[async_trait]
pub trait BookingApi: Send + Sync {
    async fn rate_card(&self) -> Result<AccommodationRateCard, ClientError>;
    async fn create_booking(&self, request: &BookingRequest) -> Result<Booking, ClientError>;
    async fn my_bookings(&self) -> Result<Vec<Booking>, ClientError>;
    async fn reviews(&self) -> Result<Vec<Review>, ClientError>;
}

#[async_trait]
pub trait RefundApi: Send + Sync {
    async fn my_refunds(&self) -> Result<Vec<RefundRequest>, ClientError>;
    async fn delete_refund(&self, id: Uuid) -> Result<(), ClientError>;
}

#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn user_detail(&self, user_id: Uuid) -> Result<UserDetailBundle, ClientError>;
    async fn block_user(&self, user_id: Uuid) -> Result<UserIdentity, ClientError>;
    async fn unblock_user(&self, user_id: Uuid) -> Result<UserIdentity, ClientError>;
    async fn booking_details(&self, booking_id: Uuid) -> Result<BookingDetails, ClientError>;
    async fn cancel_booking(&self, booking_id: Uuid) -> Result<Booking, ClientError>;
}
