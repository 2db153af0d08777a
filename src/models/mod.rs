// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models shared by the server of record and the client core.

pub mod admin;
pub mod booking;
pub mod envelope;
pub mod refund;
pub mod user;

pub use admin::{BookingDetails, UserDetailBundle};
pub use booking::{
    AccommodationRateCard, Booking, BookingDraft, BookingRequest, BookingStatus, MealType,
    Payment, PaymentConfirmation, PaymentStatus, Review, ReviewRequest,
};
pub use envelope::ApiEnvelope;
pub use refund::{
    RefundCreateRequest, RefundRequest, RefundStatus, StatusBadge, TimelineEntry, TimelineView,
    Tone, TransitionError,
};
pub use user::{AuthProvider, ProfileUpdate, Role, UserIdentity};
