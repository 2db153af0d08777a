// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Booking, payment and review models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

/// Meal plan chosen for the group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum MealType {
    #[default]
    #[serde(rename = "veg")]
    Veg,
    #[serde(rename = "non-veg")]
    NonVeg,
}

/// Externally supplied pricing constants, whole rupees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AccommodationRateCard {
    #[validate(range(max = 1_000_000))]
    pub veg_rate: u64,
    #[validate(range(max = 1_000_000))]
    pub non_veg_rate: u64,
    #[validate(range(max = 1_000_000))]
    pub price_per_night: u64,
}

/// In-progress booking form fields. The amount is derived, never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    pub stay_date: Option<NaiveDate>,
    #[validate(range(min = 1, max = 200))]
    pub group_size: u32,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub group_name: String,
    pub need_stay: bool,
    #[validate(range(max = 60))]
    pub stay_night: u32,
    pub meal_type: MealType,
    #[serde(default)]
    pub phone: String,
}

impl Default for BookingDraft {
    fn default() -> Self {
        Self {
            stay_date: None,
            group_size: 1,
            group_name: String::new(),
            need_stay: false,
            stay_night: 1,
            meal_type: MealType::Veg,
            phone: String::new(),
        }
    }
}

/// Opaque pass/fail result handed back by the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    pub success: bool,
    pub provider_payment_id: String,
    pub provider_order_id: String,
}

/// Body of `POST bookings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[serde(flatten)]
    pub draft: BookingDraft,
    /// Amount the client quoted; must match the server's recomputation.
    pub amount: u64,
    pub payment: PaymentConfirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }
}

/// Persisted booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stay_date: NaiveDate,
    pub group_size: u32,
    pub group_name: String,
    pub need_stay: bool,
    pub stay_night: u32,
    pub meal_type: MealType,
    pub phone: String,
    pub amount: u64,
    pub status: BookingStatus,
    pub payment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub amount: u64,
    pub status: PaymentStatus,
    pub provider_payment_id: String,
    pub provider_order_id: String,
    pub created_at: DateTime<Utc>,
}

/// Guest review, shown publicly as a testimonial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub booking_id: Uuid,
    pub author_name: String,
    pub rating: u8,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST reviews`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub booking_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    pub rating: u8,
    #[validate(length(min = 1, max = 1000))]
    pub comment: String,
}
