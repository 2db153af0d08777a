// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Booking price computation and pre-submission validation.
//!
//! Amounts are whole rupees in `u64`. Every input is already integral, so no
//! rounding ever happens; overflow is reported instead of wrapping.

use crate::models::user::is_valid_mobile;
use crate::models::{AccommodationRateCard, BookingDraft, MealType};
use chrono::NaiveDate;
use serde::Serialize;

/// Price breakdown for a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub meal_amount: u64,
    pub stay_amount: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("booking amount is too large")]
    Overflow,
}

/// Per-person meal rate for the chosen meal type.
pub fn meal_rate(meal_type: MealType, rates: &AccommodationRateCard) -> u64 {
    match meal_type {
        MealType::NonVeg => rates.non_veg_rate,
        MealType::Veg => rates.veg_rate,
    }
}

/// Full breakdown of the booking amount.
pub fn quote(draft: &BookingDraft, rates: &AccommodationRateCard) -> Result<Quote, PricingError> {
    let group = u64::from(draft.group_size);
    let nights = u64::from(draft.stay_night);
    let rate = meal_rate(draft.meal_type, rates);

    let meal_amount = if draft.need_stay {
        mul3(rate, nights, group)?
    } else {
        rate.checked_mul(group).ok_or(PricingError::Overflow)?
    };

    let stay_amount = if draft.need_stay {
        mul3(rates.price_per_night, nights, group)?
    } else {
        0
    };

    let total = meal_amount
        .checked_add(stay_amount)
        .ok_or(PricingError::Overflow)?;

    Ok(Quote {
        meal_amount,
        stay_amount,
        total,
    })
}

/// Total amount for a draft.
pub fn compute_amount(
    draft: &BookingDraft,
    rates: &AccommodationRateCard,
) -> Result<u64, PricingError> {
    quote(draft, rates).map(|q| q.total)
}

fn mul3(a: u64, b: u64, c: u64) -> Result<u64, PricingError> {
    a.checked_mul(b)
        .and_then(|ab| ab.checked_mul(c))
        .ok_or(PricingError::Overflow)
}

/// A field-level problem with a booking draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BookingFieldError {
    #[error("Please choose a stay date")]
    StayDateMissing,
    #[error("Stay date cannot be in the past")]
    StayDateInPast,
    #[error("Phone number must be exactly 10 digits")]
    InvalidPhone,
    #[error("Group size must be at least 1")]
    GroupSizeZero,
    #[error("Group name is required for groups larger than one")]
    GroupNameRequired,
    #[error("Number of nights must be at least 1")]
    StayNightZero,
}

/// Check a draft before submission. All failing fields are returned.
pub fn validate_booking(draft: &BookingDraft, today: NaiveDate) -> Vec<BookingFieldError> {
    let mut errors = Vec::new();

    match draft.stay_date {
        None => errors.push(BookingFieldError::StayDateMissing),
        Some(date) if date < today => errors.push(BookingFieldError::StayDateInPast),
        Some(_) => {}
    }

    if !is_valid_mobile(draft.phone.trim()) {
        errors.push(BookingFieldError::InvalidPhone);
    }

    if draft.group_size == 0 {
        errors.push(BookingFieldError::GroupSizeZero);
    } else if draft.group_size > 1 && draft.group_name.trim().is_empty() {
        errors.push(BookingFieldError::GroupNameRequired);
    }

    if draft.need_stay && draft.stay_night == 0 {
        errors.push(BookingFieldError::StayNightZero);
    }

    errors
}
