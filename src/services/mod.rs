// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod credentials;
pub mod google_id;
pub mod mailer;
pub mod otp;
pub mod pricing;

pub use google_id::{GoogleIdError, GoogleIdVerifier, GoogleIdentity};
pub use mailer::{LogMailer, Mailer, SmtpMailer};
pub use otp::OtpService;
pub use pricing::{compute_amount, quote, validate_booking, BookingFieldError, PricingError, Quote};
