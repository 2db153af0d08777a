// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-side error taxonomy.
//!
//! - `Validation`: detected locally, never reaches the network
//! - `Provider`: verification provider failures; the channel goes back to a
//!   re-requestable state
//! - `Api` / `StaleState`: the server said no; the affected aggregate is
//!   re-fetched
//!
//! `Superseded` and `Cancelled` mark responses that were dropped on purpose
//! and never produce a notice.

use crate::client::verification::ChannelKind;
use crate::services::pricing::BookingFieldError;

/// Problems caught before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Mobile number must be exactly 10 digits")]
    InvalidMobile,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Enter the 6-digit code")]
    MalformedCode,

    #[error("Name cannot be empty")]
    NameRequired,

    #[error("Mobile number is already set and cannot be edited here")]
    MobileLocked,

    #[error("This mobile number is already registered")]
    MobileInUse,

    #[error("Nothing has changed")]
    NoChanges,

    #[error("Verify your {0} before saving")]
    VerificationRequired(ChannelKind),

    #[error("You are not signed in")]
    NotSignedIn,

    #[error("User is already blocked")]
    AlreadyBlocked,

    #[error("User is not blocked")]
    AlreadyUnblocked,

    #[error("Booking is already cancelled")]
    AlreadyCancelled,

    #[error("{}", booking_summary(.0))]
    Booking(Vec<BookingFieldError>),

    #[error("Booking amount is too large")]
    AmountOverflow,
}

fn booking_summary(errors: &[BookingFieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Verification provider failures, for either channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("Too many requests, try again in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("This number or address cannot receive codes")]
    InvalidTarget,

    #[error("Verification service unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Incorrect code")]
    InvalidCode,

    #[error("Code expired, request a new one")]
    Expired,

    #[error("No code has been requested, request a new one")]
    NoActiveChallenge,

    #[error("Complete the human check first")]
    ChallengeRequired,

    #[error("Human check failed, try again")]
    ChallengeFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
        retry_after_secs: Option<u64>,
    },

    /// The server rejected something this client believed legal.
    #[error("{0}")]
    StaleState(String),

    #[error("Network error: {0}")]
    Transport(String),

    /// The same action is already in flight.
    #[error("Please wait for the current request to finish")]
    Busy,

    /// A newer request replaced this one; its response was dropped.
    #[error("superseded by a newer request")]
    Superseded,

    /// The owning view was torn down; the response was dropped.
    #[error("view closed")]
    Cancelled,

    /// The item is not in the local cache (reload and retry).
    #[error("{0} not found")]
    Missing(String),
}

impl ClientError {
    /// Text for the single dismissible notification, or `None` for errors
    /// that are dropped silently.
    pub fn notice(&self) -> Option<String> {
        match self {
            ClientError::Superseded | ClientError::Cancelled => None,
            other => Some(other.to_string()),
        }
    }

    /// Whether the affected aggregate should be re-fetched.
    pub fn needs_refetch(&self) -> bool {
        matches!(self, ClientError::Api { .. } | ClientError::StaleState(_))
    }

    /// Machine-readable envelope code, if the server sent one.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_responses_are_silent() {
        assert_eq!(ClientError::Superseded.notice(), None);
        assert_eq!(ClientError::Cancelled.notice(), None);
        assert_eq!(
            ClientError::StaleState("Refund is already refunded".into()).notice(),
            Some("Refund is already refunded".to_string())
        );
    }

    #[test]
    fn booking_errors_join() {
        let err = ClientError::from(ValidationError::Booking(vec![
            BookingFieldError::StayDateMissing,
            BookingFieldError::InvalidPhone,
        ]));
        assert_eq!(
            err.notice().unwrap(),
            "Please choose a stay date; Phone number must be exactly 10 digits"
        );
    }

    #[test]
    fn refetch_policy() {
        assert!(ClientError::StaleState(String::new()).needs_refetch());
        assert!(!ClientError::from(ProviderError::InvalidCode).needs_refetch());
        assert!(!ClientError::from(ValidationError::InvalidMobile).needs_refetch());
    }
}
