//! Aggregate payloads served to the administrative view.

use serde::{Deserialize, Serialize};

use super::{Booking, Payment, RefundRequest, Review, UserIdentity};

/// Everything an administrator sees about one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailBundle {
    pub user: UserIdentity,
    #[serde(default)]
    pub bookings: Vec<Booking>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub refunds: Vec<RefundRequest>,
}

/// One booking with its payment and refund, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    pub booking: Booking,
    pub user: UserIdentity,
    pub payment: Option<Payment>,
    pub refund: Option<RefundRequest>,
}
