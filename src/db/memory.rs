// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store of record.
//!
//! Holds:
//! - Users, with unique email and mobile indexes
//! - Bookings with their payments, and reviews
//! - Refund requests, one per booking; all status changes go through
//!   `apply_refund_transition`
//! - The accommodation rate card

use crate::error::AppError;
use crate::models::{
    AccommodationRateCard, Booking, BookingDetails, BookingStatus, Payment, PaymentStatus,
    RefundRequest, RefundStatus, Review, UserDetailBundle, UserIdentity,
};
use crate::models::user::normalize_email;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// A user row: public identity plus credentials.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub identity: UserIdentity,
    /// Argon2 PHC string; `None` for accounts created through Google.
    pub password_hash: Option<String>,
    pub google_subject: Option<String>,
}

#[derive(Clone)]
pub struct MemoryDb {
    users: Arc<DashMap<Uuid, StoredUser>>,
    users_by_email: Arc<DashMap<String, Uuid>>,
    users_by_mobile: Arc<DashMap<String, Uuid>>,
    bookings: Arc<DashMap<Uuid, Booking>>,
    payments: Arc<DashMap<Uuid, Payment>>,
    reviews: Arc<DashMap<Uuid, Review>>,
    refunds: Arc<DashMap<Uuid, RefundRequest>>,
    refunds_by_booking: Arc<DashMap<Uuid, Uuid>>,
    rate_card: Arc<RwLock<AccommodationRateCard>>,
}

impl MemoryDb {
    pub fn new(rate_card: AccommodationRateCard) -> Self {
        Self {
            users: Arc::new(DashMap::new()),
            users_by_email: Arc::new(DashMap::new()),
            users_by_mobile: Arc::new(DashMap::new()),
            bookings: Arc::new(DashMap::new()),
            payments: Arc::new(DashMap::new()),
            reviews: Arc::new(DashMap::new()),
            refunds: Arc::new(DashMap::new()),
            refunds_by_booking: Arc::new(DashMap::new()),
            rate_card: Arc::new(RwLock::new(rate_card)),
        }
    }

    // ─── Users ───────────────────────────────────────────────────

    /// Insert a new user. Fails if the email (or mobile) is taken.
    pub fn insert_user(&self, user: StoredUser) -> Result<UserIdentity, AppError> {
        let id = user.identity.id;
        let email = normalize_email(&user.identity.email);

        match self.users_by_email.entry(email) {
            Entry::Occupied(_) => {
                return Err(AppError::BadRequest(
                    "An account with this email already exists".to_string(),
                ))
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        if let Some(mobile) = &user.identity.mobile {
            if let Err(e) = self.claim_mobile(mobile, id) {
                self.users_by_email
                    .remove(&normalize_email(&user.identity.email));
                return Err(e);
            }
        }

        let identity = user.identity.clone();
        self.users.insert(id, user);
        tracing::info!(user_id = %id, role = ?identity.role, "User created");
        Ok(identity)
    }

    pub fn get_user(&self, id: Uuid) -> Option<UserIdentity> {
        self.users.get(&id).map(|u| u.identity.clone())
    }

    pub fn get_stored_user(&self, id: Uuid) -> Option<StoredUser> {
        self.users.get(&id).map(|u| u.clone())
    }

    pub fn find_by_email(&self, email: &str) -> Option<StoredUser> {
        let id = *self.users_by_email.get(&normalize_email(email))?;
        self.get_stored_user(id)
    }

    pub fn find_by_google_subject(&self, subject: &str) -> Option<StoredUser> {
        self.users
            .iter()
            .find(|u| u.google_subject.as_deref() == Some(subject))
            .map(|u| u.clone())
    }

    pub fn mobile_in_use(&self, mobile: &str) -> bool {
        self.users_by_mobile.contains_key(mobile.trim())
    }

    pub fn list_users(&self) -> Vec<UserIdentity> {
        let mut users: Vec<_> = self.users.iter().map(|u| u.identity.clone()).collect();
        users.sort_by_key(|u| u.created_at);
        users
    }

    /// Commit a profile edit.
    ///
    /// The mobile number may be set once; after that it can only be resent
    /// unchanged. Email and mobile stay unique across users.
    pub fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        email: &str,
        mobile: Option<&str>,
    ) -> Result<UserIdentity, AppError> {
        let current = self
            .get_user(id)
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))?;
        self.apply_profile(&current, name, email, mobile)
    }

    /// Commit an edit decided against the snapshot `current`. The indexes
    /// are claimed first, then the row is re-checked under its guard; if a
    /// concurrent edit moved it on, the claims are released and the edit
    /// fails with `Conflict`.
    fn apply_profile(
        &self,
        current: &UserIdentity,
        name: &str,
        email: &str,
        mobile: Option<&str>,
    ) -> Result<UserIdentity, AppError> {
        let id = current.id;
        let new_email = normalize_email(email);
        let old_email = normalize_email(&current.email);
        let email_changed = new_email != old_email;
        let new_mobile = mobile.map(str::trim).filter(|m| !m.is_empty());

        let mobile_to_claim = match (current.mobile.as_deref(), new_mobile) {
            (Some(existing), Some(requested)) if existing != requested => {
                return Err(AppError::Forbidden(
                    "Mobile number is already set and cannot be changed".to_string(),
                ));
            }
            (Some(_), None) => {
                return Err(AppError::Forbidden(
                    "Mobile number cannot be removed".to_string(),
                ));
            }
            (None, Some(requested)) => Some(requested),
            _ => None,
        };

        if email_changed {
            match self.users_by_email.entry(new_email.clone()) {
                Entry::Occupied(slot) if *slot.get() != id => {
                    return Err(AppError::BadRequest(
                        "Email address is already in use".to_string(),
                    ))
                }
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
        }

        if let Some(mobile) = mobile_to_claim {
            if let Err(e) = self.claim_mobile(mobile, id) {
                if email_changed {
                    self.release_email(&new_email, id, None);
                }
                return Err(e);
            }
        }

        let committed = {
            let mut user = self
                .users
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))?;
            let row = &mut user.identity;
            let unchanged = normalize_email(&row.email) == old_email
                && (mobile_to_claim.is_none() || row.mobile.is_none());
            if unchanged {
                row.name = name.trim().to_string();
                row.email = new_email.clone();
                if let Some(mobile) = mobile_to_claim {
                    row.mobile = Some(mobile.to_string());
                }
                Ok(row.clone())
            } else {
                Err(row.clone())
            }
        };

        match committed {
            Ok(identity) => {
                if email_changed {
                    self.release_email(&old_email, id, None);
                }
                Ok(identity)
            }
            Err(stored) => {
                // Release only what the stored row does not hold.
                if email_changed {
                    self.release_email(&new_email, id, Some(&stored.email));
                }
                if let Some(mobile) = mobile_to_claim {
                    if stored.mobile.as_deref() != Some(mobile) {
                        self.users_by_mobile.remove_if(mobile, |_, owner| *owner == id);
                    }
                }
                tracing::warn!(user_id = %id, "Profile changed concurrently, edit refused");
                Err(AppError::Conflict(
                    "Profile was changed by another request, reload and try again".to_string(),
                ))
            }
        }
    }

    /// Drop `email` from the index if `id` owns it and `stored` is not it.
    fn release_email(&self, email: &str, id: Uuid, stored: Option<&str>) {
        if stored.is_some_and(|s| normalize_email(s) == email) {
            return;
        }
        self.users_by_email.remove_if(email, |_, owner| *owner == id);
    }

    pub fn set_password_hash(&self, id: Uuid, hash: String) -> Result<(), AppError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))?;
        user.password_hash = Some(hash);
        Ok(())
    }

    pub fn link_google_subject(&self, id: Uuid, subject: &str) -> Result<(), AppError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))?;
        user.google_subject = Some(subject.to_string());
        Ok(())
    }

    /// Set the blocked flag. Setting it to its current value is a no-op.
    pub fn set_blocked(&self, id: Uuid, blocked: bool) -> Result<UserIdentity, AppError> {
        let mut user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))?;
        if user.identity.blocked != blocked {
            user.identity.blocked = blocked;
            tracing::info!(user_id = %id, blocked, "User block flag changed");
        }
        Ok(user.identity.clone())
    }

    fn claim_mobile(&self, mobile: &str, id: Uuid) -> Result<(), AppError> {
        match self.users_by_mobile.entry(mobile.to_string()) {
            Entry::Occupied(slot) if *slot.get() != id => Err(AppError::BadRequest(
                "Mobile number is already registered".to_string(),
            )),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
        }
    }

    // ─── Rate card ───────────────────────────────────────────────

    pub fn rate_card(&self) -> AccommodationRateCard {
        match self.rate_card.read() {
            Ok(card) => *card,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set_rate_card(&self, card: AccommodationRateCard) {
        match self.rate_card.write() {
            Ok(mut guard) => *guard = card,
            Err(poisoned) => *poisoned.into_inner() = card,
        }
        tracing::info!(
            veg_rate = card.veg_rate,
            non_veg_rate = card.non_veg_rate,
            price_per_night = card.price_per_night,
            "Rate card updated"
        );
    }

    // ─── Bookings & payments ─────────────────────────────────────

    pub fn insert_booking(&self, booking: Booking, payment: Payment) {
        tracing::info!(
            booking_id = %booking.id,
            user_id = %booking.user_id,
            amount = booking.amount,
            "Booking stored"
        );
        self.payments.insert(payment.id, payment);
        self.bookings.insert(booking.id, booking);
    }

    pub fn get_booking(&self, id: Uuid) -> Option<Booking> {
        self.bookings.get(&id).map(|b| b.clone())
    }

    pub fn bookings_for_user(&self, user_id: Uuid) -> Vec<Booking> {
        let mut bookings: Vec<_> = self
            .bookings
            .iter()
            .filter(|b| b.user_id == user_id)
            .map(|b| b.clone())
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings
    }

    /// Cancel a confirmed booking. With `owner` set, only that user's
    /// booking may be cancelled.
    pub fn cancel_booking(&self, id: Uuid, owner: Option<Uuid>) -> Result<Booking, AppError> {
        let mut booking = self
            .bookings
            .get_mut(&id)
            .filter(|b| owner.is_none_or(|o| b.user_id == o))
            .ok_or_else(|| AppError::NotFound(format!("Booking {id} not found")))?;

        match booking.status {
            BookingStatus::Confirmed => {
                booking.status = BookingStatus::Cancelled;
                tracing::info!(booking_id = %id, "Booking cancelled");
                Ok(booking.clone())
            }
            BookingStatus::Cancelled => Ok(booking.clone()),
            BookingStatus::Completed => Err(AppError::Conflict(
                "Completed bookings cannot be cancelled".to_string(),
            )),
        }
    }

    pub fn get_payment(&self, id: Uuid) -> Option<Payment> {
        self.payments.get(&id).map(|p| p.clone())
    }

    pub fn payments_for_user(&self, user_id: Uuid) -> Vec<Payment> {
        let mut payments: Vec<_> = self
            .payments
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| p.clone())
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        payments
    }

    // ─── Reviews ─────────────────────────────────────────────────

    pub fn insert_review(&self, review: Review) -> Result<Review, AppError> {
        if self
            .reviews
            .iter()
            .any(|r| r.booking_id == review.booking_id && r.user_id == review.user_id)
        {
            return Err(AppError::BadRequest(
                "This booking has already been reviewed".to_string(),
            ));
        }
        self.reviews.insert(review.id, review.clone());
        Ok(review)
    }

    pub fn list_reviews(&self) -> Vec<Review> {
        let mut reviews: Vec<_> = self.reviews.iter().map(|r| r.clone()).collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        reviews
    }

    pub fn reviews_for_user(&self, user_id: Uuid) -> Vec<Review> {
        self.list_reviews()
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .collect()
    }

    // ─── Refunds ─────────────────────────────────────────────────

    /// Open a refund for the owner's cancelled booking.
    pub fn create_refund(
        &self,
        user_id: Uuid,
        booking_id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<RefundRequest, AppError> {
        let booking = self
            .get_booking(booking_id)
            .filter(|b| b.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Booking {booking_id} not found")))?;

        if booking.status != BookingStatus::Cancelled {
            return Err(AppError::BadRequest(
                "Only cancelled bookings can be refunded".to_string(),
            ));
        }

        let refund = RefundRequest::initiate(booking_id, user_id, booking.amount, reason.trim(), at);

        match self.refunds_by_booking.entry(booking_id) {
            Entry::Occupied(_) => {
                return Err(AppError::Conflict(
                    "A refund has already been requested for this booking".to_string(),
                ))
            }
            Entry::Vacant(slot) => {
                slot.insert(refund.id());
            }
        }
        self.refunds.insert(refund.id(), refund.clone());

        tracing::info!(
            refund_id = %refund.id(),
            booking_id = %booking_id,
            amount = refund.amount(),
            "Refund initiated"
        );
        Ok(refund)
    }

    pub fn get_refund(&self, id: Uuid) -> Option<RefundRequest> {
        self.refunds.get(&id).map(|r| r.clone())
    }

    pub fn refund_for_booking(&self, booking_id: Uuid) -> Option<RefundRequest> {
        let id = *self.refunds_by_booking.get(&booking_id)?;
        self.get_refund(id)
    }

    pub fn refund_by_provider_id(&self, provider_refund_id: &str) -> Option<RefundRequest> {
        self.refunds
            .iter()
            .find(|r| r.provider_refund_id() == Some(provider_refund_id))
            .map(|r| r.clone())
    }

    /// Owner's refunds, most recently initiated first.
    pub fn refunds_for_user(&self, user_id: Uuid) -> Vec<RefundRequest> {
        let mut refunds: Vec<_> = self
            .refunds
            .iter()
            .filter(|r| r.user_id() == user_id)
            .map(|r| r.clone())
            .collect();
        refunds.sort_by(|a, b| b.initiated_at().cmp(&a.initiated_at()));
        refunds
    }

    /// Withdraw the owner's refund. Only `initiated` requests can go;
    /// anything else is a conflict with the caller's view.
    pub fn delete_own_refund(&self, user_id: Uuid, refund_id: Uuid) -> Result<(), AppError> {
        let removed = self.refunds.remove_if(&refund_id, |_, r| {
            r.user_id() == user_id && r.status().is_withdrawable()
        });

        match removed {
            Some((_, refund)) => {
                self.refunds_by_booking.remove(&refund.booking_id());
                tracing::info!(refund_id = %refund_id, user_id = %user_id, "Refund withdrawn");
                Ok(())
            }
            None => match self.get_refund(refund_id) {
                Some(refund) if refund.user_id() == user_id => {
                    tracing::warn!(
                        refund_id = %refund_id,
                        status = %refund.status(),
                        "Refund withdrawal refused"
                    );
                    Err(AppError::Conflict(format!(
                        "Refund is already {} and can no longer be withdrawn",
                        refund.status()
                    )))
                }
                _ => Err(AppError::NotFound(format!("Refund {refund_id} not found"))),
            },
        }
    }

    /// The only place refund status changes. Returns the updated request and
    /// whether anything changed.
    pub fn apply_refund_transition(
        &self,
        refund_id: Uuid,
        next: RefundStatus,
        provider_refund_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(RefundRequest, bool), AppError> {
        let (refund, changed) = {
            let mut refund = self
                .refunds
                .get_mut(&refund_id)
                .ok_or_else(|| AppError::NotFound(format!("Refund {refund_id} not found")))?;

            let changed = refund.record_transition(next, at).map_err(|e| {
                tracing::warn!(refund_id = %refund_id, error = %e, "Refund transition refused");
                AppError::Transition(e)
            })?;

            if let Some(provider_id) = provider_refund_id {
                if refund.provider_refund_id().is_none() {
                    refund.set_provider_refund_id(provider_id.to_string());
                }
            }
            (refund.clone(), changed)
        };

        if changed {
            tracing::info!(refund_id = %refund_id, status = %next, "Refund status changed");
            if next == RefundStatus::Refunded {
                self.mark_payment_refunded(refund.booking_id());
            }
        }

        Ok((refund, changed))
    }

    fn mark_payment_refunded(&self, booking_id: Uuid) {
        let Some(payment_id) = self.get_booking(booking_id).and_then(|b| b.payment_id) else {
            return;
        };
        if let Some(mut payment) = self.payments.get_mut(&payment_id) {
            payment.status = PaymentStatus::Refunded;
        }
    }

    // ─── Admin aggregates ────────────────────────────────────────

    pub fn user_detail(&self, user_id: Uuid) -> Option<UserDetailBundle> {
        let user = self.get_user(user_id)?;
        Some(UserDetailBundle {
            user,
            bookings: self.bookings_for_user(user_id),
            payments: self.payments_for_user(user_id),
            reviews: self.reviews_for_user(user_id),
            refunds: self.refunds_for_user(user_id),
        })
    }

    pub fn booking_details(&self, booking_id: Uuid) -> Option<BookingDetails> {
        let booking = self.get_booking(booking_id)?;
        let user = self.get_user(booking.user_id)?;
        let payment = booking.payment_id.and_then(|id| self.get_payment(id));
        let refund = self.refund_for_booking(booking_id);
        Some(BookingDetails {
            booking,
            user,
            payment,
            refund,
        })
    }
}
