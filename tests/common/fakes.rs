// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hand-written collaborators for the client core.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use homestay::client::ports::{AdminApi, IdentityApi, OtpApi, RefundApi};
use homestay::client::verification::{ChallengeToken, ConfirmationHandle, PhoneAuthProvider};
use homestay::client::{ClientError, ProviderError};
use homestay::models::{
    AuthProvider, Booking, BookingDetails, BookingStatus, ProfileUpdate, RefundRequest, Role,
    UserDetailBundle, UserIdentity,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// Code for the first phone session. Later sessions get `phone_code(n)`.
pub const PHONE_CODE: &str = "123456";
pub const EMAIL_CODE: &str = "654321";

pub fn user(mobile: Option<&str>) -> UserIdentity {
    UserIdentity {
        id: Uuid::new_v4(),
        name: "Asha".to_string(),
        email: "asha@example.com".to_string(),
        mobile: mobile.map(str::to_string),
        role: Role::Trekker,
        blocked: false,
        provider: AuthProvider::Local,
        created_at: Utc::now(),
    }
}

// ─── Phone provider ──────────────────────────────────────────────

/// The code the fake provider binds to its `n`th session (1-based).
pub fn phone_code(n: usize) -> String {
    if n == 1 {
        PHONE_CODE.to_string()
    } else {
        format!("{:06}", 200_000 + n)
    }
}

/// Each `send_code` opens a new session with its own code and retires the
/// previous ones, as the real provider does.
#[derive(Default)]
pub struct FakePhone {
    /// E.164 numbers codes were sent to, in order.
    pub sent: Mutex<Vec<String>>,
    pub send_delay: Mutex<Option<Duration>>,
    pub send_error: Mutex<Option<ProviderError>>,
    pub challenges: AtomicUsize,
}

impl FakePhone {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PhoneAuthProvider for FakePhone {
    async fn solve_challenge(&self) -> Result<ChallengeToken, ClientError> {
        let n = self.challenges.fetch_add(1, Ordering::SeqCst);
        Ok(ChallengeToken::new(format!("challenge-{n}")))
    }

    async fn send_code(
        &self,
        phone_number: &str,
        _challenge: &ChallengeToken,
    ) -> Result<ConfirmationHandle, ClientError> {
        let delay = *self.send_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.send_error.lock().unwrap().clone() {
            return Err(err.into());
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(phone_number.to_string());
        Ok(ConfirmationHandle::new(format!("session-{}", sent.len())))
    }

    async fn confirm_code(
        &self,
        handle: &ConfirmationHandle,
        code: &str,
    ) -> Result<(), ClientError> {
        let latest = self.sent.lock().unwrap().len();
        let session = handle
            .as_str()
            .strip_prefix("session-")
            .and_then(|n| n.parse::<usize>().ok())
            .ok_or(ProviderError::NoActiveChallenge)?;
        if session != latest {
            return Err(ProviderError::Expired.into());
        }
        if code == phone_code(session) {
            Ok(())
        } else if (1..session).any(|old| code == phone_code(old)) {
            Err(ProviderError::Expired.into())
        } else {
            Err(ProviderError::InvalidCode.into())
        }
    }
}

// ─── Email OTP ───────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeOtp {
    pub sent: Mutex<Vec<String>>,
    pub expired: Mutex<bool>,
}

#[async_trait]
impl OtpApi for FakeOtp {
    async fn send_otp(&self, email: &str) -> Result<(), ClientError> {
        self.sent.lock().unwrap().push(email.to_string());
        *self.expired.lock().unwrap() = false;
        Ok(())
    }

    async fn verify_otp(&self, _email: &str, otp: &str) -> Result<(), ClientError> {
        if *self.expired.lock().unwrap() {
            return Err(ProviderError::Expired.into());
        }
        if otp == EMAIL_CODE {
            Ok(())
        } else {
            Err(ProviderError::InvalidCode.into())
        }
    }
}

// ─── Identity ────────────────────────────────────────────────────

pub struct FakeIdentity {
    pub user: Mutex<UserIdentity>,
    pub taken_mobiles: Mutex<Vec<String>>,
    pub update_error: Mutex<Option<ClientError>>,
    pub updates: Mutex<Vec<ProfileUpdate>>,
    pub profile_reads: AtomicUsize,
}

impl FakeIdentity {
    pub fn new(user: UserIdentity) -> Self {
        Self {
            user: Mutex::new(user),
            taken_mobiles: Mutex::new(Vec::new()),
            update_error: Mutex::new(None),
            updates: Mutex::new(Vec::new()),
            profile_reads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl IdentityApi for FakeIdentity {
    async fn profile(&self) -> Result<UserIdentity, ClientError> {
        self.profile_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.user.lock().unwrap().clone())
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserIdentity, ClientError> {
        self.updates.lock().unwrap().push(update.clone());
        if let Some(err) = self.update_error.lock().unwrap().clone() {
            return Err(err);
        }
        let mut user = self.user.lock().unwrap();
        user.name = update.name.clone();
        user.email = update.email.clone();
        user.mobile = update.mobile.clone();
        Ok(user.clone())
    }

    async fn check_mobile(&self, number: &str) -> Result<bool, ClientError> {
        Ok(!self
            .taken_mobiles
            .lock()
            .unwrap()
            .iter()
            .any(|m| m == number))
    }
}

// ─── Refunds ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeRefunds {
    pub refunds: Mutex<Vec<RefundRequest>>,
    /// Delay applied to the next list call only.
    pub next_list_delay: Mutex<Option<Duration>>,
    pub list_calls: AtomicUsize,
}

#[async_trait]
impl RefundApi for FakeRefunds {
    async fn my_refunds(&self) -> Result<Vec<RefundRequest>, ClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.refunds.lock().unwrap().clone();
        let delay = self.next_list_delay.lock().unwrap().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn delete_refund(&self, id: Uuid) -> Result<(), ClientError> {
        let mut refunds = self.refunds.lock().unwrap();
        let Some(pos) = refunds.iter().position(|r| r.id() == id) else {
            return Err(ClientError::Api {
                status: 404,
                code: Some("not_found".to_string()),
                message: "Refund request not found".to_string(),
                retry_after_secs: None,
            });
        };
        if !refunds[pos].status().is_withdrawable() {
            return Err(ClientError::StaleState(format!(
                "Refund is already {}",
                refunds[pos].status().as_str()
            )));
        }
        refunds.remove(pos);
        Ok(())
    }
}

// ─── Admin ───────────────────────────────────────────────────────

pub struct FakeAdmin {
    pub bundle: Mutex<UserDetailBundle>,
    pub block_error: Mutex<Option<ClientError>>,
    /// Delay applied to the next detail read only. The bundle is read
    /// before the delay.
    pub next_detail_delay: Mutex<Option<Duration>>,
    pub loads: AtomicUsize,
}

impl FakeAdmin {
    pub fn new(bundle: UserDetailBundle) -> Self {
        Self {
            bundle: Mutex::new(bundle),
            block_error: Mutex::new(None),
            next_detail_delay: Mutex::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    fn set_blocked(&self, blocked: bool) -> Result<UserIdentity, ClientError> {
        if let Some(err) = self.block_error.lock().unwrap().clone() {
            return Err(err);
        }
        let mut bundle = self.bundle.lock().unwrap();
        bundle.user.blocked = blocked;
        Ok(bundle.user.clone())
    }
}

#[async_trait]
impl AdminApi for FakeAdmin {
    async fn user_detail(&self, _user_id: Uuid) -> Result<UserDetailBundle, ClientError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.bundle.lock().unwrap().clone();
        let delay = self.next_detail_delay.lock().unwrap().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn block_user(&self, _user_id: Uuid) -> Result<UserIdentity, ClientError> {
        self.set_blocked(true)
    }

    async fn unblock_user(&self, _user_id: Uuid) -> Result<UserIdentity, ClientError> {
        self.set_blocked(false)
    }

    async fn booking_details(&self, booking_id: Uuid) -> Result<BookingDetails, ClientError> {
        let bundle = self.bundle.lock().unwrap();
        let booking = bundle
            .bookings
            .iter()
            .find(|b| b.id == booking_id)
            .cloned()
            .ok_or_else(|| ClientError::Missing("Booking".to_string()))?;
        Ok(BookingDetails {
            payment: bundle
                .payments
                .iter()
                .find(|p| p.booking_id == booking_id)
                .cloned(),
            refund: bundle
                .refunds
                .iter()
                .find(|r| r.booking_id() == booking_id)
                .cloned(),
            user: bundle.user.clone(),
            booking,
        })
    }

    async fn cancel_booking(&self, booking_id: Uuid) -> Result<Booking, ClientError> {
        let mut bundle = self.bundle.lock().unwrap();
        let booking = bundle
            .bookings
            .iter_mut()
            .find(|b| b.id == booking_id)
            .ok_or_else(|| ClientError::Missing("Booking".to_string()))?;
        booking.status = BookingStatus::Cancelled;
        Ok(booking.clone())
    }
}
