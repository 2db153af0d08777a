// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client state synchronization layer.
//!
//! `SyncStore` is the single writer of committed state on the client. It is a
//! cheap handle (clones share the same slices) passed to every component.
//! Each write bumps a version published on a `watch` channel so views know
//! when to re-render.

use crate::client::error::ClientError;
use crate::models::{
    AccommodationRateCard, Booking, BookingDetails, RefundRequest, Review, UserDetailBundle,
    UserIdentity,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use uuid::Uuid;

/// A cached entity and whether the server has confirmed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cached<T> {
    /// Local guess (restored from disk, or patched ahead of a reload).
    Optimistic(T),
    /// Last authoritative read.
    Confirmed(T),
}

impl<T> Cached<T> {
    pub fn get(&self) -> &T {
        match self {
            Cached::Optimistic(v) | Cached::Confirmed(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Cached::Optimistic(v) | Cached::Confirmed(v) => v,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Cached::Confirmed(_))
    }
}

/// One dismissible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub message: String,
}

#[derive(Default)]
struct Slices {
    identity: Option<Cached<UserIdentity>>,
    refunds: Option<Vec<RefundRequest>>,
    bookings: Option<Vec<Booking>>,
    testimonials: Option<Vec<Review>>,
    rate_card: Option<Cached<AccommodationRateCard>>,
    admin_users: HashMap<Uuid, Cached<UserDetailBundle>>,
    booking_details: HashMap<Uuid, BookingDetails>,
    notices: Vec<Notice>,
    next_notice: u64,
}

/// The subset that survives a reload.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Persisted {
    identity: Option<UserIdentity>,
    rate_card: Option<AccommodationRateCard>,
}

#[derive(Clone)]
pub struct SyncStore {
    slices: Arc<RwLock<Slices>>,
    version: Arc<watch::Sender<u64>>,
}

impl Default for SyncStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            slices: Arc::new(RwLock::new(Slices::default())),
            version: Arc::new(tx),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Slices> {
        self.slices
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write<R>(&self, f: impl FnOnce(&mut Slices) -> R) -> R {
        let result = {
            let mut slices: RwLockWriteGuard<'_, Slices> = self
                .slices
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&mut slices)
        };
        self.version.send_modify(|v| *v += 1);
        result
    }

    /// Receives the version after every write.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    // ─── Session / identity ──────────────────────────────────────

    pub fn identity(&self) -> Option<Cached<UserIdentity>> {
        self.read().identity.clone()
    }

    /// The signed-in user, confirmed or not.
    pub fn current_user(&self) -> Option<UserIdentity> {
        self.read().identity.as_ref().map(|c| c.get().clone())
    }

    pub fn set_identity(&self, user: UserIdentity) {
        self.write(|s| s.identity = Some(Cached::Confirmed(user)));
    }

    /// Sign-out: drop everything tied to the session.
    pub fn clear_session(&self) {
        self.write(|s| {
            s.identity = None;
            s.refunds = None;
            s.bookings = None;
            s.admin_users.clear();
            s.booking_details.clear();
        });
    }

    // ─── Refunds ─────────────────────────────────────────────────

    pub fn refunds(&self) -> Option<Vec<RefundRequest>> {
        self.read().refunds.clone()
    }

    pub fn refund(&self, id: Uuid) -> Option<RefundRequest> {
        self.read()
            .refunds
            .as_ref()
            .and_then(|list| list.iter().find(|r| r.id() == id).cloned())
    }

    pub fn set_refunds(&self, refunds: Vec<RefundRequest>) {
        self.write(|s| s.refunds = Some(refunds));
    }

    /// Drop a refund the server confirmed deleted.
    pub fn remove_refund(&self, id: Uuid) {
        self.write(|s| {
            if let Some(list) = s.refunds.as_mut() {
                list.retain(|r| r.id() != id);
            }
        });
    }

    // ─── Bookings, testimonials, rate card ───────────────────────

    pub fn bookings(&self) -> Option<Vec<Booking>> {
        self.read().bookings.clone()
    }

    pub fn set_bookings(&self, bookings: Vec<Booking>) {
        self.write(|s| s.bookings = Some(bookings));
    }

    /// Insert or replace one booking the server returned.
    pub fn upsert_booking(&self, booking: Booking) {
        self.write(|s| {
            let list = s.bookings.get_or_insert_with(Vec::new);
            match list.iter_mut().find(|b| b.id == booking.id) {
                Some(existing) => *existing = booking,
                None => list.insert(0, booking),
            }
        });
    }

    pub fn testimonials(&self) -> Option<Vec<Review>> {
        self.read().testimonials.clone()
    }

    pub fn set_testimonials(&self, reviews: Vec<Review>) {
        self.write(|s| s.testimonials = Some(reviews));
    }

    pub fn rate_card(&self) -> Option<Cached<AccommodationRateCard>> {
        self.read().rate_card.clone()
    }

    pub fn set_rate_card(&self, card: AccommodationRateCard) {
        self.write(|s| s.rate_card = Some(Cached::Confirmed(card)));
    }

    // ─── Admin slices ────────────────────────────────────────────

    pub fn admin_user(&self, user_id: Uuid) -> Option<Cached<UserDetailBundle>> {
        self.read().admin_users.get(&user_id).cloned()
    }

    pub fn set_admin_user(&self, bundle: UserDetailBundle) {
        self.write(|s| {
            s.admin_users
                .insert(bundle.user.id, Cached::Confirmed(bundle));
        });
    }

    /// Apply a local patch ahead of the next reload. The entry becomes
    /// `Optimistic` until `set_admin_user` replaces it.
    pub fn patch_admin_user(&self, user_id: Uuid, patch: impl FnOnce(&mut UserDetailBundle)) {
        self.write(|s| {
            if let Some(entry) = s.admin_users.remove(&user_id) {
                let mut bundle = entry.into_inner();
                patch(&mut bundle);
                s.admin_users.insert(user_id, Cached::Optimistic(bundle));
            }
        });
    }

    pub fn forget_admin_user(&self, user_id: Uuid) {
        self.write(|s| {
            s.admin_users.remove(&user_id);
        });
    }

    pub fn booking_details(&self, booking_id: Uuid) -> Option<BookingDetails> {
        self.read().booking_details.get(&booking_id).cloned()
    }

    pub fn set_booking_details(&self, details: BookingDetails) {
        self.write(|s| {
            s.booking_details.insert(details.booking.id, details);
        });
    }

    // ─── Notices ─────────────────────────────────────────────────

    /// Queue a notice and return its id.
    pub fn notify(&self, message: impl Into<String>) -> u64 {
        let message = message.into();
        self.write(|s| {
            s.next_notice += 1;
            let id = s.next_notice;
            s.notices.push(Notice { id, message });
            id
        })
    }

    /// Queue the notice for `err`, unless it is one that stays silent.
    pub fn notify_error(&self, err: &ClientError) -> Option<u64> {
        err.notice().map(|message| self.notify(message))
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.read().notices.clone()
    }

    pub fn dismiss(&self, id: u64) {
        self.write(|s| s.notices.retain(|n| n.id != id));
    }

    // ─── Persistence ─────────────────────────────────────────────

    /// Write identity and rate card to `path` as JSON.
    pub async fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let persisted = {
            let slices = self.read();
            Persisted {
                identity: slices.identity.as_ref().map(|c| c.get().clone()),
                rate_card: slices.rate_card.as_ref().map(|c| *c.get()),
            }
        };
        let json = serde_json::to_vec_pretty(&persisted)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Load what `save_to` wrote. Restored values are `Optimistic` until the
    /// next authoritative read. A missing file is not an error.
    pub async fn restore_from(&self, path: &Path) -> anyhow::Result<bool> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        let persisted: Persisted = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing {}", path.display()))?;

        self.write(|s| {
            if s.identity.is_none() {
                s.identity = persisted.identity.map(Cached::Optimistic);
            }
            if s.rate_card.is_none() {
                s.rate_card = persisted.rate_card.map(Cached::Optimistic);
            }
        });
        tracing::debug!(path = %path.display(), "Restored client state");
        Ok(true)
    }

    /// Drop everything.
    pub fn reset(&self) {
        self.write(|s| *s = Slices::default());
    }
}
