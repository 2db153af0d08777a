// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Administrative per-user aggregate view.
//!
//! Reads the user's bookings, payments, reviews and refunds as one bundle
//! and shows them in tabs with per-tab filter and paging. Mutations:
//! block, unblock and cancel-booking. Each is patched into the cache as
//! `Optimistic` once the server confirms and collapsed by the next reload.

use crate::client::action::ActionTracker;
use crate::client::error::{ClientError, ValidationError};
use crate::client::ports::AdminApi;
use crate::client::sync::{Cached, SyncStore};
use crate::models::{
    Booking, BookingDetails, BookingStatus, Payment, RefundRequest, Review, UserDetailBundle,
    UserIdentity,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

pub const PER_PAGE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminTab {
    Bookings,
    Payments,
    Reviews,
    Refunds,
}

/// Filter and page for one tab. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabState {
    pub status: Option<String>,
    pub page: usize,
}

impl Default for TabState {
    fn default() -> Self {
        Self {
            status: None,
            page: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    /// Items matching the filter, across all pages.
    pub total: usize,
}

impl<T: Clone> Page<T> {
    fn of(items: Vec<T>, page: usize) -> Self {
        let total = items.len();
        let total_pages = total.div_ceil(PER_PAGE).max(1);
        let page = page.clamp(1, total_pages);
        let items = items
            .into_iter()
            .skip((page - 1) * PER_PAGE)
            .take(PER_PAGE)
            .collect();
        Self {
            items,
            page,
            total_pages,
            total,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabCounts {
    pub bookings: usize,
    pub payments: usize,
    pub reviews: usize,
    pub refunds: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminAction {
    Load,
    Block,
    Unblock,
    CancelBooking(Uuid),
    BookingDetails(Uuid),
}

pub struct AdminUserView {
    api: Arc<dyn AdminApi>,
    store: SyncStore,
    user_id: Uuid,
    tabs: Mutex<HashMap<AdminTab, TabState>>,
    actions: ActionTracker<AdminAction>,
    generation: AtomicU64,
    torn_down: AtomicBool,
}

impl AdminUserView {
    pub fn new(api: Arc<dyn AdminApi>, store: SyncStore, user_id: Uuid) -> Self {
        Self {
            api,
            store,
            user_id,
            tabs: Mutex::new(HashMap::new()),
            actions: ActionTracker::new(),
            generation: AtomicU64::new(0),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn tabs(&self) -> MutexGuard<'_, HashMap<AdminTab, TabState>> {
        self.tabs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn live(&self) -> Result<(), ClientError> {
        if self.torn_down.load(Ordering::SeqCst) {
            Err(ClientError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Invalidate every bundle read started so far.
    fn bump(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fetch the bundle. Replaces any optimistic patch.
    ///
    /// A read that was in flight while an action ran is dropped as
    /// `Superseded`; it may predate the action's effect on the server.
    pub async fn load(&self) -> Result<UserDetailBundle, ClientError> {
        let generation = self.bump();
        let result = self.api.user_detail(self.user_id).await;
        self.live()?;
        if self.generation.load(Ordering::SeqCst) != generation {
            return Err(ClientError::Superseded);
        }
        match result {
            Ok(bundle) => {
                self.store.set_admin_user(bundle.clone());
                Ok(bundle)
            }
            Err(err) => {
                self.store.notify_error(&err);
                Err(err)
            }
        }
    }

    /// Reload after a failed action; errors are only logged.
    async fn reload(&self) {
        let _guard = self.actions.begin(AdminAction::Load).ok();
        match self.load().await {
            Ok(_) | Err(ClientError::Superseded | ClientError::Cancelled) => {}
            Err(e) => tracing::warn!(user_id = %self.user_id, error = %e, "Admin reload failed"),
        }
    }

    pub fn bundle(&self) -> Option<Cached<UserDetailBundle>> {
        self.store.admin_user(self.user_id)
    }

    fn user(&self) -> Option<UserIdentity> {
        self.bundle().map(|b| b.get().user.clone())
    }

    pub fn counts(&self) -> TabCounts {
        self.bundle()
            .map(|b| {
                let b = b.get();
                TabCounts {
                    bookings: b.bookings.len(),
                    payments: b.payments.len(),
                    reviews: b.reviews.len(),
                    refunds: b.refunds.len(),
                }
            })
            .unwrap_or_default()
    }

    // ─── Tabs ────────────────────────────────────────────────────

    pub fn tab_state(&self, tab: AdminTab) -> TabState {
        self.tabs().get(&tab).cloned().unwrap_or_default()
    }

    /// Changing the filter goes back to the first page.
    pub fn set_status_filter(&self, tab: AdminTab, status: Option<&str>) {
        let mut tabs = self.tabs();
        let state = tabs.entry(tab).or_default();
        state.status = status.map(str::to_string);
        state.page = 1;
    }

    pub fn set_page(&self, tab: AdminTab, page: usize) {
        self.tabs().entry(tab).or_default().page = page.max(1);
    }

    fn page_of<T: Clone>(
        &self,
        tab: AdminTab,
        items: impl FnOnce(&UserDetailBundle) -> &Vec<T>,
        status_of: impl Fn(&T) -> &'static str,
    ) -> Page<T> {
        let state = self.tab_state(tab);
        let all = self
            .bundle()
            .map(|b| items(b.get()).clone())
            .unwrap_or_default();
        let filtered = all
            .into_iter()
            .filter(|item| {
                state
                    .status
                    .as_deref()
                    .is_none_or(|wanted| status_of(item) == wanted)
            })
            .collect();
        Page::of(filtered, state.page)
    }

    pub fn bookings_page(&self) -> Page<Booking> {
        self.page_of(AdminTab::Bookings, |b| &b.bookings, |x| x.status.as_str())
    }

    pub fn payments_page(&self) -> Page<Payment> {
        self.page_of(AdminTab::Payments, |b| &b.payments, |x| x.status.as_str())
    }

    /// Reviews carry no status, so the filter does not apply.
    pub fn reviews_page(&self) -> Page<Review> {
        let state = self.tab_state(AdminTab::Reviews);
        let all = self
            .bundle()
            .map(|b| b.get().reviews.clone())
            .unwrap_or_default();
        Page::of(all, state.page)
    }

    pub fn refunds_page(&self) -> Page<RefundRequest> {
        self.page_of(AdminTab::Refunds, |b| &b.refunds, |x| x.status().as_str())
    }

    // ─── Actions ─────────────────────────────────────────────────

    pub fn is_pending(&self, action: AdminAction) -> bool {
        self.actions.is_pending(&action)
    }

    fn block_pending(&self) -> bool {
        self.is_pending(AdminAction::Block) || self.is_pending(AdminAction::Unblock)
    }

    /// "Block" is offered only for a loaded, unblocked user.
    pub fn can_block(&self) -> bool {
        !self.block_pending() && self.user().is_some_and(|u| !u.blocked)
    }

    pub fn can_unblock(&self) -> bool {
        !self.block_pending() && self.user().is_some_and(|u| u.blocked)
    }

    pub async fn block(&self) -> Result<UserIdentity, ClientError> {
        self.set_blocked(true).await
    }

    pub async fn unblock(&self) -> Result<UserIdentity, ClientError> {
        self.set_blocked(false).await
    }

    async fn set_blocked(&self, blocked: bool) -> Result<UserIdentity, ClientError> {
        if let Some(user) = self.user() {
            match (blocked, user.blocked) {
                (true, true) => return Err(ValidationError::AlreadyBlocked.into()),
                (false, false) => return Err(ValidationError::AlreadyUnblocked.into()),
                _ => {}
            }
        }
        let action = if blocked {
            AdminAction::Block
        } else {
            AdminAction::Unblock
        };
        let _guard = self.actions.begin(action)?;
        self.bump();

        let result = if blocked {
            self.api.block_user(self.user_id).await
        } else {
            self.api.unblock_user(self.user_id).await
        };
        self.live()?;
        self.bump();

        match result {
            Ok(user) => {
                tracing::info!(user_id = %self.user_id, blocked, "User block state changed");
                let patched = user.clone();
                self.store
                    .patch_admin_user(self.user_id, move |b| b.user = patched);
                Ok(user)
            }
            Err(err) => {
                self.store.notify_error(&err);
                self.reload().await;
                Err(err)
            }
        }
    }

    /// Mark one of the user's bookings cancelled.
    pub async fn cancel_booking(&self, booking_id: Uuid) -> Result<Booking, ClientError> {
        let already = self.bundle().and_then(|b| {
            b.get()
                .bookings
                .iter()
                .find(|x| x.id == booking_id)
                .map(|x| x.status == BookingStatus::Cancelled)
        });
        if already == Some(true) {
            return Err(ValidationError::AlreadyCancelled.into());
        }
        let _guard = self.actions.begin(AdminAction::CancelBooking(booking_id))?;
        self.bump();

        let result = self.api.cancel_booking(booking_id).await;
        self.live()?;
        self.bump();

        match result {
            Ok(booking) => {
                let patched = booking.clone();
                self.store.patch_admin_user(self.user_id, move |b| {
                    if let Some(slot) = b.bookings.iter_mut().find(|x| x.id == patched.id) {
                        *slot = patched;
                    }
                });
                Ok(booking)
            }
            Err(err) => {
                self.store.notify_error(&err);
                self.reload().await;
                Err(err)
            }
        }
    }

    pub async fn booking_details(&self, booking_id: Uuid) -> Result<BookingDetails, ClientError> {
        let _guard = self.actions.begin(AdminAction::BookingDetails(booking_id))?;
        let result = self.api.booking_details(booking_id).await;
        self.live()?;
        match result {
            Ok(details) => {
                self.store.set_booking_details(details.clone());
                Ok(details)
            }
            Err(err) => {
                self.store.notify_error(&err);
                Err(err)
            }
        }
    }

    pub fn teardown(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
    }
}
