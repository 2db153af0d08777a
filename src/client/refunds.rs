// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Owner-facing refund lifecycle store.
//!
//! Statuses only ever come from the server. Filtering and sorting are
//! projections over the fetched set. Deletion is owner-confirmed here and
//! enforced by the server; a rejection leaves the entry in place.

use crate::client::action::ActionTracker;
use crate::client::error::ClientError;
use crate::client::ports::RefundApi;
use crate::client::sync::SyncStore;
use crate::models::{RefundRequest, RefundStatus, TimelineView};
use crate::time_utils::local_offset;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

/// Client-side filter and sort over the fetched refunds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefundQuery {
    pub status: Option<RefundStatus>,
    /// Initiation date, in local (IST) calendar terms.
    pub date: Option<NaiveDate>,
    pub sort: SortOrder,
}

impl RefundQuery {
    pub fn apply(&self, refunds: &[RefundRequest]) -> Vec<RefundRequest> {
        let offset = local_offset();
        let mut out: Vec<RefundRequest> = refunds
            .iter()
            .filter(|r| self.status.is_none_or(|s| r.status() == s))
            .filter(|r| self.date.is_none_or(|d| r.initiated_on(&offset) == d))
            .cloned()
            .collect();
        match self.sort {
            SortOrder::Newest => out.sort_by_key(|r| std::cmp::Reverse(r.initiated_at())),
            SortOrder::Oldest => out.sort_by_key(|r| r.initiated_at()),
        }
        out
    }
}

/// What the owner is asked to confirm before a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePrompt {
    pub id: Uuid,
    pub amount: u64,
    pub status: RefundStatus,
    /// Whether the server is expected to accept the delete.
    pub withdrawable: bool,
    pub message: String,
}

pub struct RefundStore {
    api: Arc<dyn RefundApi>,
    store: SyncStore,
    generation: AtomicU64,
    actions: ActionTracker<Uuid>,
    torn_down: AtomicBool,
}

impl RefundStore {
    pub fn new(api: Arc<dyn RefundApi>, store: SyncStore) -> Self {
        Self {
            api,
            store,
            generation: AtomicU64::new(0),
            actions: ActionTracker::new(),
            torn_down: AtomicBool::new(false),
        }
    }

    fn bump(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn check_current(&self, generation: u64) -> Result<(), ClientError> {
        if self.torn_down.load(Ordering::SeqCst) {
            return Err(ClientError::Cancelled);
        }
        if self.generation.load(Ordering::SeqCst) != generation {
            return Err(ClientError::Superseded);
        }
        Ok(())
    }

    /// Fetch `owner`'s refunds and project them through `query`.
    pub async fn list(
        &self,
        owner: Uuid,
        query: &RefundQuery,
    ) -> Result<Vec<RefundRequest>, ClientError> {
        let generation = self.bump();
        let result = self.api.my_refunds().await;
        self.check_current(generation)?;

        match result {
            Ok(mut refunds) => {
                refunds.retain(|r| r.user_id() == owner);
                self.store.set_refunds(refunds.clone());
                Ok(query.apply(&refunds))
            }
            Err(err) => {
                self.store.notify_error(&err);
                Err(err)
            }
        }
    }

    /// Project the cached set without a fetch.
    pub fn filtered(&self, query: &RefundQuery) -> Vec<RefundRequest> {
        self.store
            .refunds()
            .map(|refunds| query.apply(&refunds))
            .unwrap_or_default()
    }

    pub fn prepare_delete(&self, id: Uuid) -> Result<DeletePrompt, ClientError> {
        let refund = self
            .store
            .refund(id)
            .ok_or_else(|| ClientError::Missing("Refund request".to_string()))?;
        let status = refund.status();
        Ok(DeletePrompt {
            id,
            amount: refund.amount(),
            status,
            withdrawable: status.is_withdrawable(),
            message: format!(
                "Delete the refund request for ₹{} ({})? This cannot be undone.",
                refund.amount(),
                status.badge().label
            ),
        })
    }

    pub fn is_deleting(&self, id: Uuid) -> bool {
        self.actions.is_pending(&id)
    }

    /// Issue a confirmed delete.
    pub async fn delete(&self, prompt: &DeletePrompt) -> Result<(), ClientError> {
        let _guard = self.actions.begin(prompt.id)?;
        // Any list response already in flight predates this delete.
        self.bump();

        let result = self.api.delete_refund(prompt.id).await;
        if self.torn_down.load(Ordering::SeqCst) {
            return Err(ClientError::Cancelled);
        }

        match result {
            Ok(()) => {
                tracing::info!(refund_id = %prompt.id, "Refund request deleted");
                self.store.remove_refund(prompt.id);
                self.refresh().await;
                Ok(())
            }
            Err(err) => {
                tracing::info!(refund_id = %prompt.id, error = %err, "Refund delete rejected");
                self.store.notify_error(&err);
                if err.needs_refetch() {
                    self.refresh().await;
                }
                Err(err)
            }
        }
    }

    /// Best-effort reload into the cache.
    async fn refresh(&self) {
        let Some(owner) = self.store.current_user().map(|u| u.id) else {
            return;
        };
        match self.list(owner, &RefundQuery::default()).await {
            Ok(_) | Err(ClientError::Superseded | ClientError::Cancelled) => {}
            Err(e) => tracing::warn!(error = %e, "Refund list refetch failed"),
        }
    }

    pub fn view_timeline(&self, id: Uuid) -> Result<Vec<TimelineView>, ClientError> {
        self.store
            .refund(id)
            .map(|r| r.timeline_view())
            .ok_or_else(|| ClientError::Missing("Refund request".to_string()))
    }

    pub fn teardown(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
    }
}
