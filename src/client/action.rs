// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-action pending state ("button disabled + spinner").

use crate::client::error::ClientError;
use dashmap::DashSet;
use std::hash::Hash;
use std::sync::Arc;

/// Tracks which actions are in flight. Each action is keyed independently,
/// so a pending action never disables unrelated ones.
#[derive(Debug)]
pub struct ActionTracker<K: Eq + Hash> {
    pending: Arc<DashSet<K>>,
}

impl<K: Eq + Hash> Clone for ActionTracker<K> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<K: Eq + Hash> Default for ActionTracker<K> {
    fn default() -> Self {
        Self {
            pending: Arc::new(DashSet::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> ActionTracker<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` in flight until the returned guard drops.
    pub fn begin(&self, key: K) -> Result<ActionGuard<K>, ClientError> {
        if !self.pending.insert(key.clone()) {
            return Err(ClientError::Busy);
        }
        Ok(ActionGuard {
            pending: Arc::clone(&self.pending),
            key: Some(key),
        })
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains(key)
    }

    pub fn any_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Clears its action on drop, whether the call succeeded, failed or was
/// abandoned.
#[must_use = "the action is only pending while the guard is alive"]
pub struct ActionGuard<K: Eq + Hash> {
    pending: Arc<DashSet<K>>,
    key: Option<K>,
}

impl<K: Eq + Hash> Drop for ActionGuard<K> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.pending.remove(&key);
        }
    }
}
