// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Resend countdown for one verification channel.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_secs(1);

/// Countdown published as whole seconds left on a `watch` channel.
///
/// Each `start` replaces the previous ticker. `teardown` cancels the root
/// token, which stops any ticker and makes later `start`s inert.
pub struct Cooldown {
    seconds_left: Arc<watch::Sender<u64>>,
    deadline: Mutex<Option<Instant>>,
    ticker: Mutex<Option<CancellationToken>>,
    root: CancellationToken,
}

impl Default for Cooldown {
    fn default() -> Self {
        Self::new()
    }
}

impl Cooldown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            seconds_left: Arc::new(tx),
            deadline: Mutex::new(None),
            ticker: Mutex::new(None),
            root: CancellationToken::new(),
        }
    }

    /// Start (or restart) the countdown. Must be called inside a runtime.
    pub fn start(&self, duration: Duration) {
        if self.root.is_cancelled() {
            return;
        }

        let deadline = Instant::now() + duration;
        *lock(&self.deadline) = Some(deadline);
        self.seconds_left.send_replace(whole_seconds(duration));

        let token = self.root.child_token();
        if let Some(previous) = lock(&self.ticker).replace(token.clone()) {
            previous.cancel();
        }

        let tx = Arc::clone(&self.seconds_left);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let left = whole_seconds(deadline.saturating_duration_since(Instant::now()));
                        tx.send_replace(left);
                        if left == 0 {
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Stop the countdown and allow an immediate resend.
    pub fn clear(&self) {
        if let Some(token) = lock(&self.ticker).take() {
            token.cancel();
        }
        *lock(&self.deadline) = None;
        self.seconds_left.send_replace(0);
    }

    /// Cancel the ticker for good.
    pub fn teardown(&self) {
        self.root.cancel();
        lock(&self.ticker).take();
        *lock(&self.deadline) = None;
    }

    /// Time left before a resend is allowed.
    pub fn remaining(&self) -> Duration {
        lock(&self.deadline)
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }

    pub fn is_active(&self) -> bool {
        !self.remaining().is_zero()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.seconds_left.subscribe()
    }
}

impl Drop for Cooldown {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

fn whole_seconds(d: Duration) -> u64 {
    d.as_millis().div_ceil(1000) as u64
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
