// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Verification channels (mobile and email).
//!
//! Each channel wraps one challenge/response exchange:
//! - `request_code` validates the target locally, dispatches a code and
//!   starts the resend countdown
//! - `confirm_code` checks a code against the live session
//! - `reset` drops the session (target edited, or profile committed)
//!
//! Every request bumps the channel generation. A response whose generation
//! is no longer current is dropped without touching state. Failures are
//! never retried automatically.

pub mod cooldown;
pub mod email;
pub mod mobile;
pub mod provider;

use crate::client::error::{ClientError, ProviderError, ValidationError};
use async_trait::async_trait;
use cooldown::Cooldown;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;

pub use email::{EmailBackend, EmailChannel};
pub use mobile::{MobileBackend, MobileChannel};
pub use provider::{
    ChallengeSolver, ChallengeToken, ConfirmationHandle, IdentityToolkitProvider,
    PhoneAuthProvider,
};

/// Wrong codes accepted before the session is discarded.
pub const MAX_CONFIRM_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Mobile,
    Email,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Mobile => f.write_str("mobile number"),
            ChannelKind::Email => f.write_str("email address"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Unstarted,
    CodeSent,
    Verified,
}

/// A code is on its way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    pub target: String,
    pub resend_in: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub target: String,
}

/// The provider-specific half of a channel.
#[async_trait]
pub trait ChannelBackend: Send + Sync + 'static {
    /// Provider-side handle for a dispatched code. Never the code itself.
    type Session: Clone + Send + Sync + 'static;

    fn kind(&self) -> ChannelKind;

    /// Normalize and check a target before any network call.
    fn normalize_target(&self, raw: &str) -> Result<String, ValidationError>;

    /// Local precondition checked before the channel commits to a request.
    fn ready(&self) -> Result<(), ClientError> {
        Ok(())
    }

    async fn dispatch(&self, target: &str) -> Result<Self::Session, ClientError>;

    async fn confirm(
        &self,
        target: &str,
        session: &Self::Session,
        code: &str,
    ) -> Result<(), ClientError>;
}

struct Inner<S> {
    state: ChannelState,
    target: Option<String>,
    session: Option<S>,
    attempts: u32,
    generation: u64,
    in_flight: bool,
    torn_down: bool,
}

/// One verification channel. Clones share state.
pub struct Channel<B: ChannelBackend> {
    backend: Arc<B>,
    inner: Arc<Mutex<Inner<B::Session>>>,
    cooldown: Arc<Cooldown>,
    resend_cooldown: Duration,
    provider_timeout: Duration,
}

impl<B: ChannelBackend> Clone for Channel<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            inner: Arc::clone(&self.inner),
            cooldown: Arc::clone(&self.cooldown),
            resend_cooldown: self.resend_cooldown,
            provider_timeout: self.provider_timeout,
        }
    }
}

impl<B: ChannelBackend> Channel<B> {
    pub fn new(backend: B, resend_cooldown: Duration, provider_timeout: Duration) -> Self {
        Self {
            backend: Arc::new(backend),
            inner: Arc::new(Mutex::new(Inner {
                state: ChannelState::Unstarted,
                target: None,
                session: None,
                attempts: 0,
                generation: 0,
                in_flight: false,
                torn_down: false,
            })),
            cooldown: Arc::new(Cooldown::new()),
            resend_cooldown,
            provider_timeout,
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.backend.kind()
    }

    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    fn lock(&self) -> MutexGuard<'_, Inner<B::Session>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Dispatch a fresh code to `target`, invalidating any earlier one.
    pub async fn request_code(&self, target: &str) -> Result<Pending, ClientError> {
        let target = self.backend.normalize_target(target)?;

        let generation = {
            let mut inner = self.lock();
            if inner.torn_down {
                return Err(ClientError::Cancelled);
            }
            if inner.in_flight {
                return Err(ClientError::Busy);
            }
            let remaining = self.cooldown.remaining();
            if !remaining.is_zero() {
                return Err(ProviderError::RateLimited {
                    retry_after_secs: remaining.as_secs().max(1),
                }
                .into());
            }
            self.backend.ready()?;

            inner.generation += 1;
            inner.state = ChannelState::Unstarted;
            inner.session = None;
            inner.attempts = 0;
            inner.target = Some(target.clone());
            inner.in_flight = true;
            inner.generation
        };

        tracing::debug!(channel = %self.kind(), generation, "Requesting verification code");
        let result = self.bounded(self.backend.dispatch(&target)).await;

        let mut inner = self.lock();
        self.settle(&mut inner, generation)?;

        match result {
            Ok(session) => {
                inner.session = Some(session);
                inner.state = ChannelState::CodeSent;
                self.cooldown.start(self.resend_cooldown);
                Ok(Pending {
                    target,
                    resend_in: self.resend_cooldown,
                })
            }
            Err(e) => {
                tracing::info!(channel = %self.kind(), error = %e, "Code request failed");
                inner.state = ChannelState::Unstarted;
                if let ClientError::Provider(ProviderError::RateLimited { retry_after_secs }) = e {
                    self.cooldown.start(Duration::from_secs(retry_after_secs));
                }
                Err(e)
            }
        }
    }

    /// Check `code` against the live session.
    pub async fn confirm_code(&self, code: &str) -> Result<Verified, ClientError> {
        let code = code.trim();
        if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::MalformedCode.into());
        }

        let (generation, target, session) = {
            let mut inner = self.lock();
            if inner.torn_down {
                return Err(ClientError::Cancelled);
            }
            if inner.in_flight {
                return Err(ClientError::Busy);
            }
            if inner.state == ChannelState::Verified {
                if let Some(target) = inner.target.clone() {
                    return Ok(Verified { target });
                }
            }
            let (Some(target), Some(session)) = (inner.target.clone(), inner.session.clone())
            else {
                return Err(ProviderError::NoActiveChallenge.into());
            };
            inner.in_flight = true;
            (inner.generation, target, session)
        };

        let result = self
            .bounded(self.backend.confirm(&target, &session, code))
            .await;

        let mut inner = self.lock();
        self.settle(&mut inner, generation)?;

        match result {
            Ok(()) => {
                inner.state = ChannelState::Verified;
                inner.session = None;
                self.cooldown.clear();
                tracing::info!(channel = %self.kind(), "Target verified");
                Ok(Verified { target })
            }
            Err(ClientError::Provider(ProviderError::InvalidCode)) => {
                inner.attempts += 1;
                if inner.attempts >= MAX_CONFIRM_ATTEMPTS {
                    discard_session(&mut inner);
                    return Err(ProviderError::Expired.into());
                }
                Err(ProviderError::InvalidCode.into())
            }
            Err(
                e @ ClientError::Provider(ProviderError::Expired | ProviderError::NoActiveChallenge),
            ) => {
                // The provider session is gone; only a fresh request helps.
                discard_session(&mut inner);
                self.cooldown.clear();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the session and the countdown.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.state = ChannelState::Unstarted;
        inner.target = None;
        inner.session = None;
        inner.attempts = 0;
        inner.in_flight = false;
        self.cooldown.clear();
    }

    /// The owning view is going away: stop timers and ignore late responses.
    pub fn teardown(&self) {
        let mut inner = self.lock();
        inner.torn_down = true;
        inner.generation += 1;
        inner.in_flight = false;
        self.cooldown.teardown();
    }

    pub fn state(&self) -> ChannelState {
        self.lock().state
    }

    pub fn target(&self) -> Option<String> {
        self.lock().target.clone()
    }

    /// Target that reached `Verified`, if any.
    pub fn verified_target(&self) -> Option<String> {
        let inner = self.lock();
        match inner.state {
            ChannelState::Verified => inner.target.clone(),
            _ => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.lock().attempts
    }

    pub fn is_busy(&self) -> bool {
        self.lock().in_flight
    }

    pub fn is_torn_down(&self) -> bool {
        self.lock().torn_down
    }

    pub fn resend_remaining(&self) -> Duration {
        self.cooldown.remaining()
    }

    pub fn can_request(&self) -> bool {
        let inner = self.lock();
        !inner.torn_down && !inner.in_flight && !self.cooldown.is_active()
    }

    /// Seconds left on the resend countdown.
    pub fn countdown(&self) -> watch::Receiver<u64> {
        self.cooldown.subscribe()
    }

    /// Clear the in-flight flag for `generation`, or report why the response
    /// must be dropped.
    fn settle(&self, inner: &mut Inner<B::Session>, generation: u64) -> Result<(), ClientError> {
        if inner.torn_down {
            return Err(ClientError::Cancelled);
        }
        if inner.generation != generation {
            tracing::debug!(channel = %self.kind(), generation, "Dropping stale response");
            return Err(ClientError::Superseded);
        }
        inner.in_flight = false;
        Ok(())
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        tokio::time::timeout(self.provider_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(ProviderError::ProviderUnavailable("request timed out".to_string()).into())
            })
    }
}

fn discard_session<S>(inner: &mut Inner<S>) {
    inner.session = None;
    inner.state = ChannelState::Unstarted;
    inner.attempts = 0;
}
