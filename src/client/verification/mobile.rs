// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mobile channel: phone-auth provider gated by a human challenge.

use super::provider::{ChallengeToken, ConfirmationHandle, PhoneAuthProvider};
use super::{Channel, ChannelBackend, ChannelKind};
use crate::client::error::{ClientError, ProviderError, ValidationError};
use crate::config::ClientConfig;
use crate::models::user::is_valid_mobile;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// A solved challenge stays usable this long.
pub const CHALLENGE_TTL: Duration = Duration::from_secs(120);

pub type MobileChannel = Channel<MobileBackend>;

struct SolvedChallenge {
    token: ChallengeToken,
    expires_at: Instant,
}

pub struct MobileBackend {
    provider: Arc<dyn PhoneAuthProvider>,
    country_code: String,
    challenge: Mutex<Option<SolvedChallenge>>,
}

impl MobileBackend {
    pub fn new(provider: Arc<dyn PhoneAuthProvider>, country_code: impl Into<String>) -> Self {
        Self {
            provider,
            country_code: country_code.into(),
            challenge: Mutex::new(None),
        }
    }

    fn challenge(&self) -> std::sync::MutexGuard<'_, Option<SolvedChallenge>> {
        self.challenge
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn e164(&self, number: &str) -> String {
        format!("{}{}", self.country_code, number)
    }

    fn has_live_challenge(&self) -> bool {
        self.challenge()
            .as_ref()
            .is_some_and(|c| c.expires_at > Instant::now())
    }

    /// Take the challenge token. It is single-use.
    fn take_challenge(&self) -> Option<ChallengeToken> {
        self.challenge()
            .take()
            .filter(|c| c.expires_at > Instant::now())
            .map(|c| c.token)
    }
}

#[async_trait]
impl ChannelBackend for MobileBackend {
    type Session = ConfirmationHandle;

    fn kind(&self) -> ChannelKind {
        ChannelKind::Mobile
    }

    fn normalize_target(&self, raw: &str) -> Result<String, ValidationError> {
        let number = raw.trim();
        if !is_valid_mobile(number) {
            return Err(ValidationError::InvalidMobile);
        }
        Ok(number.to_string())
    }

    fn ready(&self) -> Result<(), ClientError> {
        if self.has_live_challenge() {
            Ok(())
        } else {
            Err(ProviderError::ChallengeRequired.into())
        }
    }

    async fn dispatch(&self, target: &str) -> Result<ConfirmationHandle, ClientError> {
        let token = self
            .take_challenge()
            .ok_or(ProviderError::ChallengeRequired)?;
        self.provider.send_code(&self.e164(target), &token).await
    }

    async fn confirm(
        &self,
        _target: &str,
        handle: &ConfirmationHandle,
        code: &str,
    ) -> Result<(), ClientError> {
        self.provider.confirm_code(handle, code).await
    }
}

impl Channel<MobileBackend> {
    pub fn mobile(provider: Arc<dyn PhoneAuthProvider>, config: &ClientConfig) -> Self {
        Channel::new(
            MobileBackend::new(provider, config.phone_country_code.clone()),
            config.resend_cooldown,
            config.provider_timeout,
        )
    }

    /// Run the human challenge. A pass is good for `CHALLENGE_TTL` and one
    /// code request.
    pub async fn solve_challenge(&self) -> Result<(), ClientError> {
        if self.is_torn_down() {
            return Err(ClientError::Cancelled);
        }
        let backend = self.backend();
        let token = self.bounded(backend.provider.solve_challenge()).await?;
        if self.is_torn_down() {
            return Err(ClientError::Cancelled);
        }
        *backend.challenge() = Some(SolvedChallenge {
            token,
            expires_at: Instant::now() + CHALLENGE_TTL,
        });
        tracing::debug!("Human challenge solved");
        Ok(())
    }

    pub fn challenge_ready(&self) -> bool {
        self.backend().has_live_challenge()
    }
}
