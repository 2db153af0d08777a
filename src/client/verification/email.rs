// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email channel: server-issued one-time codes.

use super::{Channel, ChannelBackend, ChannelKind};
use crate::client::error::{ClientError, ProviderError, ValidationError};
use crate::client::ports::OtpApi;
use crate::config::ClientConfig;
use crate::models::user::normalize_email;
use async_trait::async_trait;
use std::sync::Arc;
use validator::ValidateEmail;

pub type EmailChannel = Channel<EmailBackend>;

pub struct EmailBackend {
    api: Arc<dyn OtpApi>,
}

impl EmailBackend {
    pub fn new(api: Arc<dyn OtpApi>) -> Self {
        Self { api }
    }
}

/// Translate OTP API failures into provider errors.
fn provider_error(err: ClientError) -> ClientError {
    match err {
        ClientError::Api {
            status,
            code,
            message,
            retry_after_secs,
        } => match code.as_deref() {
            Some("invalid_code") => ProviderError::InvalidCode.into(),
            Some("expired_code") => ProviderError::Expired.into(),
            Some("no_active_code") => ProviderError::NoActiveChallenge.into(),
            Some("rate_limited") => ProviderError::RateLimited {
                retry_after_secs: retry_after_secs.unwrap_or(30),
            }
            .into(),
            Some("invalid_target") => ProviderError::InvalidTarget.into(),
            _ if status >= 500 || code.as_deref() == Some("upstream_error") => {
                ProviderError::ProviderUnavailable(message).into()
            }
            _ => ClientError::Api {
                status,
                code,
                message,
                retry_after_secs,
            },
        },
        ClientError::Transport(msg) => ProviderError::ProviderUnavailable(msg).into(),
        other => other,
    }
}

#[async_trait]
impl ChannelBackend for EmailBackend {
    /// The server keys the code by address, so there is no handle to hold.
    type Session = ();

    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn normalize_target(&self, raw: &str) -> Result<String, ValidationError> {
        let email = normalize_email(raw);
        if !email.validate_email() {
            return Err(ValidationError::InvalidEmail);
        }
        Ok(email)
    }

    async fn dispatch(&self, target: &str) -> Result<(), ClientError> {
        self.api.send_otp(target).await.map_err(provider_error)
    }

    async fn confirm(&self, target: &str, _session: &(), code: &str) -> Result<(), ClientError> {
        self.api
            .verify_otp(target, code)
            .await
            .map_err(provider_error)
    }
}

impl Channel<EmailBackend> {
    pub fn email(api: Arc<dyn OtpApi>, config: &ClientConfig) -> Self {
        Channel::new(
            EmailBackend::new(api),
            config.resend_cooldown,
            config.provider_timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, code: &str) -> ClientError {
        ClientError::Api {
            status,
            code: Some(code.to_string()),
            message: "nope".to_string(),
            retry_after_secs: Some(7),
        }
    }

    #[test]
    fn maps_otp_codes() {
        assert_eq!(
            provider_error(api(400, "invalid_code")),
            ClientError::from(ProviderError::InvalidCode)
        );
        assert_eq!(
            provider_error(api(400, "expired_code")),
            ClientError::from(ProviderError::Expired)
        );
        assert_eq!(
            provider_error(api(429, "rate_limited")),
            ClientError::from(ProviderError::RateLimited { retry_after_secs: 7 })
        );
        assert_eq!(
            provider_error(ClientError::Transport("reset".into())),
            ClientError::from(ProviderError::ProviderUnavailable("reset".into()))
        );
    }

    #[test]
    fn rejects_malformed_address() {
        let backend = EmailBackend::new(Arc::new(NoOtp));
        assert_eq!(
            backend.normalize_target("not-an-email"),
            Err(ValidationError::InvalidEmail)
        );
        assert_eq!(
            backend.normalize_target("  Asha@Example.COM "),
            Ok("asha@example.com".to_string())
        );
    }

    struct NoOtp;

    #[async_trait]
    impl OtpApi for NoOtp {
        async fn send_otp(&self, _email: &str) -> Result<(), ClientError> {
            Ok(())
        }
        async fn verify_otp(&self, _email: &str, _otp: &str) -> Result<(), ClientError> {
            Ok(())
        }
    }
}
