// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Phone-auth provider abstraction.
//!
//! The provider owns the code; the client only ever holds an opaque
//! confirmation handle. The human-challenge widget sits behind
//! `ChallengeSolver` so it can be replaced in tests.

use crate::client::error::{ClientError, ProviderError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Proof that the human challenge was passed. Opaque to the client.
#[derive(Clone, PartialEq, Eq)]
pub struct ChallengeToken(String);

impl ChallengeToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ChallengeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChallengeToken(..)")
    }
}

/// Provider-side session for one dispatched code.
#[derive(Clone, PartialEq, Eq)]
pub struct ConfirmationHandle(String);

impl ConfirmationHandle {
    pub fn new(session: impl Into<String>) -> Self {
        Self(session.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ConfirmationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConfirmationHandle(..)")
    }
}

/// The third-party human-verification widget.
#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    async fn solve(&self) -> Result<ChallengeToken, ProviderError>;
}

#[async_trait]
pub trait PhoneAuthProvider: Send + Sync {
    async fn solve_challenge(&self) -> Result<ChallengeToken, ClientError>;

    /// Send a code to `phone_number` (E.164).
    async fn send_code(
        &self,
        phone_number: &str,
        challenge: &ChallengeToken,
    ) -> Result<ConfirmationHandle, ClientError>;

    async fn confirm_code(
        &self,
        handle: &ConfirmationHandle,
        code: &str,
    ) -> Result<(), ClientError>;
}

/// Google Identity Toolkit phone sign-in over REST.
pub struct IdentityToolkitProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    solver: Arc<dyn ChallengeSolver>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendCodeResponse {
    session_info: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl IdentityToolkitProvider {
    pub fn new(api_key: String, solver: Arc<dyn ChallengeSolver>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: IDENTITY_TOOLKIT_URL.to_string(),
            api_key,
            solver,
        }
    }

    /// Point at a different endpoint (emulator or test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn post(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}/accounts:{}", self.base_url, method);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::ProviderUnavailable(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|e| e.error.message)
            .unwrap_or_default();
        tracing::warn!(%status, method, error = %message, "Phone-auth provider error");
        Err(map_provider_error(&message).into())
    }
}

#[async_trait]
impl PhoneAuthProvider for IdentityToolkitProvider {
    async fn solve_challenge(&self) -> Result<ChallengeToken, ClientError> {
        Ok(self.solver.solve().await?)
    }

    async fn send_code(
        &self,
        phone_number: &str,
        challenge: &ChallengeToken,
    ) -> Result<ConfirmationHandle, ClientError> {
        let body = json!({
            "phoneNumber": phone_number,
            "recaptchaToken": challenge.as_str(),
        });
        let response = self.post("sendVerificationCode", body).await?;
        let sent: SendCodeResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ProviderUnavailable(e.to_string()))?;
        Ok(ConfirmationHandle::new(sent.session_info))
    }

    async fn confirm_code(
        &self,
        handle: &ConfirmationHandle,
        code: &str,
    ) -> Result<(), ClientError> {
        let body = json!({
            "sessionInfo": handle.as_str(),
            "code": code,
        });
        self.post("signInWithPhoneNumber", body).await?;
        Ok(())
    }
}

/// Map an Identity Toolkit error string to a `ProviderError`.
///
/// Messages look like `"TOO_MANY_ATTEMPTS_TRY_LATER : details"`; only the
/// leading token matters.
pub fn map_provider_error(message: &str) -> ProviderError {
    let token = message
        .split(|c: char| c == ' ' || c == ':')
        .next()
        .unwrap_or_default();
    match token {
        "INVALID_CODE" => ProviderError::InvalidCode,
        "SESSION_EXPIRED" | "CODE_EXPIRED" => ProviderError::Expired,
        "INVALID_SESSION_INFO" | "MISSING_SESSION_INFO" => ProviderError::NoActiveChallenge,
        "TOO_MANY_ATTEMPTS_TRY_LATER" | "QUOTA_EXCEEDED" => {
            ProviderError::RateLimited { retry_after_secs: 60 }
        }
        "INVALID_PHONE_NUMBER" | "MISSING_PHONE_NUMBER" => ProviderError::InvalidTarget,
        "CAPTCHA_CHECK_FAILED" | "INVALID_RECAPTCHA_TOKEN" => ProviderError::ChallengeFailed,
        "MISSING_RECAPTCHA_TOKEN" => ProviderError::ChallengeRequired,
        "" => ProviderError::ProviderUnavailable("no error detail".to_string()),
        other => ProviderError::ProviderUnavailable(other.to_string()),
    }
}
