// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! One-time email codes.
//!
//! Handles:
//! - Code generation (6 digits, CSPRNG) and delivery through a `Mailer`
//! - Hashed storage with TTL and per-email resend cooldown
//! - Verification with attempt limits; a superseded code reports `Expired`
//! - Short-lived "email verified" grants, held by the session that
//!   verified, consumed by that user's profile update

use crate::error::{AppError, OtpFailure};
use crate::models::user::normalize_email;
use crate::services::mailer::Mailer;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;
use subtle::ConstantTimeEq;
use validator::ValidateEmail;

/// Wrong guesses allowed before the code is discarded.
const MAX_VERIFY_ATTEMPTS: u32 = 5;
/// How long a successful verification may be used by a profile update.
const VERIFIED_GRANT_MINUTES: i64 = 15;
/// Superseded code hashes remembered per email.
const SUPERSEDED_HISTORY: usize = 3;

#[derive(Clone)]
struct OtpRecord {
    code_hash: [u8; 32],
    superseded: Vec<[u8; 32]>,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    attempts: u32,
}

impl OtpRecord {
    /// Long enough past expiry that a late guess may report "no code"
    /// instead of "expired", and past the resend cooldown.
    fn is_stale(&self, now: DateTime<Utc>, ttl: Duration, cooldown: Duration) -> bool {
        now > self.expires_at + ttl && now >= self.issued_at + cooldown
    }
}

/// A successful verification, usable only by the user who verified.
#[derive(Clone, Copy)]
struct VerifiedGrant {
    holder: Option<Uuid>,
    until: DateTime<Utc>,
}

/// Issues and checks emailed codes.
#[derive(Clone)]
pub struct OtpService {
    records: Arc<DashMap<String, OtpRecord>>,
    verified: Arc<DashMap<String, VerifiedGrant>>,
    mailer: Arc<dyn Mailer>,
    rng: SystemRandom,
    ttl: Duration,
    cooldown: Duration,
}

impl OtpService {
    pub fn new(mailer: Arc<dyn Mailer>, ttl: std::time::Duration, cooldown: std::time::Duration) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            verified: Arc::new(DashMap::new()),
            mailer,
            rng: SystemRandom::new(),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::minutes(5)),
            cooldown: Duration::from_std(cooldown).unwrap_or_else(|_| Duration::seconds(30)),
        }
    }

    /// Issue a fresh code for `email`, invalidating any earlier one.
    ///
    /// Returns the code's lifetime in seconds.
    pub async fn issue(&self, email: &str) -> Result<u64, AppError> {
        let email = normalize_email(email);
        if !email.validate_email() {
            return Err(AppError::BadRequest("Invalid email address".to_string()));
        }

        let now = Utc::now();
        self.purge_expired(now);
        let previous = self.records.get(&email).map(|r| r.clone());

        if let Some(prev) = &previous {
            let next_allowed = prev.issued_at + self.cooldown;
            if now < next_allowed {
                let retry_after_secs = (next_allowed - now).num_seconds().max(1) as u64;
                return Err(AppError::RateLimited { retry_after_secs });
            }
        }

        let code = self.generate_code()?;
        let mut superseded = previous
            .as_ref()
            .map(|prev| {
                let mut history = prev.superseded.clone();
                history.push(prev.code_hash);
                history
            })
            .unwrap_or_default();
        if superseded.len() > SUPERSEDED_HISTORY {
            let excess = superseded.len() - SUPERSEDED_HISTORY;
            superseded.drain(..excess);
        }

        self.records.insert(
            email.clone(),
            OtpRecord {
                code_hash: hash_code(&email, &code),
                superseded,
                issued_at: now,
                expires_at: now + self.ttl,
                attempts: 0,
            },
        );

        let body = format!(
            "Your verification code is {code}. It expires in {} minutes. \
             If you did not request this, you can ignore this email.",
            self.ttl.num_minutes().max(1)
        );

        if let Err(e) = self.mailer.send(&email, "Your verification code", &body).await {
            // Don't leave a code the user can never receive.
            match previous {
                Some(prev) => {
                    self.records.insert(email.clone(), prev);
                }
                None => {
                    self.records.remove(&email);
                }
            }
            return Err(AppError::Upstream(format!("Failed to send code: {e}")));
        }

        tracing::info!(email = %email, "Verification code issued");
        Ok(self.ttl.num_seconds().max(0) as u64)
    }

    /// Check a code. Success consumes it and grants `holder` a short
    /// verification window. An anonymous caller gets a grant nobody can use.
    pub fn verify(&self, email: &str, code: &str, holder: Option<Uuid>) -> Result<(), AppError> {
        let email = normalize_email(email);
        let now = Utc::now();
        self.purge_expired(now);
        let submitted = hash_code(&email, code.trim());

        let outcome = {
            let Some(mut record) = self.records.get_mut(&email) else {
                return Err(AppError::Otp(OtpFailure::NoActiveCode));
            };

            if now > record.expires_at {
                Err(OtpFailure::Expired)
            } else if bool::from(record.code_hash[..].ct_eq(&submitted[..])) {
                Ok(())
            } else if record
                .superseded
                .iter()
                .any(|old| bool::from(old[..].ct_eq(&submitted[..])))
            {
                Err(OtpFailure::Expired)
            } else {
                record.attempts += 1;
                if record.attempts >= MAX_VERIFY_ATTEMPTS {
                    Err(OtpFailure::Expired)
                } else {
                    Err(OtpFailure::InvalidCode)
                }
            }
        };

        match outcome {
            Ok(()) => {
                self.records.remove(&email);
                self.verified.insert(
                    email.clone(),
                    VerifiedGrant {
                        holder,
                        until: now + Duration::minutes(VERIFIED_GRANT_MINUTES),
                    },
                );
                tracing::info!(email = %email, user_id = ?holder, "Email verified");
                Ok(())
            }
            Err(OtpFailure::Expired) => {
                // An expired or exhausted code can never succeed; a superseded
                // one leaves the live code in place.
                self.records.remove_if(&email, |_, r| {
                    now > r.expires_at || r.attempts >= MAX_VERIFY_ATTEMPTS
                });
                Err(AppError::Otp(OtpFailure::Expired))
            }
            Err(failure) => Err(AppError::Otp(failure)),
        }
    }

    /// Whether `user_id` holds an unexpired verification grant for `email`.
    pub fn is_verified(&self, user_id: Uuid, email: &str) -> bool {
        self.verified
            .get(&normalize_email(email))
            .is_some_and(|grant| grant.holder == Some(user_id) && Utc::now() <= grant.until)
    }

    /// Consume `user_id`'s grant for `email`, if one is still valid.
    pub fn consume_verified(&self, user_id: Uuid, email: &str) -> bool {
        let now = Utc::now();
        self.verified
            .remove_if(&normalize_email(email), |_, grant| grant.holder == Some(user_id))
            .is_some_and(|(_, grant)| now <= grant.until)
    }

    /// Drop dead codes and grants. `send-otp` needs no session, so nothing
    /// else bounds these maps.
    fn purge_expired(&self, now: DateTime<Utc>) {
        let (ttl, cooldown) = (self.ttl, self.cooldown);
        self.records.retain(|_, r| !r.is_stale(now, ttl, cooldown));
        self.verified.retain(|_, grant| now <= grant.until);
    }

    fn generate_code(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; 4];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG unavailable")))?;
        Ok(format!("{:06}", u32::from_be_bytes(bytes) % 1_000_000))
    }
}

fn hash_code(email: &str, code: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    hasher.update(b"|");
    hasher.update(code.as_bytes());
    hasher.finalize().into()
}
